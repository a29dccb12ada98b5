use accel_api::Handle;
use dashmap::DashMap;

/// Loader handle -> native handle, for objects that can also travel by value
/// inside other calls' payloads (kernel arguments), where the loader cannot
/// tell them apart from plain data without a lookup.
pub struct AuxiliaryMap<H: Handle> {
    entries: DashMap<H, H>,
}

impl<H: Handle> AuxiliaryMap<H> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, loader: H, native: H) {
        self.entries.insert(loader, native);
    }

    pub fn remove(&self, loader: H) -> Option<H> {
        self.entries.remove(&loader).map(|(_, native)| native)
    }

    /// Native handle for `loader`, or `loader` unchanged if it is not tracked.
    pub fn translate(&self, loader: H) -> H {
        self.entries.get(&loader).map(|v| *v).unwrap_or(loader)
    }

    pub fn contains(&self, loader: H) -> bool {
        self.entries.contains_key(&loader)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<H: Handle> Default for AuxiliaryMap<H> {
    fn default() -> Self {
        Self::new()
    }
}
