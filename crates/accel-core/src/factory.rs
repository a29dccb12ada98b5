//! Handle virtualization.
//!
//! When more than one driver is loaded, every handle the application sees is
//! a loader handle: an index into a per-family arena, tagged with the family
//! and a generation counter. The arena slot remembers the driver's native
//! handle and the dispatch bundle of the driver that produced it.
//!
//! Bit layout of a loader handle:
//!
//! ```text
//!  63      56 55            32 31             0
//! +----------+----------------+----------------+
//! |  family  |   generation   |   index + 1    |
//! +----------+----------------+----------------+
//! ```
//!
//! A handle whose slot was released (or reused) fails the generation check,
//! so a stale handle is reported as `ERROR_INVALID_NULL_HANDLE` instead of
//! reaching the wrong object.

use std::collections::HashMap;
use std::sync::Arc;

use accel_api::handle::*;
use accel_api::ZeResult;
use parking_lot::RwLock;

use crate::dispatch::DispatchBundle;

const GENERATION_MASK: u32 = 0x00ff_ffff;

/// Wrapper record for one live native object.
struct Wrapper<H, B> {
    native: H,
    dispatch: Arc<B>,
    refs: u32,
}

struct Slot<H, B> {
    generation: u32,
    object: Option<Wrapper<H, B>>,
}

struct Arena<H, B> {
    slots: Vec<Slot<H, B>>,
    free: Vec<u32>,
    /// `(native handle, bundle address)` -> slot index.
    by_identity: HashMap<(u64, usize), u32>,
}

/// Per-family map from (native handle, dispatch bundle) to a unique loader
/// handle.
pub struct ObjectFactory<H, B = DispatchBundle> {
    arena: RwLock<Arena<H, B>>,
    max_live: usize,
}

impl<H: Handle, B> ObjectFactory<H, B> {
    pub fn new(max_live: usize) -> Self {
        Self {
            arena: RwLock::new(Arena {
                slots: Vec::new(),
                free: Vec::new(),
                by_identity: HashMap::new(),
            }),
            max_live,
        }
    }

    fn identity(native: H, dispatch: &Arc<B>) -> (u64, usize) {
        (native.as_raw(), Arc::as_ptr(dispatch) as usize)
    }

    fn encode(index: u32, generation: u32) -> H {
        let raw = (u64::from(H::FAMILY.tag()) << 56)
            | (u64::from(generation & GENERATION_MASK) << 32)
            | (u64::from(index) + 1);
        H::from_raw(raw)
    }

    /// Split a loader handle into (index, generation), rejecting handles of
    /// another family.
    fn decode(handle: H) -> Result<(u32, u32), ZeResult> {
        let raw = handle.as_raw();
        let tag = (raw >> 56) as u8;
        let low = (raw & 0xffff_ffff) as u32;
        if handle.is_null() || tag != H::FAMILY.tag() || low == 0 {
            return Err(ZeResult::ERROR_INVALID_NULL_HANDLE);
        }
        Ok((low - 1, ((raw >> 32) as u32) & GENERATION_MASK))
    }

    /// Return the loader handle for `native` as produced by the driver owning
    /// `dispatch`, creating the wrapper on first sight.
    ///
    /// Each call takes one reference; [`release`](Self::release) drops one.
    /// A null native handle maps to the null loader handle.
    pub fn get_instance(&self, native: H, dispatch: &Arc<B>) -> Result<H, ZeResult> {
        if native.is_null() {
            return Ok(H::NULL);
        }
        let key = Self::identity(native, dispatch);
        let mut arena = self.arena.write();

        if let Some(&index) = arena.by_identity.get(&key) {
            let slot = &mut arena.slots[index as usize];
            if let Some(wrapper) = slot.object.as_mut() {
                wrapper.refs = wrapper.refs.saturating_add(1);
                return Ok(Self::encode(index, slot.generation));
            }
        }

        if arena.by_identity.len() >= self.max_live {
            tracing::warn!(
                family = ?H::FAMILY,
                limit = self.max_live,
                "handle factory full"
            );
            return Err(ZeResult::ERROR_OUT_OF_HOST_MEMORY);
        }
        arena
            .by_identity
            .try_reserve(1)
            .map_err(|_| ZeResult::ERROR_OUT_OF_HOST_MEMORY)?;

        let wrapper = Wrapper {
            native,
            dispatch: Arc::clone(dispatch),
            refs: 1,
        };
        let (index, generation) = match arena.free.pop() {
            Some(index) => {
                let slot = &mut arena.slots[index as usize];
                slot.object = Some(wrapper);
                (index, slot.generation)
            }
            None => {
                let index = u32::try_from(arena.slots.len())
                    .ok()
                    .filter(|index| *index < u32::MAX)
                    .ok_or(ZeResult::ERROR_OUT_OF_HOST_MEMORY)?;
                arena
                    .slots
                    .try_reserve(1)
                    .map_err(|_| ZeResult::ERROR_OUT_OF_HOST_MEMORY)?;
                arena.slots.push(Slot {
                    generation: 1,
                    object: Some(wrapper),
                });
                (index, 1)
            }
        };
        arena.by_identity.insert(key, index);
        Ok(Self::encode(index, generation))
    }

    /// Native handle and owning dispatch bundle behind a loader handle.
    pub fn unwrap(&self, handle: H) -> Result<(H, Arc<B>), ZeResult> {
        let (index, generation) = Self::decode(handle)?;
        let arena = self.arena.read();
        match arena.slots.get(index as usize) {
            Some(Slot {
                generation: current,
                object: Some(wrapper),
            }) if *current == generation => Ok((wrapper.native, Arc::clone(&wrapper.dispatch))),
            _ => Err(ZeResult::ERROR_INVALID_NULL_HANDLE),
        }
    }

    /// Drop one reference. The wrapper is destroyed, and the handle becomes
    /// stale, when the last reference goes.
    pub fn release(&self, handle: H) -> Result<(), ZeResult> {
        let (index, generation) = Self::decode(handle)?;
        let mut arena = self.arena.write();
        let slot = match arena.slots.get_mut(index as usize) {
            Some(slot) if slot.generation == generation && slot.object.is_some() => slot,
            _ => return Err(ZeResult::ERROR_INVALID_NULL_HANDLE),
        };

        let remaining = match slot.object.as_mut() {
            Some(wrapper) => {
                wrapper.refs -= 1;
                wrapper.refs
            }
            None => return Err(ZeResult::ERROR_INVALID_NULL_HANDLE),
        };
        if remaining > 0 {
            return Ok(());
        }

        let wrapper = slot.object.take();
        slot.generation = match (slot.generation + 1) & GENERATION_MASK {
            0 => 1,
            next => next,
        };
        if let Some(wrapper) = wrapper {
            let key = Self::identity(wrapper.native, &wrapper.dispatch);
            arena.by_identity.remove(&key);
        }
        arena.free.push(index);
        Ok(())
    }

    /// Current reference count of a live handle.
    pub fn refcount(&self, handle: H) -> Option<u32> {
        let (index, generation) = Self::decode(handle).ok()?;
        let arena = self.arena.read();
        let slot = arena.slots.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.object.as_ref().map(|wrapper| wrapper.refs)
    }

    /// Number of live wrappers.
    pub fn len(&self) -> usize {
        self.arena.read().by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every wrapper. Outstanding handles become stale.
    pub fn clear(&self) {
        let mut arena = self.arena.write();
        let Arena {
            slots,
            free,
            by_identity,
        } = &mut *arena;
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.object.take().is_some() {
                slot.generation = match (slot.generation + 1) & GENERATION_MASK {
                    0 => 1,
                    next => next,
                };
                free.push(index as u32);
            }
        }
        by_identity.clear();
    }
}

macro_rules! object_factories {
    ($($field:ident: $handle:ty),* $(,)?) => {
        /// One factory per object family.
        pub struct ObjectFactories {
            $(pub $field: ObjectFactory<$handle>,)*
        }

        impl ObjectFactories {
            pub fn new(max_live: usize) -> Self {
                Self {
                    $($field: ObjectFactory::new(max_live),)*
                }
            }

            /// Live wrappers across all families.
            pub fn live_objects(&self) -> usize {
                0 $(+ self.$field.len())*
            }

            pub fn clear(&self) {
                $(self.$field.clear();)*
            }
        }
    };
}

object_factories! {
    driver: DriverHandle,
    device: DeviceHandle,
    context: ContextHandle,
    command_queue: CommandQueueHandle,
    command_list: CommandListHandle,
    fence: FenceHandle,
    event_pool: EventPoolHandle,
    event: EventHandle,
    image: ImageHandle,
    module: ModuleHandle,
    module_build_log: ModuleBuildLogHandle,
    kernel: KernelHandle,
    sampler: SamplerHandle,
    physical_mem: PhysicalMemHandle,
    fabric_vertex: FabricVertexHandle,
    fabric_edge: FabricEdgeHandle,
    rtas_builder: RtasBuilderHandle,
    rtas_parallel_operation: RtasParallelOperationHandle,
}
