//! Dynamic loading of driver modules.
//!
//! A driver module is a shared library exporting `accel_driver_entry`
//! (see [`accel_api::export_driver`]), which hands back a boxed
//! `Arc<dyn DdiProvider>`.

use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use accel_api::{DdiProvider, DRIVER_ENTRY_SYMBOL};
use libloading::{Library, Symbol};
use tracing::debug;

use crate::error::LoaderError;

type FnDriverEntry = unsafe extern "C" fn() -> *mut c_void;

/// An opened driver module.
///
/// The module is never unloaded. Providers and passthrough tables obtained
/// from it run its code and may outlive every `Loader`, so the mapping lives
/// until process exit.
pub struct DriverLibrary {
    path: PathBuf,
    _library: &'static Library,
}

impl DriverLibrary {
    /// Open `path` and call its entry point.
    ///
    /// # Safety
    ///
    /// `path` must name a driver module built against this version of
    /// `accel-api`, so that its entry point returns a
    /// `Box<Arc<dyn DdiProvider>>` with a compatible layout. Running its
    /// initializers must be sound.
    pub unsafe fn open(path: &Path) -> Result<(Arc<dyn DdiProvider>, Self), LoaderError> {
        let shown = path.display().to_string();
        // SAFETY: upheld by the caller.
        let library = unsafe { Library::new(path) }.map_err(|source| LoaderError::Library {
            path: shown.clone(),
            source,
        })?;

        let raw = {
            // SAFETY: the symbol type matches what `export_driver!` generates.
            let entry: Symbol<FnDriverEntry> = unsafe { library.get(DRIVER_ENTRY_SYMBOL) }
                .map_err(|source| LoaderError::MissingEntry {
                    path: shown.clone(),
                    source,
                })?;
            // SAFETY: see above; the entry point takes no arguments.
            unsafe { entry() }
        };
        if raw.is_null() {
            return Err(LoaderError::EntryFailed(shown));
        }
        let library: &'static Library = Box::leak(Box::new(library));

        // SAFETY: a non-null result is the `Box<Arc<dyn DdiProvider>>` leaked
        // by `export_driver!`; ownership transfers here exactly once.
        let provider = unsafe { *Box::from_raw(raw.cast::<Arc<dyn DdiProvider>>()) };
        debug!(path = %shown, driver = provider.name(), "driver entry point resolved");

        Ok((
            provider,
            Self {
                path: path.to_path_buf(),
                _library: library,
            },
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for DriverLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverLibrary").field("path", &self.path).finish()
    }
}
