//! Loader trampolines.
//!
//! Each trampoline unwraps the loader handles it receives, looks up the
//! entry in the dispatch bundle of the driver owning the primary handle,
//! forwards the call, and on success wraps any handles the driver produced.
//! Destroy-style calls release the wrapper only after the driver succeeds.

mod command;
mod context;
mod driver;
mod fabric;
mod image;
mod memory;
mod module;
mod rtas;
mod sync;

// Submodules import this by path, not by textual scope.
/// Table entry that forwards to a `LoaderContext` method returning
/// `Result<(), ZeResult>`.
macro_rules! route {
    ($ctx:expr, $method:ident, |$($arg:ident : $ty:ty),* $(,)?|) => {{
        let ctx = ::std::sync::Arc::clone($ctx);
        Some(::std::sync::Arc::new(move |$($arg: $ty),*| -> ::accel_api::ZeResult {
            ::accel_api::ZeResult::from(ctx.$method($($arg),*))
        }))
    }};
}

pub(crate) use route;
