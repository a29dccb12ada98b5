//! Accelerator loader.
//!
//! Sits between an application and one or more driver modules. With a single
//! driver and no forced interception, the application receives the driver's
//! own dispatch tables. Otherwise every entry is a loader trampoline: handles
//! are virtualized per driver, enumerations fan out across drivers, and each
//! call is routed to the driver that produced its primary handle. Optional
//! validation and tracing layers wrap whichever tables were selected.

pub mod builder;
pub mod context;
pub mod error;
mod fanout;
pub mod layers;
pub mod library;
mod trampolines;

pub use builder::LoaderTable;
pub use context::{ComponentKind, ComponentVersion, DriverStatus, Loader, LoaderBuilder, LoaderContext};
pub use error::LoaderError;
pub use layers::tracer::{ApiTracer, Tracer, TracingLayer};
pub use layers::validation::{ParamChecker, ValidationLayer, Validator};
