//! Shared vocabulary between the loader, its layers and driver modules:
//! result codes, handle types, descriptors and the per-family dispatch
//! tables (DDI tables) that every component fills in.

pub mod ddi;
pub mod handle;
pub mod intercept;
pub mod provider;
pub mod result;
pub mod types;

pub use ddi::*;
pub use handle::*;
pub use intercept::{Call, InterceptLayer, Interceptor, Param};
pub use provider::{DdiProvider, DdiTable, DdiTables, InterfaceFamily, DRIVER_ENTRY_SYMBOL};
pub use result::ZeResult;
pub use types::*;
