//! Built-in interceptor layers.
//!
//! Each layer is an [`accel_api::InterceptLayer`]: a table provider that
//! answers every table request by wrapping the table it is handed.

pub mod tracer;
pub mod validation;
