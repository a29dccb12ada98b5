pub mod aux_map;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod factory;

pub use aux_map::AuxiliaryMap;
pub use config::LoaderConfig;
pub use dispatch::DispatchBundle;
pub use error::CoreError;
pub use factory::{ObjectFactories, ObjectFactory};
