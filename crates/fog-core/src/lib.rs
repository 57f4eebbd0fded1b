pub mod config;
pub mod error;
pub mod qos;
pub mod resources;
pub mod sampling;
pub mod types;

pub use config::FogConfig;
pub use error::ValidationError;
pub use qos::*;
pub use resources::Resources;
pub use sampling::*;
pub use types::*;
