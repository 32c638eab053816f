pub mod config;
pub mod error;
pub mod glob;
pub mod identity;
pub mod registry;

pub use config::{AndoConfig, ProjectConfig};
pub use error::GatewayError;
pub use identity::Identity;
pub use registry::ProjectRegistry;
