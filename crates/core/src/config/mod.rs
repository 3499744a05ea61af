pub mod app_config;
pub mod identifier;
pub mod sources;
pub mod validation;

pub use app_config::*;
pub use identifier::*;
pub use sources::*;
pub use validation::*;
