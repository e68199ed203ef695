mod env;
mod loader;
mod types;

pub use env::Environment;
pub use loader::{CONFIG_FILE, load};
pub use types::{CollaboratorConfig, Config, DependencyConfig, RuntimeConfig, Seconds, TimeoutConfig};
