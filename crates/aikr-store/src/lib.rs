pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use config::{load_config, load_config_or_default, parse_config};
pub use error::{Result, StoreError};
pub use store::Store;
