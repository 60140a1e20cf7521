pub mod settings;

pub use settings::{BridgeConfig, ConfigError, CONFIG_PATH_ENV};
