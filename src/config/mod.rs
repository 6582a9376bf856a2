mod expand;
pub mod generate;
pub mod parse;
pub mod types;

pub use expand::{expand_tilde, resolve_config_path, EnvRefs};
pub use parse::{load_config, parse_config, ConfigError};
pub use types::{Config, HttpConfig, OutputConfig, ServerConfig, StreamConfig};
