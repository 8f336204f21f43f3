//! Configuration loading for the pairlink relay.
//!
//! Files are discovered as `pairlink.{toml,yaml,yml,json}` and may reference
//! environment variables as `${VAR}`.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, load_config, set_config_dir,
        to_toml_string,
    },
    schema::{MIN_CODE_BYTES, PairlinkConfig, ServerConfig, SessionConfig},
};
