pub mod macros;
mod chain_config;

pub mod groups;

pub use utils::configuration_utils::ParsableConfigValue;
pub use chain_config::ChainConfig;

pub type ClientConfig = groups::client::ConfigValues;
pub type EnumerationConfig = groups::enumeration::ConfigValues;
pub type ReconstructionConfig = groups::reconstruction::ConfigValues;
pub type LogConfig = groups::log::ConfigValues;

lazy_static::lazy_static! {
    static ref CHAIN_CONFIG: ChainConfig = ChainConfig::new();
}

/// The process-wide configuration, read from the environment on first access.
pub fn chain_config() -> &'static ChainConfig {
    &CHAIN_CONFIG
}
