use crate::groups;

/// Primary configuration struct containing all config sections
#[derive(Debug, Clone, Default)]
pub struct ChainConfig {
    pub client: groups::client::ConfigValues,
    pub enumeration: groups::enumeration::ConfigValues,
    pub reconstruction: groups::reconstruction::ConfigValues,
    pub log: groups::log::ConfigValues,
}

impl ChainConfig {
    /// Create a new ChainConfig with default values and environment variable overrides applied.
    pub fn new() -> Self {
        Self::default().with_env_overrides()
    }

    /// Environment variables follow the pattern: CHAINFETCH_{GROUP_NAME}_{FIELD_NAME}
    pub fn with_env_overrides(mut self) -> Self {
        self.client.apply_env_overrides();
        self.enumeration.apply_env_overrides();
        self.reconstruction.apply_env_overrides();
        self.log.apply_env_overrides();
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use utils::EnvVarGuard;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.client.retry_max_attempts, 3);
        assert_eq!(config.client.retry_base_delay, Duration::from_millis(500));
        assert_eq!(config.enumeration.page_size, 100);
        assert_eq!(config.enumeration.record_types, vec![16705, 16961]);
        assert_eq!(config.reconstruction.transfer_type, 16724);
        assert!(config.reconstruction.analyze_gaps);
    }

    #[test]
    fn test_env_override() {
        let _guard = EnvVarGuard::set("CHAINFETCH_RECONSTRUCTION_MAX_REPORTED_MISSING_KEYS", "12");
        let _bad = EnvVarGuard::set("CHAINFETCH_RECONSTRUCTION_DUPLICATE_PREVIEW_CHARS", "lots");

        let config = ChainConfig::default().with_env_overrides();
        assert_eq!(config.reconstruction.max_reported_missing_keys, 12);
        assert_eq!(config.reconstruction.duplicate_preview_chars, 50);
    }
}
