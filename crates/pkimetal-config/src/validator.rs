use crate::error::{ConfigError, Result};
use crate::types::PkiMetalConfig;

/// Three checks the reference implementation leaves implicit in its defaults but this crate
/// enforces explicitly, since a typo'd override (e.g. `maxQueueSize: 0`) would otherwise only
/// surface as a confusing hang at the first lint request rather than a boot-time error.
pub fn validate_config(config: &PkiMetalConfig) -> Result<()> {
    if config.linter.max_queue_size == 0 {
        return Err(ConfigError::Validation("linter.maxQueueSize must be greater than 0".to_string()));
    }

    // rocacheck, x509lint and zlint run in-process against the one shared interpreter-free
    // codebase; unlike badkeys/certlint/ftfy/pkilint (one OS process per instance) or dwklint
    // (one goroutine per instance against a read-only blocklist), there is no isolation boundary
    // between two in-process instances of these three, so configuring more than one buys nothing
    // and very likely indicates a misconfigured copy-paste from an engine that does support it.
    if config.linter.rocacheck.num_goroutines > 1 {
        return Err(ConfigError::Validation(
            "linter.rocacheck.numGoroutines must be 0 or 1".to_string(),
        ));
    }
    if config.linter.x509lint.num_goroutines > 1 {
        return Err(ConfigError::Validation(
            "linter.x509lint.numGoroutines must be 0 or 1".to_string(),
        ));
    }
    if config.linter.zlint.num_goroutines > 1 {
        return Err(ConfigError::Validation("linter.zlint.numGoroutines must be 0 or 1".to_string()));
    }

    if config.server.request_timeout < config.server.livez_timeout {
        return Err(ConfigError::Validation(
            "server.requestTimeout must be at least server.livezTimeout".to_string(),
        ));
    }
    if config.server.request_timeout < config.server.readyz_timeout {
        return Err(ConfigError::Validation(
            "server.requestTimeout must be at least server.readyzTimeout".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_validate() {
        validate_config(&PkiMetalConfig::default()).unwrap();
    }

    #[test]
    fn zero_queue_size_is_rejected() {
        let mut config = PkiMetalConfig::default();
        config.linter.max_queue_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn more_than_one_zlint_instance_is_rejected() {
        let mut config = PkiMetalConfig::default();
        config.linter.zlint.num_goroutines = 2;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn disabling_zlint_entirely_is_allowed() {
        let mut config = PkiMetalConfig::default();
        config.linter.zlint.num_goroutines = 0;
        validate_config(&config).unwrap();
    }

    #[test]
    fn multiple_badkeys_processes_are_allowed() {
        let mut config = PkiMetalConfig::default();
        config.linter.badkeys.num_processes = 8;
        validate_config(&config).unwrap();
    }

    #[test]
    fn request_timeout_shorter_than_livez_timeout_is_rejected() {
        let mut config = PkiMetalConfig::default();
        config.server.request_timeout = Duration::from_millis(100);
        config.server.livez_timeout = Duration::from_secs(1);
        assert!(validate_config(&config).is_err());
    }
}
