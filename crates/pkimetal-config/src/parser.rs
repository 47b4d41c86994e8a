use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::{ConfigError, Result};
use crate::types::PkiMetalConfig;
use crate::validator::validate_config;

const ENV_PREFIX: &str = "PKIMETAL_";

/// Reads `path`, parses it, overlays `PKIMETAL_<SECTION>__<FIELD>` environment variables, then
/// validates. This is the entry point `pkimetal-cli` calls at boot.
pub fn parse_config(path: &Path) -> Result<PkiMetalConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config = parse_config_from_str(&content)?;
    let config = overlay_env(config, std::env::vars())?;
    validate_config(&config)?;
    Ok(config)
}

/// Parses a YAML document into a config. Every field defaults if absent, so an empty document
/// parses to [`PkiMetalConfig::default`]. Does not apply the environment overlay or validate;
/// callers that need the full boot sequence should go through [`parse_config`].
pub fn parse_config_from_str(yaml: &str) -> Result<PkiMetalConfig> {
    if yaml.trim().is_empty() {
        return Ok(PkiMetalConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

fn overlay_env(config: PkiMetalConfig, vars: impl Iterator<Item = (String, String)>) -> Result<PkiMetalConfig> {
    let mut value = serde_yaml::to_value(&config).map_err(ConfigError::Parse)?;

    for (key, raw) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<&str> = rest.split("__").filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }
        set_path(&mut value, &segments, &raw);
    }

    serde_yaml::from_value(value).map_err(ConfigError::Parse)
}

/// Descends `value` along `segments`, matching each segment case-insensitively against the
/// mapping keys already present (so `PKIMETAL_SERVER__WEBSERVERPORT` finds `server.webserverPort`
/// regardless of case), and sets the final segment to `raw` parsed as a YAML scalar so booleans
/// and integers round-trip as their proper type rather than becoming strings.
fn set_path(value: &mut Value, segments: &[&str], raw: &str) {
    if !matches!(value, Value::Mapping(_)) {
        *value = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(mapping) = value else {
        unreachable!("just normalised to a mapping");
    };

    let head = segments[0];
    let tail = &segments[1..];

    let existing_key = mapping
        .keys()
        .find(|k| k.as_str().is_some_and(|s| s.eq_ignore_ascii_case(head)))
        .cloned();
    let key = existing_key.unwrap_or_else(|| Value::String(head.to_string()));

    if tail.is_empty() {
        let parsed: Value = serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        mapping.insert(key, parsed);
        return;
    }

    let mut child = mapping.get(&key).cloned().unwrap_or(Value::Mapping(Mapping::new()));
    set_path(&mut child, tail, raw);
    mapping.insert(key, child);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_document_parses_to_defaults() {
        let config = parse_config_from_str("").unwrap();
        assert_eq!(config.server.webserver_port, 8080);
        assert_eq!(config.linter.max_queue_size, 8192);
        assert_eq!(config.response.default_format, "json");
    }

    #[test]
    fn partial_document_only_overrides_named_fields() {
        let yaml = "server:\n  webserverPort: 9090\n";
        let config = parse_config_from_str(yaml).unwrap();
        assert_eq!(config.server.webserver_port, 9090);
        assert_eq!(config.server.monitoring_port, 8081);
    }

    #[test]
    fn human_readable_durations_parse() {
        let yaml = "server:\n  requestTimeout: 45s\n  livezTimeout: 250ms\n";
        let config = parse_config_from_str(yaml).unwrap();
        assert_eq!(config.server.request_timeout, Duration::from_secs(45));
        assert_eq!(config.server.livez_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let result = parse_config_from_str("server: [unterminated");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = parse_config(Path::new("/nonexistent/pkimetal.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }

    #[test]
    fn env_overlay_overrides_a_nested_field_case_insensitively() {
        let config = PkiMetalConfig::default();
        std::env::set_var("PKIMETAL_LINTER__ZLINT__NUMGOROUTINES", "4");
        let overlaid = overlay_env(config, std::env::vars()).unwrap();
        std::env::remove_var("PKIMETAL_LINTER__ZLINT__NUMGOROUTINES");
        assert_eq!(overlaid.linter.zlint.num_goroutines, 4);
    }
}
