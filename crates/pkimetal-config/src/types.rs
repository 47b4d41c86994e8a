use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The whole of the active configuration, as loaded by [`crate::parse_config`]. Immutable once
/// built: every component that needs it is handed an `Arc<PkiMetalConfig>` rather than a mutable
/// reference, matching the reference implementation's single package-level `Config` var that is
/// populated once at boot and never written again.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PkiMetalConfig {
    pub server: ServerConfig,
    pub linter: LinterConfig,
    pub response: ResponseConfig,
    pub logging: LoggingConfig,
}

impl Default for PkiMetalConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            linter: LinterConfig::default(),
            response: ResponseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub webserver_port: u16,
    pub monitoring_port: u16,
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    pub disable_keepalive: bool,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub livez_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub readyz_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub remember_busy_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub metrics_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            webserver_port: 8080,
            monitoring_port: 8081,
            read_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            disable_keepalive: false,
            request_timeout: Duration::from_secs(30),
            livez_timeout: Duration::from_millis(500),
            readyz_timeout: Duration::from_millis(500),
            remember_busy_timeout: Duration::from_secs(5),
            metrics_timeout: Duration::from_secs(8),
        }
    }
}

/// One entry per lint engine the reference implementation ships. `num_processes` is used by the
/// engines that spawn external interpreters (badkeys, certlint, ftfy, pkilint); `num_goroutines`
/// is used by the ones that run in-process (dwklint, rocacheck, x509lint, zlint). Both map onto
/// the same thing on this side: the number of `EngineInstance`s the registry starts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinterConfig {
    pub max_queue_size: usize,
    pub badkeys: ProcessEngineConfig,
    pub certlint: ProcessEngineConfig,
    pub dwklint: DirEngineConfig,
    pub ftfy: ProcessEngineConfig,
    pub pkilint: ProcessEngineConfig,
    pub rocacheck: InstanceEngineConfig,
    pub x509lint: InstanceEngineConfig,
    pub zlint: InstanceEngineConfig,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 8192,
            badkeys: ProcessEngineConfig::with_dir("autodetect"),
            certlint: ProcessEngineConfig::with_dir("autodetect"),
            dwklint: DirEngineConfig::with_dir("autodetect"),
            ftfy: ProcessEngineConfig::with_dir("autodetect"),
            pkilint: ProcessEngineConfig::with_dir("autodetect"),
            rocacheck: InstanceEngineConfig::default(),
            x509lint: InstanceEngineConfig::default(),
            zlint: InstanceEngineConfig::default(),
        }
    }
}

/// An engine that spawns one external process per instance (Python or Ruby interpreter).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessEngineConfig {
    pub num_processes: usize,
    pub python_dir: String,
}

impl ProcessEngineConfig {
    fn with_dir(dir: &str) -> Self {
        Self {
            num_processes: 1,
            python_dir: dir.to_string(),
        }
    }
}

impl Default for ProcessEngineConfig {
    fn default() -> Self {
        Self::with_dir("autodetect")
    }
}

/// Like [`ProcessEngineConfig`] but for the one engine (dwklint) whose directory holds a data
/// file (a compromised-key blocklist) rather than an interpreter, and whose field is named
/// `blocklistDir` rather than `pythonDir`/`rubyDir` in the reference implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirEngineConfig {
    pub num_goroutines: usize,
    pub blocklist_dir: String,
}

impl DirEngineConfig {
    fn with_dir(dir: &str) -> Self {
        Self {
            num_goroutines: 1,
            blocklist_dir: dir.to_string(),
        }
    }
}

impl Default for DirEngineConfig {
    fn default() -> Self {
        Self::with_dir("autodetect")
    }
}

/// An in-process engine with no directory of its own (rocacheck, x509lint, zlint): just a
/// goroutine (here, worker instance) count.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceEngineConfig {
    pub num_goroutines: usize,
}

impl Default for InstanceEngineConfig {
    fn default() -> Self {
        Self { num_goroutines: 1 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseConfig {
    pub default_format: String,
    pub json_pretty_print: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            default_format: "json".to_string(),
            json_pretty_print: false,
        }
    }
}

/// Sampling is disabled when both fields are `None`, matching the reference implementation's
/// convention of setting both to `math.MaxInt` (here represented as the absence of a value
/// rather than a sentinel integer).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub is_development: bool,
    pub level: String,
    pub sampling_initial: Option<u32>,
    pub sampling_thereafter: Option<u32>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            is_development: false,
            level: String::new(),
            sampling_initial: None,
            sampling_thereafter: None,
        }
    }
}
