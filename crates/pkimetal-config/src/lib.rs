//! # pkimetal-config
//!
//! Configuration loading for the lint gateway: a YAML file, overlaid with environment variables,
//! validated once at boot into an immutable typed tree.
//!
//! ## Quick Start
//!
//! ```rust
//! use pkimetal_config::{parse_config_from_str, validate_config};
//!
//! let yaml = r#"
//! server:
//!   webserverPort: 8080
//!   requestTimeout: 30s
//!
//! linter:
//!   maxQueueSize: 8192
//!   zlint:
//!     numGoroutines: 1
//! "#;
//!
//! let config = parse_config_from_str(yaml).expect("valid config");
//! validate_config(&config).expect("validation passes");
//!
//! assert_eq!(config.server.webserver_port, 8080);
//! assert_eq!(config.linter.zlint.num_goroutines, 1);
//! ```
//!
//! ## Validation rules
//!
//! - `linter.maxQueueSize` must be greater than 0.
//! - In-process engines with no subprocess isolation (`rocacheck`, `x509lint`, `zlint`) may only
//!   be configured with 0 or 1 instances.
//! - `server.requestTimeout` must be at least `server.livezTimeout` and `server.readyzTimeout`.

pub mod error;
pub mod parser;
pub mod types;
pub mod validator;

pub use error::{ConfigError, Result};
pub use parser::{parse_config, parse_config_from_str};
pub use types::*;
pub use validator::validate_config;
