//! # pkimetal-core
//!
//! Dispatch core for a PKI meta-linter gateway: decodes certificates/CRLs/OCSP responses,
//! autodetects their conformance profile, and fans each request out to a pool of in-process
//! and external-subprocess lint engines, merging their findings into one ordered report.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pkimetal_core::{Engine, EngineRegistry, LintingRequest};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut registry = EngineRegistry::new();
//! // registry.register(Engine::new(...));
//! registry.start_all().await.expect("engines are a declared capability at boot");
//! registry.stop_all().await;
//! # }
//! ```
//!
//! ## Components
//!
//! - **Profile registry** (`profile`): every certificate/CRL/OCSP conformance profile.
//! - **Input decoder** (`decode`): PEM/base64 decode, dummy-signature TBS wrapping.
//! - **Profile autodetector** (`autodetect`): deterministic profile selection.
//! - **CCADB capability table** (`ccadb`): fingerprint/SKI issuer capability lookup.
//! - **Engine registry & worker pool** (`registry`): bounded queues, mixed worker kinds.
//! - **Engine adapters** (`adapters`): the uniform start/stop/handle-request capability set.
//! - **Dispatch & merge** (`dispatch`): fan-out, deterministic sort, severity filtering, deadline.
//! - **Health observer** (`health`): liveness/readiness timestamps.
//! - **Metrics & request logging** (`telemetry`): Prometheus exposition, structured log lines.

pub mod adapters;
pub mod autodetect;
pub mod ccadb;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod http;
pub mod profile;
pub mod registry;
pub mod severity;
pub mod telemetry;
pub mod types;

pub use adapters::{EngineAdapter, StartInstance};
pub use autodetect::EndpointKind;
pub use dispatch::{dispatch, DispatchInput, DispatchOutcome};
pub use error::{CoreError, Result};
pub use health::HealthObserver;
pub use http::{monitoring_router, web_router, AppState};
pub use profile::{Profile, ProfileId};
pub use registry::{Engine, EngineInstance, EngineRegistry, InstanceState};
pub use severity::Severity;
pub use telemetry::{log_request, LogLevel, Metrics, RequestKind, RequestLogFields};
pub use types::{LintingRequest, LintingResult};
