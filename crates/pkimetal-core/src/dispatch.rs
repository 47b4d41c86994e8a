//! Dispatch & merge (C6): fans one decoded input out to every applicable engine, waits for all
//! of them to finish (or the request's deadline to expire), then merges, sorts and severity-
//! filters their findings into the one ordered report the HTTP surface renders.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::health::HealthObserver;
use crate::profile::{self, ProfileId};
use crate::registry::EngineRegistry;
use crate::severity::{self, Severity};
use crate::types::{LintingRequest, LintingResult, PKIMETAL_NAME};

/// Everything dispatch needs about the decoded input. Built by the input decoder (C2) and the
/// profile autodetector (C3) before reaching this module.
pub struct DispatchInput {
    pub b64_input: String,
    pub decoded_input: Arc<Vec<u8>>,
    pub is_certificate: bool,
    pub profile_id: ProfileId,
    pub minimum_severity: Severity,
}

/// What a dispatched request produced.
pub enum DispatchOutcome {
    /// Every engine either finished or was skipped; `results` is sorted, merged and already
    /// filtered to `minimum_severity`.
    Completed(Vec<LintingResult>),
    /// The request's deadline elapsed before every applicable engine reported its
    /// `[EndOfResults]` sentinel. Engines that were already running continue to completion;
    /// their results are discarded once the shared response channel's only receiver is dropped.
    TimedOut,
}

/// Runs one request to completion under `deadline`, recording the outcome on `health`.
///
/// A timeout is recorded as busy, matching the reference service's `health.CompleteRequest`.
/// Completion is recorded as an error when any engine reported a protocol failure (surfaced as
/// a FATAL `pkimetal`-attributed result); everything else completing counts as success. This is
/// a deliberate generalisation beyond the reference implementation, which never calls its
/// equivalent of `record_success`/`record_error` outside the timeout path — see DESIGN.md.
pub async fn dispatch(
    registry: &EngineRegistry,
    health: &HealthObserver,
    input: DispatchInput,
    deadline: Duration,
    service_version: &str,
) -> DispatchOutcome {
    match tokio::time::timeout(deadline, run(registry, input, service_version)).await {
        Ok(results) => {
            if results.iter().any(|r| r.severity == Severity::Fatal) {
                health.record_error();
            } else {
                health.record_success();
            }
            DispatchOutcome::Completed(results)
        }
        Err(_) => {
            health.record_busy();
            DispatchOutcome::TimedOut
        }
    }
}

async fn run(registry: &EngineRegistry, input: DispatchInput, service_version: &str) -> Vec<LintingResult> {
    let (resp_tx, resp_rx) = async_channel::unbounded();

    let mut results = Vec::new();
    let mut outstanding = 0usize;

    for engine in registry.engines() {
        let available = engine.instance_count > 0;
        let applicable = engine.is_applicable(input.profile_id);
        if available && applicable {
            let request = LintingRequest {
                b64_input: input.b64_input.clone(),
                decoded_input: input.decoded_input.clone(),
                is_certificate: input.is_certificate,
                profile_id: input.profile_id,
                queued_at: Instant::now(),
                checks_added: Vec::new(),
                checks_disabled: Vec::new(),
                resp_tx: resp_tx.clone(),
            };
            match engine.enqueue(request).await {
                Ok(()) => outstanding += 1,
                Err(_) => results.push(LintingResult::meta(
                    engine.name.clone(),
                    format!("{}: queue closed", engine.name),
                )),
            }
        } else {
            results.push(LintingResult::meta(
                engine.name.clone(),
                format!(
                    "{}: Not used [Available:{}, Applicable:{}]",
                    engine.name, available, applicable
                ),
            ));
        }
    }
    drop(resp_tx);

    while outstanding > 0 {
        match resp_rx.recv().await {
            Ok(r) if r.is_end_of_results() => outstanding -= 1,
            Ok(r) => results.push(r),
            Err(_) => break,
        }
    }

    results.sort_by(|a, b| {
        a.engine_name
            .cmp(&b.engine_name)
            .then_with(|| severity::descending(a.severity, b.severity))
            .then_with(|| a.finding.cmp(&b.finding))
    });

    results.insert(
        0,
        LintingResult::meta(
            PKIMETAL_NAME,
            format!(
                "Profile: {}; Version: {}",
                profile::profile(input.profile_id).name,
                service_version
            ),
        ),
    );

    results.retain(|r| r.severity >= input.minimum_severity);

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{FixedFindingAdapter, SilentAdapter, SlowAdapter};
    use crate::adapters::EngineAdapter;
    use crate::registry::Engine;

    fn input(profile_id: ProfileId, minimum_severity: Severity) -> DispatchInput {
        DispatchInput {
            b64_input: "AA==".to_string(),
            decoded_input: Arc::new(vec![0]),
            is_certificate: false,
            profile_id,
            minimum_severity,
        }
    }

    #[tokio::test]
    async fn merges_sorts_and_prepends_profile_header() {
        let mut registry = EngineRegistry::new();

        let zlint: Arc<dyn EngineAdapter> = Arc::new(FixedFindingAdapter {
            severity: Severity::Warning,
            finding: "w_something",
        });
        registry.register(Engine::new("zlint", "1.0", "", [], 1, 8, zlint));

        let pkilint: Arc<dyn EngineAdapter> = Arc::new(FixedFindingAdapter {
            severity: Severity::Error,
            finding: "e_something_else",
        });
        registry.register(Engine::new("pkilint", "1.0", "", [], 1, 8, pkilint));

        registry.start_all().await.unwrap();
        let health = HealthObserver::default();

        let outcome = dispatch(
            &registry,
            &health,
            input(ProfileId::Rfc5280Leaf, Severity::Debug),
            Duration::from_secs(5),
            "test",
        )
        .await;

        let results = match outcome {
            DispatchOutcome::Completed(r) => r,
            DispatchOutcome::TimedOut => panic!("should not time out"),
        };

        assert_eq!(results[0].engine_name, PKIMETAL_NAME);
        assert!(results[0].finding.starts_with("Profile: rfc5280_leaf;"));
        // LinterName asc: pkilint before zlint.
        assert_eq!(results[1].engine_name, "pkilint");
        assert_eq!(results[1].finding, "e_something_else");
        assert_eq!(results[2].engine_name, "zlint");
        assert_eq!(results[2].finding, "w_something");

        registry.stop_all().await;
    }

    #[tokio::test]
    async fn unsupported_profile_is_reported_as_not_applicable() {
        let mut registry = EngineRegistry::new();
        let adapter: Arc<dyn EngineAdapter> = Arc::new(SilentAdapter);
        registry.register(Engine::new("crl-only", "1.0", "", [ProfileId::Rfc5280Leaf], 1, 8, adapter));
        registry.start_all().await.unwrap();
        let health = HealthObserver::default();

        let outcome = dispatch(
            &registry,
            &health,
            input(ProfileId::Rfc5280Leaf, Severity::Meta),
            Duration::from_secs(5),
            "test",
        )
        .await;

        let results = match outcome {
            DispatchOutcome::Completed(r) => r,
            DispatchOutcome::TimedOut => panic!("should not time out"),
        };
        assert!(results.iter().any(|r| r.finding.contains("Not used")
            && r.finding.contains("Available:true")
            && r.finding.contains("Applicable:false")));

        registry.stop_all().await;
    }

    #[tokio::test]
    async fn minimum_severity_filters_out_the_profile_header_too() {
        let mut registry = EngineRegistry::new();
        let adapter: Arc<dyn EngineAdapter> = Arc::new(FixedFindingAdapter {
            severity: Severity::Warning,
            finding: "w_something",
        });
        registry.register(Engine::new("zlint", "1.0", "", [], 1, 8, adapter));
        registry.start_all().await.unwrap();
        let health = HealthObserver::default();

        let outcome = dispatch(
            &registry,
            &health,
            input(ProfileId::Rfc5280Leaf, Severity::Error),
            Duration::from_secs(5),
            "test",
        )
        .await;

        let results = match outcome {
            DispatchOutcome::Completed(r) => r,
            DispatchOutcome::TimedOut => panic!("should not time out"),
        };
        // The WARNING finding and the META profile header both sort below ERROR.
        assert!(results.is_empty());

        registry.stop_all().await;
    }

    #[tokio::test]
    async fn deadline_elapses_before_a_slow_engine_finishes() {
        let mut registry = EngineRegistry::new();
        let adapter: Arc<dyn EngineAdapter> = Arc::new(SlowAdapter {
            delay: Duration::from_millis(200),
        });
        registry.register(Engine::new("slow", "1.0", "", [], 1, 8, adapter));
        registry.start_all().await.unwrap();
        let health = HealthObserver::default();

        let outcome = dispatch(
            &registry,
            &health,
            input(ProfileId::Rfc5280Leaf, Severity::Meta),
            Duration::from_millis(20),
            "test",
        )
        .await;

        assert!(matches!(outcome, DispatchOutcome::TimedOut));
        assert!(!health.is_ready());

        registry.stop_all().await;
    }
}
