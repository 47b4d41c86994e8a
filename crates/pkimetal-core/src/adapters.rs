//! Engine adapters (C7): the uniform capability surface every lint engine implements.
//!
//! An adapter's `start_instance` is called once per configured instance and decides whether
//! that instance runs in-process or as an external subprocess; everything about spawning and
//! supervising the subprocess (pipes, the stdio wire protocol, teardown) is the worker pool's
//! job (`registry.rs`), not the adapter's — mirroring how the reference runtime splits
//! `LinterInterface` (what an engine is) from `serverLoop` (how the pool runs it).

use async_trait::async_trait;

use crate::types::{LintingRequest, LintingResult};

/// What an adapter's startup yields for one instance.
pub enum StartInstance {
    /// `handle_request` is called directly on a pool worker task.
    InProcess,
    /// The pool spawns `command` (with `args`, cwd `directory`) as a persistent child process
    /// and speaks the line-oriented stdio protocol to it (see `registry::SubprocessBackend`).
    Subprocess {
        directory: String,
        command: String,
        args: Vec<String>,
    },
}

/// Implemented once per lint engine kind. `handle_request` is only ever invoked for instances
/// whose `start_instance` returned `InProcess`; subprocess instances are driven entirely by the
/// pool's stdio protocol loop.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    fn start_instance(&self) -> StartInstance;

    /// Release any in-process-held state. No-op by default; subprocess teardown (closing
    /// stdin, draining stderr, waiting for exit) is handled by the pool regardless of this hook.
    async fn stop_instance(&self) {}

    async fn handle_request(&self, request: &LintingRequest) -> Vec<LintingResult>;
}

/// Drives one engine that speaks the subprocess stdio protocol: every instance spawns `command`
/// with `args` in `directory`. Used for every configured engine whose config carries a
/// `numProcesses`/interpreter-directory pair (badkeys, certlint, ftfy, pkilint); the command and
/// its arguments are this engine's own business (a Python or Ruby entry point living under that
/// directory), which is why `command`/`args` are supplied by the bootstrap code rather than
/// derived here.
pub struct SubprocessAdapter {
    pub directory: String,
    pub command: String,
    pub args: Vec<String>,
}

#[async_trait]
impl EngineAdapter for SubprocessAdapter {
    fn start_instance(&self) -> StartInstance {
        StartInstance::Subprocess {
            directory: self.directory.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
        }
    }

    async fn handle_request(&self, _request: &LintingRequest) -> Vec<LintingResult> {
        // Never called: subprocess instances are driven entirely by the pool's stdio loop.
        Vec::new()
    }
}

/// Placeholder for an in-process engine whose lint rule content is a black box this crate does
/// not implement (dwklint, rocacheck, x509lint, zlint in the reference implementation run
/// in-process against Go/cgo libraries with no equivalent here). Registered so the dispatch core
/// and capability-enumeration endpoints have a real, queryable engine to report on instead of
/// silently omitting it; always returns a single META finding explaining why.
pub struct UnimplementedEngineAdapter {
    pub name: &'static str,
}

#[async_trait]
impl EngineAdapter for UnimplementedEngineAdapter {
    fn start_instance(&self) -> StartInstance {
        StartInstance::InProcess
    }

    async fn handle_request(&self, _request: &LintingRequest) -> Vec<LintingResult> {
        vec![LintingResult::meta(
            self.name,
            format!("{}: lint rule content not implemented in this build", self.name),
        )]
    }
}

/// Deterministic fake in-process adapters used by dispatch-core integration tests, so queueing,
/// merge ordering, deadline handling and graceful shutdown can be exercised without depending on
/// any real external linter being installed.
pub mod testing {
    use super::*;
    use crate::severity::Severity;

    /// Always emits one finding of the given severity, then returns immediately.
    pub struct FixedFindingAdapter {
        pub severity: Severity,
        pub finding: &'static str,
    }

    #[async_trait]
    impl EngineAdapter for FixedFindingAdapter {
        fn start_instance(&self) -> StartInstance {
            StartInstance::InProcess
        }

        async fn handle_request(&self, _request: &LintingRequest) -> Vec<LintingResult> {
            vec![LintingResult::finding("fixed", self.severity, self.finding)]
        }
    }

    /// Emits nothing; used to exercise the "applicable but silent" path through dispatch.
    pub struct SilentAdapter;

    #[async_trait]
    impl EngineAdapter for SilentAdapter {
        fn start_instance(&self) -> StartInstance {
            StartInstance::InProcess
        }

        async fn handle_request(&self, _request: &LintingRequest) -> Vec<LintingResult> {
            Vec::new()
        }
    }

    /// Sleeps past any reasonable test deadline before responding, to exercise abandonment.
    pub struct SlowAdapter {
        pub delay: std::time::Duration,
    }

    #[async_trait]
    impl EngineAdapter for SlowAdapter {
        fn start_instance(&self) -> StartInstance {
            StartInstance::InProcess
        }

        async fn handle_request(&self, _request: &LintingRequest) -> Vec<LintingResult> {
            tokio::time::sleep(self.delay).await;
            vec![LintingResult::finding("slow", Severity::Info, "finally done")]
        }
    }
}
