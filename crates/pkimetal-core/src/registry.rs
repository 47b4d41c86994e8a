//! Engine registry & worker pool (C5) — the dispatch core's crux.
//!
//! Each engine owns a fixed number of worker instances sharing one bounded request queue.
//! Instances run either in-process or as a persistent subprocess speaking a line-oriented
//! stdio protocol; either way, one instance handles one request at a time, so an engine with
//! `k` instances serves up to `k` requests concurrently.

use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_channel::{Receiver, Sender};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::watch;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::adapters::{EngineAdapter, StartInstance};
use crate::error::{CoreError, Result};
use crate::profile::ProfileId;
use crate::severity::Severity;
use crate::types::{LintingRequest, LintingResult, END_OF_RESULTS, PKIMETAL_NAME};

/// Lifecycle of one worker instance. Entered `Unstarted` at registration, `Running` once its
/// task is polling the request queue, `Draining` after the shutdown signal while it tears down
/// any subprocess, `Stopped` once that teardown completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Unstarted,
    Running,
    Draining,
    Stopped,
}

impl InstanceState {
    fn to_u8(self) -> u8 {
        match self {
            InstanceState::Unstarted => 0,
            InstanceState::Running => 1,
            InstanceState::Draining => 2,
            InstanceState::Stopped => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => InstanceState::Unstarted,
            1 => InstanceState::Running,
            2 => InstanceState::Draining,
            _ => InstanceState::Stopped,
        }
    }
}

/// A registered lint engine: its identity, the profiles it can't handle, and the bounded queue
/// its instances share.
pub struct Engine {
    pub name: String,
    pub version: String,
    pub url: String,
    pub unsupported_profiles: FxHashSet<ProfileId>,
    pub instance_count: usize,
    adapter: Arc<dyn EngineAdapter>,
    tx: Sender<LintingRequest>,
    rx: Receiver<LintingRequest>,
}

impl Engine {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
        unsupported_profiles: impl IntoIterator<Item = ProfileId>,
        instance_count: usize,
        max_queue_size: usize,
        adapter: Arc<dyn EngineAdapter>,
    ) -> Arc<Self> {
        let (tx, rx) = async_channel::bounded(max_queue_size.max(1));
        Arc::new(Self {
            name: name.into(),
            version: version.into(),
            url: url.into(),
            unsupported_profiles: unsupported_profiles.into_iter().collect(),
            instance_count,
            adapter,
            tx,
            rx,
        })
    }

    pub fn is_applicable(&self, profile_id: ProfileId) -> bool {
        self.instance_count > 0 && !self.unsupported_profiles.contains(&profile_id)
    }

    /// Enqueues a request, suspending until the queue has capacity or every receiver is gone.
    pub async fn enqueue(&self, request: LintingRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| CoreError::QueueClosed)
    }
}

/// One worker instance of an engine. Points back to its engine rather than the other way
/// around, so instances can be tracked (and their state inspected) independently of dispatch.
pub struct EngineInstance {
    pub engine: Arc<Engine>,
    pub index: usize,
    state: AtomicU8,
}

impl EngineInstance {
    pub fn state(&self) -> InstanceState {
        InstanceState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, s: InstanceState) {
        self.state.store(s.to_u8(), Ordering::Release);
    }
}

enum InstanceBackend {
    InProcess,
    Subprocess(SubprocessBackend),
}

#[derive(Deserialize)]
struct FindingDescription {
    severity: String,
    code: String,
    #[allow(dead_code)]
    message: String,
}

#[derive(Deserialize)]
struct PkilintResult {
    node_path: String,
    #[allow(dead_code)]
    validator: String,
    finding_descriptions: Vec<FindingDescription>,
}

#[derive(Deserialize)]
struct PkilintResults {
    results: Vec<PkilintResult>,
}

fn protocol_failure(engine_name: &str, detail: impl AsRef<str>) -> LintingResult {
    LintingResult::finding(
        PKIMETAL_NAME,
        Severity::Fatal,
        format!("{engine_name}: {}", detail.as_ref()),
    )
}

/// The child process and its three pipes for one external worker instance. Scoped to the
/// instance's lifetime; `kill_on_drop` guarantees the child is reaped even if the worker task
/// is aborted before `stop` runs.
struct SubprocessBackend {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: BufReader<ChildStderr>,
}

impl SubprocessBackend {
    async fn spawn(
        engine_name: &str,
        instance: usize,
        directory: &str,
        command: &str,
        args: &[String],
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args);
        if !directory.is_empty() {
            cmd.current_dir(directory);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            tracing::error!(engine = engine_name, instance, error = %e, "Cmd.Start() failed");
            CoreError::EngineProtocol {
                engine: engine_name.to_string(),
                detail: format!("spawn failed: {e}"),
            }
        })?;

        let stdin = child.stdin.take().ok_or_else(|| CoreError::EngineProtocol {
            engine: engine_name.to_string(),
            detail: "Cmd.StdinPipe() failed".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| CoreError::EngineProtocol {
            engine: engine_name.to_string(),
            detail: "Cmd.StdoutPipe() failed".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| CoreError::EngineProtocol {
            engine: engine_name.to_string(),
            detail: "Cmd.StderrPipe() failed".to_string(),
        })?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr: BufReader::new(stderr),
        })
    }

    /// Writes `<profileId>\n<b64input>\n` to the child's stdin, then reads response tokens
    /// until the `[EndOfResults]` sentinel or a protocol violation ends the stream early. On
    /// any violation the stream is considered corrupted: the worker does not try to realign,
    /// it just surfaces a single FATAL result naming the engine.
    async fn handle_request(
        &mut self,
        engine_name: &str,
        profile_id: ProfileId,
        b64_input: &str,
    ) -> Vec<LintingResult> {
        let mut results = Vec::new();

        let line = format!("{}\n{}\n", profile_id as u16, b64_input.trim());
        if let Err(e) = self.stdin.write_all(line.as_bytes()).await {
            results.push(protocol_failure(engine_name, format!("stdin write failed: {e}")));
            return results;
        }

        let mut line = String::new();
        loop {
            line.clear();
            let n = match self.stdout.read_line(&mut line).await {
                Ok(n) => n,
                Err(e) => {
                    results.push(protocol_failure(engine_name, format!("stdout read failed: {e}")));
                    return results;
                }
            };
            if n == 0 {
                results.push(protocol_failure(engine_name, "stdout closed unexpectedly"));
                return results;
            }
            let token = line.trim_end_matches(['\r', '\n']);

            if token == END_OF_RESULTS {
                break;
            } else if token.len() >= 2 && token.as_bytes()[1] == b':' {
                if token.len() < 4 {
                    results.push(protocol_failure(
                        engine_name,
                        format!("description of finding is unexpectedly short: '{token}'"),
                    ));
                    return results;
                }
                match Severity::from_token(token.chars().next().expect("non-empty token")) {
                    Some(severity) => {
                        results.push(LintingResult::finding(engine_name, severity, token[3..].to_string()))
                    }
                    None => {
                        results.push(protocol_failure(engine_name, format!("unexpected linting result: '{token}'")));
                        return results;
                    }
                }
            } else if token.starts_with('{') {
                match serde_json::from_str::<PkilintResults>(token) {
                    Ok(parsed) => {
                        for r in parsed.results {
                            for fd in r.finding_descriptions {
                                match Severity::from_name(&fd.severity) {
                                    Some(severity) => results.push(LintingResult {
                                        engine_name: engine_name.to_string(),
                                        field: Some(r.node_path.clone()),
                                        finding: fd.code.clone(),
                                        severity,
                                        code: Some(fd.code),
                                    }),
                                    None => {
                                        results.push(protocol_failure(
                                            engine_name,
                                            format!("unknown severity '{}'", fd.severity),
                                        ));
                                        return results;
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        results.push(protocol_failure(engine_name, format!("JSON parse error: {e}")));
                        return results;
                    }
                }
            } else {
                results.push(protocol_failure(engine_name, format!("unknown response format: '{token}'")));
                return results;
            }
        }

        results
    }

    /// Closes stdin (signalling EOF to the child), logs any residual stderr, then waits for
    /// the child to exit.
    async fn stop(mut self, engine_name: &str, instance: usize) {
        drop(self.stdin);

        let mut line = String::new();
        loop {
            line.clear();
            match self.stderr.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = line.trim_end_matches(['\r', '\n']);
                    if !text.is_empty() {
                        tracing::info!(engine = engine_name, instance, text, "from stderr");
                    }
                }
            }
        }

        match self.child.wait().await {
            Ok(status) if !status.success() => {
                tracing::error!(engine = engine_name, instance, ?status, "Cmd.Wait failed");
            }
            Err(e) => tracing::error!(engine = engine_name, instance, error = %e, "Cmd.Wait failed"),
            _ => {}
        }
    }
}

async fn process_request(instance: &EngineInstance, backend: &mut InstanceBackend, request: LintingRequest) {
    let engine = &instance.engine;
    let queued_for = request.queued_at.elapsed();
    let start = Instant::now();

    match backend {
        InstanceBackend::InProcess => {
            for mut result in engine.adapter.handle_request(&request).await {
                result.engine_name = engine.name.clone();
                if request.resp_tx.send(result).await.is_err() {
                    return;
                }
            }
        }
        InstanceBackend::Subprocess(sub) => {
            for result in sub
                .handle_request(&engine.name, request.profile_id, &request.b64_input)
                .await
            {
                if request.resp_tx.send(result).await.is_err() {
                    return;
                }
            }
        }
    }

    let meta = LintingResult::meta(
        engine.name.clone(),
        format!(
            "Queued: {:?}; Runtime: {:?}; Version: {}",
            queued_for,
            start.elapsed(),
            engine.version
        ),
    );
    if request.resp_tx.send(meta).await.is_err() {
        return;
    }
    let _ = request
        .resp_tx
        .send(LintingResult::end_of_results(PKIMETAL_NAME))
        .await;
}

async fn run_instance(instance: Arc<EngineInstance>, mut backend: InstanceBackend, mut shutdown_rx: watch::Receiver<bool>) {
    instance.set_state(InstanceState::Running);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                break;
            }
            request = instance.engine.rx.recv() => {
                match request {
                    Ok(request) => process_request(&instance, &mut backend, request).await,
                    Err(_) => break,
                }
            }
        }
    }

    instance.set_state(InstanceState::Draining);
    if let InstanceBackend::Subprocess(sub) = backend {
        sub.stop(&instance.engine.name, instance.index).await;
    }
    instance.engine.adapter.stop_instance().await;
    instance.set_state(InstanceState::Stopped);
}

/// Owns every registered engine and its running instances. Built once at boot; the engine set
/// never grows after `start_all` is called.
pub struct EngineRegistry {
    engines: Vec<Arc<Engine>>,
    instances: AsyncMutex<Vec<Arc<EngineInstance>>>,
    worker_handles: AsyncMutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            engines: Vec::new(),
            instances: AsyncMutex::new(Vec::new()),
            worker_handles: AsyncMutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Registers an engine. Must be called before `start_all`.
    pub fn register(&mut self, engine: Arc<Engine>) {
        if engine.instance_count > 0 {
            tracing::info!(name = %engine.name, instances = engine.instance_count, "registering linter");
        } else {
            tracing::info!(name = %engine.name, "unused linter");
        }
        self.engines.push(engine);
    }

    pub fn engines(&self) -> &[Arc<Engine>] {
        &self.engines
    }

    pub fn applicable_engines(&self, profile_id: ProfileId) -> impl Iterator<Item = &Arc<Engine>> {
        self.engines.iter().filter(move |e| e.is_applicable(profile_id))
    }

    /// Starts every registered engine's instances sequentially. A subprocess spawn failure is
    /// fatal for the whole service: engines are a declared capability, not optional at runtime.
    pub async fn start_all(&self) -> Result<()> {
        let mut instances = self.instances.lock().await;
        let mut handles = self.worker_handles.lock().await;

        for engine in &self.engines {
            if engine.instance_count == 0 {
                continue;
            }
            for index in 0..engine.instance_count {
                tracing::info!(name = %engine.name, instance = index, "starting linter");

                let backend = match engine.adapter.start_instance() {
                    StartInstance::InProcess => InstanceBackend::InProcess,
                    StartInstance::Subprocess { directory, command, args } => {
                        let sub = SubprocessBackend::spawn(&engine.name, index, &directory, &command, &args).await?;
                        InstanceBackend::Subprocess(sub)
                    }
                };

                let instance = Arc::new(EngineInstance {
                    engine: engine.clone(),
                    index,
                    state: AtomicU8::new(InstanceState::Unstarted.to_u8()),
                });
                instances.push(instance.clone());

                let shutdown_rx = self.shutdown_rx.clone();
                handles.push(tokio::spawn(run_instance(instance, backend, shutdown_rx)));
            }
        }

        Ok(())
    }

    /// Signals every worker to drain its in-flight request and stop, then waits for all of them
    /// (and any subprocess they own) to exit. The service should only consider itself shut down
    /// once this returns.
    pub async fn stop_all(&self) {
        let _ = self.shutdown_tx.send(true);

        let mut handles = self.worker_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "linter worker task panicked");
            }
        }
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{FixedFindingAdapter, SilentAdapter};

    fn make_request(profile_id: ProfileId, resp_tx: Sender<LintingResult>) -> LintingRequest {
        LintingRequest {
            b64_input: "AA==".to_string(),
            decoded_input: Arc::new(vec![0]),
            is_certificate: false,
            profile_id,
            queued_at: Instant::now(),
            checks_added: Vec::new(),
            checks_disabled: Vec::new(),
            resp_tx,
        }
    }

    async fn drain(rx: Receiver<LintingResult>) -> Vec<LintingResult> {
        let mut out = Vec::new();
        while let Ok(r) = rx.recv().await {
            let is_eor = r.is_end_of_results();
            out.push(r);
            if is_eor {
                break;
            }
        }
        out
    }

    #[test]
    fn engine_is_applicable_respects_unsupported_and_instance_count() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(SilentAdapter);
        let engine = Engine::new("x", "1.0", "", [ProfileId::Rfc5280Crl], 2, 8, adapter.clone());
        assert!(engine.is_applicable(ProfileId::Rfc5280Leaf));
        assert!(!engine.is_applicable(ProfileId::Rfc5280Crl));

        let disabled = Engine::new("y", "1.0", "", [], 0, 8, adapter);
        assert!(!disabled.is_applicable(ProfileId::Rfc5280Leaf));
    }

    #[tokio::test]
    async fn in_process_engine_emits_finding_then_meta_then_sentinel() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(FixedFindingAdapter {
            severity: Severity::Warning,
            finding: "w_something_odd",
        });
        let engine = Engine::new("fixed", "1.0.0", "", [], 1, 8, adapter);

        let mut registry = EngineRegistry::new();
        registry.register(engine.clone());
        registry.start_all().await.expect("in-process engine never fails to start");

        let (tx, rx) = async_channel::unbounded();
        engine.enqueue(make_request(ProfileId::Rfc5280Leaf, tx)).await.unwrap();

        let results = drain(rx).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].finding, "w_something_odd");
        assert_eq!(results[0].severity, Severity::Warning);
        assert_eq!(results[1].severity, Severity::Meta);
        assert!(results[1].finding.starts_with("Queued:"));
        assert!(results[2].is_end_of_results());

        registry.stop_all().await;
    }

    #[tokio::test]
    async fn single_instance_engine_completes_requests_one_at_a_time() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(FixedFindingAdapter {
            severity: Severity::Info,
            finding: "ok",
        });
        let engine = Engine::new("fixed", "1.0.0", "", [], 1, 8, adapter);

        let mut registry = EngineRegistry::new();
        registry.register(engine.clone());
        registry.start_all().await.unwrap();

        let (tx1, rx1) = async_channel::unbounded();
        let (tx2, rx2) = async_channel::unbounded();
        engine.enqueue(make_request(ProfileId::Rfc5280Leaf, tx1)).await.unwrap();
        engine.enqueue(make_request(ProfileId::Rfc5280Leaf, tx2)).await.unwrap();

        assert_eq!(drain(rx1).await.len(), 3);
        assert_eq!(drain(rx2).await.len(), 3);

        registry.stop_all().await;
    }

    struct BogusSubprocessAdapter;

    #[async_trait::async_trait]
    impl EngineAdapter for BogusSubprocessAdapter {
        fn start_instance(&self) -> StartInstance {
            StartInstance::Subprocess {
                directory: String::new(),
                command: "definitely-not-a-real-pkimetal-linter-binary".to_string(),
                args: Vec::new(),
            }
        }

        async fn handle_request(&self, _request: &LintingRequest) -> Vec<LintingResult> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn subprocess_spawn_failure_is_propagated_as_an_error() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(BogusSubprocessAdapter);
        let engine = Engine::new("bogus", "1.0.0", "", [], 1, 8, adapter);

        let mut registry = EngineRegistry::new();
        registry.register(engine);
        assert!(registry.start_all().await.is_err());
    }
}
