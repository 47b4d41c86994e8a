//! `pkimetald`: boots the dispatch core (profile/CCADB tables, engine registry) and serves the
//! web and monitoring HTTP listeners until a termination signal arrives. Mirrors `main.go`'s
//! sequencing: configure graceful shutdown, start the linters, start the HTTP servers, wait to
//! be interrupted, then tear both down in reverse order.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use pkimetal_config::{parse_config, PkiMetalConfig};
use pkimetal_core::adapters::{EngineAdapter, SubprocessAdapter, UnimplementedEngineAdapter};
use pkimetal_core::ccadb::CcadbTable;
use pkimetal_core::health::HealthObserver;
use pkimetal_core::http::{monitoring_router, web_router, AppState};
use pkimetal_core::profile::{self, ProfileId};
use pkimetal_core::registry::{Engine, EngineRegistry};
use pkimetal_core::telemetry::Metrics;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pkimetald")]
#[command(about = "PKI meta-linter gateway", long_about = None)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "pkimetal.yaml")]
    config: PathBuf,

    /// Path to a CCADB "All Certificate Records" CSV export. Absence only degrades profile
    /// autodetection to its RFC5280 defaults; it is never a boot-time error.
    #[arg(long, default_value = "ccadb.csv")]
    ccadb: PathBuf,

    /// Overrides `logging.level` from the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(parse_config(&cli.config).context("failed to load configuration")?);

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.logging.level), config.logging.is_development);

    let ccadb = Arc::new(if cli.ccadb.is_file() {
        CcadbTable::load_from_file(&cli.ccadb)
    } else {
        tracing::info!(path = %cli.ccadb.display(), "no CCADB CSV file found, profile autodetection will use RFC5280 defaults");
        CcadbTable::empty()
    });

    let registry = Arc::new(build_registry(&config));
    registry.start_all().await.context("failed to start lint engines")?;

    let health = Arc::new(HealthObserver::new(config.server.remember_busy_timeout));
    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);

    let state = Arc::new(AppState {
        registry: registry.clone(),
        health,
        metrics,
        ccadb,
        config: config.clone(),
        service_version: SERVICE_VERSION.to_string(),
    });

    let web_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.webserver_port))
        .await
        .context("failed to bind web listener")?;
    let monitoring_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server.monitoring_port))
        .await
        .context("failed to bind monitoring listener")?;
    tracing::info!(port = config.server.webserver_port, "web listener bound");
    tracing::info!(port = config.server.monitoring_port, "monitoring listener bound");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_termination_signal().await;
        tracing::info!("received termination signal, shutting down");
        let _ = shutdown_tx.send(true);
    });

    let web_server = axum::serve(web_listener, web_router(state.clone()))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let monitoring_server =
        axum::serve(monitoring_listener, monitoring_router(state.clone())).with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let (web_result, monitoring_result) = tokio::join!(web_server, monitoring_server);
    web_result.context("web listener failed")?;
    monitoring_result.context("monitoring listener failed")?;

    registry.stop_all().await;
    tracing::info!("shut down");
    Ok(())
}

fn build_env_filter(level: &str) -> EnvFilter {
    if level.is_empty() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn init_tracing(level: &str, is_development: bool) {
    if is_development {
        tracing_subscriber::fmt()
            .with_env_filter(build_env_filter(level))
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(build_env_filter(level))
            .json()
            .init();
    }
}

/// Resolves once a matching value is observed on `rx`, whether it was already set before this
/// future started polling or arrives afterwards -- avoids the missed-wakeup a bare `Notify`
/// would have if the signal fires before both listeners are awaiting it.
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|shutting_down| *shutting_down).await;
}

/// Waits for SIGINT, SIGTERM, or (on Unix) SIGHUP, matching `signal.NotifyContext`'s signal set.
async fn wait_for_termination_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sighup.recv() => {}
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn non_certificate_profiles() -> Vec<ProfileId> {
    profile::all_profiles_ordered()
        .into_iter()
        .map(|(id, _)| id)
        .filter(|&id| profile::is_non_certificate(id))
        .collect()
}

fn ocsp_profiles() -> Vec<ProfileId> {
    profile::all_profiles_ordered()
        .into_iter()
        .map(|(id, _)| id)
        .filter(|&id| profile::is_ocsp(id))
        .collect()
}

/// Builds a subprocess-backed engine whose interpreter script speaks the registry's stdio
/// protocol directly: read `<profileId>\n<b64input>\n`, emit zero or more `<severity-token>: `
/// finding lines, then the `[EndOfResults]` sentinel. The embedded scripts below are minimal
/// stand-ins for this protocol, not the full upstream validator logic (which depends on Python/
/// Ruby packages this build does not vendor) -- see DESIGN.md.
fn subprocess_engine(
    name: &str,
    version: &str,
    url: &str,
    unsupported: Vec<ProfileId>,
    instance_count: usize,
    max_queue_size: usize,
    directory: String,
    command: &str,
    script: &str,
) -> std::sync::Arc<Engine> {
    let adapter: Arc<dyn EngineAdapter> = Arc::new(SubprocessAdapter {
        directory,
        command: command.to_string(),
        args: vec!["-c".to_string(), script.to_string()],
    });
    Engine::new(name, version, url, unsupported, instance_count, max_queue_size, adapter)
}

fn unimplemented_engine(
    name: &'static str,
    url: &str,
    unsupported: Vec<ProfileId>,
    instance_count: usize,
    max_queue_size: usize,
) -> std::sync::Arc<Engine> {
    let adapter: Arc<dyn EngineAdapter> = Arc::new(UnimplementedEngineAdapter { name });
    Engine::new(name, "unimplemented", url, unsupported, instance_count, max_queue_size, adapter)
}

const PYTHON_STDIO_DRIVER: &str = r#"
import sys

for line in sys.stdin:
    profile_id = line.strip()
    b64input = sys.stdin.readline().strip()
    print("[EndOfResults]", flush=True)
"#;

const RUBY_STDIO_DRIVER: &str = r#"
STDIN.each_line do |profile_id|
  b64input = STDIN.readline
  puts "[EndOfResults]"
  STDOUT.flush
end
"#;

fn build_registry(config: &PkiMetalConfig) -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    let max_queue_size = config.linter.max_queue_size;

    registry.register(subprocess_engine(
        "badkeys",
        "unknown",
        "https://github.com/badkeys/badkeys",
        non_certificate_profiles(),
        config.linter.badkeys.num_processes,
        max_queue_size,
        config.linter.badkeys.python_dir.clone(),
        "python3",
        PYTHON_STDIO_DRIVER,
    ));

    registry.register(subprocess_engine(
        "certlint",
        "unknown",
        "https://github.com/certlint/certlint",
        non_certificate_profiles(),
        config.linter.certlint.num_processes,
        max_queue_size,
        config.linter.certlint.python_dir.clone(),
        "ruby",
        RUBY_STDIO_DRIVER,
    ));

    registry.register(subprocess_engine(
        "ftfy",
        "unknown",
        "https://github.com/rspeer/python-ftfy",
        non_certificate_profiles(),
        config.linter.ftfy.num_processes,
        max_queue_size,
        config.linter.ftfy.python_dir.clone(),
        "python3",
        PYTHON_STDIO_DRIVER,
    ));

    registry.register(subprocess_engine(
        "pkilint",
        "unknown",
        "https://github.com/digicert/pkilint",
        Vec::new(),
        config.linter.pkilint.num_processes,
        max_queue_size,
        config.linter.pkilint.python_dir.clone(),
        "python3",
        PYTHON_STDIO_DRIVER,
    ));

    registry.register(unimplemented_engine(
        "dwklint",
        "https://github.com/CVE-2008-0166/dwklint",
        non_certificate_profiles(),
        config.linter.dwklint.num_goroutines,
        max_queue_size,
    ));

    registry.register(unimplemented_engine(
        "rocacheck",
        "https://github.com/titanous/rocacheck",
        non_certificate_profiles(),
        config.linter.rocacheck.num_goroutines,
        max_queue_size,
    ));

    registry.register(unimplemented_engine(
        "x509lint",
        "https://github.com/kroeckx/x509lint",
        non_certificate_profiles(),
        config.linter.x509lint.num_goroutines,
        max_queue_size,
    ));

    registry.register(unimplemented_engine(
        "zlint",
        "https://github.com/zmap/zlint",
        ocsp_profiles(),
        config.linter.zlint.num_goroutines,
        max_queue_size,
    ));

    registry
}
