use anyhow::Result;
use orchestrate::error::OrchestrateError;
use orchestrate::{
    HealthPoller, OrchestrationEngine, Outcome, ProcessManager, Scope, ServiceDefinition,
    ServiceRegistry, ServiceRuntimeState, SystemConfig, UnixSupervisor,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// These tests drive the real engine end to end: real child processes
// (`sleep`), a real loopback health endpoint, and PID/lock/log files in a
// temporary run directory.

/// Loopback HTTP server answering 200 on every request.
async fn serve_ok() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        }
    });
    port
}

/// A port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

fn fast_config(dir: &Path) -> SystemConfig {
    SystemConfig {
        run_dir: dir.to_path_buf(),
        log_dir: dir.join("logs"),
        health_attempts: 3,
        health_interval: Duration::from_millis(20),
        stop_grace: Duration::from_secs(2),
        settle_delay: Duration::ZERO,
    }
}

/// A service whose process is a plain `sleep` and whose health endpoint is
/// whatever the test wires to `port`.
fn sleeper(name: &str, port: u16, deps: &[&str]) -> ServiceDefinition {
    ServiceDefinition {
        name: name.to_string(),
        command: vec!["sleep".to_string(), "30".to_string()],
        host: "127.0.0.1".to_string(),
        port,
        health_path: "/health".to_string(),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
    }
}

fn build_engine(
    definitions: Vec<ServiceDefinition>,
    config: &SystemConfig,
) -> OrchestrationEngine<UnixSupervisor> {
    let registry = ServiceRegistry::from_definitions(definitions).expect("registry");
    let manager = ProcessManager::new(UnixSupervisor, config);
    let poller = HealthPoller::new().expect("poller");
    OrchestrationEngine::new(registry, manager, poller, config)
}

fn read_pid(dir: &Path, service: &str) -> u32 {
    std::fs::read_to_string(dir.join(format!("{}.pid", service)))
        .expect("pid file")
        .trim()
        .parse()
        .expect("decimal pid")
}

/// File name -> contents snapshot of the run directory (PID files only;
/// logs are expected to change).
fn pid_snapshot(dir: &Path) -> BTreeMap<String, String> {
    let mut snapshot = BTreeMap::new();
    for entry in std::fs::read_dir(dir).expect("read dir").flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".pid") {
            let contents = std::fs::read_to_string(entry.path()).unwrap_or_default();
            snapshot.insert(name, contents);
        }
    }
    snapshot
}

#[tokio::test]
async fn test_restart_replaces_pid_and_ends_running() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = fast_config(dir.path());
    let port = serve_ok().await;
    let engine = build_engine(vec![sleeper("auth", port, &[])], &config);
    let scope = Scope::One("auth".to_string());

    // Cold start.
    let report = engine.start(&scope).await?;
    assert_eq!(report.entries, vec![("auth".to_string(), Outcome::Started)]);
    let first_pid = read_pid(dir.path(), "auth");

    // Restart must tear the old process down and bring a fresh one up.
    let report = engine.restart(&scope).await?;
    assert_eq!(report.entries, vec![("auth".to_string(), Outcome::Started)]);
    let second_pid = read_pid(dir.path(), "auth");
    assert_ne!(first_pid, second_pid, "restart must spawn a new process");

    let rows = engine.status(&scope).await?;
    assert_eq!(rows[0].state, ServiceRuntimeState::Running);
    assert_eq!(rows[0].pid, Some(second_pid));

    // Teardown: PID file gone once the stop is confirmed.
    engine.stop(&scope).await?;
    assert!(!dir.path().join("auth.pid").exists());
    Ok(())
}

#[tokio::test]
async fn test_start_when_running_does_not_respawn() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = fast_config(dir.path());
    let port = serve_ok().await;
    let engine = build_engine(vec![sleeper("auth", port, &[])], &config);
    let scope = Scope::One("auth".to_string());

    engine.start(&scope).await?;
    let first_pid = read_pid(dir.path(), "auth");

    let report = engine.start(&scope).await?;
    assert_eq!(
        report.entries,
        vec![("auth".to_string(), Outcome::AlreadySatisfied)]
    );
    assert_eq!(read_pid(dir.path(), "auth"), first_pid);

    engine.stop(&scope).await?;
    Ok(())
}

#[tokio::test]
async fn test_dependency_gate_blocks_start_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = fast_config(dir.path());
    // auth is down (closed port); strategy depends on it.
    let engine = build_engine(
        vec![
            sleeper("auth", closed_port(), &[]),
            sleeper("strategy", closed_port(), &["auth"]),
        ],
        &config,
    );

    let result = engine.start(&Scope::One("strategy".to_string())).await;
    match result {
        Err(OrchestrateError::DependencyNotReady {
            service,
            dependency,
        }) => {
            assert_eq!(service, "strategy");
            assert_eq!(dependency, "auth");
        }
        other => panic!("expected DependencyNotReady, got {:?}", other),
    }
    // Nothing was spawned for the gated service.
    assert!(!dir.path().join("strategy.pid").exists());
    Ok(())
}

#[tokio::test]
async fn test_partial_start_leaves_earlier_services_running() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = fast_config(dir.path());
    let auth_port = serve_ok().await;
    // strategy's health endpoint never comes up.
    let engine = build_engine(
        vec![
            sleeper("auth", auth_port, &[]),
            sleeper("strategy", closed_port(), &["auth"]),
        ],
        &config,
    );

    let result = engine.start(&Scope::All).await;
    match result {
        Err(OrchestrateError::HealthTimeout { service, attempts }) => {
            assert_eq!(service, "strategy");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected HealthTimeout, got {:?}", other),
    }

    // Forward-only failure handling: auth stays up, no rollback.
    let rows = engine.status(&Scope::All).await?;
    let auth_row = rows.iter().find(|r| r.service == "auth").expect("auth row");
    assert_eq!(auth_row.state, ServiceRuntimeState::Running);

    engine.stop(&Scope::All).await?;
    Ok(())
}

#[tokio::test]
async fn test_status_all_never_touches_pid_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = fast_config(dir.path());
    let engine = build_engine(
        vec![
            sleeper("auth", closed_port(), &[]),
            sleeper("data", closed_port(), &[]),
        ],
        &config,
    );

    // Plant a stale PID file; status must report around it, not fix it.
    std::fs::write(dir.path().join("auth.pid"), "999999\n")?;
    let before = pid_snapshot(dir.path());

    let rows = engine.status(&Scope::All).await?;
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.state, ServiceRuntimeState::Stopped);
    }

    let after = pid_snapshot(dir.path());
    assert_eq!(before, after, "status must be strictly read-only");
    Ok(())
}

#[tokio::test]
async fn test_stop_is_idempotent_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = fast_config(dir.path());
    let engine = build_engine(vec![sleeper("auth", closed_port(), &[])], &config);
    let scope = Scope::One("auth".to_string());

    let report = engine.stop(&scope).await?;
    assert_eq!(
        report.entries,
        vec![("auth".to_string(), Outcome::AlreadyStopped)]
    );
    assert!(!report.has_failures());
    Ok(())
}
