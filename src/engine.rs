//! Orchestration engine.
//!
//! Walks the dependency graph in the right direction for the requested
//! action and drives the lifecycle manager and the health poller. All
//! operations run as a single sequential flow: starting two services in
//! parallel when one may depend on the other is unsafe, and the registry
//! is small enough that ordering dominates anyway.

use crate::config::SystemConfig;
use crate::error::{OrchestrateError, Result};
use crate::health::HealthPoller;
use crate::process::{ProcessManager, ProcessSupervisor, StopDisposition};
use crate::registry::ServiceRegistry;
use crate::state::StatusRow;
use log::{debug, error, info};
use std::time::Duration;
use tokio::time::sleep;

/// What an operation applies to: everything, or one named service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    One(String),
}

impl Scope {
    pub fn parse(raw: &str, registry: &ServiceRegistry) -> Result<Self> {
        if raw == "all" {
            Ok(Scope::All)
        } else if registry.contains(raw) {
            Ok(Scope::One(raw.to_string()))
        } else {
            Err(OrchestrateError::UnknownService(raw.to_string()))
        }
    }
}

/// Per-service phases within one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Checking,
    AlreadySatisfied,
    Acting,
    Verifying,
    Succeeded,
    Failed,
}

/// Tracks one service's progress through an operation.
struct OpTrace {
    service: String,
    phase: Phase,
}

impl OpTrace {
    fn begin(service: &str) -> Self {
        Self {
            service: service.to_string(),
            phase: Phase::Idle,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug!("[{}] {:?} -> {:?}", self.service, self.phase, next);
        self.phase = next;
    }
}

/// How one service came out of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AlreadySatisfied,
    Started,
    Stopped,
    AlreadyStopped,
    Failed(String),
}

/// Aggregated result of one operation over a scope.
#[derive(Debug, Default)]
pub struct OperationReport {
    pub entries: Vec<(String, Outcome)>,
}

impl OperationReport {
    fn record(&mut self, service: &str, outcome: Outcome) {
        self.entries.push((service.to_string(), outcome));
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, outcome)| matches!(outcome, Outcome::Failed(_)))
    }
}

pub struct OrchestrationEngine<S: ProcessSupervisor> {
    registry: ServiceRegistry,
    manager: ProcessManager<S>,
    poller: HealthPoller,
    health_attempts: u32,
    health_interval: Duration,
    settle_delay: Duration,
}

impl<S: ProcessSupervisor> OrchestrationEngine<S> {
    pub fn new(
        registry: ServiceRegistry,
        manager: ProcessManager<S>,
        poller: HealthPoller,
        config: &SystemConfig,
    ) -> Self {
        Self {
            registry,
            manager,
            poller,
            health_attempts: config.health_attempts,
            health_interval: config.health_interval,
            settle_delay: config.settle_delay,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    fn start_scope(&self, scope: &Scope) -> Result<Vec<String>> {
        match scope {
            Scope::All => Ok(self.registry.start_order().to_vec()),
            Scope::One(name) => {
                self.registry.get(name)?;
                Ok(vec![name.clone()])
            }
        }
    }

    fn stop_scope(&self, scope: &Scope) -> Result<Vec<String>> {
        match scope {
            Scope::All => Ok(self.registry.stop_order()),
            Scope::One(name) => {
                self.registry.get(name)?;
                Ok(vec![name.clone()])
            }
        }
    }

    /// Start the scope in dependency order. Fail-fast: the first failure
    /// aborts the whole operation. Services started earlier stay up; they
    /// succeeded independently, and nothing here rolls them back.
    pub async fn start(&self, scope: &Scope) -> Result<OperationReport> {
        let services = self.start_scope(scope)?;
        let mut report = OperationReport::default();

        for name in &services {
            match self.start_one(name).await {
                Ok(outcome) => report.record(name, outcome),
                Err(e) => {
                    error!("start aborted at '{}': {}", name, e);
                    return Err(e);
                }
            }
        }
        Ok(report)
    }

    async fn start_one(&self, name: &str) -> Result<Outcome> {
        let def = self.registry.get(name)?;
        let mut trace = OpTrace::begin(name);
        trace.advance(Phase::Checking);

        // Every prerequisite must already answer its health endpoint. A
        // service whose dependency is down is never even spawned.
        for dep in self.registry.dependencies_of(name)? {
            let dep_def = self.registry.get(dep)?;
            let healthy = self
                .poller
                .check_once(&dep_def.host, dep_def.port, &dep_def.health_path)
                .await;
            if !healthy {
                trace.advance(Phase::Failed);
                return Err(OrchestrateError::DependencyNotReady {
                    service: name.to_string(),
                    dependency: dep.clone(),
                });
            }
        }

        // Running and healthy: nothing to do.
        if self.manager.check_running(name)?.is_some()
            && self
                .poller
                .check_once(&def.host, def.port, &def.health_path)
                .await
        {
            trace.advance(Phase::AlreadySatisfied);
            info!("[{}] already running and healthy", name);
            return Ok(Outcome::AlreadySatisfied);
        }

        trace.advance(Phase::Acting);
        self.manager.start(def)?;

        trace.advance(Phase::Verifying);
        let result = self
            .poller
            .wait_ready(
                &def.host,
                def.port,
                &def.health_path,
                self.health_attempts,
                self.health_interval,
            )
            .await;
        if !result.ready {
            trace.advance(Phase::Failed);
            return Err(OrchestrateError::HealthTimeout {
                service: name.to_string(),
                attempts: result.attempts,
            });
        }

        info!(
            "[{}] healthy after {} attempt(s) ({:?})",
            name, result.attempts, result.elapsed
        );
        trace.advance(Phase::Succeeded);
        Ok(Outcome::Started)
    }

    /// Stop the scope in reverse dependency order. Best-effort teardown:
    /// "already stopped" is success, and a process that refuses to die is
    /// recorded as failed while the remaining stops still run.
    pub async fn stop(&self, scope: &Scope) -> Result<OperationReport> {
        let services = self.stop_scope(scope)?;
        let mut report = OperationReport::default();

        for name in &services {
            let def = self.registry.get(name)?;
            let mut trace = OpTrace::begin(name);
            trace.advance(Phase::Checking);
            trace.advance(Phase::Acting);

            match self.manager.stop(def).await {
                Ok(StopDisposition::Stopped) => {
                    trace.advance(Phase::Succeeded);
                    report.record(name, Outcome::Stopped);
                }
                Ok(StopDisposition::NotRunning) => {
                    trace.advance(Phase::AlreadySatisfied);
                    report.record(name, Outcome::AlreadyStopped);
                }
                Err(e) => {
                    trace.advance(Phase::Failed);
                    error!("[{}] stop failed: {}", name, e);
                    report.record(name, Outcome::Failed(e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Full stop, fixed settle delay, full start. Deliberately not an
    /// in-place restart per service: the stop half runs to completion
    /// before anything starts again, so there is never a window where a
    /// dependency chain is partially torn down.
    pub async fn restart(&self, scope: &Scope) -> Result<OperationReport> {
        let stop_report = self.stop(scope).await?;
        if stop_report.has_failures() {
            return Ok(stop_report);
        }

        debug!("settling for {:?} before start", self.settle_delay);
        sleep(self.settle_delay).await;

        self.start(scope).await
    }

    /// Purely observational: no PID file is created, deleted or rewritten.
    pub async fn status(&self, scope: &Scope) -> Result<Vec<StatusRow>> {
        let services = self.start_scope(scope)?;
        let mut rows = Vec::with_capacity(services.len());

        for name in &services {
            let def = self.registry.get(name)?;
            let handle = self.manager.inspect(name);
            let healthy = self
                .poller
                .check_once(&def.host, def.port, &def.health_path)
                .await;
            rows.push(StatusRow::derive(name, handle.as_ref(), healthy));
        }
        Ok(rows)
    }
}
