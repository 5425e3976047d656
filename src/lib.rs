//! # Orchestrate
//!
//! Service process orchestrator for the trading stack: starts, stops,
//! restarts and health-checks the service constellation in dependency
//! order. PID files and HTTP health probes are its only state; every
//! invocation recomputes the world from scratch.
//!
//! ## Modules
//! - `registry`: the static service table and its topological ordering.
//! - `process`: the OS seam, PID files, per-service locks, lifecycle.
//! - `health`: bounded-retry HTTP readiness probing.
//! - `engine`: the start/stop/restart/status state machine.
//! - `config`: environment-derived settings.
//! - `state`: derived runtime state and status reporting.

pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod process;
pub mod registry;
pub mod state;

pub use config::SystemConfig;
pub use engine::{OperationReport, OrchestrationEngine, Outcome, Scope};
pub use error::{OrchestrateError, Result};
pub use health::{HealthCheckResult, HealthPoller};
pub use process::{ProcessHandle, ProcessManager, ProcessSupervisor, UnixSupervisor};
pub use registry::{ServiceDefinition, ServiceRegistry};
pub use state::{ServiceRuntimeState, StatusRow};
