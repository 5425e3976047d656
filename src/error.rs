use thiserror::Error;

/// Global error type for the orchestrator.
#[derive(Error, Debug)]
pub enum OrchestrateError {
    /// The name is not present in the service registry.
    #[error("Unknown service '{0}'")]
    UnknownService(String),

    /// The static dependency table contains a cycle. Raised once at
    /// registry construction, never during normal operation.
    #[error("Cyclic dependency in service table involving '{0}'")]
    CyclicDependency(String),

    /// The static table itself is malformed (duplicate name, empty command).
    #[error("Invalid service table: {0}")]
    InvalidRegistry(String),

    /// A prerequisite of the service is not answering its health endpoint.
    #[error("Cannot start '{service}': dependency '{dependency}' is not ready")]
    DependencyNotReady { service: String, dependency: String },

    /// The service executable could not be launched.
    #[error("Failed to spawn '{service}': {source}")]
    SpawnError {
        service: String,
        #[source]
        source: std::io::Error,
    },

    /// The process survived the forceful kill attempt.
    #[error("Process {pid} of '{service}' refused to die")]
    StopError { service: String, pid: u32 },

    /// The service never returned HTTP 200 within the attempt budget.
    #[error("Service '{service}' did not become healthy after {attempts} attempts")]
    HealthTimeout { service: String, attempts: u32 },

    /// Another orchestrator invocation holds the per-service lock.
    #[error("Service '{service}' is locked by another invocation (pid {holder})")]
    LockHeld { service: String, holder: u32 },

    /// HTTP client construction failure.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Underlying IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestrateError>;
