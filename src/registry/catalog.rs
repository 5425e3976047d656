//! Static table of manageable services.
//!
//! This struct is the "Knowledge Base" (Registry). It is PURE data: the
//! dependency edges and connection info are fixed at construction time and
//! never mutated afterwards. The topological order is computed once in the
//! constructor, so a misconfigured table fails fast instead of surfacing
//! mid-operation.

use crate::config::{env_or, env_parse};
use crate::error::{OrchestrateError, Result};
use std::collections::HashMap;

/// Everything the orchestrator knows about one service. The command is
/// opaque: program plus args, handed to the process supervisor verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    pub name: String,
    pub command: Vec<String>,
    pub host: String,
    pub port: u16,
    pub health_path: String,
    pub dependencies: Vec<String>,
}

/// One row of the built-in table: name, default port, dependency edges.
struct ServiceSpec {
    name: &'static str,
    default_port: u16,
    dependencies: &'static [&'static str],
}

/// The fixed constellation: five core services plus auxiliary processes,
/// each depending only on services registered before it.
const SERVICE_TABLE: &[ServiceSpec] = &[
    ServiceSpec { name: "auth", default_port: 8000, dependencies: &[] },
    ServiceSpec { name: "data", default_port: 8001, dependencies: &[] },
    ServiceSpec { name: "strategy", default_port: 8002, dependencies: &["auth", "data"] },
    ServiceSpec { name: "backtest", default_port: 8003, dependencies: &["auth", "data", "strategy"] },
    ServiceSpec { name: "trade", default_port: 8004, dependencies: &["auth", "strategy"] },
    ServiceSpec { name: "router", default_port: 8010, dependencies: &["auth"] },
    ServiceSpec { name: "exchange-gateway", default_port: 8011, dependencies: &["auth", "trade"] },
    ServiceSpec { name: "paper-trading", default_port: 8012, dependencies: &["auth", "strategy"] },
];

#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: Vec<ServiceDefinition>,
    index: HashMap<String, usize>,
    start_order: Vec<String>,
}

impl ServiceRegistry {
    /// The built-in table with host/port/command resolved from the
    /// environment (`AUTH_HOST`, `AUTH_PORT`, `AUTH_CMD`, ...).
    pub fn standard() -> Result<Self> {
        let definitions = SERVICE_TABLE
            .iter()
            .map(|spec| {
                let prefix = spec.name.to_uppercase().replace('-', "_");
                let default_cmd = format!("bin/{}-service", spec.name);
                let command = env_or(&format!("{}_CMD", prefix), &default_cmd)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                ServiceDefinition {
                    name: spec.name.to_string(),
                    command,
                    host: env_or(&format!("{}_HOST", prefix), "0.0.0.0"),
                    port: env_parse(&format!("{}_PORT", prefix), spec.default_port),
                    health_path: "/health".to_string(),
                    dependencies: spec.dependencies.iter().map(|d| d.to_string()).collect(),
                }
            })
            .collect();
        Self::from_definitions(definitions)
    }

    /// Build a registry from explicit definitions. Validates the table and
    /// computes the start order up front.
    pub fn from_definitions(services: Vec<ServiceDefinition>) -> Result<Self> {
        let mut index = HashMap::new();
        for (i, def) in services.iter().enumerate() {
            if index.insert(def.name.clone(), i).is_some() {
                return Err(OrchestrateError::InvalidRegistry(format!(
                    "duplicate service '{}'",
                    def.name
                )));
            }
            if def.command.is_empty() {
                return Err(OrchestrateError::InvalidRegistry(format!(
                    "service '{}' has an empty command",
                    def.name
                )));
            }
        }
        for def in &services {
            for dep in &def.dependencies {
                if !index.contains_key(dep) {
                    return Err(OrchestrateError::UnknownService(dep.clone()));
                }
            }
        }

        let start_order = topological_order(&services, &index)?;
        Ok(Self {
            services,
            index,
            start_order,
        })
    }

    pub fn get(&self, name: &str) -> Result<&ServiceDefinition> {
        self.index
            .get(name)
            .map(|&i| &self.services[i])
            .ok_or_else(|| OrchestrateError::UnknownService(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Dependency names of a service, in declaration order.
    pub fn dependencies_of(&self, name: &str) -> Result<&[String]> {
        self.get(name).map(|def| def.dependencies.as_slice())
    }

    /// All services, every one after all of its dependencies. Ties broken
    /// by registration order so the output is deterministic.
    pub fn start_order(&self) -> &[String] {
        &self.start_order
    }

    /// The exact reverse of `start_order`.
    pub fn stop_order(&self) -> Vec<String> {
        self.start_order.iter().rev().cloned().collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|def| def.name.as_str())
    }
}

/// Kahn's algorithm over the static graph. Each round takes the earliest
/// registered service with no unplaced prerequisites; if a round finds
/// none while services remain, the table is cyclic.
fn topological_order(
    services: &[ServiceDefinition],
    index: &HashMap<String, usize>,
) -> Result<Vec<String>> {
    let n = services.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, def) in services.iter().enumerate() {
        for dep in &def.dependencies {
            // Unknown deps were rejected before this runs.
            if let Some(&j) = index.get(dep) {
                indegree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    while order.len() < n {
        match (0..n).find(|&i| !placed[i] && indegree[i] == 0) {
            Some(i) => {
                placed[i] = true;
                order.push(services[i].name.clone());
                for &d in &dependents[i] {
                    indegree[d] -= 1;
                }
            }
            None => {
                let stuck = (0..n)
                    .find(|&i| !placed[i])
                    .map(|i| services[i].name.clone())
                    .unwrap_or_default();
                return Err(OrchestrateError::CyclicDependency(stuck));
            }
        }
    }
    Ok(order)
}
