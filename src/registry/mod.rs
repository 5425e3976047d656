pub mod catalog;

pub use catalog::{ServiceDefinition, ServiceRegistry};
