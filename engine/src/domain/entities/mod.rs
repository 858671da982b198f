pub mod service;

pub use service::{ServiceBuilder, ServiceDefinition};
