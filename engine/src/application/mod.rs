//! Application Layer
//! Wires adapters into domain services and exposes one facade to callers

pub mod registry;

pub use registry::{Adapters, ServiceManager};
