//! Service layer

pub mod agent;
pub mod desired_config;
pub mod feature;
pub mod reconcile;
pub mod workspace;
