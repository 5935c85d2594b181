//! Domain models

pub mod agent;
pub mod reconcile;
pub mod resource;
pub mod workspace;
