//! Infrastructure layer

pub mod sqlite;
pub mod workspace_repository;
