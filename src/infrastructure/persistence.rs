pub mod artifact_store;
pub mod database;
pub mod repositories;
