//! podwatch DB - Database repository layer for PostgreSQL
//!
//! This crate provides the repository pattern for node inventory
//! persistence.
//!
//! # Overview
//!
//! The main components are:
//! - [`NodeRepository`] - Node rows, network snapshots and notifications
//! - [`MIGRATOR`] - Embedded schema migrations

mod node_repository;

pub use node_repository::NodeRepository;

/// Schema migrations from `crates/podwatch-db/migrations`, embedded at build time.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
