//! Retag DB - PostgreSQL persistence for tag regeneration
//!
//! # Overview
//!
//! The main components are:
//! - [`TagRepository`] - Resources and their current tag lists
//! - [`FailureRepository`] - Failure records that drive retry runs
//! - [`ensure_schema`] - Idempotent table creation

mod failure_repository;
mod schema;
mod tag_repository;

pub use failure_repository::FailureRepository;
pub use schema::{SCHEMA, ensure_schema};
pub use tag_repository::TagRepository;
