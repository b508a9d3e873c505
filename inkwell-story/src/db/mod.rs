//! Database access for inkwell-story
//!
//! Free functions over a shared `SqlitePool`, one module per table. Schema
//! creation lives in `inkwell_common::db::init`.

pub mod assessments;
pub mod claims;
pub mod comics;
pub mod sentences;
pub mod stories;
