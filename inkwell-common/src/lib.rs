//! # Inkwell Common Library
//!
//! Shared code for the Inkwell story services including:
//! - Database schema and row models
//! - Event types (InkwellEvent enum) and the handler-dispatching EventBus
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
