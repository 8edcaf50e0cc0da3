//! Test fixtures for integration testing
//!
//! This module provides a fully wired service context over in-memory
//! backends, with seed helpers for the account states the deletion flow
//! distinguishes.

mod app_context;

pub use app_context::{AppContext, SeededAccount};
