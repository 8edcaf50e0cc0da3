//! Test utilities for gatherly.
//!
//! Reusable helpers for building test configurations and standing in for
//! the identity provider, the billing provider and the media store without
//! any network access.
//!
//! # Feature Flag
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::{FakeBillingProvider, StaticIdentityProvider, TestConfigBuilder};
//!
//! let config = TestConfigBuilder::new()
//!     .in_memory()
//!     .with_static_token("test-token", account_id, "person@example.com")
//!     .build();
//! ```

mod config_builder;
mod providers;

pub use config_builder::TestConfigBuilder;
pub use providers::{FakeBillingProvider, FlakyObjectStore, StaticIdentityProvider};
