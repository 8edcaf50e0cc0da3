pub mod auth;
pub mod billing;
pub mod cli;
pub mod config;
pub mod db;
pub mod identity;
pub mod model;
pub mod storage;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use db::Store;
