//! Core of the Chroma collection viewer: reconciles raw collection data
//! into tables and runs browse and similarity queries against a remote
//! server or a local persistent directory.

pub mod browse;
pub mod connector;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod http_client;
pub mod inspect;
pub mod local_store;
pub mod query;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{ErrorKind, Result, ViewerError};
