//! Lagoon: Keyspace Data Source Client
//!
//! Browses a hierarchical, colon-delimited keyspace served by the Lagoon API.
//! Listings and values arrive either inline or through deferred streaming
//! channels; results populate an in-memory tree with tab-like selection state.

pub mod channel;
pub mod cluster;
pub mod config;
pub mod datasource;
pub mod error;
pub mod filter;
pub mod logging;
pub mod selection;
pub mod tooling;
pub mod transport;
pub mod tree;
pub mod types;

pub use datasource::{DataSource, DataSourceClient};
pub use error::{ApiError, DomainError};
