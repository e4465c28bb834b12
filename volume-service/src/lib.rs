pub mod aggregate;
pub mod backfill;
pub mod config;
pub mod error;
pub mod http;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod store;

pub use aggregate::{Aggregator, ValueKind};
pub use error::ApiError;
pub use http::{router, AppState};
pub use ingest::Ingestor;
