//! merchflow - merchant activity ingestion and analytics core.
//!
//! Ingests merchant activity events (transactions, KYC steps, purchases)
//! from CSV files into SQLite, then answers five read-only aggregate
//! questions over the stored data: top merchant by volume, monthly active
//! merchants, product adoption, KYC funnel conversion and per-product
//! failure rates.
//!
//! The HTTP surface is an external collaborator; it calls the typed query
//! functions in [`analytics`] and serializes their results.

pub mod analytics;
pub mod config;
pub mod ingest;
pub mod model;
pub mod store;

pub use analytics::{FailureRate, KycFunnel, ProductAdoption, TopMerchant};
pub use config::Config;
pub use ingest::{ingest_dir, IngestError, IngestSummary};
pub use model::{Channel, MerchantTier, Product, Record, Status};
pub use store::Store;
