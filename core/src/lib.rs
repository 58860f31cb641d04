//! Catalog chat core: turns agent-backend responses into chat outcomes.

pub mod agent;
pub mod classifier;
pub mod config;
pub mod decode;
pub mod error;
pub mod product;
pub mod registry;
pub mod response;
pub mod runtime;
pub mod safety;

pub use classifier::{ClassificationOutcome, NoResultsReason, ResponseClassifier};
pub use error::CatalogError;
