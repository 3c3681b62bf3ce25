//! `policymail` extracts insurance mail archives into an on-disk store and
//! classifies the stored messages into quote, renewal and endorsement
//! requests.
//!
//! The pipeline has two halves that share only the store:
//! [`extract::Extractor`] walks an [`archive::Archive`] and persists each
//! message under `output/`, resumably; [`aggregate::classify_all`] reads
//! the committed messages back through [`store::StoreReader`] and scores
//! them with [`classify::Classifier`].

pub mod aggregate;
pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod i18n;
pub mod model;
pub mod parser;
pub mod store;
