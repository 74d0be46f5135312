//! taxrag: Title 26 (Internal Revenue Code) ingestion for RAG
//!
//! Parses the US Code HTML release into validated [`model::TaxSection`]
//! records using the embedded structural comment markers, embeds each
//! record's statutory text, and loads the points into a Qdrant collection
//! for retrieval-augmented question answering.

pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod loader;
pub mod model;
pub mod parser;
pub mod store;
