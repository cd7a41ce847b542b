//! Batch ingestion of support tickets and application logs into the
//! bronze layer of the CarePlus warehouse.

pub mod cli;
pub mod config;
pub mod ingest;
pub mod parser;
pub mod source;
pub mod store;
pub mod warehouse;
pub mod workflow;
