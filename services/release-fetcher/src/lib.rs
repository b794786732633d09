//!
//! src/lib.rs
//!
//! Release ingestion pipeline: search the discogs catalog for master
//! releases, resolve the operator's picks, download their cover art and
//! republish each one to the media catalog
//!
//!

pub mod config;
pub mod errors;
pub mod logging;

pub mod extract;
pub mod types;
pub mod fetch;
pub mod sink;
pub mod builder;
pub mod upload;
pub mod pipeline;

#[cfg(test)]
mod test_utils;

pub use errors::IngestError;
