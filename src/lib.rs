//! Tag Sleuth - unattended metadata resolution for directories of audio files.
//!
//! Each directory is treated as one release. Candidate values for every
//! field are gathered from on-disk tags, file names, acoustic fingerprints
//! and a remote metadata database, weighed against each other, and the
//! winners are written back before the directory is filed away.
//!
//! # Layout
//!
//! - [`model`] - releases, tracks and fields
//! - [`resolve`] - finders, consensus, the round-robin resolver, sanity and write-back
//! - [`matcher`] - remote query planning and fuzzy matching
//! - [`enrichment`] - remote database and fingerprint clients, retry
//! - [`cache`] - memoization of remote results
//! - [`control`] - pause/stop coordination
//! - [`pipeline`] - directory traversal, accept and reject

pub mod cache;
pub mod cli;
pub mod config;
pub mod control;
pub mod enrichment;
pub mod error;
pub mod matcher;
pub mod metadata;
pub mod model;
pub mod organizer;
pub mod pipeline;
pub mod resolve;
pub mod scanner;
pub mod text;
#[cfg(test)]
pub mod test_utils;
