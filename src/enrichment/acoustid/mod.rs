//! AcoustID API integration
//!
//! AcoustID identifies music by audio fingerprint.
//! API docs: https://acoustid.org/webservice

mod adapter;
mod client;
pub mod dto;

pub use adapter::best_match;
pub use client::AcoustIdClient;
