//! MusicBrainz API integration
//!
//! The remote metadata database behind every query the matcher makes:
//! artist, release and recording searches plus lookups by MusicBrainz ID.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;

pub use client::{DEFAULT_BASE_URL, MusicBrainzClient};
