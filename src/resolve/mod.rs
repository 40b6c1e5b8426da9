//! Metadata resolution for one release.
//!
//! Candidate values for every field come from [`getters`]; each
//! [`FieldFinder`] weighs its candidates with [`consensus`]; the
//! [`ReleaseResolver`] keeps running finders until every field is known,
//! then checks the result ([`sanity`]) and writes it back ([`writeback`]).

pub mod consensus;
pub mod finder;
pub mod getters;
pub mod resolver;
pub mod sanity;
pub mod writeback;

use std::path::PathBuf;
use thiserror::Error;

use crate::control::Cancelled;
use crate::model::Field;

pub use consensus::{Candidate, consensus};
pub use finder::{FieldFinder, Mode};
pub use resolver::ReleaseResolver;
pub use sanity::SanityViolation;

/// Why a release could not be resolved. Any of these rejects the release.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unable to resolve {}", field_list(.0))]
    UnresolvedFields(Vec<Field>),

    #[error("sanity check failed: {0}")]
    Sanity(#[from] SanityViolation),

    #[error("renaming {} would overwrite {}", from.display(), to.display())]
    RenameCollision { from: PathBuf, to: PathBuf },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("writing tags failed: {0:#}")]
    Tags(anyhow::Error),

    #[error("renaming failed: {0}")]
    Io(#[from] std::io::Error),
}

fn field_list(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
