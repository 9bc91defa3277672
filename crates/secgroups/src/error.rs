//! Error types for loading, planning and applying security groups.
//!
//! Grammar and reference errors stop a run before anything is mutated.
//! Remote errors raised while mutating are not returned from `apply`;
//! they are collected per entity in the [`ApplySummary`](crate::ApplySummary).

use crate::rule::GrammarError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A rule line in the desired-state document does not parse
    #[error("group '{group}': cannot parse rule \"{line}\": {source}")]
    Grammar {
        group: String,
        line: String,
        #[source]
        source: GrammarError,
    },

    /// A rule names a group that exists neither in the document nor remotely
    #[error("group '{group}': rule references unknown group '{name}'")]
    UnresolvedReference { name: String, group: String },

    /// A rule names a group that exists in several VPCs, none of them the owner's
    #[error("group '{group}': reference to '{name}' is ambiguous ({})", candidates.join(", "))]
    AmbiguousReference {
        name: String,
        group: String,
        candidates: Vec<String>,
    },

    /// The desired-state document could not be read
    #[error("cannot read {path}: {source}")]
    DocumentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The desired-state document is not valid YAML/JSON/TOML for the schema
    #[error("invalid {format} document: {message}")]
    DocumentFormat {
        format: &'static str,
        message: String,
    },

    /// The remote API failed while loading state
    #[error("remote API error: {0}")]
    Remote(#[from] netkit::Error),

    /// The executor thread pool could not be created
    #[error("failed to create apply thread pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Whether the error was raised before any remote mutation could happen.
    pub fn is_pre_mutation(&self) -> bool {
        !matches!(self, Error::Remote(_) | Error::ThreadPool(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
