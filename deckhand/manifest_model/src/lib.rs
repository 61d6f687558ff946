//! Typed manifest model: wire format, entry parsing, and whole-manifest
//! validation.
//!
//! The manifest document has four top-level mappings: `images`,
//! `containers`, `clusters` and `groups`. Loading produces an immutable
//! [`Manifest`] or a [`ValidationError`] aggregating every violation found.

pub mod error;
pub mod model;
pub mod wire;

pub use error::{ManifestError, Result, ValidationError, ValidationIssue};
pub use model::{ClusterDef, ContainerDef, GroupDef, ImageDef, Manifest, OverrideSet};
