//! ovfedit Core Library
//!
//! This crate edits OVF virtual-machine descriptors produced by one
//! hypervisor into a variant accepted by another, while preserving every
//! byte of formatting the surrounding document already has: indentation
//! style, namespace-prefixed tag names, attribute ordering, and the line
//! ending convention. Only the elements an edit scheme targets change.
//!
//! # Overview
//!
//! Editing is a single line-oriented pass. Lines outside a targeted
//! element are copied through verbatim; a line opening a `<System>` or
//! `<Item>` element is captured as a raw span (with its indentation
//! facts), decoded into a record, and offered to the caller's edit
//! proposals, which decide to keep, delete, or replace it. Replacements
//! are rendered with the span's captured indentation so the edit is
//! indistinguishable in style from the original.
//!
//! # Modules
//!
//! - [`error`] - Error types and Result alias
//! - [`scan`] - Line scanning, span capture, well-formedness validation
//! - [`ovf`] - Record types, decoding, namespace-qualified serialization
//! - [`edit`] - Edit schemes and the document edit pass
//! - [`vmware`] - VMware conversion policy and file-level helpers
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! ovfedit_core::convert_file(
//!     Path::new("machine.ovf"),
//!     Path::new("machine-vmware.ovf"),
//! )
//! .unwrap();
//! ```

pub mod edit;
pub mod error;
pub mod ovf;
pub mod scan;
pub mod vmware;

pub use error::{Error, Result};

// Re-export the edit pass and the VMware policy for convenience
pub use edit::{edit_document, EditAction, EditProposal, EditScheme};
pub use ovf::{parse_document, ElementKind, HardwareItem, OvfSummary, Record, System};
pub use scan::validate;
pub use vmware::{basic_convert_scheme, convert_file, edit_file};
