//! Interleaved diglot output from parallel USFM documents.
//!
//! This crate ties the workspace together: `diglot-sfm` parses documents
//! against marker stylesheets, `diglot-merge` cuts them into typed chunks
//! and aligns the chunk sequences into rows, and the [`pipeline`] module
//! serializes the rows as a single USFM stream with column-switch
//! directives. Stylesheet overlay editing lives in `diglot-style`.
//!
//! # Example
//!
//! ```ignore
//! use diglot::{MergeConfig, usfmerge};
//!
//! let config = MergeConfig::default();
//! let mut out = Vec::new();
//! usfmerge(&config, &[left_text, right_text], &mut out)?;
//! ```

pub mod pipeline;

// Core public API
pub use pipeline::{MergeConfig, Mode, PipelineError, merge_files, usfmerge};

// Member crate re-exports
pub use diglot_merge::{Chunk, ChunkType, Row, SyncMode, align_chunks, align_simple, chunk_document};
pub use diglot_sfm::{Node, Sheet, UsfmError, generate, parse_document, parse_file};
pub use diglot_style::{StyError, StyleEditor, Value};
