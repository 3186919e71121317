//! Chunking and alignment for parallel scripture documents.
//!
//! A document is cut into typed [`Chunk`]s keyed by chapter and verse,
//! then two or more chunk sequences are aligned key-by-key into rows for
//! interleaved diglot output.

pub mod align;
pub mod chunk;
pub mod collector;
pub mod matcher;

pub use align::{Row, align_chunks, align_simple};
pub use chunk::{Chunk, ChunkType};
pub use collector::{Collector, SyncMode, chunk_document};
pub use matcher::{Opcode, SequenceMatcher, Tag};
