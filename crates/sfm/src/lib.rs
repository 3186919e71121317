//! USFM document handling: stylesheet records, tokenizing, tree building
//! and canonical regeneration.

pub mod error;
pub mod generate;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod sty;

pub use error::UsfmError;
pub use generate::generate;
pub use node::{AttrMap, Element, Node, Pos};
pub use parser::{parse_document, parse_file};
pub use sty::{Sheet, normalize_key};
