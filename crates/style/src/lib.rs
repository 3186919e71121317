pub mod codec;
pub mod color;
pub mod editor;
pub mod error;
pub mod fontref;
pub mod value;

pub use codec::{Constraint, FieldKind, constraint_for, decode_pts, field_kind, validate_sheet};
pub use color::Color;
pub use editor::StyleEditor;
pub use error::StyError;
pub use fontref::{FontRef, TexStyle, TexStyleView};
pub use value::{Value, f2s};
