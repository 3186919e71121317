//! Field codecs and load-time validation for stylesheet attributes.
//!
//! Attribute keys carry an implied type: `Bold` is a flag, `FontSize` is a
//! twelfths factor, `Raise` is a length with a unit suffix. The codec table
//! maps a key to its kind, decodes raw sheet text into a [`Value`] and
//! encodes edited values back into the spelling the sheet expects.
use log::info;
use nom::bytes::complete::take_while;
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::{all_consuming, opt, recognize};
use nom::sequence::preceded;
use nom::{IResult, Parser};

use diglot_sfm::Sheet;

use crate::color::Color;
use crate::value::{Value, f2s};

const PTS_PER_INCH: f32 = 72.27;
const MM_PER_INCH: f32 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Empty text is on, `-` is off.
    Bool,
    /// Plain float, stored as written.
    Float,
    /// A length in points, accepting `pt`, `in`, `mm`, `ex` and `em`.
    Pts,
    /// Stored as twelve times the decoded factor.
    Twelfths,
    /// Whitespace-separated word set.
    Set,
    /// Colour stored as a one-max channel triple.
    ColorOneMax,
    /// Path text, passed through untouched.
    FileName,
    /// Handled by the editor through [`crate::fontref::FontRef`].
    Font,
}

pub fn field_kind(key: &str) -> Option<FieldKind> {
    match key.to_ascii_lowercase().as_str() {
        "bold" | "italic" | "superscript" | "smallcaps" => Some(FieldKind::Bool),
        "firstlineindent" | "leftmargin" | "rightmargin" | "linespacing" => {
            Some(FieldKind::Float)
        }
        "raise" | "baseline" | "callerraise" | "notecallerraise" => Some(FieldKind::Pts),
        "fontsize" | "spacebefore" | "spaceafter" => Some(FieldKind::Twelfths),
        "fontname" => Some(FieldKind::Font),
        "textproperties" | "occursunder" => Some(FieldKind::Set),
        "bordercolor" | "bgimagecolor" | "bgcolor" => Some(FieldKind::ColorOneMax),
        "bgimage" | "fgimage" => Some(FieldKind::FileName),
        _ => None,
    }
}

fn measure(input: &str) -> IResult<&str, (&str, &str)> {
    all_consuming((
        multispace0,
        recognize((opt(char('-')), digit1, opt(preceded(char('.'), digit1)))),
        take_while(|c: char| !c.is_ascii_digit()),
    ))
    .map(|(_, num, unit): (&str, &str, &str)| (num, unit))
    .parse(input)
}

/// Split a measure into magnitude and unit suffix. Returns `None` when the
/// text is not a number followed by a unit, in which case callers fall back
/// to plain float parsing.
pub fn parse_measure(s: &str) -> Option<(f32, &str)> {
    let (_, (num, unit)) = measure(s).ok()?;
    Some((num.parse().unwrap_or(0.0), unit.trim()))
}

/// Decode a length to points. `ex` and `em` scale by the owning marker's
/// decoded font size; without one the bare magnitude is kept.
pub fn decode_pts(s: &str, font_size: Option<f32>) -> f32 {
    match parse_measure(s) {
        Some((v, unit)) => {
            if unit.is_empty() || unit.eq_ignore_ascii_case("pt") {
                v
            } else if unit == "in" {
                v * PTS_PER_INCH
            } else if unit == "mm" {
                v * PTS_PER_INCH / MM_PER_INCH
            } else {
                match font_size {
                    Some(f) if unit == "ex" => v * f / 12.0 / 2.0,
                    Some(f) if unit == "em" => v * f / 12.0,
                    _ => v,
                }
            }
        }
        None => s.trim().parse().unwrap_or(0.0),
    }
}

pub fn decode(kind: FieldKind, raw: &str, font_size: Option<f32>) -> Value {
    match kind {
        FieldKind::Bool => Value::Bool(raw != "-"),
        FieldKind::Float => Value::Num(raw.trim().parse().unwrap_or(0.0)),
        FieldKind::Pts => Value::Num(decode_pts(raw, font_size)),
        FieldKind::Twelfths => {
            Value::Num(raw.trim().parse::<f32>().map(|v| v / 12.0).unwrap_or(0.0))
        }
        FieldKind::Set => Value::Set(raw.split_whitespace().map(str::to_string).collect()),
        FieldKind::ColorOneMax => Value::Color(Color::from_text(raw)),
        FieldKind::FileName | FieldKind::Font => Value::Text(raw.to_string()),
    }
}

/// Encode a value into sheet text. `None` means the codec does not produce
/// text for this kind and the write should be abandoned.
pub fn encode(kind: FieldKind, value: &Value) -> Option<String> {
    Some(match kind {
        FieldKind::Bool => {
            if value.truthy() {
                String::new()
            } else {
                "-".to_string()
            }
        }
        FieldKind::Float => f2s(value.coerce_f32()),
        FieldKind::Pts => format!("{} pt", f2s(value.coerce_f32())),
        FieldKind::Twelfths => f2s(value.coerce_f32() * 12.0),
        FieldKind::Set => value.to_raw_string(),
        FieldKind::ColorOneMax => match value {
            Value::Color(c) => c.to_one_max(),
            other => Color::from_text(&other.to_raw_string()).to_one_max(),
        },
        FieldKind::FileName => value.to_raw_string(),
        FieldKind::Font => return None,
    })
}

/// A load-time check on the raw text of one attribute.
#[derive(Debug, Clone, Copy)]
pub enum Constraint {
    /// Numeric, at least this value.
    Min(f32),
    /// Numeric, anything but this value.
    Not(f32),
    /// One of a fixed word list, compared case-insensitively.
    Enum(&'static [&'static str]),
}

impl Constraint {
    pub fn check(&self, raw: &str) -> bool {
        match self {
            Constraint::Min(m) => raw
                .trim()
                .parse::<f32>()
                .map(|v| v >= *m)
                .unwrap_or(false),
            Constraint::Not(x) => raw
                .trim()
                .parse::<f32>()
                .map(|v| v != *x)
                .unwrap_or(false),
            Constraint::Enum(options) => {
                let raw = raw.trim();
                options.iter().any(|o| o.eq_ignore_ascii_case(raw))
            }
        }
    }
}

pub fn constraint_for(key: &str) -> Option<Constraint> {
    match key.to_ascii_lowercase().as_str() {
        "fontsize" => Some(Constraint::Min(1.0)),
        "spacebefore" | "spaceafter" => Some(Constraint::Min(0.0)),
        "linespacing" => Some(Constraint::Not(0.0)),
        "styletype" => Some(Constraint::Enum(&[
            "Paragraph",
            "Character",
            "Note",
            "Milestone",
            "Standalone",
        ])),
        "texttype" => Some(Constraint::Enum(&[
            "Title",
            "Section",
            "VerseText",
            "NoteText",
            "BodyText",
            "Back",
            "Other",
            "ChapterNumber",
            "VerseNumber",
            "Unspecified",
        ])),
        "bold" | "italic" | "superscript" | "smallcaps" => {
            Some(Constraint::Enum(&["", "-"]))
        }
        _ => None,
    }
}

/// Drop attributes whose raw text fails their constraint. Sheets keep
/// loading; each dropped value is reported once.
pub fn validate_sheet(sheet: &mut Sheet) {
    let mut drops: Vec<(String, String, String)> = Vec::new();
    for (marker, attrs) in sheet.records() {
        for (key, raw) in attrs.iter() {
            if let Some(c) = constraint_for(key) {
                if !c.check(raw) {
                    drops.push((marker.to_string(), key.clone(), raw.clone()));
                }
            }
        }
    }
    for (marker, key, raw) in drops {
        info!("dropping invalid {key} \"{raw}\" on marker {marker}");
        sheet.remove_attr(&marker, &key);
    }
}
