//! Stylesheet (`.sty`) parsing and the marker record store.
//!
//! A stylesheet is a line-oriented file of records. `\Marker <name>` opens
//! a record; each following `\<Attribute> <value>` line sets one attribute
//! until the next record starts. `#` begins a comment. Attribute keys are
//! stored in canonical capitalization (see [`normalize_key`]), marker names
//! as written.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::warn;

use crate::error::UsfmError;
use crate::node::AttrMap;

/// Attribute names whose canonical form is not simple title case.
const CANONICAL_KEYS: &[&str] = &[
    "BaseLine",
    "TextType",
    "TextProperties",
    "FontName",
    "FontSize",
    "FirstLineIndent",
    "LeftMargin",
    "RightMargin",
    "SpaceBefore",
    "SpaceAfter",
    "CallerStyle",
    "CallerRaise",
    "NoteCallerStyle",
    "NoteCallerRaise",
    "NoteBlendInto",
    "LineSpacing",
    "StyleType",
    "ColorName",
    "XMLTag",
    "TEStyleName",
    "ztexFontFeatures",
    "ztexFontGrSpace",
    "FgImage",
    "FgImagePos",
    "FgImageScale",
    "BgImage",
    "BgImageScale",
    "BgImagePos",
    "BgImageLow",
    "BgImageColour",
    "BgImageColor",
    "BgImageAlpha",
    "BgImageOversize",
    "BgColour",
    "BgColor",
    "BorderWidth",
    "BorderColour",
    "BorderColor",
    "BorderVPadding",
    "BorderHPadding",
    "BoxVPadding",
    "BoxHPadding",
];

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(c);
            prev_cased = false;
        }
    }
    out
}

/// Normalizes an attribute key to its canonical capitalization:
/// a fixed exception list first, title case otherwise.
pub fn normalize_key(key: &str) -> String {
    CANONICAL_KEYS
        .iter()
        .find(|c| c.eq_ignore_ascii_case(key))
        .map(|c| c.to_string())
        .unwrap_or_else(|| title_case(key))
}

/// An ordered collection of marker records.
///
/// Records are shared: parsed documents hold [`Arc`] clones of the record
/// their markers were matched against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    records: BTreeMap<String, Arc<AttrMap>>,
}

impl Sheet {
    pub fn new() -> Self {
        Sheet::default()
    }

    /// The built-in marker definitions every parse starts from.
    pub fn base() -> Self {
        Sheet::parse(include_str!("../resources/usfm_base.sty"))
    }

    /// Parses stylesheet text. Lines outside any record and lines that are
    /// not directives are skipped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut sheet = Sheet::new();
        let mut current: Option<(String, AttrMap)> = None;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        for line in text.lines() {
            let line = match line.find('#') {
                Some(i) => &line[..i],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(directive) = line.strip_prefix('\\') else {
                warn!("ignoring stylesheet line: {line}");
                continue;
            };
            let (key, value) = match directive.split_once(char::is_whitespace) {
                Some((k, v)) => (k, v.trim()),
                None => (directive, ""),
            };
            let key = normalize_key(key);
            if key == "Marker" {
                if let Some((name, attrs)) = current.take() {
                    sheet.insert(name, attrs);
                }
                let name = value.split_whitespace().next().unwrap_or("");
                if name.is_empty() {
                    warn!("\\Marker directive without a name");
                } else {
                    current = Some((name.to_string(), AttrMap::new()));
                }
            } else if let Some((_, attrs)) = current.as_mut() {
                attrs.insert(key, value.to_string());
            } else {
                warn!("attribute \\{key} before any \\Marker");
            }
        }
        if let Some((name, attrs)) = current.take() {
            sheet.insert(name, attrs);
        }
        sheet
    }

    pub fn from_file(path: &Path) -> Result<Self, UsfmError> {
        let text = fs::read_to_string(path).map_err(|source| UsfmError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Sheet::parse(&text))
    }

    /// Merges `other` over this sheet, attribute-wise per marker. Markers
    /// keep attributes the other sheet does not mention.
    pub fn update_from(&mut self, other: Sheet) {
        for (name, attrs) in other.records {
            match self.records.get_mut(&name) {
                Some(existing) => {
                    let merged = Arc::make_mut(existing);
                    for (k, v) in attrs.iter() {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                None => {
                    self.records.insert(name, attrs);
                }
            }
        }
    }

    fn insert(&mut self, name: String, attrs: AttrMap) {
        match self.records.get_mut(&name) {
            // A repeated \Marker block extends the earlier one.
            Some(existing) => {
                let merged = Arc::make_mut(existing);
                for (k, v) in attrs {
                    merged.insert(k, v);
                }
            }
            None => {
                self.records.insert(name, Arc::new(attrs));
            }
        }
    }

    pub fn get(&self, marker: &str) -> Option<&Arc<AttrMap>> {
        self.records.get(marker)
    }

    pub fn attr(&self, marker: &str, key: &str) -> Option<&str> {
        self.records
            .get(marker)
            .and_then(|r| r.get(key))
            .map(String::as_str)
    }

    pub fn contains_marker(&self, marker: &str) -> bool {
        self.records.contains_key(marker)
    }

    pub fn markers(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &Arc<AttrMap>)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn set_attr(&mut self, marker: &str, key: &str, value: impl Into<String>) {
        let record = self
            .records
            .entry(marker.to_string())
            .or_insert_with(|| Arc::new(AttrMap::new()));
        Arc::make_mut(record).insert(normalize_key(key), value.into());
    }

    pub fn remove_attr(&mut self, marker: &str, key: &str) -> Option<String> {
        self.records
            .get_mut(marker)
            .and_then(|r| Arc::make_mut(r).remove(key))
    }

    /// Ensures a record exists for `marker`, returning whether it was added.
    pub fn ensure_marker(&mut self, marker: &str) -> bool {
        if self.records.contains_key(marker) {
            return false;
        }
        self.records
            .insert(marker.to_string(), Arc::new(AttrMap::new()));
        true
    }

    pub fn remove_marker(&mut self, marker: &str) -> Option<Arc<AttrMap>> {
        self.records.remove(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("texttype"), "TextType");
        assert_eq!(normalize_key("ENDMARKER"), "Endmarker");
        assert_eq!(normalize_key("ztexfontgrspace"), "ztexFontGrSpace");
        assert_eq!(normalize_key("xmltag"), "XMLTag");
        assert_eq!(normalize_key("frobnicate"), "Frobnicate");
    }

    #[test]
    fn test_parse_records() {
        let sheet = Sheet::parse(
            "# comment line\n\
             \\Marker p\n\
             \\endmarker\n\
             \\TextType VerseText  # trailing comment\n\
             \\StyleType Paragraph\n\
             \n\
             \\Marker nd\n\
             \\Endmarker nd*\n\
             \\StyleType Character\n",
        );
        assert_eq!(sheet.attr("p", "TextType"), Some("VerseText"));
        assert_eq!(sheet.attr("p", "StyleType"), Some("Paragraph"));
        assert_eq!(sheet.attr("p", "Endmarker"), Some(""));
        assert_eq!(sheet.attr("nd", "Endmarker"), Some("nd*"));
        assert!(!sheet.contains_marker("comment"));
    }

    #[test]
    fn test_update_from_merges_attributes() {
        let mut base = Sheet::parse("\\Marker p\n\\StyleType Paragraph\n\\FontSize 12\n");
        let patch = Sheet::parse("\\Marker p\n\\FontSize 14\n\\Marker q\n\\StyleType Paragraph\n");
        base.update_from(patch);
        assert_eq!(base.attr("p", "FontSize"), Some("14"));
        assert_eq!(base.attr("p", "StyleType"), Some("Paragraph"));
        assert!(base.contains_marker("q"));
    }

    #[test]
    fn test_repeated_marker_block_extends() {
        let sheet = Sheet::parse(
            "\\Marker p\n\\StyleType Paragraph\n\\Marker p\n\\FontSize 12\n",
        );
        assert_eq!(sheet.attr("p", "StyleType"), Some("Paragraph"));
        assert_eq!(sheet.attr("p", "FontSize"), Some("12"));
    }

    #[test]
    fn test_base_sheet_core_markers() {
        let base = Sheet::base();
        for m in ["id", "c", "v", "p", "s", "f", "ft", "tr", "mt"] {
            assert!(base.contains_marker(m), "missing marker {m}");
        }
        assert_eq!(base.attr("v", "StyleType"), Some("Character"));
        assert!(
            base.attr("v", "TextProperties")
                .is_some_and(|p| p.contains("verse"))
        );
        assert!(
            base.attr("c", "TextProperties")
                .is_some_and(|p| p.contains("chapter"))
        );
    }
}
