//! Two-layer stylesheet editing.
//!
//! A [`StyleEditor`] stacks a project's local overrides (the overlay) on a
//! pile of inherited sheets (the base). Reads resolve overlay first and
//! decode through the field codecs; writes keep the overlay minimal by
//! deleting any override that merely restates what the base already says.
//! The overlay is what `output_diff` serializes, so a round-tripped project
//! carries exactly its own edits and nothing else.
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::Path;

use diglot_sfm::{AttrMap, Sheet, normalize_key};

use crate::codec::{self, FieldKind};
use crate::error::StyError;
use crate::fontref::{FontRef, TexStyle, TexStyleView};
use crate::value::Value;

/// Markers whose styling is edited through their level-one variant.
const ALIASES: &[&str] = &[
    "q", "s", "mt", "to", "imt", "imte", "io", "iq", "is", "ili", "pi", "qm",
    "sd", "ms", "mte", "li", "lim", "liv",
];

/// Flag keys where presence and absence mean different things, so diffing
/// compares them without normalizing missing values to empty text.
const BINARY_KEYS: &[&str] = &["bold", "italic", "smallcaps"];

/// Length keys compared in decoded points regardless of unit spelling.
const ABSOLUTES: &[&str] = &["baseline", "raise", "callerraise", "notecallerraise"];

/// Keys that define a marker rather than style it. An empty override for
/// one of these means "unset here", so reads fall through to the base.
const DEF_FIELDS: &[&str] = &[
    "marker", "endmarker", "name", "description", "occursunder",
    "textproperties", "texttype", "styletype",
];

fn is_definitional(key: &str) -> bool {
    DEF_FIELDS.contains(&key.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Default)]
pub struct StyleEditor {
    base: Sheet,
    overlay: Sheet,
    regular_font: Option<FontRef>,
}

impl StyleEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheets(base: Sheet, overlay: Sheet) -> Self {
        Self { base, overlay, regular_font: None }
    }

    /// The publication's regular face, used to decide when a font write can
    /// be recorded by absence.
    pub fn set_regular_font(&mut self, font: Option<FontRef>) {
        self.regular_font = font;
    }

    pub fn base(&self) -> &Sheet {
        &self.base
    }

    pub fn overlay(&self) -> &Sheet {
        &self.overlay
    }

    /// Load a layered stack of sheet files. All but the last merge into the
    /// built-in sheet to form the base; the last file alone becomes the
    /// overlay. Each file is range-checked as it loads. An empty list leaves
    /// the editor untouched.
    pub fn load<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<(), StyError> {
        if files.is_empty() {
            return Ok(());
        }
        let mut base = Sheet::base();
        for f in &files[..files.len() - 1] {
            let mut layer = Sheet::from_file(f.as_ref())?;
            codec::validate_sheet(&mut layer);
            base.update_from(layer);
        }
        let mut overlay = Sheet::from_file(files[files.len() - 1].as_ref())?;
        codec::validate_sheet(&mut overlay);
        self.base = base;
        self.overlay = overlay;
        Ok(())
    }

    /// Read one attribute, overlay first, decoded per its field kind.
    pub fn get_val(&self, mrk: &str, key: &str) -> Option<Value> {
        self.lookup(mrk, key, false)
    }

    /// Read one attribute from the base layer only.
    pub fn get_val_base(&self, mrk: &str, key: &str) -> Option<Value> {
        self.lookup(mrk, key, true)
    }

    fn lookup(&self, mrk: &str, key: &str, base_only: bool) -> Option<Value> {
        let key = normalize_key(key);
        if codec::field_kind(&key) == Some(FieldKind::Font) {
            self.raw_val(mrk, &key, base_only)?;
            let view = MarkerView { editor: self, marker: mrk };
            return FontRef::from_tex_style(&view).map(Value::Font);
        }
        let raw = self.raw_val(mrk, &key, base_only)?;
        match codec::field_kind(&key) {
            Some(kind) => {
                let fsize = if kind == FieldKind::Pts {
                    self.font_size(mrk)
                } else {
                    None
                };
                Some(codec::decode(kind, raw, fsize))
            }
            None => Some(Value::Text(raw.to_string())),
        }
    }

    fn raw_val(&self, mrk: &str, key: &str, base_only: bool) -> Option<&str> {
        if !base_only {
            if let Some(v) = self.overlay.attr(mrk, key) {
                if !(is_definitional(key) && v.is_empty()) {
                    return Some(v);
                }
            }
        }
        self.base.attr(mrk, key)
    }

    fn font_size(&self, mrk: &str) -> Option<f32> {
        match self.get_val(mrk, "FontSize") {
            Some(Value::Num(v)) => Some(v),
            _ => None,
        }
    }

    /// Write one attribute. `None` withdraws the local override. A value
    /// that restates the base is stored as no override at all. With
    /// `if_unchanged` the write is skipped when the overlay already
    /// diverges from the base for this key.
    pub fn set_val(&mut self, mrk: &str, key: &str, val: Option<Value>, if_unchanged: bool) {
        let key = normalize_key(key);
        if if_unchanged && self.base.attr(mrk, &key) != self.overlay.attr(mrk, &key) {
            return;
        }
        let val = match val {
            Some(Value::Font(font)) => {
                let force = self.base.attr(mrk, "FontName").is_some();
                let regular = self.regular_font.clone();
                let mut style = MarkerStyle { editor: self, marker: mrk };
                font.update_tex_style(&mut style, regular.as_ref(), force);
                return;
            }
            other => other,
        };
        let encoded = match (&val, codec::field_kind(&key)) {
            (Some(v), Some(kind)) => match codec::encode(kind, v) {
                Some(e) => Some(e),
                None => return,
            },
            (Some(v), None) => Some(v.to_raw_string()),
            (None, _) => None,
        };
        let in_overlay = self.overlay.attr(mrk, &key).is_some();
        if in_overlay
            && (encoded.is_none() || self.base.attr(mrk, &key) == encoded.as_deref())
        {
            self.overlay.remove_attr(mrk, &key);
            return;
        }
        if let Some(e) = encoded {
            if self.base.attr(mrk, &key) != Some(e.as_str()) {
                self.overlay.set_attr(mrk, &key, e);
            }
        }
    }

    pub fn has_key(&self, mrk: &str, key: &str) -> bool {
        let key = normalize_key(key);
        self.overlay.attr(mrk, &key).is_some() || self.base.attr(mrk, &key).is_some()
    }

    pub fn all_styles(&self) -> BTreeSet<String> {
        let mut res: BTreeSet<String> =
            self.base.markers().map(str::to_string).collect();
        res.extend(self.overlay.markers().map(str::to_string));
        res
    }

    pub fn all_value_keys(&self, mrk: &str) -> BTreeSet<String> {
        let mut res = BTreeSet::new();
        if let Some(r) = self.base.get(mrk) {
            res.extend(r.keys().cloned());
        }
        if let Some(r) = self.overlay.get(mrk) {
            res.extend(r.keys().cloned());
        }
        res
    }

    /// The effective attributes for one marker, base under overlay.
    pub fn as_style(&self, mrk: &str) -> AttrMap {
        let mut res = self
            .base
            .get(mrk)
            .map(|r| (**r).clone())
            .unwrap_or_default();
        if let Some(over) = self.overlay.get(mrk) {
            for (k, v) in over.iter() {
                res.insert(k.clone(), v.clone());
            }
        }
        res
    }

    pub fn as_styles(&self) -> BTreeMap<String, AttrMap> {
        self.all_styles()
            .into_iter()
            .map(|m| {
                let style = self.as_style(&m);
                (m, style)
            })
            .collect()
    }

    /// Serialize the overlay as a minimal diff stylesheet: one `\Marker`
    /// block per marker with at least one changed value, lines in canonical
    /// key spelling. Aliased markers diff their effective level-one style
    /// against the alias's own base record. Derived markers never appear.
    pub fn output_diff<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let zd = normalize_key("zDerived");
        for m in self.all_styles() {
            let alias_style;
            let over: &AttrMap = if ALIASES.contains(&m.as_str()) {
                alias_style = self.as_style(&format!("{m}1"));
                &alias_style
            } else if let Some(r) = self.overlay.get(&m) {
                r
            } else {
                continue;
            };
            if over.contains_key(&zd) || self.base.attr(&m, &zd).is_some() {
                continue;
            }
            let mut marker_out = false;
            for (k, v) in over {
                if k.starts_with(' ') {
                    continue;
                }
                let other = self.base.attr(&m, k);
                if !self.eq_val(other, Some(v.as_str()), k) {
                    if !marker_out {
                        writeln!(out, "\n\\Marker {m}")?;
                        marker_out = true;
                    }
                    writeln!(out, "\\{} {}", normalize_key(k), v)?;
                }
            }
        }
        Ok(())
    }

    /// Fold another editor's changes into this one. For every key under any
    /// marker `new_ed` overrides, take `new_ed`'s value when it changed
    /// relative to `base_ed`, unless this editor already diverged from
    /// `base_ed` there, in which case the local value wins.
    pub fn merge(&mut self, base_ed: &StyleEditor, new_ed: &StyleEditor) {
        let markers: Vec<String> =
            new_ed.overlay.markers().map(str::to_string).collect();
        for m in markers {
            let mut keys = new_ed.all_value_keys(&m);
            keys.extend(base_ed.all_value_keys(&m));
            keys.extend(self.all_value_keys(&m));
            for k in keys {
                let nv = new_ed.get_val(&m, &k);
                let bv = base_ed.get_val(&m, &k);
                let sv = self.get_val(&m, &k);
                if sv != bv {
                    continue;
                }
                if nv != bv {
                    self.set_val(&m, &k, nv, false);
                }
            }
        }
    }

    /// Value equality for diffing. Absolute lengths compare decoded, other
    /// numerics with a small tolerance, flags by exact layer presence and
    /// the rest as text with missing treated as empty.
    fn eq_val(&self, a: Option<&str>, b: Option<&str>, key: &str) -> bool {
        let lk = key.to_ascii_lowercase();
        if ABSOLUTES.contains(&lk.as_str()) {
            let fa = codec::decode_pts(a.unwrap_or(""), None);
            let fb = codec::decode_pts(b.unwrap_or(""), None);
            return fa == fb;
        }
        let pa = a.and_then(|s| s.trim().parse::<f32>().ok());
        let pb = b.and_then(|s| s.trim().parse::<f32>().ok());
        if let (Some(fa), Some(fb)) = (pa, pb) {
            return (fa - fb).abs() < 0.005;
        }
        if BINARY_KEYS.contains(&lk.as_str()) {
            a == b
        } else {
            a.unwrap_or("") == b.unwrap_or("")
        }
    }
}

/// Read adapter handing one marker's attributes to font handling.
/// `FontName` is served raw so font lookup does not re-enter itself.
struct MarkerView<'a> {
    editor: &'a StyleEditor,
    marker: &'a str,
}

impl TexStyleView for MarkerView<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        if key == "FontName" {
            return self
                .editor
                .overlay
                .attr(self.marker, "FontName")
                .or_else(|| self.editor.base.attr(self.marker, "FontName"))
                .map(|s| Value::Text(s.to_string()));
        }
        self.editor.get_val(self.marker, key)
    }

    fn contains(&self, key: &str) -> bool {
        self.editor.has_key(self.marker, key)
    }
}

/// Write adapter for font updates. `FontName` writes go straight to the
/// overlay; everything else funnels back through `set_val` so overrides
/// still collapse. Removal clears the overlay only.
struct MarkerStyle<'a> {
    editor: &'a mut StyleEditor,
    marker: &'a str,
}

impl TexStyleView for MarkerStyle<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        MarkerView { editor: self.editor, marker: self.marker }.get(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.editor.has_key(self.marker, key)
    }
}

impl TexStyle for MarkerStyle<'_> {
    fn set(&mut self, key: &str, value: Value) {
        if key == "FontName" {
            if let Value::Text(name) = value {
                self.editor.overlay.set_attr(self.marker, "FontName", name);
            }
        } else {
            self.editor.set_val(self.marker, key, Some(value), false);
        }
    }

    fn remove(&mut self, key: &str) {
        self.editor.overlay.remove_attr(self.marker, &normalize_key(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(base: &str, overlay: &str) -> StyleEditor {
        StyleEditor::with_sheets(Sheet::parse(base), Sheet::parse(overlay))
    }

    #[test]
    fn overlay_wins_and_base_remains_reachable() {
        let ed = editor(
            "\\Marker p\n\\FontSize 12\n",
            "\\Marker p\n\\FontSize 18\n",
        );
        assert_eq!(ed.get_val("p", "FontSize"), Some(Value::Num(1.5)));
        assert_eq!(ed.get_val_base("p", "FontSize"), Some(Value::Num(1.0)));
    }

    #[test]
    fn empty_definitional_override_falls_through() {
        let ed = editor(
            "\\Marker p\n\\TextType VerseText\n\\ColorName red\n",
            "\\Marker p\n\\TextType\n\\ColorName\n",
        );
        assert_eq!(
            ed.get_val("p", "TextType"),
            Some(Value::Text("VerseText".to_string()))
        );
        assert_eq!(
            ed.get_val("p", "ColorName"),
            Some(Value::Text(String::new()))
        );
    }

    #[test]
    fn restating_the_base_collapses_the_override() {
        let mut ed = editor("\\Marker p\n\\FontSize 12\n", "");
        ed.set_val("p", "FontSize", Some(Value::Num(1.5)), false);
        assert_eq!(ed.overlay().attr("p", "FontSize"), Some("18"));
        ed.set_val("p", "FontSize", Some(Value::Num(1.0)), false);
        assert_eq!(ed.overlay().attr("p", "FontSize"), None);
        assert_eq!(ed.get_val("p", "FontSize"), Some(Value::Num(1.0)));
        assert!(ed.has_key("p", "FontSize"));
    }

    #[test]
    fn writing_the_inherited_value_stores_nothing() {
        let mut ed = editor("\\Marker p\n\\SpaceBefore 4\n", "");
        ed.set_val("p", "SpaceBefore", Some(Value::Num(4.0 / 12.0)), false);
        assert!(ed.overlay().get("p").is_none());
    }

    #[test]
    fn withdrawing_leaves_the_base_alone() {
        let mut ed = editor(
            "\\Marker p\n\\LeftMargin 0.25\n",
            "\\Marker p\n\\LeftMargin 0.5\n",
        );
        ed.set_val("p", "LeftMargin", None, false);
        assert_eq!(ed.overlay().attr("p", "LeftMargin"), None);
        assert_eq!(ed.get_val("p", "LeftMargin"), Some(Value::Num(0.25)));

        ed.set_val("p", "LeftMargin", None, false);
        assert_eq!(ed.base().attr("p", "LeftMargin"), Some("0.25"));
    }

    #[test]
    fn guarded_write_skips_diverged_keys() {
        let mut ed = editor(
            "\\Marker p\n\\FontSize 12\n",
            "\\Marker p\n\\FontSize 18\n",
        );
        ed.set_val("p", "FontSize", Some(Value::Num(2.0)), true);
        assert_eq!(ed.overlay().attr("p", "FontSize"), Some("18"));
        ed.set_val("q1", "FontSize", Some(Value::Num(2.0)), true);
        assert_eq!(ed.overlay().attr("q1", "FontSize"), Some("24"));
    }

    #[test]
    fn fonts_read_and_write_through_the_style_adapter() {
        let mut ed = editor("\\Marker p\n\\FontName Charis SIL\n", "");
        let font = match ed.get_val("p", "FontName") {
            Some(Value::Font(f)) => f,
            other => panic!("expected a font, got {other:?}"),
        };
        assert_eq!(font.family, "Charis SIL");
        assert!(!font.bold);

        ed.set_val("p", "FontName", Some(Value::Font(font.clone().bold(true))), false);
        assert_eq!(ed.overlay().attr("p", "FontName"), Some("Charis SIL"));
        assert_eq!(ed.overlay().attr("p", "Bold"), Some(""));
        match ed.get_val("p", "FontName") {
            Some(Value::Font(f)) => assert!(f.bold),
            other => panic!("expected a font, got {other:?}"),
        }
    }

    #[test]
    fn plain_regular_font_clears_the_override() {
        let mut ed = editor("", "\\Marker p\n\\FontName Andika\n");
        ed.set_regular_font(Some(FontRef::new("Charis SIL")));
        ed.set_val("p", "FontName", Some(Value::Font(FontRef::new("Charis SIL"))), false);
        assert_eq!(ed.overlay().attr("p", "FontName"), None);
    }

    #[test]
    fn merge_prefers_local_divergence() {
        let base = editor("\\Marker p\n\\FontSize 12\n\\SpaceAfter 4\n", "");
        let mut ours = base.clone();
        let mut theirs = base.clone();
        theirs.set_val("p", "FontSize", Some(Value::Num(2.0)), false);
        theirs.set_val("p", "SpaceAfter", Some(Value::Num(0.5)), false);
        ours.set_val("p", "SpaceAfter", Some(Value::Num(1.0)), false);

        ours.merge(&base, &theirs);
        assert_eq!(ours.get_val("p", "FontSize"), Some(Value::Num(2.0)));
        assert_eq!(ours.get_val("p", "SpaceAfter"), Some(Value::Num(1.0)));
    }

    #[test]
    fn merge_withdrawals_propagate() {
        let base = editor(
            "\\Marker p\n\\FontSize 12\n",
            "\\Marker p\n\\Justification Center\n",
        );
        let mut ours = base.clone();
        let mut theirs = base.clone();
        theirs.set_val("p", "Justification", None, false);

        ours.merge(&base, &theirs);
        assert_eq!(ours.get_val("p", "Justification"), None);
    }

    #[test]
    fn diff_is_empty_without_overrides() {
        let ed = editor("\\Marker p\n\\FontSize 12\n", "");
        let mut out = Vec::new();
        ed.output_diff(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "");
    }

    #[test]
    fn diff_emits_marker_blocks_with_canonical_keys() {
        let ed = editor(
            "\\Marker p\n\\FontSize 12\n\\SpaceBefore 4\n",
            "\\Marker p\n\\FontSize 14\n\\SpaceBefore 4.001\n",
        );
        let mut out = Vec::new();
        ed.output_diff(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "\n\\Marker p\n\\FontSize 14\n");
    }

    #[test]
    fn absolute_lengths_compare_without_units() {
        let ed = editor(
            "\\Marker p\n\\Raise 6 pt\n",
            "\\Marker p\n\\Raise 6\n",
        );
        let mut out = Vec::new();
        ed.output_diff(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "");
    }

    #[test]
    fn aliases_diff_their_level_one_style() {
        let ed = editor(
            "\\Marker s\n\\TextType Section\n\\Marker s1\n\\FontSize 12\n",
            "\\Marker s1\n\\FontSize 14\n",
        );
        let mut out = Vec::new();
        ed.output_diff(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\n\\Marker s\n"));
        assert!(text.contains("\n\\Marker s1\n\\FontSize 14\n"));
    }

    #[test]
    fn derived_markers_never_diff() {
        let ed = editor(
            "",
            "\\Marker zgloss\n\\Zderived p\n\\FontSize 14\n",
        );
        let mut out = Vec::new();
        ed.output_diff(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "");
    }

    #[test]
    fn diff_round_trips_to_an_identical_overlay() {
        let ed = editor(
            "\\Marker p\n\\FontSize 12\n",
            "\\Marker p\n\\FontSize 14\n\\Justification Center\n",
        );
        let mut out = Vec::new();
        ed.output_diff(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let again = StyleEditor::with_sheets(ed.base().clone(), Sheet::parse(&text));
        let mut out2 = Vec::new();
        again.output_diff(&mut out2).unwrap();
        assert_eq!(String::from_utf8(out2).unwrap(), text);
    }
}
