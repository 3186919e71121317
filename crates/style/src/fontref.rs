//! Font selection as a first-class value over marker styles.
use crate::value::Value;

/// Read access to one marker's style attributes, as seen by font handling.
///
/// Values come back decoded (`Bold` as a flag, not as `"-"` text), except
/// `FontName` which implementations surface as raw text so a font can be
/// rebuilt without consulting font machinery recursively.
pub trait TexStyleView {
    fn get(&self, key: &str) -> Option<Value>;
    fn contains(&self, key: &str) -> bool;
}

/// Write access on top of [`TexStyleView`]. `remove` only clears local
/// overrides; inherited values stay visible through `get`.
pub trait TexStyle: TexStyleView {
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str);
}

/// A resolved font choice: family plus the face and rendering switches
/// that travel with it in a stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FontRef {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
    pub features: Option<String>,
    pub gr_space: Option<String>,
}

impl FontRef {
    pub fn new(family: impl Into<String>) -> Self {
        Self { family: family.into(), ..Self::default() }
    }

    pub fn bold(mut self, v: bool) -> Self {
        self.bold = v;
        self
    }

    pub fn italic(mut self, v: bool) -> Self {
        self.italic = v;
        self
    }

    /// Rebuild a font from a marker's attributes. A marker with no
    /// `FontName` of its own has no font; callers fall back to the
    /// publication's regular face.
    pub fn from_tex_style(style: &impl TexStyleView) -> Option<FontRef> {
        let name = style.get("FontName")?;
        let family = name.text()?.to_string();
        let bold = style.get("Bold").map(|v| v.truthy()).unwrap_or(false);
        let italic = style.get("Italic").map(|v| v.truthy()).unwrap_or(false);
        let features = style
            .get("ztexFontFeatures")
            .and_then(|v| v.text().map(str::to_string));
        let gr_space = style
            .get("ztexFontGrSpace")
            .and_then(|v| v.text().map(str::to_string));
        Some(FontRef { family, bold, italic, features, gr_space })
    }

    /// Write this font back into a marker's attributes.
    ///
    /// A plain face that merely repeats the publication's regular font is
    /// recorded by absence so the marker keeps inheriting, unless `force`
    /// says the underlying sheet already pins a `FontName` there. Face
    /// flags are only written as `false` when the attribute exists
    /// somewhere, so untouched markers stay untouched.
    pub fn update_tex_style(
        &self,
        style: &mut impl TexStyle,
        regular: Option<&FontRef>,
        force: bool,
    ) {
        let plain = !self.bold && !self.italic;
        let inherits = regular.is_some_and(|r| r.family == self.family);
        if !force && plain && inherits {
            style.remove("FontName");
        } else {
            style.set("FontName", Value::Text(self.family.clone()));
        }
        for (key, on) in [("Bold", self.bold), ("Italic", self.italic)] {
            if on {
                style.set(key, Value::Bool(true));
            } else if style.contains(key) {
                style.set(key, Value::Bool(false));
            }
        }
        for (key, opt) in [
            ("ztexFontFeatures", &self.features),
            ("ztexFontGrSpace", &self.gr_space),
        ] {
            match opt {
                Some(v) => style.set(key, Value::Text(v.clone())),
                None => style.remove(key),
            }
        }
    }
}
