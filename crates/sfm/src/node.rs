//! Core, in-memory representation of a USFM document after parsing.
//!
//! A document is an ordered list of [`Node`]s. Structural markers become
//! [`Element`]s carrying their stylesheet record as shared metadata; raw
//! character data becomes [`Node::Text`].

use std::collections::BTreeMap;
use std::sync::Arc;

/// A marker's stylesheet record: attribute name to raw value.
pub type AttrMap = BTreeMap<String, String>;

/// Source position of a marker, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A marker occurrence: name, positional arguments, child content and the
/// stylesheet record it was parsed against.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub args: Vec<String>,
    pub meta: Arc<AttrMap>,
    pub content: Vec<Node>,
    pub pos: Pos,
}

impl Element {
    pub fn new(name: impl Into<String>, meta: Arc<AttrMap>, pos: Pos) -> Self {
        Element {
            name: name.into(),
            args: Vec::new(),
            meta,
            content: Vec::new(),
            pos,
        }
    }

    /// Looks up a metadata attribute by its canonical name.
    pub fn meta_val(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn style_type(&self) -> &str {
        self.meta_val("StyleType").unwrap_or("")
    }

    pub fn text_type(&self) -> &str {
        self.meta_val("TextType").unwrap_or("")
    }

    /// The end-marker form declared for this marker, if any (e.g. `nd*`).
    pub fn endmarker(&self) -> Option<&str> {
        self.meta_val("Endmarker").filter(|e| !e.is_empty())
    }

    /// True for paragraph-level markers.
    pub fn is_para(&self) -> bool {
        self.style_type().eq_ignore_ascii_case("paragraph")
    }

    /// Tests membership in the whitespace-separated `TextProperties` set.
    pub fn has_text_property(&self, prop: &str) -> bool {
        self.meta_val("TextProperties")
            .map(|props| {
                props
                    .split_whitespace()
                    .any(|p| p.eq_ignore_ascii_case(prop))
            })
            .unwrap_or(false)
    }

    /// First element child, skipping interleaved text.
    pub fn first_element(&self) -> Option<&Element> {
        self.content.iter().find_map(Node::as_element)
    }
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    /// True for text nodes carrying only whitespace.
    pub fn is_whitespace(&self) -> bool {
        match self {
            Node::Text(t) => t.chars().all(char::is_whitespace),
            Node::Element(_) => false,
        }
    }
}
