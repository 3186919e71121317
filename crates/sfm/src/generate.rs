//! Canonical text generation from a node tree.
//!
//! Output is normalized rather than byte-preserving: paragraph-level
//! markers, chapters and verses each start a fresh line, character spans
//! stay inline, and paragraph content ends with a single newline.

use crate::node::{Element, Node};

fn is_block(el: &Element) -> bool {
    el.is_para()
        || el.has_text_property("chapter")
        || el.has_text_property("book")
        || (el.has_text_property("verse") && el.endmarker().is_none())
}

struct Generator {
    out: String,
}

impl Generator {
    fn line_start(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn marker(&mut self, el: &Element) {
        self.out.push('\\');
        self.out.push_str(&el.name);
        for arg in &el.args {
            self.out.push(' ');
            self.out.push_str(arg);
        }
    }

    fn children(&mut self, el: &Element) {
        let mut first = true;
        for node in &el.content {
            match node {
                Node::Text(t) => {
                    if first {
                        self.out.push(' ');
                    }
                    self.out.push_str(t);
                }
                Node::Element(child) => {
                    if first && !is_block(child) {
                        self.out.push(' ');
                    }
                    self.element(child);
                }
            }
            first = false;
        }
    }

    fn element(&mut self, el: &Element) {
        if is_block(el) {
            self.line_start();
            self.marker(el);
            self.children(el);
            if el.is_para() || el.has_text_property("chapter") {
                self.line_start();
            }
        } else {
            self.marker(el);
            self.children(el);
            if let Some(end) = el.endmarker() {
                self.out.push('\\');
                self.out.push_str(end);
            }
        }
    }
}

/// Serializes a node list to canonical marked-up text.
pub fn generate(nodes: &[Node]) -> String {
    let mut g = Generator { out: String::new() };
    for node in nodes {
        match node {
            Node::Text(t) => g.out.push_str(t),
            Node::Element(el) => g.element(el),
        }
    }
    if !g.out.is_empty() && !g.out.ends_with('\n') {
        g.out.push('\n');
    }
    g.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use crate::sty::Sheet;

    fn roundtrip(input: &str) -> String {
        let sheet = Sheet::base();
        generate(&parse_document(input, &sheet))
    }

    #[test]
    fn test_generate_paragraphs_and_verses() {
        let out = roundtrip("\\c 1\n\\p\n\\v 1 In the beginning\n\\v 2 And the earth\n");
        assert_eq!(out, "\\c 1\n\\p\n\\v 1 In the beginning\n\\v 2 And the earth\n");
    }

    #[test]
    fn test_generate_char_span_inline() {
        let out = roundtrip("\\p the \\nd LORD\\nd* spoke\n");
        assert_eq!(out, "\\p the \\nd LORD\\nd* spoke\n");
    }

    #[test]
    fn test_generate_note_inline() {
        let out = roundtrip("\\p word\\f + \\fr 1:1 \\ft note text\\f* more\n");
        assert_eq!(out, "\\p word\\f + \\fr 1:1\\ft note text\\f* more\n");
    }

    #[test]
    fn test_generate_normalizes_layout() {
        let out = roundtrip("\\c 1 \\p \\v 1 one two\n\n\n\\q1 three\n");
        assert_eq!(out, "\\c 1\n\\p\n\\v 1 one two\n\\q1 three\n");
    }

    #[test]
    fn test_generate_table_row() {
        let out = roundtrip("\\c 1\n\\tr \\th1 Day\\th2 Night\n");
        assert_eq!(out, "\\c 1\n\\tr \\th1 Day\\th2 Night\n");
    }

    #[test]
    fn test_generate_id_line() {
        let out = roundtrip("\\id GEN Genesis in English\n\\c 1\n");
        assert_eq!(out, "\\id GEN Genesis in English\n\\c 1\n");
    }
}
