//! Stylesheet-driven USFM parser.
//!
//! Builds a [`Node`] tree from token events. Structure comes from the
//! stylesheet, not from a fixed marker list: paragraph styles open
//! paragraph containers, the `chapter`/`verse`/`book` text properties open
//! their containers, `Note` styles open note spans, and character styles
//! nest as spans. A character style without a declared end-marker closes
//! implicitly when the next such span opens (table cells, footnote
//! content). Parsing never fails; structural problems are logged and
//! repaired in place.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::warn;

use crate::error::UsfmError;
use crate::lexer::{Lexer, Token};
use crate::node::{AttrMap, Element, Node, Pos};
use crate::sty::Sheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Chapter,
    Para,
    Verse,
    Note,
    Span { explicit: bool },
}

#[derive(Debug)]
struct Frame {
    el: Element,
    scope: Scope,
}

pub struct TreeBuilder<'a> {
    sheet: &'a Sheet,
    doc: Vec<Node>,
    stack: Vec<Frame>,
    synthesized: BTreeMap<String, Arc<AttrMap>>,
    pending_args: usize,
}

fn trim_trailing(el: &mut Element) {
    while let Some(Node::Text(t)) = el.content.last_mut() {
        let trimmed = t.trim_end().len();
        if trimmed == 0 {
            el.content.pop();
        } else {
            t.truncate(trimmed);
            break;
        }
    }
}

fn split_arg(t: &str) -> (String, String) {
    let t = t.trim_start();
    match t.find(char::is_whitespace) {
        Some(i) => {
            let arg = t[..i].to_string();
            let mut rest = t[i..].chars();
            rest.next();
            (arg, rest.as_str().to_string())
        }
        None => (t.to_string(), String::new()),
    }
}

impl<'a> TreeBuilder<'a> {
    pub fn new(sheet: &'a Sheet) -> Self {
        TreeBuilder {
            sheet,
            doc: Vec::new(),
            stack: Vec::new(),
            synthesized: BTreeMap::new(),
            pending_args: 0,
        }
    }

    fn meta_for(&mut self, name: &str) -> Arc<AttrMap> {
        if let Some(rec) = self.sheet.get(name) {
            return Arc::clone(rec);
        }
        Arc::clone(self.synthesized.entry(name.to_string()).or_insert_with(|| {
            warn!("unknown marker \\{name}, treating as a character style");
            let mut attrs = AttrMap::new();
            attrs.insert("StyleType".into(), "Character".into());
            attrs.insert("TextType".into(), "Unspecified".into());
            Arc::new(attrs)
        }))
    }

    fn attach(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(frame) => frame.el.content.push(node),
            None => self.doc.push(node),
        }
    }

    fn close_top(&mut self) {
        if let Some(mut frame) = self.stack.pop() {
            trim_trailing(&mut frame.el);
            self.attach(Node::Element(frame.el));
        }
    }

    fn close_implicit_spans(&mut self) {
        while matches!(
            self.stack.last().map(|f| f.scope),
            Some(Scope::Span { explicit: false })
        ) {
            self.close_top();
        }
    }

    /// Closes everything down to the enclosing paragraph.
    fn close_verse(&mut self) {
        while let Some(frame) = self.stack.last() {
            let stop = matches!(frame.scope, Scope::Verse);
            match frame.scope {
                Scope::Span { explicit: true } => warn!("unclosed span \\{}", frame.el.name),
                Scope::Note => warn!("unclosed note \\{}", frame.el.name),
                Scope::Para | Scope::Chapter => return,
                _ => {}
            }
            self.close_top();
            if stop {
                return;
            }
        }
    }

    /// Closes everything down to the enclosing chapter.
    fn close_para(&mut self) {
        while let Some(frame) = self.stack.last() {
            let stop = matches!(frame.scope, Scope::Para);
            match frame.scope {
                Scope::Span { explicit: true } => warn!("unclosed span \\{}", frame.el.name),
                Scope::Note => warn!("unclosed note \\{}", frame.el.name),
                Scope::Chapter => return,
                _ => {}
            }
            self.close_top();
            if stop {
                return;
            }
        }
    }

    fn close_chapter(&mut self) {
        while let Some(frame) = self.stack.last() {
            match frame.scope {
                Scope::Span { explicit: true } => warn!("unclosed span \\{}", frame.el.name),
                Scope::Note => warn!("unclosed note \\{}", frame.el.name),
                _ => {}
            }
            self.close_top();
        }
    }

    fn push(&mut self, el: Element, scope: Scope, args: usize) {
        self.stack.push(Frame { el, scope });
        self.pending_args = args;
    }

    pub fn open(&mut self, name: String, pos: Pos) {
        self.pending_args = 0;
        let meta = self.meta_for(&name);
        let el = Element::new(name, meta, pos);
        if el.is_para() && el.has_text_property("chapter") {
            self.close_chapter();
            self.push(el, Scope::Chapter, 1);
        } else if el.has_text_property("book") {
            self.close_chapter();
            self.push(el, Scope::Para, 1);
        } else if el.is_para() {
            self.close_para();
            self.push(el, Scope::Para, 0);
        } else if el.has_text_property("verse") && el.endmarker().is_none() {
            self.close_verse();
            self.push(el, Scope::Verse, 1);
        } else if el.style_type().eq_ignore_ascii_case("note") {
            self.push(el, Scope::Note, 1);
        } else {
            let explicit = el.endmarker().is_some();
            if !explicit {
                self.close_implicit_spans();
            }
            self.push(el, Scope::Span { explicit }, 0);
        }
    }

    pub fn close(&mut self, name: &str) {
        self.pending_args = 0;
        self.close_implicit_spans();
        let matched = self.stack.last().is_some_and(|f| {
            f.el.name == name && matches!(f.scope, Scope::Span { explicit: true } | Scope::Note)
        });
        if !matched {
            warn!("unmatched close marker \\{name}*");
            return;
        }
        if let Some(mut frame) = self.stack.pop() {
            if matches!(frame.scope, Scope::Note) {
                trim_trailing(&mut frame.el);
            }
            self.attach(Node::Element(frame.el));
        }
    }

    pub fn text(&mut self, t: String) {
        let t = if self.pending_args > 0 {
            self.take_args(t)
        } else {
            t
        };
        self.pending_args = 0;
        if t.is_empty() {
            return;
        }
        // Whitespace between records at document or chapter level carries
        // no content.
        let structural = matches!(
            self.stack.last().map(|f| f.scope),
            None | Some(Scope::Chapter)
        );
        if structural && t.chars().all(char::is_whitespace) {
            return;
        }
        self.attach(Node::Text(t));
    }

    fn take_args(&mut self, t: String) -> String {
        let mut rest = t;
        for _ in 0..self.pending_args {
            if rest.is_empty() {
                break;
            }
            let (arg, r) = split_arg(&rest);
            rest = r;
            if arg.is_empty() {
                break;
            }
            if let Some(frame) = self.stack.last_mut() {
                frame.el.args.push(arg);
            }
        }
        rest
    }

    pub fn finish(mut self) -> Vec<Node> {
        self.close_chapter();
        self.doc
    }
}

/// Parses a whole document against a stylesheet.
pub fn parse_document(input: &str, sheet: &Sheet) -> Vec<Node> {
    let mut builder = TreeBuilder::new(sheet);
    for (pos, token) in Lexer::new(input) {
        match token {
            Token::Open { name, .. } => builder.open(name, pos),
            Token::Close { name } => builder.close(&name),
            Token::Text(t) => builder.text(t),
        }
    }
    builder.finish()
}

pub fn parse_file(path: &Path, sheet: &Sheet) -> Result<Vec<Node>, UsfmError> {
    let text = fs::read_to_string(path).map_err(|source| UsfmError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_document(&text, sheet))
}
