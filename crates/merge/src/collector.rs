//! Cutting a parsed document into typed, reference-labelled chunks.
//!
//! The collector walks the node tree depth-first, opening a new chunk at
//! every paragraph-level marker whose classification differs from the
//! running mode, labelling chunks with the chapter and verse they carry,
//! and finally reordering the flat list so titles, tables and chapter
//! headings merge into alignable units.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use diglot_sfm::{Element, Node};

use crate::chunk::{Chunk, ChunkType};

/// Paragraph markers that continue the chunk they appear in instead of
/// opening a new one.
const NESTED_PARAS: [&str; 9] = [
    "io2", "io3", "io4", "toc2", "toc3", "ili2", "cp", "cl", "nb",
];

/// Which structural breaks open a new chunk during collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Only chapters and the title block start chunks.
    Chapter,
    /// Every paragraph-level break starts a chunk.
    #[default]
    Normal,
    /// Paragraph-level breaks plus one chunk per verse.
    Verse,
}

impl SyncMode {
    /// Whether a paragraph resolving to `kind` may open a chunk.
    fn breaks_at(self, kind: ChunkType) -> bool {
        match self {
            SyncMode::Chapter => matches!(kind, ChunkType::Chapter | ChunkType::Title),
            SyncMode::Normal | SyncMode::Verse => true,
        }
    }
}

fn marker_mode(name: &str) -> Option<ChunkType> {
    match name {
        "id" | "ide" | "h" | "toc1" | "toc2" | "toc3" => Some(ChunkType::Title),
        "v" => Some(ChunkType::Verse),
        "cl" => Some(ChunkType::Chapter),
        _ => None,
    }
}

fn texttype_mode(texttype: &str) -> Option<ChunkType> {
    if texttype.eq_ignore_ascii_case("ChapterNumber") {
        Some(ChunkType::Chapter)
    } else if texttype.eq_ignore_ascii_case("Section") {
        Some(ChunkType::Heading)
    } else if texttype.eq_ignore_ascii_case("Title") {
        Some(ChunkType::Title)
    } else if texttype.eq_ignore_ascii_case("Other") {
        Some(ChunkType::Intro)
    } else if texttype.eq_ignore_ascii_case("VerseText") {
        Some(ChunkType::Body)
    } else {
        None
    }
}

/// Verse references keep digits and hyphens only; anything that still
/// fails to parse labels as 0 rather than failing the run.
fn parse_verse(arg: &str) -> (u32, u32) {
    let digits: String = arg
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if arg.contains('-') {
        let parts: Vec<&str> = digits.split('-').collect();
        if let [v, e] = parts[..] {
            if let (Ok(v), Ok(e)) = (v.parse(), e.parse()) {
                return (v, e);
            }
        }
        (0, 0)
    } else {
        digits.parse().map(|v| (v, v)).unwrap_or((0, 0))
    }
}

fn parse_chapter(arg: &str) -> u32 {
    let digits: String = arg
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits.parse().unwrap_or(0)
}

/// Accumulates the chunks of one document in a multi-document merge.
///
/// The walk consumes the node tree: elements move out of their parents
/// and into chunks as boundaries are found, so a chunk can be serialized
/// without re-visiting the source document.
pub struct Collector {
    colkey: String,
    fsecondary: bool,
    sync: SyncMode,
    acc: Vec<Chunk>,
    chap: u32,
    verse: u32,
    end: u32,
    waspar: bool,
    counts: HashMap<String, u32>,
    mode: ChunkType,
}

impl Collector {
    pub fn new(colkey: impl Into<String>, fsecondary: bool, sync: SyncMode) -> Self {
        Collector {
            colkey: colkey.into(),
            fsecondary,
            sync,
            acc: Vec::new(),
            chap: 0,
            verse: 0,
            end: 0,
            waspar: false,
            counts: HashMap::new(),
            mode: ChunkType::Intro,
        }
    }

    /// Walk a document, cutting it into chunks. `primary` marks the
    /// reference side for figure stripping.
    pub fn collect(&mut self, doc: Vec<Node>, primary: bool) {
        let _ = self.walk(doc, primary);
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.acc
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.acc
    }

    /// Per-marker occurrence counter, reset at every verse.
    fn next_pnum(&mut self, name: &str) -> u32 {
        let n = self.counts.entry(name.to_string()).or_insert(1);
        let res = *n;
        *n += 1;
        res
    }

    /// The mode a paragraph marker resolves to before any fixed override:
    /// marker table, then the declared text type, then the running mode.
    fn para_mode(&self, el: &Element) -> ChunkType {
        marker_mode(&el.name)
            .or_else(|| texttype_mode(el.text_type()))
            .unwrap_or(self.mode)
    }

    /// Final chunk classification, fixed overrides first.
    fn resolve_kind(&self, el: &Element) -> ChunkType {
        match el.name.as_str() {
            "cl" => {
                if self.chap == 0 {
                    ChunkType::Title
                } else {
                    ChunkType::Heading
                }
            }
            "id" => ChunkType::Id,
            "tr" => ChunkType::Table,
            "v" => {
                if self.waspar {
                    ChunkType::ParVerse
                } else {
                    ChunkType::Verse
                }
            }
            _ => {
                let mut kind = self.para_mode(el);
                if kind == ChunkType::Body {
                    if self.acc.last().map(|c| c.has_verse).unwrap_or(false) {
                        kind = ChunkType::MidVersePar;
                    }
                    if el.first_element().is_some_and(|e| e.name == "v") {
                        kind = ChunkType::PreVersePar;
                    }
                }
                kind
            }
        }
    }

    fn open_chunk(&mut self, el: &Element) -> usize {
        let kind = self.resolve_kind(el);
        let pnum = self.next_pnum(&el.name);
        let chunk = Chunk::new(kind, self.chap, self.verse, self.verse, pnum);
        self.waspar = el.is_para();
        self.mode = kind;
        self.acc.push(chunk);
        self.acc.len() - 1
    }

    /// Walks one level of siblings. Returns the children that stay with
    /// the parent and the index of the last chunk opened in this subtree.
    fn walk(&mut self, nodes: Vec<Node>, primary: bool) -> (Vec<Node>, Option<usize>) {
        let mut kept: Vec<Node> = Vec::new();
        let mut curr: Option<usize> = None;
        for node in nodes {
            let mut el = match node {
                Node::Element(el) => el,
                text => {
                    match curr {
                        Some(ci) => self.acc[ci].content.push(text),
                        None => kept.push(text),
                    }
                    continue;
                }
            };
            if el.name == "fig" && self.fsecondary == primary {
                debug!(
                    "[{}] dropping figure at line {}",
                    self.colkey, el.pos.line
                );
                continue;
            }
            let is_verse = el.has_text_property("verse");
            let is_chap = el.has_text_property("chapter");

            let mut newchunk = false;
            if el.is_para() {
                let newmode = self.para_mode(&el);
                if !NESTED_PARAS.contains(&el.name.as_str())
                    && self.sync.breaks_at(newmode)
                    && (newmode != self.mode
                        || !matches!(self.mode, ChunkType::Heading | ChunkType::Title))
                {
                    newchunk = true;
                }
            }
            if is_verse {
                let (v, e) = parse_verse(el.args.first().map(String::as_str).unwrap_or(""));
                self.verse = v;
                self.end = e;
                self.counts.clear();
                if let Some(last) = self.acc.last_mut() {
                    // Verse chunks are labelled once, at creation; pushing
                    // the range along would claim the next verse's number.
                    if !matches!(last.kind, ChunkType::Verse | ChunkType::ParVerse) {
                        last.label(self.chap, self.verse, self.end, 0);
                        last.has_verse = true;
                    }
                }
                if self.sync == SyncMode::Verse {
                    newchunk = true;
                }
            }
            if newchunk {
                let ci = self.open_chunk(&el);
                if is_verse {
                    self.acc[ci].label(self.chap, self.verse, self.end, 0);
                    self.acc[ci].has_verse = true;
                }
                curr = Some(ci);
            }
            if is_chap {
                self.chap = parse_chapter(el.args.first().map(String::as_str).unwrap_or(""));
                self.verse = 0;
                self.end = 0;
            }
            let sub = match (is_chap, curr) {
                (true, Some(ci)) => {
                    // The chunk gets a fresh childless copy of the chapter
                    // marker; the subtree is distributed to its own chunks
                    // rather than riding along inside the marker.
                    let mut fresh = Element::new(el.name.clone(), el.meta.clone(), el.pos);
                    fresh.args = el.args.clone();
                    {
                        let chunk = &mut self.acc[ci];
                        chunk.chap = self.chap;
                        chunk.verse = 0;
                        chunk.end = 0;
                        chunk.content.push(Node::Element(fresh));
                    }
                    let (stray, sub) = self.walk(el.content, primary);
                    if stray.iter().any(|n| !n.is_whitespace()) {
                        debug!(
                            "[{}] {} stray nodes under chapter {}",
                            self.colkey,
                            stray.len(),
                            self.chap
                        );
                    }
                    sub
                }
                (_, target) => {
                    let (children, sub) = self.walk(std::mem::take(&mut el.content), primary);
                    el.content = children;
                    match target {
                        Some(ci) => self.acc[ci].content.push(Node::Element(el)),
                        None if el.is_para() && !self.acc.is_empty() => {
                            // Nested paragraphs and sync-suppressed breaks
                            // continue whatever chunk is open.
                            let last = self.acc.len() - 1;
                            self.acc[last].content.push(Node::Element(el));
                        }
                        None => kept.push(Node::Element(el)),
                    }
                    sub
                }
            };
            if sub.is_some() {
                curr = sub;
            }
        }
        (kept, curr)
    }

    /// Merge chunks that belong together for alignment purposes, then
    /// compact the tombstones left behind.
    pub fn reorder(&mut self) {
        debug!(
            "[{}] chunks before reordering: {}",
            self.colkey,
            self.acc.len()
        );
        // Contiguous runs of titles or tables collapse into their first chunk.
        let mut anchor: Option<usize> = None;
        for i in 1..self.acc.len() {
            let kind = self.acc[i].kind;
            if kind == self.acc[i - 1].kind
                && matches!(kind, ChunkType::Title | ChunkType::Table)
            {
                let a = match anchor {
                    Some(a) if self.acc[a].kind == kind => a,
                    _ => i - 1,
                };
                self.absorb_into(a, i);
                anchor = Some(a);
            } else {
                anchor = None;
            }
        }
        // Headings before the first chapter or body chunk belong to the intro.
        for i in 1..self.acc.len().saturating_sub(1) {
            if matches!(
                self.acc[i + 1].kind,
                ChunkType::Chapter | ChunkType::Body
            ) {
                break;
            }
            if self.acc[i].kind == ChunkType::Heading {
                self.acc[i].kind = ChunkType::Intro;
            }
        }
        // A heading adjacent to a chapter number travels with the chapter.
        for i in 1..self.acc.len() {
            if self.acc[i].kind == ChunkType::Chapter
                && self.acc[i - 1].kind == ChunkType::Heading
            {
                self.absorb_into(i, i - 1);
            } else if self.acc[i - 1].kind == ChunkType::Chapter
                && self.acc[i].kind == ChunkType::Heading
            {
                self.absorb_into(i - 1, i);
            }
        }
        self.acc.retain(|c| !c.dead);
        debug!(
            "[{}] chunks after reordering: {}",
            self.colkey,
            self.acc.len()
        );
    }

    fn absorb_into(&mut self, dst: usize, src: usize) {
        if dst < src {
            let (head, tail) = self.acc.split_at_mut(src);
            head[dst].absorb(&mut tail[0]);
        } else {
            let (head, tail) = self.acc.split_at_mut(dst);
            tail[0].absorb(&mut head[src]);
        }
        self.acc[src].dead = true;
    }
}

/// Chunk one document end to end: collect, then reorder.
pub fn chunk_document(
    doc: Vec<Node>,
    colkey: &str,
    primary: bool,
    fsecondary: bool,
    sync: SyncMode,
) -> Vec<Chunk> {
    let mut coll = Collector::new(colkey, fsecondary, sync);
    coll.collect(doc, primary);
    coll.reorder();
    coll.into_chunks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use diglot_sfm::{Sheet, parse_document};

    fn chunked(src: &str, sync: SyncMode) -> Vec<Chunk> {
        chunked_as(src, sync, false, true)
    }

    fn chunked_as(src: &str, sync: SyncMode, fsecondary: bool, primary: bool) -> Vec<Chunk> {
        let sheet = Sheet::base();
        let doc = parse_document(src, &sheet);
        chunk_document(doc, "L", primary, fsecondary, sync)
    }

    fn keys(chunks: &[Chunk]) -> Vec<String> {
        chunks.iter().map(Chunk::key).collect()
    }

    #[test]
    fn chapter_and_verse_label_their_chunks() {
        let chunks = chunked(
            "\\id GEN Genesis\n\\c 1\n\\p\n\\v 1 In the beginning\n",
            SyncMode::Normal,
        );
        assert_eq!(
            keys(&chunks),
            vec!["ID_0_0", "CHAPTER_1_0", "PREVERSEPAR_1_1"]
        );
    }

    #[test]
    fn verse_range_labels_verse_and_end() {
        let chunks = chunked("\\id GEN\n\\c 3\n\\p\n\\v 3-5 text\n", SyncMode::Normal);
        let last = chunks.last().unwrap();
        assert_eq!(last.chap, 3);
        assert_eq!(last.verse, 3);
        assert_eq!(last.end, 5);
    }

    #[test]
    fn continuation_paragraph_is_midverse() {
        let chunks = chunked(
            "\\id GEN\n\\c 1\n\\p\n\\v 1 words\n\\q rest of the verse\n\\p\n\\v 2 next\n",
            SyncMode::Normal,
        );
        let kinds: Vec<ChunkType> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkType::Id,
                ChunkType::Chapter,
                ChunkType::PreVersePar,
                ChunkType::MidVersePar,
                ChunkType::PreVersePar,
            ]
        );
        assert_eq!(chunks[3].key(), "MIDVERSEPAR_1_1");
    }

    #[test]
    fn heading_before_chapter_travels_with_it() {
        let chunks = chunked(
            "\\id GEN\n\\s Prologue\n\\c 1\n\\p\n\\v 1 x\n",
            SyncMode::Normal,
        );
        let kinds: Vec<ChunkType> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ChunkType::Id, ChunkType::Chapter, ChunkType::PreVersePar]
        );
        assert!(chunks[1].to_string().contains("\\s Prologue"));
    }

    #[test]
    fn nested_paragraph_continues_the_open_chunk() {
        let chunks = chunked(
            "\\id GEN\n\\c 1\n\\p\n\\v 1 a\n\\nb no break here\n",
            SyncMode::Normal,
        );
        let body = chunks.last().unwrap();
        assert_eq!(body.kind, ChunkType::PreVersePar);
        assert!(body.to_string().contains("\\nb"));
    }

    #[test]
    fn chapter_label_lands_in_the_chapter_chunk() {
        let chunks = chunked(
            "\\id PSA\n\\c 1\n\\cl Psalm 1\n\\p\n\\v 1 blessed\n",
            SyncMode::Normal,
        );
        let chapter = &chunks[1];
        assert_eq!(chapter.kind, ChunkType::Chapter);
        assert!(chapter.to_string().contains("\\cl Psalm 1"));
    }

    #[test]
    fn verse_sync_opens_a_chunk_per_verse() {
        let chunks = chunked(
            "\\id GEN\n\\c 1\n\\p\n\\v 1 alpha\n\\v 2 beta\n",
            SyncMode::Verse,
        );
        let k = keys(&chunks);
        assert!(k.contains(&"PARVERSE_1_1".to_string()), "{k:?}");
        assert!(k.contains(&"VERSE_1_2".to_string()), "{k:?}");
        let beta = chunks.last().unwrap();
        assert!(beta.to_string().contains("beta"));
        assert!(!beta.to_string().contains("alpha"));
    }

    #[test]
    fn chapter_sync_folds_paragraphs_into_the_chapter() {
        let chunks = chunked(
            "\\id GEN\n\\c 1\n\\p\n\\v 1 a\n\\s head\n\\p\n\\v 2 b\n\\c 2\n\\p\n\\v 1 c\n",
            SyncMode::Chapter,
        );
        let kinds: Vec<ChunkType> = chunks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ChunkType::Id, ChunkType::Chapter, ChunkType::Chapter]
        );
        let one = chunks[1].to_string();
        assert!(one.contains("head"));
        assert!(one.contains("\\v 2 b"));
    }

    #[test]
    fn figures_stripped_on_exactly_one_side() {
        let src = "\\id GEN\n\\c 1\n\\p\n\\v 1 a \\fig caption\\fig* b\n";
        let on_primary = chunked_as(src, SyncMode::Normal, false, true);
        let on_secondary = chunked_as(src, SyncMode::Normal, false, false);
        let text = |cs: &[Chunk]| cs.iter().map(|c| c.to_string()).collect::<String>();
        assert!(text(&on_primary).contains("\\fig"));
        assert!(!text(&on_secondary).contains("\\fig"));

        let flipped_primary = chunked_as(src, SyncMode::Normal, true, true);
        let flipped_secondary = chunked_as(src, SyncMode::Normal, true, false);
        assert!(!text(&flipped_primary).contains("\\fig"));
        assert!(text(&flipped_secondary).contains("\\fig"));
    }

    #[test]
    fn adjacent_title_and_table_runs_merge() {
        let mut coll = Collector::new("L", false, SyncMode::Normal);
        for kind in [
            ChunkType::Title,
            ChunkType::Title,
            ChunkType::Intro,
            ChunkType::Table,
            ChunkType::Table,
        ] {
            let mut c = Chunk::new(kind, 0, 0, 0, 1);
            c.content.push(Node::Text("x".into()));
            coll.acc.push(c);
        }
        coll.reorder();
        let kinds: Vec<ChunkType> = coll.acc.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ChunkType::Title, ChunkType::Intro, ChunkType::Table]
        );
        assert_eq!(coll.acc[0].content.len(), 2);
        assert_eq!(coll.acc[2].content.len(), 2);
    }

    #[test]
    fn headings_in_the_intro_demote_to_intro() {
        let mut coll = Collector::new("L", false, SyncMode::Normal);
        for kind in [
            ChunkType::Id,
            ChunkType::Heading,
            ChunkType::Intro,
            ChunkType::Chapter,
        ] {
            let mut c = Chunk::new(kind, 0, 0, 0, 1);
            c.content.push(Node::Text("x".into()));
            coll.acc.push(c);
        }
        coll.reorder();
        let kinds: Vec<ChunkType> = coll.acc.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChunkType::Id,
                ChunkType::Intro,
                ChunkType::Intro,
                ChunkType::Chapter
            ]
        );
    }

    #[test]
    fn malformed_verse_references_label_as_zero() {
        assert_eq!(parse_verse("16"), (16, 16));
        assert_eq!(parse_verse("3-5"), (3, 5));
        assert_eq!(parse_verse("12a"), (12, 12));
        assert_eq!(parse_verse("xyz"), (0, 0));
        assert_eq!(parse_verse("1-2-3"), (0, 0));
        assert_eq!(parse_verse(""), (0, 0));
    }
}
