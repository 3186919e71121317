//! Typed runs of document content, addressed by kind and reference.
use std::fmt;

use diglot_sfm::{Node, generate};

/// What a chunk holds, for keying and alignment.
///
/// The distinctions among the verse-bearing paragraph kinds matter because
/// alignment only merges runs of the same kind: a paragraph that opens with
/// a verse number can sync against another document, a paragraph continuing
/// mid-verse cannot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkType {
    /// Placeholder kind carrying the default score.
    DefScore,
    Chapter,
    Heading,
    Title,
    Intro,
    Body,
    Id,
    Table,
    /// A verse run split out inside a paragraph.
    Verse,
    /// A verse run opening a paragraph.
    ParVerse,
    /// A paragraph starting mid-verse.
    MidVersePar,
    /// A paragraph whose first element is a verse number.
    PreVersePar,
}

impl ChunkType {
    pub const ALL: [ChunkType; 12] = [
        ChunkType::DefScore,
        ChunkType::Chapter,
        ChunkType::Heading,
        ChunkType::Title,
        ChunkType::Intro,
        ChunkType::Body,
        ChunkType::Id,
        ChunkType::Table,
        ChunkType::Verse,
        ChunkType::ParVerse,
        ChunkType::MidVersePar,
        ChunkType::PreVersePar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChunkType::DefScore => "DEFSCORE",
            ChunkType::Chapter => "CHAPTER",
            ChunkType::Heading => "HEADING",
            ChunkType::Title => "TITLE",
            ChunkType::Intro => "INTRO",
            ChunkType::Body => "BODY",
            ChunkType::Id => "ID",
            ChunkType::Table => "TABLE",
            ChunkType::Verse => "VERSE",
            ChunkType::ParVerse => "PARVERSE",
            ChunkType::MidVersePar => "MIDVERSEPAR",
            ChunkType::PreVersePar => "PREVERSEPAR",
        }
    }
}

/// A contiguous slice of document nodes with the reference it was cut at.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: Vec<Node>,
    pub kind: ChunkType,
    pub chap: u32,
    pub verse: u32,
    pub end: u32,
    pub pnum: u32,
    pub has_verse: bool,
    labelled: bool,
    pub(crate) dead: bool,
}

impl Chunk {
    pub fn new(kind: ChunkType, chap: u32, verse: u32, end: u32, pnum: u32) -> Self {
        Chunk {
            content: Vec::new(),
            kind,
            chap,
            verse,
            end,
            pnum,
            has_verse: false,
            labelled: false,
            dead: false,
        }
    }

    /// Pin this chunk to a reference. The first label wins; later calls
    /// only push the end of the verse range along.
    pub fn label(&mut self, chap: u32, verse: u32, end: u32, pnum: u32) {
        if self.labelled {
            self.end = end;
            return;
        }
        self.chap = chap;
        self.verse = verse;
        self.end = end;
        self.pnum = pnum;
        self.labelled = true;
    }

    pub fn ident(&self) -> (&'static str, u32, u32) {
        if self.content.is_empty() {
            return ("", 0, 0);
        }
        (self.kind.name(), self.chap, self.verse)
    }

    /// Alignment key, e.g. `BODY_3_16`.
    pub fn key(&self) -> String {
        let (name, chap, verse) = self.ident();
        format!("{name}_{chap}_{verse}")
    }

    /// Move another chunk's content onto the end of this one.
    pub fn absorb(&mut self, other: &mut Chunk) {
        self.content.append(&mut other.content);
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&generate(&self.content))
    }
}
