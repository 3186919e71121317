use std::fmt::Write as _;

use diglot::{MergeConfig, PipelineError, usfmerge};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Diglot column-switch directives, defined by the ptx2pdf macros.
pub const DIRECTIVES: [&str; 4] = [
    "\\lefttext",
    "\\righttext",
    "\\nolefttext",
    "\\norighttext",
];

/// Build a one-book USFM document: one `\p` per chapter holding the given
/// verse texts.
pub fn book(code: &str, chapters: &[&[&str]]) -> String {
    let mut doc = format!("\\id {code} test document\n");
    for (c, verses) in chapters.iter().enumerate() {
        let _ = writeln!(doc, "\\c {}", c + 1);
        doc.push_str("\\p\n");
        for (v, text) in verses.iter().enumerate() {
            let _ = writeln!(doc, "\\v {} {}", v + 1, text);
        }
    }
    doc
}

/// Run the full pipeline in memory and return the interleaved output.
pub fn merge_to_string(config: &MergeConfig, docs: &[&str]) -> Result<String, PipelineError> {
    let mut out = Vec::new();
    usfmerge(config, docs, &mut out)?;
    Ok(String::from_utf8(out).unwrap_or_default())
}

/// The column-switch directives of `merged`, in output order.
pub fn directives(merged: &str) -> Vec<&str> {
    merged
        .lines()
        .filter(|line| DIRECTIVES.contains(line))
        .collect()
}

/// Byte offset of `needle`, panicking with context when it is missing.
pub fn offset_of(haystack: &str, needle: &str) -> usize {
    match haystack.find(needle) {
        Some(i) => i,
        None => panic!("{needle:?} not found in output:\n{haystack}"),
    }
}
