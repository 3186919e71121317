//! End-to-end merge pipeline: parse, chunk, align, serialize.
//!
//! [`usfmerge`] drives the whole flow for in-memory documents and
//! [`merge_files`] wraps it with file I/O. A [`MergeConfig`] carries the
//! column keys and per-column options, and deserializes from JSON with
//! every field optional.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use diglot_merge::{ChunkType, Row, SyncMode, align_chunks, align_simple, chunk_document};
use diglot_sfm::{Node, Sheet, UsfmError, parse_document};

/// Errors from configuring and running the merge pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Usfm(#[from] UsfmError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("cannot have {0} keys and {1} documents")]
    KeyCount(usize, usize),

    #[error("cannot have {0} keys and {1} synchronisation modes")]
    SyncCount(usize, usize),

    #[error("cannot have {0} keys and {1} scores")]
    ScoreCount(usize, usize),

    #[error("document-pair alignment requires exactly 2 documents, got {0}")]
    DocMode(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alignment strategy for combining chunk sequences.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pairwise alignment of exactly two documents, regrouping unmatched
    /// stretches by chunk type.
    #[default]
    Doc,
    /// Star alignment of any number of documents around the first one.
    Simple,
}

/// Settings for one merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Column keys, one per document, primary first.
    pub keys: Vec<String>,
    pub mode: Mode,
    /// Drop figures from the secondary columns instead of the primary one.
    pub fsecondary: bool,
    /// Synchronisation granularity per column. A single entry applies to
    /// every column.
    pub sync: Vec<SyncMode>,
    /// Per-column chunk scores. Checked for arity against `keys`.
    pub scores: Vec<u32>,
    /// Stylesheets layered over the built-in one, per column key.
    pub stylesheets: BTreeMap<String, Vec<PathBuf>>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            keys: vec!["L".to_string(), "R".to_string()],
            mode: Mode::default(),
            fsecondary: false,
            sync: Vec::new(),
            scores: Vec::new(),
            stylesheets: BTreeMap::new(),
        }
    }
}

impl MergeConfig {
    /// Builds a config from a JSON object; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Expands `sync` to one mode per column.
    fn sync_modes(&self) -> Result<Vec<SyncMode>, PipelineError> {
        match self.sync.len() {
            0 => Ok(vec![SyncMode::default(); self.keys.len()]),
            1 => Ok(vec![self.sync[0]; self.keys.len()]),
            n if n == self.keys.len() => Ok(self.sync.clone()),
            n => Err(PipelineError::SyncCount(self.keys.len(), n)),
        }
    }

    fn check_scores(&self) -> Result<(), PipelineError> {
        if self.scores.is_empty() {
            if !self.keys.is_empty() {
                debug!("using default chunk score {}", 1 + 100 / self.keys.len());
            }
        } else if self.scores.len() != self.keys.len() {
            return Err(PipelineError::ScoreCount(
                self.keys.len(),
                self.scores.len(),
            ));
        }
        Ok(())
    }

    /// Composes the stylesheet for one column: the built-in sheet plus any
    /// configured overlays. Missing overlay files are skipped.
    fn sheet_for(&self, key: &str) -> Result<Sheet, PipelineError> {
        let mut sheet = Sheet::base();
        if let Some(extras) = self.stylesheets.get(key) {
            for path in extras {
                if !path.exists() {
                    debug!("skipping missing stylesheet {}", path.display());
                    continue;
                }
                debug!("appending {} to stylesheet {key}", path.display());
                sheet.update_from(Sheet::from_file(path)?);
            }
        }
        Ok(sheet)
    }
}

/// Merges parallel USFM documents into one interleaved stream.
///
/// `docs` holds whole documents ordered to match `config.keys`; the first
/// key is the primary column. Output is written to `out` as USFM with
/// diglot column-switch directives.
pub fn usfmerge<S: AsRef<str>, W: Write>(
    config: &MergeConfig,
    docs: &[S],
    out: &mut W,
) -> Result<(), PipelineError> {
    if config.keys.len() != docs.len() {
        return Err(PipelineError::KeyCount(config.keys.len(), docs.len()));
    }
    let syncs = config.sync_modes()?;
    config.check_scores()?;
    if config.mode == Mode::Doc && docs.len() != 2 {
        return Err(PipelineError::DocMode(docs.len()));
    }
    if docs.is_empty() {
        return Ok(());
    }

    info!("merging {} documents, {:?} alignment", docs.len(), config.mode);
    let mut columns = Vec::with_capacity(docs.len());
    for (i, (key, doc)) in config.keys.iter().zip(docs).enumerate() {
        let sheet = config.sheet_for(key)?;
        let mut nodes = parse_document(doc.as_ref(), &sheet);
        strip_leading_text(&mut nodes);
        let chunks = chunk_document(nodes, key, i == 0, config.fsecondary, syncs[i]);
        debug!("{key}: {} chunks", chunks.len());
        columns.push(chunks);
    }

    let rows = match config.mode {
        Mode::Doc => {
            let mut cols = columns.into_iter();
            match (cols.next(), cols.next()) {
                (Some(left), Some(right)) => align_chunks(left, right),
                _ => Vec::new(),
            }
        }
        Mode::Simple => align_simple(columns),
    };
    debug!("aligned {} rows", rows.len());
    write_rows(&rows, out)?;
    Ok(())
}

/// Reads `infiles`, merges them per `config` and writes the interleaved
/// result to `outfile`.
pub fn merge_files<P: AsRef<Path>>(
    config: &MergeConfig,
    infiles: &[P],
    outfile: &Path,
) -> Result<(), PipelineError> {
    let mut docs = Vec::with_capacity(infiles.len());
    for path in infiles {
        let path = path.as_ref();
        debug!("reading {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| UsfmError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        docs.push(text);
    }
    let mut out = io::BufWriter::new(fs::File::create(outfile)?);
    usfmerge(config, &docs, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Drops stray text before the first marker, keeping at least one node.
fn strip_leading_text(doc: &mut Vec<Node>) {
    while doc.len() > 1 && matches!(doc.first(), Some(n) if n.is_text()) {
        doc.remove(0);
    }
}

/// Serializes aligned rows as an interleaved diglot stream.
///
/// `\lefttext` and `\righttext` introduce content for a column;
/// `\nolefttext` and `\norighttext` mark the column as absent for the
/// current row. Every chunk except headings and titles is closed with
/// `\p` so the following column switch starts a fresh paragraph.
fn write_rows<W: Write>(rows: &[Row], out: &mut W) -> io::Result<()> {
    let mut isright = true;
    for (i, row) in rows.iter().enumerate() {
        let left = row
            .first()
            .and_then(|c| c.as_ref())
            .filter(|c| !c.is_empty());
        let right = row
            .get(1)
            .and_then(|c| c.as_ref())
            .filter(|c| !c.is_empty());
        if let Some(chunk) = left {
            if isright {
                out.write_all(b"\\lefttext\n")?;
                isright = false;
            }
            write!(out, "{chunk}")?;
            if !matches!(chunk.kind, ChunkType::Heading | ChunkType::Title) {
                out.write_all(b"\\p\n")?;
            }
        } else if i != 0 && isright && right.is_some() {
            out.write_all(b"\\nolefttext\n")?;
            isright = false;
        }
        if let Some(chunk) = right {
            if !isright {
                out.write_all(b"\\righttext\n")?;
                isright = true;
            }
            write!(out, "{chunk}")?;
            if !matches!(chunk.kind, ChunkType::Heading | ChunkType::Title) {
                out.write_all(b"\\p\n")?;
            }
        } else if !isright {
            out.write_all(b"\\norighttext\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_document_counts_must_match() {
        let config = MergeConfig::default();
        let mut out = Vec::new();
        let err = usfmerge(&config, &["\\id GEN"], &mut out).unwrap_err();
        assert!(matches!(err, PipelineError::KeyCount(2, 1)));
    }

    #[test]
    fn single_sync_mode_broadcasts_to_every_column() {
        let config = MergeConfig {
            keys: vec!["A".into(), "B".into(), "C".into()],
            sync: vec![SyncMode::Verse],
            ..MergeConfig::default()
        };
        let modes = config.sync_modes().unwrap();
        assert_eq!(modes, vec![SyncMode::Verse; 3]);
    }

    #[test]
    fn mismatched_sync_count_is_rejected() {
        let config = MergeConfig {
            sync: vec![SyncMode::Verse, SyncMode::Normal, SyncMode::Chapter],
            ..MergeConfig::default()
        };
        let err = config.sync_modes().unwrap_err();
        assert!(matches!(err, PipelineError::SyncCount(2, 3)));
    }

    #[test]
    fn mismatched_score_count_is_rejected() {
        let config = MergeConfig {
            scores: vec![55],
            ..MergeConfig::default()
        };
        let err = config.check_scores().unwrap_err();
        assert!(matches!(err, PipelineError::ScoreCount(2, 1)));
    }

    #[test]
    fn doc_mode_requires_exactly_two_documents() {
        let config = MergeConfig {
            keys: vec!["A".into(), "B".into(), "C".into()],
            ..MergeConfig::default()
        };
        let mut out = Vec::new();
        let docs = ["\\id GEN", "\\id GEN", "\\id GEN"];
        let err = usfmerge(&config, &docs, &mut out).unwrap_err();
        assert!(matches!(err, PipelineError::DocMode(3)));
    }

    #[test]
    fn partial_json_config_fills_in_defaults() {
        let config = MergeConfig::from_json(r#"{"mode": "simple", "keys": ["A", "B", "C"]}"#)
            .unwrap();
        assert_eq!(config.mode, Mode::Simple);
        assert_eq!(config.keys, vec!["A", "B", "C"]);
        assert!(!config.fsecondary);
        assert!(config.sync.is_empty());
    }

    #[test]
    fn leading_text_is_stripped_but_a_lone_node_survives() {
        let sheet = Sheet::base();
        let mut doc = vec![Node::Text("\u{feff}".to_string())];
        doc.extend(parse_document("\\id GEN\n\\c 1\n", &sheet));
        strip_leading_text(&mut doc);
        assert!(!doc[0].is_text());

        let mut lone = vec![Node::Text("stray".to_string())];
        strip_leading_text(&mut lone);
        assert_eq!(lone.len(), 1);
    }

    #[test]
    fn interleaved_output_switches_columns_with_directives() {
        let left = "\\id GEN Left\n\\c 1\n\\p\n\\v 1 first left\n\\v 2 second left\n";
        let right = "\\id GEN Right\n\\c 1\n\\p\n\\v 1 first right\n\\v 2 second right\n";
        let mut out = Vec::new();
        usfmerge(&MergeConfig::default(), &[left, right], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let directives: Vec<&str> = text
            .lines()
            .filter(|l| {
                l.starts_with("\\lefttext")
                    || l.starts_with("\\righttext")
                    || l.starts_with("\\nolefttext")
                    || l.starts_with("\\norighttext")
            })
            .collect();
        assert!(directives.len() >= 2, "directives: {directives:?}");
        assert_eq!(directives[0], "\\lefttext");
        assert!(text.contains("first left"));
        assert!(text.contains("first right"));
    }

    #[test]
    fn one_sided_rows_emit_no_text_directives() {
        let left = "\\id GEN\n\\c 1\n\\p\n\\v 1 shared one\n\\s Left-only heading\n\\p\n\\v 2 shared two\n";
        let right = "\\id GEN\n\\c 1\n\\p\n\\v 1 shared one\n\\p\n\\v 2 shared two\n";
        let mut out = Vec::new();
        usfmerge(&MergeConfig::default(), &[left, right], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(
            text.contains("\\norighttext"),
            "missing \\norighttext in: {text}"
        );
        assert!(text.contains("Left-only heading"));
    }
}
