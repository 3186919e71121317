//! Pairing chunk sequences across documents into output rows.
//!
//! Rows are built from an edit script over the chunks' identity keys.
//! Matching keys pair positionally; one-sided runs prefer extending an
//! already-open row of the same chunk type over starting a new row, which
//! keeps long stretches of unmatched same-typed content from fragmenting
//! the interleaved output.

use itertools::Itertools;
use log::debug;

use crate::chunk::{Chunk, ChunkType};
use crate::matcher::{SequenceMatcher, Tag};

/// One output row: a cell per document, in key order.
pub type Row = Vec<Option<Chunk>>;

fn concat(chunks: Vec<Chunk>) -> Option<Chunk> {
    let mut iter = chunks.into_iter();
    let mut acc = iter.next()?;
    for mut c in iter {
        acc.absorb(&mut c);
    }
    Some(acc)
}

/// Concatenate a run, keeping the run's final chunk type for the result.
fn concat_run(run: Vec<Chunk>) -> Option<Chunk> {
    let kind = run.last()?.kind;
    let mut merged = concat(run)?;
    merged.kind = kind;
    Some(merged)
}

fn group_by_kind(chunks: Vec<Chunk>) -> Vec<(ChunkType, Vec<Chunk>)> {
    let groups = chunks.into_iter().chunk_by(|c| c.kind);
    let mut out = Vec::new();
    for (kind, group) in &groups {
        out.push((kind, group.collect()));
    }
    out
}

/// Attach one-sided chunks, first letting the open row on that side
/// swallow chunks up to the last one matching its type.
fn append_one_sided(rows: &mut Vec<Row>, side: usize, mut chunks: Vec<Chunk>) {
    if let Some(anchor) = rows.last_mut().and_then(|row| row[side].as_mut()) {
        let want = anchor.kind;
        let mut end = None;
        let mut found = false;
        for (i, c) in chunks.iter().enumerate() {
            if c.kind == want {
                found = true;
                end = Some(i);
            } else if found {
                break;
            }
        }
        if let Some(end) = end {
            for mut c in chunks.drain(..=end) {
                anchor.absorb(&mut c);
            }
        }
    }
    for c in chunks {
        let mut row: Row = vec![None, None];
        row[side] = Some(c);
        rows.push(row);
    }
}

/// Pair two matched runs into one row, first extending the previous row
/// while it holds the same chunk type on both sides.
fn append_paired(rows: &mut Vec<Row>, mut left: Vec<Chunk>, mut right: Vec<Chunk>) {
    if let Some(row) = rows.last_mut() {
        let (l, r) = row.split_at_mut(1);
        if let (Some(lp), Some(rp)) = (l[0].as_mut(), r[0].as_mut()) {
            if lp.kind == rp.kind {
                let want = lp.kind;
                while left.first().is_some_and(|c| c.kind == want) {
                    let mut c = left.remove(0);
                    lp.absorb(&mut c);
                }
                while right.first().is_some_and(|c| c.kind == want) {
                    let mut c = right.remove(0);
                    rp.absorb(&mut c);
                }
            }
        }
    }
    let lc = concat(left);
    let rc = concat(right);
    if lc.is_some() || rc.is_some() {
        rows.push(vec![lc, rc]);
    }
}

/// Pairwise alignment of two chunk sequences by identity key.
pub fn align_chunks(left: Vec<Chunk>, right: Vec<Chunk>) -> Vec<Row> {
    let lkeys: Vec<String> = left.iter().map(Chunk::key).collect();
    let rkeys: Vec<String> = right.iter().map(Chunk::key).collect();
    let mut rows: Vec<Row> = Vec::new();
    let mut lit = left.into_iter();
    let mut rit = right.into_iter();
    for op in SequenceMatcher::new(&lkeys, &rkeys).opcodes() {
        let lrun: Vec<Chunk> = lit.by_ref().take(op.a1 - op.a0).collect();
        let rrun: Vec<Chunk> = rit.by_ref().take(op.b1 - op.b0).collect();
        debug!("{:?} {}..{} / {}..{}", op.tag, op.a0, op.a1, op.b0, op.b1);
        match op.tag {
            Tag::Equal => {
                for (l, r) in lrun.into_iter().zip(rrun) {
                    rows.push(vec![Some(l), Some(r)]);
                }
            }
            Tag::Delete => append_one_sided(&mut rows, 0, lrun),
            Tag::Insert => append_one_sided(&mut rows, 1, rrun),
            Tag::Replace => align_replace(&mut rows, lrun, rrun),
        }
    }
    rows
}

/// Within a replace range, regroup both sides by chunk type and align the
/// type sequences instead. Matching type groups concatenate and pair;
/// everything else stays one-sided, so chunks with unequal keys and
/// unequal types are never forced into the same row.
fn align_replace(rows: &mut Vec<Row>, left: Vec<Chunk>, right: Vec<Chunk>) {
    let lgrouped = group_by_kind(left);
    let rgrouped = group_by_kind(right);
    let lkinds: Vec<ChunkType> = lgrouped.iter().map(|(k, _)| *k).collect();
    let rkinds: Vec<ChunkType> = rgrouped.iter().map(|(k, _)| *k).collect();
    let mut lgi = lgrouped.into_iter();
    let mut rgi = rgrouped.into_iter();
    for op in SequenceMatcher::new(&lkinds, &rkinds).opcodes() {
        let lflat: Vec<Chunk> = lgi
            .by_ref()
            .take(op.a1 - op.a0)
            .flat_map(|(_, g)| g)
            .collect();
        let rflat: Vec<Chunk> = rgi
            .by_ref()
            .take(op.b1 - op.b0)
            .flat_map(|(_, g)| g)
            .collect();
        match op.tag {
            Tag::Equal => append_paired(rows, lflat, rflat),
            Tag::Delete => append_one_sided(rows, 0, lflat),
            Tag::Insert => append_one_sided(rows, 1, rflat),
            Tag::Replace => {
                append_one_sided(rows, 0, lflat);
                append_one_sided(rows, 1, rflat);
            }
        }
    }
}

/// Star alignment of any number of documents against the first.
///
/// One row per primary chunk. Each secondary's matched regions assign its
/// chunks to rows positionally; inserted or replaced regions merge into
/// the first row their range touches, and rows with no match on a side
/// leave that cell empty.
pub fn align_simple(docs: Vec<Vec<Chunk>>) -> Vec<Row> {
    let ncols = docs.len();
    let mut iter = docs.into_iter();
    let primary = match iter.next() {
        Some(p) => p,
        None => return Vec::new(),
    };
    let pkeys: Vec<String> = primary.iter().map(Chunk::key).collect();
    let nrows = primary.len();
    let mut rows: Vec<Row> = primary
        .into_iter()
        .map(|c| {
            let mut row: Row = Vec::with_capacity(ncols);
            row.push(Some(c));
            row
        })
        .collect();
    for other in iter {
        let okeys: Vec<String> = other.iter().map(Chunk::key).collect();
        let mut spans: Vec<Option<(usize, usize)>> = vec![None; nrows];
        for op in SequenceMatcher::new(&pkeys, &okeys).opcodes() {
            match op.tag {
                Tag::Equal => {
                    for i in 0..(op.a1 - op.a0) {
                        widen(&mut spans[op.a0 + i], op.b0 + i, op.b0 + i);
                    }
                }
                Tag::Insert | Tag::Replace => {
                    if op.b1 > op.b0 && nrows > 0 {
                        let row = op.a0.min(nrows - 1);
                        widen(&mut spans[row], op.b0, op.b1 - 1);
                    }
                }
                Tag::Delete => {}
            }
        }
        let mut chunks = other.into_iter();
        let mut cursor = 0usize;
        for (row, span) in rows.iter_mut().zip(&spans) {
            let cell = span.and_then(|(s, e)| {
                // spans are claimed in order; drop anything unclaimed
                while cursor < s {
                    chunks.next();
                    cursor += 1;
                }
                let run: Vec<Chunk> = chunks.by_ref().take(e - s + 1).collect();
                cursor = e + 1;
                concat_run(run)
            });
            row.push(cell);
        }
    }
    rows
}

fn widen(slot: &mut Option<(usize, usize)>, s: usize, e: usize) {
    *slot = Some(match *slot {
        None => (s, e),
        Some((s0, e0)) => (s0.min(s), e0.max(e)),
    });
}
