//! Per-window selection rules as pure functions over chunk results.

use camcut_media::ChunkRead;

/// A scored source competing for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub source_index: usize,
    pub score: i64,
}

/// Pick the candidate with the strictly greatest score; equal scores go to
/// the lowest source index. `None` only when there are no candidates.
pub fn select_winner(candidates: &[Candidate]) -> Option<Candidate> {
    candidates.iter().copied().reduce(|best, candidate| {
        if candidate.score > best.score
            || (candidate.score == best.score && candidate.source_index < best.source_index)
        {
            candidate
        } else {
            best
        }
    })
}

/// Clear the alive flag of every source whose video read was not Complete.
///
/// `reads` pairs source indices with this window's video results. Returns
/// the indices that went from alive to exhausted; flags never turn back on.
pub fn mark_exhausted<T>(alive: &mut [bool], reads: &[(usize, ChunkRead<T>)]) -> Vec<usize> {
    let mut newly_exhausted = Vec::new();
    for (index, read) in reads {
        if !read.is_complete() {
            if let Some(flag) = alive.get_mut(*index) {
                if *flag {
                    *flag = false;
                    newly_exhausted.push(*index);
                }
            }
        }
    }
    newly_exhausted
}

/// Indices of sources with a Complete read this window, in source order.
pub fn complete_sources<T>(reads: &[(usize, ChunkRead<T>)]) -> Vec<usize> {
    let mut indices: Vec<usize> = reads
        .iter()
        .filter(|(_, read)| read.is_complete())
        .map(|(index, _)| *index)
        .collect();
    indices.sort_unstable();
    indices
}
