//! Proximity predicates over decoded term-offset lists
//!
//! Each function takes one offset list per term, in term order, and
//! returns the first qualifying match as a `(start, end)` position range
//! (`None` when the predicate fails). Lists are expected sorted (the
//! ingest tokenizer emits non-decreasing positions) but merged or
//! malformed rows are tolerated with a warning and a sorted copy.

use crate::keys::TermOffset;
use crate::query::function::ProximityKind;
use std::borrow::Cow;
use tracing::warn;

/// All terms within `max_distance` of each other, any order.
///
/// Classic advancing-minimum sweep: hold one cursor per list, check the
/// current window, then advance whichever cursor sits at the minimum.
pub fn within(max_distance: u32, offset_lists: &[&[TermOffset]]) -> Option<(u32, u32)> {
    if offset_lists.len() < 2 {
        return None;
    }
    // a window tighter than terms-1 positions cannot exist
    if (max_distance as usize) < offset_lists.len() - 1 {
        return None;
    }
    let lists = sorted_lists(offset_lists)?;

    let mut cursors = vec![0usize; lists.len()];
    loop {
        let mut min_offset = u32::MAX;
        let mut min_low = u32::MAX;
        let mut min_index = 0;
        let mut max_offset = 0u32;
        for (i, list) in lists.iter().enumerate() {
            let position = list[cursors[i]];
            if position.offset < min_offset {
                min_offset = position.offset;
                min_low = position.low_offset();
                min_index = i;
            }
            max_offset = max_offset.max(position.offset);
        }

        if max_offset - min_offset <= max_distance {
            return Some((min_low, max_offset));
        }

        // advance the minimum cursor; exhaustion means no window exists
        cursors[min_index] += 1;
        if cursors[min_index] >= lists[min_index].len() {
            return None;
        }
    }
}

/// All terms adjacent to each other, any order.
pub fn adjacent(offset_lists: &[&[TermOffset]]) -> Option<(u32, u32)> {
    let distance = (offset_lists.len().saturating_sub(1)) as u32;
    within(distance, offset_lists)
}

/// Terms consecutive in the given order. A same-position entry (distance
/// zero) is a synonym stacked on the previous term and keeps the chain
/// alive; multi-token synonyms chain through their low offset.
pub fn phrase(offset_lists: &[&[TermOffset]]) -> Option<(u32, u32)> {
    if offset_lists.len() < 2 {
        return None;
    }
    let lists = sorted_lists(offset_lists)?;

    'starts: for start in lists[0].iter() {
        let mut current = start.offset;
        for list in &lists[1..] {
            match next_in_chain(list, current) {
                Some(position) => current = position.offset,
                None => continue 'starts,
            }
        }
        return Some((start.low_offset(), current));
    }
    None
}

/// Dispatch on a sub-query's proximity kind.
pub fn evaluate_proximity(
    kind: ProximityKind,
    offset_lists: &[&[TermOffset]],
) -> Option<(u32, u32)> {
    match kind {
        ProximityKind::Within(max_distance) => within(max_distance, offset_lists),
        ProximityKind::Adjacent => adjacent(offset_lists),
        ProximityKind::Phrase => phrase(offset_lists),
    }
}

/// Find a chain continuation in a sorted list: an entry at the same
/// position as `current` or starting exactly one past it. Binary search
/// from the candidate's low end keeps long lists cheap.
fn next_in_chain(list: &[TermOffset], current: u32) -> Option<TermOffset> {
    let target = current + 1;
    let start = list.partition_point(|p| p.offset < current);
    // no early cutoff past `target`: a multi-token synonym can end far
    // beyond it while still starting at `target` via its skip
    list[start..]
        .iter()
        .find(|p| p.offset == current || p.low_offset() == target)
        .copied()
}

/// Validate and, when necessary, repair ordering. Empty lists fail the
/// whole predicate.
fn sorted_lists<'a>(offset_lists: &[&'a [TermOffset]]) -> Option<Vec<Cow<'a, [TermOffset]>>> {
    let mut lists = Vec::with_capacity(offset_lists.len());
    for list in offset_lists {
        if list.is_empty() {
            return None;
        }
        if list.windows(2).all(|w| w[0].offset <= w[1].offset) {
            lists.push(Cow::Borrowed(*list));
        } else {
            warn!("term offset list out of order, sorting before evaluation");
            let mut sorted = list.to_vec();
            sorted.sort_unstable();
            lists.push(Cow::Owned(sorted));
        }
    }
    Some(lists)
}
