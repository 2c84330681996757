// Maximal exact match enumeration.
//
// For every end position in a fragment, the longest exact match ending
// there is found by extending backward through the FM-index until the
// interval empties or the fragment is exhausted. A match is maximal when
// it can be extended neither left (next extension would empty the
// interval) nor right (a longer match ending one position further right
// already covers it); containment between matches at different end
// positions is pruned in the same right-to-left sweep.

use crate::index::{FmIndex, SaInterval};

/// One maximal exact match within a fragment. `start..end` indexes the
/// fragment; the interval locates the match in the reference.
#[derive(Debug, Clone)]
pub struct MemHit {
    pub start: usize,
    pub end: usize,
    pub interval: SaInterval,
}

impl MemHit {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Enumerate maximal exact matches of length >= `min_len` in `fragment`.
///
/// No returned match is a proper substring of another: a match ending at
/// position `e` is kept only if it starts strictly left of every match
/// with a larger end position.
pub fn find_mems(index: &FmIndex, fragment: &str, min_len: usize) -> Vec<MemHit> {
    let q = fragment.as_bytes();
    let n = q.len();
    let mut hits = Vec::new();
    if n < min_len {
        return hits;
    }

    // Leftmost start seen so far among kept matches; any match starting at
    // or right of it is contained in an earlier (longer-right) match.
    let mut min_start = usize::MAX;

    for end in (min_len..=n).rev() {
        let mut interval = index.full_interval();
        let mut pos = end;
        while pos > 0 {
            let next = index.extend_with(interval, q[pos - 1]);
            if next.is_empty() {
                break;
            }
            interval = next;
            pos -= 1;
        }
        if end - pos < min_len || pos >= min_start {
            continue;
        }
        min_start = pos;
        hits.push(MemHit {
            start: pos,
            end,
            interval,
        });
    }
    hits
}
