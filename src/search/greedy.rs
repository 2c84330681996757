// Greedy seed-and-extend search with a mismatch budget.
//
// Seeds are exact `seed_length` windows of the fragment, enumerated by
// sliding the window over the whole fragment; a seed exists when its
// backward-search interval is non-empty. From each seed the alignment
// grows in both directions independently, each direction with its own
// mismatch budget.
//
// Leftward the walk stays in the BWT: an explicit stack of extension
// states follows the interval, and when the exact child dies it spends
// one unit of budget and branches over the residues actually present in
// the reference at that position (the surviving child intervals), each
// scored by BLOSUM62. Rightward the suffix array pins every surviving
// occurrence to its reference position and the walk compares the query
// against the reference text residue by residue, so a mismatch is again
// scored against the residue actually present, never a guess.
//
// Either direction terminates at the fragment boundary (or the end of
// the reference document, rightward), when the budget is spent and the
// next step would mismatch, or when the running score falls more than
// XDROP below the best seen in that direction.

use crate::config::Config;
use crate::index::{FmIndex, SaInterval};
use crate::search::blosum;

/// Score drop below the running maximum at which an extension is cut off.
/// Not a documented parameter; tuned against reference runs, kept public
/// so tests can reason about it.
pub const XDROP: i32 = 20;

/// Karlin-Altschul constants for BLOSUM62 (gapped).
pub const BLAST_K: f64 = 0.041;
pub const BLAST_LAMBDA: f64 = 0.267;

/// An accepted alignment of `fragment[start..end]` against the reference.
#[derive(Debug, Clone)]
pub struct GreedyHit {
    pub start: usize,
    pub end: usize,
    pub score: i32,
    /// Taxa of the occurrences achieving this score, ascending.
    pub taxa: Vec<u64>,
}

/// Expected number of chance alignments scoring at least `score`, given
/// the query fragment length and the effective database length.
pub fn evalue(score: i32, query_len: usize, db_residues: u64) -> f64 {
    BLAST_K * query_len as f64 * db_residues as f64 * (-BLAST_LAMBDA * f64::from(score)).exp()
}

struct ExtState {
    /// Next query position to consume, moving leftward; -1 is the boundary.
    qpos: isize,
    interval: SaInterval,
    mismatches_left: u32,
    score: i32,
    best_score: i32,
    best_start: usize,
    best_interval: SaInterval,
}

/// Find all accepted alignments of `fragment` against the index.
///
/// Acceptance requires `score >= config.min_score`, and additionally
/// `E <= min_evalue` when the E-value filter is configured.
pub fn find_alignments(index: &FmIndex, fragment: &str, config: &Config) -> Vec<GreedyHit> {
    let q = fragment.as_bytes();
    let n = q.len();
    let seed_len = config.seed_length;
    let mut hits: Vec<GreedyHit> = Vec::new();
    if n < seed_len {
        return hits;
    }

    let mut stack: Vec<ExtState> = Vec::new();

    for end in (seed_len..=n).rev() {
        // Seed phase: exact backward walk over the window q[end-seed_len..end].
        let seed_start = end - seed_len;
        let mut interval = index.full_interval();
        let mut score = 0i32;
        let mut alive = true;
        for i in (seed_start..end).rev() {
            interval = index.extend_with(interval, q[i]);
            if interval.is_empty() {
                alive = false;
                break;
            }
            score += blosum::self_score(q[i]);
        }
        if !alive {
            continue;
        }

        stack.clear();
        stack.push(ExtState {
            qpos: seed_start as isize - 1,
            interval,
            mismatches_left: config.mismatches,
            score,
            best_score: score,
            best_start: seed_start,
            best_interval: interval,
        });

        while let Some(mut st) = stack.pop() {
            let mut branched = false;
            loop {
                if st.qpos < 0 {
                    break;
                }
                let qa = q[st.qpos as usize];

                let exact = index.extend_with(st.interval, qa);
                if !exact.is_empty() {
                    let sc = blosum::self_score(qa);
                    if st.score + sc < st.best_score - XDROP {
                        break;
                    }
                    st.interval = exact;
                    st.score += sc;
                    if st.score > st.best_score {
                        st.best_score = st.score;
                        st.best_start = st.qpos as usize;
                        st.best_interval = st.interval;
                    }
                    st.qpos -= 1;
                    continue;
                }

                if st.mismatches_left == 0 {
                    break;
                }
                for (aa, child) in index.surviving_children(st.interval) {
                    let sc = blosum::score(qa, aa);
                    if st.score + sc < st.best_score - XDROP {
                        continue;
                    }
                    let mut next = ExtState {
                        qpos: st.qpos - 1,
                        interval: child,
                        mismatches_left: st.mismatches_left - 1,
                        score: st.score + sc,
                        best_score: st.best_score,
                        best_start: st.best_start,
                        best_interval: st.best_interval,
                    };
                    // A conservative substitution can still raise the score.
                    if next.score > next.best_score {
                        next.best_score = next.score;
                        next.best_start = st.qpos as usize;
                        next.best_interval = child;
                    }
                    stack.push(next);
                    branched = true;
                }
                break;
            }

            // A branching state hands its best prefix to its children; only
            // terminal states go on to the rightward pass, which keeps
            // duplicates down.
            if !branched {
                record_candidate(&mut hits, index, q, &st, end, config);
            }
        }
    }

    hits.sort_by_key(|h| (h.start, h.end, std::cmp::Reverse(h.score)));
    hits.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.score == b.score);
    hits
}

/// Extend one occurrence rightward along the reference text.
///
/// `occ_start` is the occurrence's text position, `match_len` the length
/// already matched leftward of `from` (the next query position to
/// consume). Returns the best cumulative score gain and the query end
/// achieving it; `(0, from)` means no profitable extension.
fn extend_right(
    index: &FmIndex,
    q: &[u8],
    occ_start: u64,
    match_len: usize,
    from: usize,
    mut budget: u32,
) -> (i32, usize) {
    let mut gain = 0i32;
    let mut best_gain = 0i32;
    let mut best_end = from;
    let mut k = 0usize;

    while from + k < q.len() {
        let ref_aa = match index.residue_at(occ_start + (match_len + k) as u64) {
            Some(aa) => aa,
            // End of the reference document.
            None => break,
        };
        let qa = q[from + k];
        if qa == ref_aa {
            gain += blosum::self_score(qa);
        } else {
            if budget == 0 {
                break;
            }
            budget -= 1;
            gain += blosum::score(qa, ref_aa);
        }
        if gain < best_gain - XDROP {
            break;
        }
        k += 1;
        if gain > best_gain {
            best_gain = gain;
            best_end = from + k;
        }
    }
    (best_gain, best_end)
}

/// Run the rightward pass for one terminated leftward walk and record the
/// resulting alignment if it clears the acceptance thresholds.
fn record_candidate(
    hits: &mut Vec<GreedyHit>,
    index: &FmIndex,
    q: &[u8],
    st: &ExtState,
    seed_end: usize,
    config: &Config,
) {
    let match_len = seed_end - st.best_start;

    // Occurrences of the leftward best interval may continue differently
    // to the right; keep those achieving the best total score.
    let mut best_total = i32::MIN;
    let mut winners: Vec<(usize, u64)> = Vec::new();
    for pos in index.interval_positions(st.best_interval) {
        let (gain, end) = extend_right(index, q, pos, match_len, seed_end, config.mismatches);
        let total = st.best_score + gain;
        if total > best_total {
            best_total = total;
            winners.clear();
        }
        if total == best_total {
            winners.push((end, index.taxid_at(pos)));
        }
    }
    if winners.is_empty() {
        return;
    }

    if best_total < config.min_score {
        return;
    }
    if let Some(min_evalue) = config.min_evalue {
        if evalue(best_total, q.len(), index.db_residues()) > min_evalue {
            return;
        }
    }

    let end = winners.iter().map(|(end, _)| *end).max().unwrap_or(seed_end);
    let mut taxa: Vec<u64> = winners.into_iter().map(|(_, taxid)| taxid).collect();
    taxa.sort_unstable();
    taxa.dedup();

    hits.push(GreedyHit {
        start: st.best_start,
        end,
        score: best_total,
        taxa,
    });
}
