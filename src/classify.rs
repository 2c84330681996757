// Per-read classification: translate, search, resolve the taxon, format.
//
// A worker hands each read through this module. The read's sequences are
// turned into search fragments, every fragment is searched with the
// configured strategy, the best matches across all fragments (and both
// mates) are pooled, and their taxa are folded into a single taxon with
// an LCA walk. Formatting stays here so the pipeline only ever writes
// whole lines.

use crate::config::{Config, Mode};
use crate::index::FmIndex;
use crate::io::read_parser::ReadItem;
use crate::mask;
use crate::search::{greedy, mem};
use crate::taxonomy::Taxonomy;
use crate::translate;

/// Outcome of classifying one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Resolved taxon; 0 means unclassified.
    pub taxid: u64,
    /// Match length in MEM mode, BLOSUM62 score in Greedy mode.
    pub score_or_len: u64,
    /// Taxa of all best matches, ascending and deduplicated.
    pub taxa: Vec<u64>,
    /// Query fragments of the best matches.
    pub fragments: Vec<String>,
}

impl Classification {
    pub fn unclassified() -> Self {
        Classification {
            taxid: 0,
            score_or_len: 0,
            taxa: Vec::new(),
            fragments: Vec::new(),
        }
    }

    pub fn is_classified(&self) -> bool {
        self.taxid != 0
    }
}

/// Search fragments for one sequence: translate if needed, optionally
/// mask, and keep runs long enough to be worth searching.
fn prepare_fragments(seq: &str, config: &Config) -> Vec<String> {
    let raw = translate::fragments_for_sequence(
        seq,
        config.input_is_protein,
        config.min_fragment_length,
    );
    if !config.seg {
        return raw;
    }
    // Masked residues become X, which re-splits the fragment.
    raw.iter()
        .flat_map(|f| {
            translate::split_fragments(mask::seg_mask(f).as_bytes(), config.min_fragment_length)
        })
        .collect()
}

/// Best matches for a set of fragments: the maximum length (MEM) or
/// score (Greedy), and the matched substring plus taxa of every match
/// achieving it.
fn best_matches(
    fragments: &[String],
    config: &Config,
    index: &FmIndex,
) -> (u64, Vec<(String, Vec<u64>)>) {
    let mut best: u64 = 0;
    let mut winners: Vec<(String, Vec<u64>)> = Vec::new();

    for fragment in fragments {
        match config.mode {
            Mode::Mem => {
                for hit in mem::find_mems(index, fragment, config.min_fragment_length) {
                    let len = hit.len() as u64;
                    if len < best {
                        continue;
                    }
                    if len > best {
                        best = len;
                        winners.clear();
                    }
                    winners.push((
                        fragment[hit.start..hit.end].to_string(),
                        index.interval_taxa(hit.interval),
                    ));
                }
            }
            Mode::Greedy => {
                for hit in greedy::find_alignments(index, fragment, config) {
                    let score = hit.score as u64;
                    if score < best {
                        continue;
                    }
                    if score > best {
                        best = score;
                        winners.clear();
                    }
                    winners.push((fragment[hit.start..hit.end].to_string(), hit.taxa));
                }
            }
        }
    }
    (best, winners)
}

/// Classify one read (both mates, if paired).
///
/// Each mate is searched on its own and contributes the taxa of its best
/// matches; the mate unions are then merged, so a pair matching two
/// sibling taxa resolves to their common ancestor while the reported
/// length or score is the maximum over both mates.
pub fn classify_read(
    item: &ReadItem,
    config: &Config,
    index: &FmIndex,
    taxonomy: &Taxonomy,
) -> Classification {
    let mut per_mate = vec![best_matches(&prepare_fragments(&item.seq1, config), config, index)];
    if let Some(seq2) = &item.seq2 {
        per_mate.push(best_matches(&prepare_fragments(seq2, config), config, index));
    }

    let best = per_mate.iter().map(|(b, _)| *b).max().unwrap_or(0);
    // MEM unions the best matches of both mates even when one mate's
    // longest match is shorter; Greedy only keeps alignments achieving
    // the maximum score over the whole pair.
    let winners: Vec<(String, Vec<u64>)> = per_mate
        .into_iter()
        .filter(|(mate_best, _)| config.mode == Mode::Mem || *mate_best == best)
        .flat_map(|(_, winners)| winners)
        .collect();

    if winners.is_empty() {
        return Classification::unclassified();
    }

    let mut taxa: Vec<u64> = Vec::new();
    for (_, match_taxa) in &winners {
        taxa.extend(match_taxa.iter().copied());
    }
    taxa.sort_unstable();
    taxa.dedup();

    let taxid = taxonomy.lca_many(taxa.iter().copied());
    if taxid == 0 {
        return Classification::unclassified();
    }

    let mut matched: Vec<String> = winners.into_iter().map(|(s, _)| s).collect();
    matched.sort_unstable();
    matched.dedup();

    Classification {
        taxid,
        score_or_len: best,
        taxa,
        fragments: matched,
    }
}

/// One tab-delimited output line (without the trailing newline):
/// status, read name, taxon, score or length, matched taxa, matched
/// fragments.
pub fn format_line(name: &str, c: &Classification) -> String {
    if c.is_classified() {
        let taxa = c
            .taxa
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "C\t{}\t{}\t{}\t{}\t{}",
            name,
            c.taxid,
            c.score_or_len,
            taxa,
            c.fragments.join(",")
        )
    } else {
        format!("U\t{}\t0\t0\t\t", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn toy_taxonomy() -> Taxonomy {
        let mut parents = HashMap::new();
        parents.insert(10, 100);
        parents.insert(20, 100);
        parents.insert(30, 200);
        parents.insert(100, 1);
        parents.insert(200, 1);
        parents.insert(1, 1);
        Taxonomy::from_parent_map(parents)
    }

    fn toy_index() -> FmIndex {
        // Taxa 10 and 20 share the 15-mer KLVNPQRSTWACDEF; the tail of
        // taxon 10 and the GG-flanked regions of taxon 20 are unique.
        FmIndex::from_database(&[
            (10, "MKLVNPQRSTWACDEFGHIY"),
            (20, "GGKLVNPQRSTWACDEFGGH"),
            (30, "YIHGFEDCAWTSRQPNVLKM"),
        ])
    }

    fn mem_config() -> Config {
        Config {
            mode: Mode::Mem,
            input_is_protein: true,
            seg: false,
            ..Config::default()
        }
    }

    fn single(name: &str, seq: &str) -> ReadItem {
        ReadItem {
            name: name.to_string(),
            seq1: seq.to_string(),
            seq2: None,
        }
    }

    #[test]
    fn unique_match_resolves_to_leaf() {
        let idx = toy_index();
        let tax = toy_taxonomy();
        // 15-mer unique to taxon 10.
        let item = single("r1", "NPQRSTWACDEFGHI");
        let c = classify_read(&item, &mem_config(), &idx, &tax);
        assert_eq!(c.taxid, 10);
        assert_eq!(c.score_or_len, 15);
        assert_eq!(c.taxa, vec![10]);
        assert_eq!(c.fragments, vec!["NPQRSTWACDEFGHI".to_string()]);
    }

    #[test]
    fn shared_match_resolves_to_lca() {
        let idx = toy_index();
        let tax = toy_taxonomy();
        // The same 15-mer occurs in taxa 10 and 20.
        let item = single("r2", "KLVNPQRSTWACDEF");
        let c = classify_read(&item, &mem_config(), &idx, &tax);
        assert_eq!(c.taxid, 100);
        assert_eq!(c.score_or_len, 15);
        assert_eq!(c.taxa, vec![10, 20]);
    }

    #[test]
    fn no_match_is_unclassified() {
        let idx = toy_index();
        let tax = toy_taxonomy();
        let item = single("r4", "WWWWWWWWWWWWWWWWWWWW");
        let c = classify_read(&item, &mem_config(), &idx, &tax);
        assert!(!c.is_classified());
        assert_eq!(c, Classification::unclassified());
    }

    #[test]
    fn paired_mates_union_their_best_matches() {
        let idx = toy_index();
        let tax = toy_taxonomy();
        // Mate 1 matches taxon 10 with 15 residues, mate 2 taxon 20 with 12.
        let item = ReadItem {
            name: "r5".to_string(),
            seq1: "NPQRSTWACDEFGHI".to_string(),
            seq2: Some("QRSTWACDEFGG".to_string()),
        };
        let c = classify_read(&item, &mem_config(), &idx, &tax);
        // The longest MEM sets the reported length; both mates' taxa count.
        assert_eq!(c.score_or_len, 15);
        assert_eq!(c.taxa, vec![10, 20]);
        assert_eq!(c.taxid, 100);

        // Swapping the mates changes nothing.
        let swapped = ReadItem {
            name: "r5".to_string(),
            seq1: "QRSTWACDEFGG".to_string(),
            seq2: Some("NPQRSTWACDEFGHI".to_string()),
        };
        let c2 = classify_read(&swapped, &mem_config(), &idx, &tax);
        assert_eq!(c2.taxid, c.taxid);
        assert_eq!(c2.score_or_len, c.score_or_len);
    }

    #[test]
    fn equal_length_matches_across_mates_merge() {
        let idx = toy_index();
        let tax = toy_taxonomy();
        // Both mates carry an 11-mer, one per taxon under node 100.
        let item = ReadItem {
            name: "r5b".to_string(),
            seq1: "TWACDEFGHIY".to_string(),
            seq2: Some("RSTWACDEFGG".to_string()),
        };
        let c = classify_read(&item, &mem_config(), &idx, &tax);
        assert_eq!(c.score_or_len, 11);
        assert_eq!(c.taxid, 100);
        assert_eq!(c.taxa, vec![10, 20]);
    }

    #[test]
    fn internal_stop_splits_protein_into_fragments() {
        let idx = toy_index();
        let tax = toy_taxonomy();
        // Two 11-mers from taxon 10 joined by a stop.
        let item = single("r6", "MKLVNPQRSTW*TWACDEFGHIY");
        let c = classify_read(&item, &mem_config(), &idx, &tax);
        assert_eq!(c.taxid, 10);
        assert_eq!(c.score_or_len, 11);
        assert_eq!(c.taxa, vec![10]);
        assert_eq!(c.fragments.len(), 2);
    }

    #[test]
    fn classified_line_format() {
        let c = Classification {
            taxid: 100,
            score_or_len: 15,
            taxa: vec![10, 20],
            fragments: vec!["KLVNPQRSTWACDEF".to_string()],
        };
        assert_eq!(
            format_line("read1", &c),
            "C\tread1\t100\t15\t10,20\tKLVNPQRSTWACDEF"
        );
    }

    #[test]
    fn unclassified_line_format() {
        assert_eq!(
            format_line("read9", &Classification::unclassified()),
            "U\tread9\t0\t0\t\t"
        );
    }
}
