// Six-frame translation of nucleotide reads and fragment extraction.
//
// A nucleotide read yields three forward and three reverse-complement
// reading frames. Each frame is cut at stop codons and at untranslatable
// positions (ambiguous bases translate to X), and every remaining run of
// canonical residues at least `min_fragment_length` long becomes a search
// fragment. Protein reads skip translation and are cut the same way.

use crate::search::blosum;

/// Codon -> amino acid, indexed by three 2-bit bases (A=0, C=1, G=2, T=3),
/// first base in the high bits. Stops are `*`.
const CODON_TABLE: &[u8; 64] = b"KNKNTTTTRSRSIIMIQHQHPPPPRRRRLLLLEDEDAAAAGGGGVVVV*Y*YSSSS*CWCLFLF";

#[inline]
fn base_code(b: u8) -> Option<u8> {
    match b {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

#[inline]
fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        other => other,
    }
}

/// Translate one reading frame of `dna` starting at `offset` (0..3).
/// Codons containing a base outside ACGT translate to `X`.
pub fn translate_frame(dna: &[u8], offset: usize) -> Vec<u8> {
    let mut aa = Vec::with_capacity(dna.len().saturating_sub(offset) / 3);
    let mut chunks = dna[offset.min(dna.len())..].chunks_exact(3);
    for codon in &mut chunks {
        match (base_code(codon[0]), base_code(codon[1]), base_code(codon[2])) {
            (Some(b0), Some(b1), Some(b2)) => {
                let idx = ((b0 as usize) << 4) | ((b1 as usize) << 2) | b2 as usize;
                aa.push(CODON_TABLE[idx]);
            }
            _ => aa.push(b'X'),
        }
    }
    aa
}

/// All six reading frames: forward 0..3, then reverse-complement 0..3.
pub fn six_frames(dna: &[u8]) -> [Vec<u8>; 6] {
    let revcomp: Vec<u8> = dna.iter().rev().map(|&b| complement(b)).collect();
    [
        translate_frame(dna, 0),
        translate_frame(dna, 1),
        translate_frame(dna, 2),
        translate_frame(&revcomp, 0),
        translate_frame(&revcomp, 1),
        translate_frame(&revcomp, 2),
    ]
}

/// Cut an amino-acid sequence into runs of canonical residues and keep
/// those of length >= `min_len`. Stops, X and any other residue outside
/// the search alphabet terminate a run.
pub fn split_fragments(aa: &[u8], min_len: usize) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut start = None;
    for (i, &b) in aa.iter().enumerate() {
        if blosum::encode(b).is_some() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            if i - s >= min_len {
                fragments.push(String::from_utf8_lossy(&aa[s..i]).into_owned());
            }
        }
    }
    if let Some(s) = start {
        if aa.len() - s >= min_len {
            fragments.push(String::from_utf8_lossy(&aa[s..]).into_owned());
        }
    }
    fragments
}

/// Search fragments for one read sequence.
///
/// Protein input is used verbatim; nucleotide input is translated in all
/// six frames first. The frame a fragment came from only matters for
/// debug logging, so fragments are returned as a flat list.
pub fn fragments_for_sequence(seq: &str, input_is_protein: bool, min_len: usize) -> Vec<String> {
    let bytes = seq.as_bytes();
    if input_is_protein {
        split_fragments(bytes, min_len)
    } else {
        let mut fragments = Vec::new();
        for (frame, aa) in six_frames(bytes).iter().enumerate() {
            let mut frags = split_fragments(aa, min_len);
            if log::log_enabled!(log::Level::Debug) && !frags.is_empty() {
                log::debug!("frame {}: {} fragment(s)", frame, frags.len());
            }
            fragments.append(&mut frags);
        }
        fragments
    }
}
