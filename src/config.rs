// Run configuration shared read-only by every stage of the pipeline.
//
// Built once from the command line, then passed by Arc to the parser,
// the workers and the searchers. Nothing mutates it after startup.

/// Search strategy selected with `-a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Maximal exact matches only, ranked by length.
    Mem,
    /// Seed-and-extend with a mismatch budget, ranked by BLOSUM62 score.
    Greedy,
}

/// Immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    /// Exact seed length for Greedy mode (`-l`, >= 7).
    pub seed_length: usize,
    /// Minimum fragment / match length in amino acids (`-m`, >= 1).
    pub min_fragment_length: usize,
    /// Minimum accepted BLOSUM62 score in Greedy mode (`-s`, > 0).
    pub min_score: i32,
    /// Mismatch budget per extension in Greedy mode (`-e`, >= 0).
    pub mismatches: u32,
    /// E-value cutoff (`-E`); `None` disables the E-value filter.
    pub min_evalue: Option<f64>,
    /// Input reads are protein sequences (`-p`), skipping translation.
    pub input_is_protein: bool,
    /// Low-complexity masking of fragments before search (`-x` / `-X`).
    pub seg: bool,
    pub verbose: bool,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: Mode::Greedy,
            seed_length: 7,
            min_fragment_length: 11,
            min_score: 65,
            mismatches: 3,
            min_evalue: None,
            input_is_protein: false,
            seg: true,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Log the resolved parameter set, mirroring what `-d` prints at startup.
    pub fn log_parameters(&self) {
        log::debug!("Parameters:");
        log::debug!("  minimum match length: {}", self.min_fragment_length);
        log::debug!("  minimum match score: {}", self.min_score);
        log::debug!("  seed length: {}", self.seed_length);
        log::debug!("  max mismatches per match: {}", self.mismatches);
        if let Some(e) = self.min_evalue {
            log::debug!("  minimum E-value: {}", e);
        }
        log::debug!(
            "  run mode: {}",
            match self.mode {
                Mode::Mem => "MEM",
                Mode::Greedy => "Greedy",
            }
        );
        log::debug!("  SEG filter: {}", if self.seg { "on" } else { "off" });
        log::debug!("  protein input: {}", self.input_is_protein);
    }
}
