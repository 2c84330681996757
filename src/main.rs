use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use protax::config::{Config, Mode};
use protax::index::load::read_index;
use protax::io::output::SharedWriter;
use protax::pipeline;
use protax::taxonomy::Taxonomy;

#[derive(Parser)]
#[command(name = "protax")]
#[command(about = "Taxonomic classification of short reads against a protein FM-index", long_about = None)]
#[command(version)]
struct Cli {
    /// NCBI taxonomy nodes.dmp file
    #[arg(short = 't', long = "nodes", value_name = "FILE")]
    nodes: PathBuf,

    /// FM-index database file
    #[arg(short = 'f', long = "fmi", value_name = "FILE")]
    fmi: PathBuf,

    /// Input file(s) with reads in FASTA or FASTQ format, comma-separated
    #[arg(short = 'i', long = "input", value_name = "FILE[,FILE...]")]
    input: String,

    /// Second input file(s) for paired-end reads, comma-separated
    #[arg(short = 'j', long = "input2", value_name = "FILE[,FILE...]")]
    input2: Option<String>,

    /// Output file(s), comma-separated; stdout when absent
    #[arg(short = 'o', long = "output", value_name = "FILE[,FILE...]")]
    output: Option<String>,

    /// Run mode, either "mem" or "greedy"
    #[arg(short = 'a', long = "mode", value_name = "MODE", default_value = "greedy")]
    mode: String,

    /// Number of mismatches allowed in Greedy mode
    #[arg(short = 'e', long = "mismatches", value_name = "INT", default_value_t = 3)]
    mismatches: u32,

    /// Seed length for Greedy matches
    #[arg(short = 'l', long = "seed-length", value_name = "INT", default_value_t = 7)]
    seed_length: usize,

    /// Minimum match length
    #[arg(short = 'm', long = "min-length", value_name = "INT", default_value_t = 11)]
    min_fragment_length: usize,

    /// Minimum match score in Greedy mode
    #[arg(short = 's', long = "min-score", value_name = "INT", default_value_t = 65)]
    min_score: i32,

    /// Minimum E-value in Greedy mode
    #[arg(short = 'E', long = "min-evalue", value_name = "FLOAT")]
    min_evalue: Option<f64>,

    /// Enable the low-complexity filter (enabled by default)
    #[arg(short = 'x', long = "seg")]
    seg: bool,

    /// Disable the low-complexity filter
    #[arg(short = 'X', long = "no-seg", conflicts_with = "seg")]
    no_seg: bool,

    /// Input sequences are protein sequences
    #[arg(short = 'p', long = "protein")]
    protein: bool,

    /// Number of parallel worker threads
    #[arg(short = 'z', long = "threads", value_name = "INT", default_value_t = 1)]
    threads: usize,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Debug output
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

/// Split a comma-separated file list, dropping empty entries.
fn split_file_list(list: &str) -> Vec<String> {
    list.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn fatal(msg: &str) -> ! {
    log::error!("{}", msg);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        // Usage and the offending argument go to stderr; the spec exit
        // code for argument errors is 1.
        e.print().ok();
        std::process::exit(1);
    });

    let log_level = if cli.debug {
        log::LevelFilter::Debug
    } else if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Validate arguments before touching any input.
    let mode = match cli.mode.as_str() {
        "mem" => Mode::Mem,
        "greedy" => Mode::Greedy,
        other => fatal(&format!("-a must be \"mem\" or \"greedy\", got \"{}\"", other)),
    };
    if cli.seed_length < 7 {
        fatal("seed length (-l) must be >= 7");
    }
    if cli.min_fragment_length < 1 {
        fatal("minimum match length (-m) must be >= 1");
    }
    if cli.min_score <= 0 {
        fatal("minimum score (-s) must be greater than 0");
    }
    if let Some(e) = cli.min_evalue {
        if e <= 0.0 {
            fatal("E-value threshold (-E) must be greater than 0");
        }
        if mode != Mode::Greedy {
            fatal("E-value filtering is only available in Greedy mode; use -a greedy");
        }
    }
    if cli.protein && cli.input2.is_some() {
        fatal("protein input (-p) only supports one input file; -j is not allowed");
    }
    if cli.threads == 0 {
        fatal("number of threads (-z) must be greater than 0");
    }
    let max_threads = num_cpus::get() * 2;
    let num_threads = if cli.threads > max_threads {
        log::warn!(
            "thread count {} exceeds recommended maximum {}, capping",
            cli.threads,
            max_threads
        );
        max_threads
    } else {
        cli.threads
    };

    let inputs1 = split_file_list(&cli.input);
    let inputs2 = cli.input2.as_deref().map(split_file_list);
    let outputs = cli.output.as_deref().map(split_file_list);

    if inputs1.is_empty() {
        fatal("no input files given (-i)");
    }
    if let Some(inputs2) = &inputs2 {
        if inputs2.len() != inputs1.len() {
            fatal("length of input file lists (-i and -j) differs");
        }
    }
    if let Some(outputs) = &outputs {
        if outputs.len() != inputs1.len() {
            fatal("length of input and output file lists differs");
        }
    }

    // Every input must be readable before any work starts.
    for path in inputs1.iter().chain(inputs2.iter().flatten()) {
        if let Err(e) = File::open(path) {
            fatal(&format!("could not open file {}: {}", path, e));
        }
    }

    let config = Arc::new(Config {
        mode,
        seed_length: cli.seed_length,
        min_fragment_length: cli.min_fragment_length,
        min_score: cli.min_score,
        min_evalue: cli.min_evalue,
        mismatches: cli.mismatches,
        input_is_protein: cli.protein,
        seg: cli.seg || !cli.no_seg,
        verbose: cli.verbose,
        debug: cli.debug,
    });
    config.log_parameters();

    log::info!("Reading taxonomic tree from {}", cli.nodes.display());
    let taxonomy = match Taxonomy::from_nodes_dmp(&cli.nodes) {
        Ok(t) => Arc::new(t),
        Err(e) => fatal(&format!("could not read {}: {}", cli.nodes.display(), e)),
    };

    log::info!("Reading database from {}", cli.fmi.display());
    let index = match read_index(&cli.fmi) {
        Ok(i) => Arc::new(i),
        Err(e) => fatal(&format!("could not read {}: {}", cli.fmi.display(), e)),
    };

    let mut any_fatal = false;
    for (i, input1) in inputs1.iter().enumerate() {
        let input2 = inputs2.as_ref().map(|l| l[i].as_str());
        match input2 {
            Some(input2) => log::info!("Processing {} and {}", input1, input2),
            None => log::info!("Processing {}", input1),
        }

        let writer: Box<dyn io::Write + Send> = match &outputs {
            Some(outputs) => {
                let path = &outputs[i];
                log::info!("Output file: {}", path);
                match File::create(path) {
                    Ok(f) => Box::new(BufWriter::new(f)),
                    Err(e) => fatal(&format!("could not open {} for writing: {}", path, e)),
                }
            }
            None => Box::new(io::stdout()),
        };
        let output = SharedWriter::new(writer);

        match pipeline::run_pipeline(
            &config,
            &index,
            &taxonomy,
            num_threads,
            input1,
            input2,
            &output,
        ) {
            Ok(clean) => {
                if !clean {
                    any_fatal = true;
                }
            }
            Err(e) => {
                log::error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    log::info!("Finished.");
    if any_fatal {
        std::process::exit(1);
    }
}
