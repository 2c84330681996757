pub mod classify;
pub mod config;
pub mod index; // FM-index facade (backward search, interval -> taxon mapping)
pub mod io; // FASTA/FASTQ parsing and guarded output
pub mod mask;
pub mod pipeline;
pub mod search; // MEM and Greedy searchers plus the BLOSUM62 tables
pub mod taxonomy;
pub mod translate;
