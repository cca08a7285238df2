//! SegmentLiftover - reconciling liftover of segment and probe tables
//!
//! Drives an external coordinate translation engine (UCSC `liftOver`) over
//! tab-delimited segment and probe tables, and turns its partial output into
//! an auditable dataset.
//!
//! # Features
//!
//! - Stepwise neighbour search for positions the engine cannot translate
//! - Run-wide memo of search results, persisted for reuse by later runs
//! - Plausibility checks on every translated record (chromosome, length ratio)
//! - Resumable batches over large file sets, optionally in parallel
//!
//! # Example
//!
//! ```no_run
//! use segment_liftover::core::{EndpointLifter, LiftOverCommand, RemapCache, RemapSettings};
//! use segment_liftover::formats::{RecordConverter, SegmentConverter};
//! use std::path::Path;
//!
//! let engine = LiftOverCommand::new("./liftOver", "chains/hg18ToHg19.over.chain.gz");
//! let cache = RemapCache::new();
//! let lifter = EndpointLifter::new(&engine, &cache, RemapSettings::default(), true);
//!
//! let result = SegmentConverter::default()
//!     .convert_file(Path::new("in/segments.tab"), Path::new("out/segments.tab"), &lifter)?;
//! println!("{} lifted", result.counts.lifted);
//! # Ok::<(), segment_liftover::ConversionError>(())
//! ```

pub mod core;
pub mod formats;
pub mod pipeline;

// Re-export commonly used types
pub use core::{
    Chrom, ConfigError, ConversionError, ConversionOutcome, KindCounts, LiftOverCommand,
    LiftoverConfig, LiftoverError, RemapCache, RemapSettings, RunStatistics, TranslationService,
    UnmappableResolver,
};
pub use formats::{ProbeConverter, RecordConverter, SegmentConverter};
pub use pipeline::{BatchOrchestrator, RunContext};
