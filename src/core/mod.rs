//! Core liftover functionality
//!
//! Chromosome normalization, the translation engine boundary, the
//! fallback resolver with its run-wide cache, and statistics.

mod chrom;
pub mod config;
pub mod error;
pub mod io;
pub mod lift;
pub mod remap;
pub mod stats;
pub mod translate;

pub use chrom::{Chrom, InvalidChrom};
pub use config::{resolve_chain, LiftoverConfig, ResumeFiles, KNOWN_CHAINS};
pub use error::{
    ConfigError, ConfigResult, ConversionError, ConversionResult, LiftoverError, RemapLogError,
    Result, TableError, TableResult, TranslationError, TranslationResult,
};
pub use io::{
    detect_compression, write_atomic, ByteLineIterator, Compression, InputReader,
    DEFAULT_BUFFER_SIZE, MMAP_THRESHOLD,
};
pub use lift::{Endpoint, EndpointLifter, Source};
pub use remap::{
    CacheStats, RemapCache, RemapEntry, RemapKey, RemapSettings, Resolved, UnmappableResolver,
};
pub use stats::{ConversionOutcome, FileCounts, KindCounts, RecordKind, RunStatistics, RunSummary};
pub use translate::{LiftOverCommand, PointQuery, TranslatedPoint, TranslationService};
