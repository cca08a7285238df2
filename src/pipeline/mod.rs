//! Batch pipeline: classification, indexing, execution and reporting

pub mod batch;
pub mod classify;
pub mod index;
pub mod report;

pub use batch::{BatchOrchestrator, ExcludedLog, FileStatus, RunContext};
pub use classify::{FileClassifier, FileMatch};
pub use index::{
    clean_log_dir, index_files, read_file_list, resume_set, write_file_list, IndexCounts,
    LogPaths, ProgressLog,
};
pub use report::{format_summary, RunReport};
