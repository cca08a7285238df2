//! Record table formats
//!
//! Segment and probe tables share the delimited [`table::Table`] model and
//! the [`record::RecordConverter`] contract.

pub mod probe;
pub mod record;
pub mod segment;
pub mod table;

pub use probe::ProbeConverter;
pub use record::{ExcludedRecord, FileConversion, RecordConverter, UNMAPPED_LOG_HEADER};
pub use segment::SegmentConverter;
pub use table::Table;
