//! Trace ingestion: the binary record layout ([`format`]) and the reader
//! that turns it into a lazy per-thread instruction stream ([`reader`]).

mod format;
mod reader;

pub use reader::{FetchOutcome, TraceReader};
