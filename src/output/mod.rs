//! Output module
//!
//! Persists fetched records as JSON Lines files.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Writing records one per line
//! - Reading a record file back
//! - Naming output files after the run that produced them

mod writer;

pub use writer::{
    output_file_name, read_records_from_jsonl, write_records_to_jsonl, RecordWriter,
    DEFAULT_OUTPUT_DIR, OUTPUT_EXTENSION,
};
