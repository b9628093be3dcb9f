//! Normalization of raw API payloads into domain models.

pub mod data_processor;

pub use data_processor::{parse_datetime, DataProcessor, ProcessError};
