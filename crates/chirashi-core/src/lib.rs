//! # Chirashi Core - Listing Types and Field Schema
//!
//! Shared vocabulary for the chirashi_rs extraction pipeline: the fixed
//! listing field schema, the [`FieldValue`] tagged union, extracted records,
//! and the error taxonomy.
//!
//! Every component of the pipeline speaks in terms of these types. Raw
//! provider JSON is normalized into [`FieldValue`] at the extraction-client
//! boundary, so consumers never handle dynamic value shapes; a missing or
//! null field is always the [`NO_INFORMATION`] sentinel under comparison.
//!
//! ## Quick Start
//!
//! ```rust
//! use chirashi_core::{ExtractedRecord, FieldSchema, FieldValue, NO_INFORMATION};
//!
//! let schema = FieldSchema::listing();
//! let mut record = ExtractedRecord::new();
//! record.insert("家賃", FieldValue::scalar("8.5万円"));
//!
//! assert_eq!(record.normalized("家賃"), "8.5万円");
//! // Absent fields compare as the sentinel literal.
//! assert_eq!(record.normalized("駐車場"), NO_INFORMATION);
//! assert!(schema.fields().len() > 30);
//! ```

pub mod error;
pub mod record;
pub mod schema;

pub use error::{ExtractError, Result};
pub use record::{ExtractedRecord, FieldValue};
pub use schema::{FieldSchema, NO_INFORMATION};
