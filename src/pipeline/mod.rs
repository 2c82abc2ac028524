//! The extraction pipeline, stage by stage.
//!
//! Each stage is its own module with a narrow, testable surface:
//!
//! | Stage        | Module         | Purpose                                    |
//! |--------------|----------------|--------------------------------------------|
//! | Fetch        | [`fetch`]      | Download the document bytes                |
//! | Detect       | [`detect`]     | Classify as PDF / image / unknown          |
//! | Parse        | [`parse`]      | Pull one JSON object out of model text     |
//! | Duplicates   | [`duplicates`] | Flag line items repeated across pages      |
//! | Validate     | [`validate`]   | Reconcile computed vs claimed totals       |
//!
//! The orchestrator in [`crate::extract`] wires these together; the model
//! transport lives in [`crate::provider`].

pub mod detect;
pub mod duplicates;
pub mod fetch;
pub mod parse;
pub mod validate;
