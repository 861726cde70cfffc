//! Pipeline orchestration for noticescore.
//!
//! This crate ties together feed correlation, text normalization, scoring,
//! output writing and run persistence into end-to-end runs (e.g., [`pipeline::run`]).

pub mod output;
pub mod pipeline;
