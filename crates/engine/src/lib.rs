//! # tightfit Engine
//!
//! The bounded target-size pipeline:
//! generator → selection (driving an `Encoder`) → fallback, wrapped by the
//! `Compressor` orchestrator.

pub mod fallback;
pub mod generator;
pub mod orchestrator;
pub mod selection;
pub mod testing;

pub use fallback::{FallbackChain, FallbackReason};
pub use generator::{CandidateGenerator, CandidatePlan};
pub use orchestrator::Compressor;
pub use selection::{SelectionEngine, SelectionReport, StopReason};
