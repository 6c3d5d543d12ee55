//! # tightfit Core
//!
//! Domain types, traits, and error definitions for the tightfit
//! size-bounded compressor. This crate has **no codec or framework
//! dependencies**: it defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here (`Encoder`, `SessionStore`,
//! `Channel`). Implementations live in their respective crates. This enables:
//! - Driving the selection engine with deterministic fake encoders
//! - Swapping session backends and chat transports via configuration
//! - Clean dependency graph (all crates depend inward on core)

pub mod artifact;
pub mod cancel;
pub mod candidate;
pub mod channel;
pub mod encoder;
pub mod error;
pub mod policy;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use artifact::{Artifact, CompressionRequest};
pub use cancel::{CancelHandle, CancelToken};
pub use candidate::{CandidateDescriptor, CandidateParams, CandidateResult, MediaKind, PresetProfile};
pub use channel::{Channel, ChannelId, ChannelMessage, MediaAttachment, OutboundMessage};
pub use encoder::Encoder;
pub use error::{CompressError, EncodeError};
pub use policy::{SizeBand, SizePolicy};
pub use session::SessionStore;
