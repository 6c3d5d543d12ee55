//! # tightfit Encoders
//!
//! Concrete implementations of the `Encoder` trait:
//! - `raster`: in-process JPEG re-encode with optional downscale
//! - `blocking`: timeout and cancel around in-process codec work
//! - `structural`: library-only PDF rewrite via `lopdf`
//! - `ghostscript`: `gs -sDEVICE=pdfwrite` subprocess with timeout and cancel
//! - `router`: the production encoder that dispatches by candidate kind

mod blocking;
pub mod ghostscript;
pub mod raster;
pub mod output;
pub mod router;
pub mod scratch;
pub mod structural;

pub use ghostscript::GhostscriptEncoder;
pub use raster::ImageCodec;
pub use router::CodecRouter;
pub use scratch::ScratchSpace;
pub use structural::StructuralOptimizer;
