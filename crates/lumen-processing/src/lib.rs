//! Lumen image processing
//!
//! Codec adapter over `image`, `mozjpeg`, `webp`, `ravif` and `kamadak-exif`,
//! the phase-based transform pipeline, and the quality-targeting search used
//! to fit variants into a byte budget.

pub mod codec;
pub mod encoder;
pub mod orientation;
pub mod pipeline;
pub mod quality_search;
pub mod resize;

pub use codec::{check_dimensions, decode_bytes, decode_file, decode_file_within, CodecError, DecodedImage};
pub use encoder::default_quality;
pub use pipeline::{ops_for, PipelineOp, PipelinePhase, TransformPipeline, TransformedImage};
pub use quality_search::{find_quality_for_budget, BudgetedOutput, Encodable};
pub use resize::{plan_resize, ResizePlan};
