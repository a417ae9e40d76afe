//! Transform pipeline for the ingest and serve phases.
//!
//! A phase maps to a fixed list of [`PipelineOp`]s that run in order against a
//! single decoded image. Encoding is recorded as pending settings so the result
//! can be written once, or re-encoded at different qualities by the search.

use image::DynamicImage;
use lumen_core::models::{MediaFormat, TransformRequest};
use std::path::Path;

use crate::codec::{decode_file, CodecError, DecodedImage};
use crate::encoder;
use crate::orientation::apply_orientation;
use crate::quality_search::Encodable;
use crate::resize::{apply_resize, plan_resize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Canonicalize an upload into a master. Never resizes.
    Ingest,
    /// Derive a variant from a master.
    Serve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOp {
    AutoRotate,
    Resize,
    Encode,
}

pub fn ops_for(phase: PipelinePhase) -> &'static [PipelineOp] {
    match phase {
        PipelinePhase::Ingest => &[PipelineOp::AutoRotate, PipelineOp::Encode],
        PipelinePhase::Serve => &[PipelineOp::AutoRotate, PipelineOp::Resize, PipelineOp::Encode],
    }
}

/// Mutable state threaded through the ops.
struct PipelineState {
    image: DynamicImage,
    orientation: u32,
    encode: Option<(MediaFormat, Option<u8>)>,
}

/// Result of a pipeline run: oriented, resized pixels plus pending encode settings.
/// Encoding consumes the handle.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    image: DynamicImage,
    format: MediaFormat,
    quality: Option<u8>,
}

impl TransformedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// Quality that encoding will use.
    pub fn effective_quality(&self) -> u8 {
        if self.format.is_lossless() {
            return encoder::LOSSLESS_QUALITY;
        }
        self.quality
            .unwrap_or_else(|| encoder::default_quality(self.format))
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn to_bytes(self) -> Result<Vec<u8>, CodecError> {
        encoder::encode(&self.image, self.format, self.quality)
    }

    /// Encode and write to `path`, returning the number of bytes written.
    pub fn write_to_file(self, path: &Path) -> Result<u64, CodecError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

impl Encodable for TransformedImage {
    fn encode_at(self, quality: u8) -> Result<Vec<u8>, CodecError> {
        self.with_quality(quality).to_bytes()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransformPipeline;

impl TransformPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Decode `source` and run the ops of `phase`. Blocking.
    pub fn run(
        &self,
        source: &Path,
        request: &TransformRequest,
        output_format: MediaFormat,
        phase: PipelinePhase,
    ) -> Result<TransformedImage, CodecError> {
        let decoded = decode_file(source)?;
        self.run_decoded(decoded, request, output_format, phase)
    }

    /// Run the ops of `phase` against an already decoded image.
    pub fn run_decoded(
        &self,
        decoded: DecodedImage,
        request: &TransformRequest,
        output_format: MediaFormat,
        phase: PipelinePhase,
    ) -> Result<TransformedImage, CodecError> {
        let mut state = PipelineState {
            image: decoded.image,
            orientation: decoded.orientation,
            encode: None,
        };

        for op in ops_for(phase) {
            match op {
                PipelineOp::AutoRotate => {
                    state.image = apply_orientation(state.image, state.orientation);
                    state.orientation = 1;
                }
                PipelineOp::Resize => {
                    let src = (state.image.width(), state.image.height());
                    if let Some(plan) = plan_resize(src, request.width, request.height, request.fit) {
                        state.image = apply_resize(state.image, &plan);
                    }
                }
                PipelineOp::Encode => {
                    state.encode = Some((output_format, request.quality));
                }
            }
        }

        let (format, quality) = state.encode.unwrap_or((output_format, request.quality));
        tracing::debug!(
            ?phase,
            format = %format,
            width = state.image.width(),
            height = state.image.height(),
            "Transform pipeline finished"
        );

        Ok(TransformedImage {
            image: state.image,
            format,
            quality,
        })
    }
}
