//! Candidate Generator: the ordered parameter ladders.
//!
//! Every plan is ordered from highest quality to lowest. The selection loop
//! relies on that order for its early stop, so the ladders below must only
//! ever step towards smaller output.

use tightfit_config::{AppConfig, ImageConfig};
use tightfit_core::{CandidateDescriptor, CandidateParams, MediaKind, PresetProfile, SizePolicy};

/// Ghostscript rungs, highest quality first.
const DOCUMENT_LADDER: &[(PresetProfile, u32)] = &[
    (PresetProfile::Prepress, 300),
    (PresetProfile::Prepress, 250),
    (PresetProfile::Prepress, 220),
    (PresetProfile::Printer, 200),
    (PresetProfile::Printer, 180),
    (PresetProfile::Printer, 150),
    (PresetProfile::Ebook, 120),
    (PresetProfile::Ebook, 110),
    (PresetProfile::Screen, 100),
    (PresetProfile::Screen, 90),
    (PresetProfile::Screen, 72),
];

/// Appended for inputs far above the ceiling.
const EXTENDED_LADDER: &[(PresetProfile, u32)] =
    &[(PresetProfile::Screen, 50), (PresetProfile::Screen, 36)];

/// A finite, single-use sequence of descriptors in priority order.
#[derive(Debug)]
pub struct CandidatePlan {
    inner: std::vec::IntoIter<CandidateDescriptor>,
}

impl CandidatePlan {
    fn from_ordered(descriptors: Vec<CandidateDescriptor>) -> Self {
        Self {
            inner: descriptors.into_iter(),
        }
    }
}

impl Iterator for CandidatePlan {
    type Item = CandidateDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for CandidatePlan {}

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    image: ImageConfig,
    auto_rotate: bool,
    extended_ladder_ratio: f64,
}

impl CandidateGenerator {
    pub fn new(image: ImageConfig, auto_rotate: bool, extended_ladder_ratio: f64) -> Self {
        Self {
            image,
            auto_rotate,
            extended_ladder_ratio,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.image.clone(),
            config.encoder.auto_rotate,
            config.encoder.extended_ladder_ratio,
        )
    }

    /// The plan for one input.
    ///
    /// An image already at or under `ideal_max` gets a single `light` re-encode
    /// at `light_quality`. `Compressor` never requests that plan, since it
    /// returns compliant input untouched before generating; the rung exists
    /// for callers driving the generator and selector directly.
    pub fn generate(&self, kind: MediaKind, policy: &SizePolicy, input_size: u64) -> CandidatePlan {
        let params = match kind {
            MediaKind::Document => self.document_params(policy, input_size),
            MediaKind::Image => self.image_params(policy, input_size),
        };

        let descriptors = params
            .into_iter()
            .enumerate()
            .map(|(priority, (name, params))| {
                CandidateDescriptor::new(name, params, priority as u32)
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            kind = %kind,
            input_bytes = input_size,
            candidates = descriptors.len(),
            "Candidate plan generated"
        );
        CandidatePlan::from_ordered(descriptors)
    }

    fn document_params(&self, policy: &SizePolicy, input_size: u64) -> Vec<(String, CandidateParams)> {
        let mut out = vec![("structural".to_string(), CandidateParams::Structural)];

        let extended = exceeds_ratio(input_size, policy.hard_max(), self.extended_ladder_ratio);
        let extra: &[(PresetProfile, u32)] = if extended { EXTENDED_LADDER } else { &[] };

        for &(preset, dpi) in DOCUMENT_LADDER.iter().chain(extra) {
            out.push((
                format!("{}-{dpi}", preset.as_str()),
                CandidateParams::Document {
                    preset,
                    image_resolution_dpi: dpi,
                    auto_rotate: self.auto_rotate,
                },
            ));
        }
        out
    }

    fn image_params(&self, policy: &SizePolicy, input_size: u64) -> Vec<(String, CandidateParams)> {
        let cfg = &self.image;

        if input_size <= policy.ideal_max() {
            return vec![(
                "light".to_string(),
                CandidateParams::Image {
                    quality: cfg.light_quality,
                    downscale_factor: None,
                },
            )];
        }

        let mut out = Vec::new();
        let step = cfg.quality_step.max(1);
        let mut quality = cfg.start_quality;
        while quality >= cfg.min_quality {
            out.push((
                format!("q{quality}"),
                CandidateParams::Image {
                    quality,
                    downscale_factor: None,
                },
            ));
            match quality.checked_sub(step) {
                Some(next) if next > 0 => quality = next,
                _ => break,
            }
        }

        if exceeds_ratio(input_size, policy.hard_max(), cfg.downscale_trigger_ratio) {
            out.push((
                "downscale".to_string(),
                CandidateParams::Image {
                    quality: cfg.downscale_quality,
                    downscale_factor: Some(cfg.effective_downscale_factor()),
                },
            ));
        }
        out
    }
}

fn exceeds_ratio(input_size: u64, hard_max: u64, ratio: f64) -> bool {
    input_size as f64 > hard_max as f64 * ratio
}
