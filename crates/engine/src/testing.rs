//! Deterministic encoder for exercising the engine without real codecs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tightfit_core::{
    Artifact, CancelToken, CandidateDescriptor, CandidateParams, CandidateResult, EncodeError,
    Encoder, MediaKind, PresetProfile,
};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    /// Succeed with a zero-filled payload of this many bytes.
    Size(u64),
    Fail(EncodeError),
    /// Panic inside `invoke`.
    Panic,
}

/// Replays a fixed list of outcomes, one per `invoke`, and records which
/// candidates were asked for. Runs out as `CandidateFailed`.
pub struct ScriptedEncoder {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEncoder {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn sizes(sizes: impl IntoIterator<Item = u64>) -> Self {
        Self::new(sizes.into_iter().map(Step::Size).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Names of the descriptors invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        _input: &[u8],
        descriptor: &CandidateDescriptor,
        _cancel: &CancelToken,
    ) -> CandidateResult {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(descriptor.name.clone());
        let step = self
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match step {
            Some(Step::Size(n)) => {
                let (mime, ext) = match descriptor.params.media_kind() {
                    MediaKind::Image => ("image/jpeg", "jpg"),
                    MediaKind::Document => ("application/pdf", "pdf"),
                };
                let artifact = Artifact::new(
                    vec![0; n as usize],
                    mime,
                    format!("{}.{ext}", descriptor.name),
                );
                CandidateResult::success(descriptor.clone(), artifact)
            }
            Some(Step::Fail(e)) => CandidateResult::failure(descriptor.clone(), e),
            Some(Step::Panic) => panic!("scripted encoder panic at {}", descriptor.name),
            None => CandidateResult::failure(
                descriptor.clone(),
                EncodeError::candidate_failed(&descriptor.name, "script exhausted"),
            ),
        }
    }
}

/// `n` document descriptors named `c0..c{n-1}` in priority order.
pub fn document_plan(n: u32) -> Vec<CandidateDescriptor> {
    (0..n)
        .map(|i| {
            CandidateDescriptor::new(
                format!("c{i}"),
                CandidateParams::Document {
                    preset: PresetProfile::Screen,
                    image_resolution_dpi: 300 - i,
                    auto_rotate: false,
                },
                i,
            )
        })
        .collect()
}
