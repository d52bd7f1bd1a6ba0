use std::path::Path;

use ort::{session::Session, session::builder::GraphOptimizationLevel, value::TensorRef};

use crate::{ClassifierError, SpeechClassifier, VadError};

/// Silero v5 speech classifier backed by ONNX Runtime.
///
/// The model keeps an LSTM state of shape `[2, 1, 128]` that is fed back on
/// every call, and expects each frame to be prefixed with the last 64
/// (16 kHz) or 32 (8 kHz) samples of the previous window.
#[derive(Debug)]
pub struct SileroClassifier {
    session: Session,
    sample_rate: i64,
    context: usize,
    /// New samples per call the model was exported for.
    chunk: usize,
    state: ndarray::Array3<f32>,
}

/// Creates a single-threaded ONNX session for per-frame inference.
fn create_session(model: &Path) -> Result<Session, VadError> {
    Session::builder()
        .map_err(|e| VadError::ModelLoad(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VadError::ModelLoad(format!("Failed to set optimization level: {e}")))?
        .with_intra_threads(1)
        .map_err(|e| VadError::ModelLoad(format!("Failed to set intra threads: {e}")))?
        .with_inter_threads(1)
        .map_err(|e| VadError::ModelLoad(format!("Failed to set inter threads: {e}")))?
        .commit_from_file(model)
        .map_err(|e| VadError::ModelLoad(format!("{}: {e}", model.display())))
}

impl SileroClassifier {
    /// Load the model from `model`. Only 8 kHz (256-sample frames) and
    /// 16 kHz (512-sample frames) are supported.
    pub fn new(model: impl AsRef<Path>, sample_rate: u32) -> Result<Self, VadError> {
        let (context, chunk) = match sample_rate {
            16_000 => (64, 512),
            8_000 => (32, 256),
            _ => return Err(VadError::UnsupportedSampleRate(sample_rate)),
        };
        Ok(Self {
            session: create_session(model.as_ref())?,
            sample_rate: sample_rate as i64,
            context,
            chunk,
            state: ndarray::Array3::<f32>::zeros((2, 1, 128)),
        })
    }
}

fn backend(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::Backend(e.to_string())
}

impl SpeechClassifier for SileroClassifier {
    fn context_size(&self) -> usize {
        self.context
    }

    fn supports_frame(&self, frame_size: usize) -> bool {
        frame_size == self.chunk
    }

    fn speech_probability(&mut self, window: &[f32]) -> Result<f32, ClassifierError> {
        let input = ndarray::ArrayView2::from_shape((1, window.len()), window).map_err(backend)?;
        let sr = ndarray::arr1::<i64>(&[self.sample_rate]);

        let input_tensor = TensorRef::from_array_view(input).map_err(backend)?;
        let sr_tensor = TensorRef::from_array_view(sr.view()).map_err(backend)?;
        let state_tensor = TensorRef::from_array_view(self.state.view()).map_err(backend)?;

        let inputs = ort::inputs![
            "input" => input_tensor,
            "state" => state_tensor,
            "sr" => sr_tensor,
        ];
        let outputs = self.session.run(inputs).map_err(backend)?;

        let next_state = outputs
            .get("stateN")
            .ok_or_else(|| backend("missing 'stateN' output"))?
            .try_extract_array::<f32>()
            .map_err(backend)?
            .into_dimensionality::<ndarray::Ix3>()
            .map_err(backend)?;
        self.state.assign(&next_state);

        let output = outputs
            .get("output")
            .ok_or_else(|| backend("missing 'output' output"))?
            .try_extract_array::<f32>()
            .map_err(backend)?;
        let p = output.iter().next().copied().ok_or(ClassifierError::NonFinite)?;

        if p.is_finite() {
            Ok(p.clamp(0.0, 1.0))
        } else {
            Err(ClassifierError::NonFinite)
        }
    }

    fn reset(&mut self) {
        self.state.fill(0.0);
    }
}
