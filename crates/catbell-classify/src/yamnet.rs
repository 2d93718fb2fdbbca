//! YAMNet sound classifier adapter.
//!
//! Runs the YAMNet ONNX model (521 audio classes) over fixed 0.975 s mono
//! windows at 16 kHz. Enabled by the `yamnet` cargo feature; without it the
//! constructor fails with a clear message so the binary still builds.

use std::path::PathBuf;

use crate::error::ClassifyError;
use crate::types::InputSpec;

/// Input tensor shape the published YAMNet model expects.
pub const SAMPLE_RATE_HZ: u32 = 16_000;
pub const WINDOW_LEN: usize = 15_600;
/// Number of classes in the YAMNet class map.
pub const NUM_CLASSES: usize = 521;

/// Options forwarded to the ONNX session and result filtering.
#[derive(Debug, Clone)]
pub struct YamnetOptions {
    pub model: PathBuf,
    pub labels: PathBuf,
    pub num_threads: usize,
    pub max_results: usize,
    pub score_threshold: f32,
    pub accelerator: bool,
}

#[cfg(feature = "yamnet")]
mod imp {
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Value;

    use super::*;
    use crate::labels::load_class_map;
    use crate::types::{Classification, LabelScore};
    use crate::Classifier;
    use catbell_audio::AudioWindow;

    pub struct YamnetClassifier {
        session: Session,
        labels: Vec<String>,
        max_results: usize,
        score_threshold: f32,
        // Reused across cycles so a long-running monitor does not grow.
        input: Vec<f32>,
    }

    impl YamnetClassifier {
        pub fn new(options: &YamnetOptions) -> Result<Self, ClassifyError> {
            let labels = load_class_map(&options.labels)?;
            if labels.len() != NUM_CLASSES {
                return Err(ClassifyError::LabelMap(format!(
                    "expected {} classes, found {}",
                    NUM_CLASSES,
                    labels.len()
                )));
            }

            tracing::info!("Loading YAMNet model from {:?}", options.model);
            let mut builder = Session::builder()
                .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?
                .with_intra_threads(options.num_threads)
                .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?;

            if options.accelerator {
                builder = register_accelerator(builder)?;
            }

            let session = builder
                .commit_from_file(&options.model)
                .map_err(|e| ClassifyError::ModelLoad(e.to_string()))?;
            tracing::info!("YAMNet model loaded successfully");

            Ok(Self {
                session,
                labels,
                max_results: options.max_results,
                score_threshold: options.score_threshold,
                input: Vec::with_capacity(WINDOW_LEN),
            })
        }
    }

    #[cfg(feature = "cuda")]
    fn register_accelerator(
        builder: ort::session::builder::SessionBuilder,
    ) -> Result<ort::session::builder::SessionBuilder, ClassifyError> {
        use ort::execution_providers::CUDAExecutionProvider;

        tracing::info!("Registering CUDA execution provider");
        builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(|e| ClassifyError::ModelLoad(e.to_string()))
    }

    #[cfg(not(feature = "cuda"))]
    fn register_accelerator(
        builder: ort::session::builder::SessionBuilder,
    ) -> Result<ort::session::builder::SessionBuilder, ClassifyError> {
        tracing::warn!("Accelerator requested but built without the cuda feature; using CPU");
        Ok(builder)
    }

    impl Classifier for YamnetClassifier {
        fn input_spec(&self) -> InputSpec {
            InputSpec {
                sample_rate_hz: SAMPLE_RATE_HZ,
                window_len: WINDOW_LEN,
            }
        }

        fn classify(&mut self, window: &AudioWindow) -> Result<Classification, ClassifyError> {
            let spec = self.input_spec();
            if !spec.matches(window.sample_rate_hz, window.samples.len()) {
                return Err(ClassifyError::UnsupportedWindow {
                    expected_rate: spec.sample_rate_hz,
                    expected_len: spec.window_len,
                    got_rate: window.sample_rate_hz,
                    got_len: window.samples.len(),
                });
            }

            self.input.clear();
            self.input
                .extend(window.samples.iter().map(|&s| s as f32 / 32768.0));

            // YAMNet expects [batch, samples] = [1, 15600]
            let input_tensor = Value::from_array(([1_usize, WINDOW_LEN], self.input.clone()))
                .map_err(|e| ClassifyError::Inference(e.to_string()))?;
            let outputs = self
                .session
                .run(ort::inputs![input_tensor])
                .map_err(|e| ClassifyError::Inference(e.to_string()))?;

            // Output is [batch, num_classes] = [1, 521]
            let output = outputs
                .iter()
                .next()
                .ok_or_else(|| ClassifyError::Inference("no output tensor".to_string()))?;
            let tensor = output
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| ClassifyError::Inference(e.to_string()))?;

            let mut ranked: Vec<LabelScore> = tensor
                .1
                .iter()
                .zip(self.labels.iter())
                .filter(|(&score, _)| score >= self.score_threshold)
                .map(|(&score, label)| LabelScore {
                    label: label.clone(),
                    score,
                })
                .collect();
            ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
            ranked.truncate(self.max_results);

            Ok(Classification { ranked })
        }
    }
}

#[cfg(feature = "yamnet")]
pub use imp::YamnetClassifier;

/// Stub for builds without the `yamnet` feature.
#[cfg(not(feature = "yamnet"))]
pub struct YamnetClassifier;

#[cfg(not(feature = "yamnet"))]
impl YamnetClassifier {
    pub fn new(_options: &YamnetOptions) -> Result<Self, ClassifyError> {
        Err(ClassifyError::ModelLoad(
            "catbell was built without the 'yamnet' feature".to_string(),
        ))
    }
}

#[cfg(not(feature = "yamnet"))]
impl crate::Classifier for YamnetClassifier {
    fn input_spec(&self) -> InputSpec {
        InputSpec {
            sample_rate_hz: SAMPLE_RATE_HZ,
            window_len: WINDOW_LEN,
        }
    }

    fn classify(
        &mut self,
        _window: &catbell_audio::AudioWindow,
    ) -> Result<crate::types::Classification, ClassifyError> {
        Err(ClassifyError::Inference(
            "catbell was built without the 'yamnet' feature".to_string(),
        ))
    }
}
