pub mod debounce;
pub mod error;
pub mod labels;
pub mod types;
pub mod yamnet;

pub use debounce::{GateDecision, NotificationGate};
pub use error::ClassifyError;
pub use types::{Classification, InputSpec, LabelScore};
pub use yamnet::{YamnetClassifier, YamnetOptions};

use catbell_audio::AudioWindow;

/// A trait for audio sound classifiers.
///
/// This defines the common interface for classifier backends, allowing the
/// monitoring loop to run against any implementation (or a test fake).
pub trait Classifier: Send {
    /// The sample rate and window length the model expects.
    fn input_spec(&self) -> InputSpec;

    /// Classifies one window, returning ranked labels in descending score
    /// order, filtered and truncated per the classifier's options.
    fn classify(&mut self, window: &AudioWindow) -> Result<Classification, ClassifyError>;
}
