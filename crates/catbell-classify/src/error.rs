use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error(
        "Window does not match model input: expected {expected_len} samples at {expected_rate} Hz, \
         got {got_len} samples at {got_rate} Hz"
    )]
    UnsupportedWindow {
        expected_rate: u32,
        expected_len: usize,
        got_rate: u32,
        got_len: usize,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Failed to load label map: {0}")]
    LabelMap(String),
}
