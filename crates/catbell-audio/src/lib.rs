pub mod capture;
pub mod window;

pub use capture::{MicSource, StreamInfo};
pub use window::{AudioWindow, WindowRing};

use catbell_foundation::AudioError;

/// Source of fixed-length audio windows for the sampling loop.
pub trait AudioSource: Send {
    /// Begins capture. Idempotent; later reads return the most recent window.
    fn start(&mut self) -> Result<(), AudioError>;
    /// Returns the most recent window, oldest sample first.
    fn read_window(&mut self) -> Result<AudioWindow, AudioError>;
}
