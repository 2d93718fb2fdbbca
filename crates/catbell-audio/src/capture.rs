use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::window::{AudioWindow, WindowRing};
use crate::AudioSource;
use catbell_foundation::AudioError;

/// Negotiated device parameters, reported once at startup.
#[derive(Debug, Clone, Copy)]
pub struct StreamInfo {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

// Handle to the dedicated capture thread. cpal streams are not Send, so the
// stream lives and dies on this thread; everyone else sees only the ring.
struct CaptureThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

/// Microphone-backed [`AudioSource`] capturing at a fixed sample rate.
///
/// The device must support the requested rate natively; there is no
/// resampling stage. Callback data is converted to i16, averaged down to
/// mono, and pushed into a rolling window ring.
pub struct MicSource {
    sample_rate_hz: u32,
    window_len: usize,
    ring: Arc<WindowRing>,
    worker: Option<CaptureThread>,
}

impl MicSource {
    pub fn new(sample_rate_hz: u32, window_len: usize) -> Self {
        Self {
            sample_rate_hz,
            window_len,
            ring: Arc::new(WindowRing::new(window_len)),
            worker: None,
        }
    }

    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::SeqCst);
            let _ = worker.handle.join();
        }
    }
}

impl AudioSource for MicSource {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let ring = Arc::clone(&self.ring);
        let required_rate_hz = self.sample_rate_hz;
        let (ready_tx, ready_rx) = mpsc::channel::<Result<StreamInfo, AudioError>>();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream =
                    match open_stream(required_rate_hz, ring, Arc::clone(&thread_running)) {
                        Ok((stream, info)) => {
                            if let Err(e) = stream.play() {
                                let _ = ready_tx.send(Err(AudioError::from(e)));
                                return;
                            }
                            tracing::info!(
                                "Audio stream started: {} Hz, {} channel(s), {:?}",
                                info.sample_rate_hz,
                                info.channels,
                                info.sample_format
                            );
                            let _ = ready_tx.send(Ok(info));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(100));
                }
                drop(stream);
                tracing::info!("Audio capture thread shutting down");
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(_info)) => {
                self.worker = Some(CaptureThread { handle, running });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "Audio capture did not start within timeout".to_string(),
                ))
            }
        }
    }

    fn read_window(&mut self) -> Result<AudioWindow, AudioError> {
        if self.worker.is_none() {
            return Err(AudioError::Fatal("Audio capture not started".to_string()));
        }
        let mut samples = Vec::with_capacity(self.window_len);
        self.ring.snapshot(&mut samples);
        Ok(AudioWindow {
            samples,
            sample_rate_hz: self.sample_rate_hz,
        })
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(
    required_rate_hz: u32,
    ring: Arc<WindowRing>,
    running: Arc<AtomicBool>,
) -> Result<(Stream, StreamInfo), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioError::DeviceNotFound { name: None })?;
    if let Ok(name) = device.name() {
        tracing::info!("Selected input device: {} (host: {:?})", name, host.id());
    }

    let (config, sample_format) = negotiate_config(&device, required_rate_hz)?;
    let info = StreamInfo {
        sample_rate_hz: config.sample_rate.0,
        channels: config.channels,
        sample_format,
    };
    let stream = build_stream(&device, config, sample_format, ring, running)?;
    Ok((stream, info))
}

fn negotiate_config(
    device: &cpal::Device,
    required_rate_hz: u32,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    // Default config first: on most devices it is the path that works.
    if let Ok(default_config) = device.default_input_config() {
        if default_config.sample_rate().0 == required_rate_hz {
            return Ok((
                StreamConfig {
                    channels: default_config.channels(),
                    sample_rate: default_config.sample_rate(),
                    buffer_size: cpal::BufferSize::Default,
                },
                default_config.sample_format(),
            ));
        }
    }

    // Otherwise any supported range containing the required rate.
    for range in device.supported_input_configs()? {
        if range.min_sample_rate().0 <= required_rate_hz
            && required_rate_hz <= range.max_sample_rate().0
        {
            let config = range.with_sample_rate(cpal::SampleRate(required_rate_hz));
            let sample_format = config.sample_format();
            return Ok((
                StreamConfig {
                    channels: config.channels(),
                    sample_rate: config.sample_rate(),
                    buffer_size: cpal::BufferSize::Default,
                },
                sample_format,
            ));
        }
    }

    Err(AudioError::FormatNotSupported {
        format: format!("no input config supports {} Hz", required_rate_hz),
    })
}

fn build_stream(
    device: &cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    ring: Arc<WindowRing>,
    running: Arc<AtomicBool>,
) -> Result<Stream, AudioError> {
    let channels = config.channels;

    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
    };

    // Common handler after conversion to i16: average interleaved frames to
    // mono and push into the ring.
    let handle_i16 = move |data: &[i16]| {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        if channels <= 1 {
            ring.push(data);
            return;
        }
        MONO_BUFFER.with(|buf| {
            let mut mono = buf.borrow_mut();
            mono.clear();
            mono.reserve(data.len() / channels as usize);
            for frame in data.chunks_exact(channels as usize) {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                mono.push((sum / channels as i32) as i16);
            }
            ring.push(&mono);
        });
    };

    // Thread-local buffers keep the audio callback allocation-free.
    thread_local! {
        static CONVERT_BUFFER: std::cell::RefCell<Vec<i16>> = const { std::cell::RefCell::new(Vec::new()) };
        static MONO_BUFFER: std::cell::RefCell<Vec<i16>> = const { std::cell::RefCell::new(Vec::new()) };
    }

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| {
                handle_i16(data);
            },
            err_fn,
            None,
        )?,
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| {
                CONVERT_BUFFER.with(|buf| {
                    let mut converted = buf.borrow_mut();
                    converted.clear();
                    converted.reserve(data.len());
                    // Clamp [-1.0, 1.0] and scale to i16
                    for &s in data {
                        let clamped = s.clamp(-1.0, 1.0);
                        converted.push((clamped * 32767.0).round() as i16);
                    }
                    handle_i16(&converted);
                });
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &_| {
                CONVERT_BUFFER.with(|buf| {
                    let mut converted = buf.borrow_mut();
                    converted.clear();
                    converted.reserve(data.len());
                    // Convert unsigned [0,65535] to signed [-32768,32767]
                    for &s in data {
                        converted.push((s as i32 - 32768) as i16);
                    }
                    handle_i16(&converted);
                });
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    Ok(stream)
}
