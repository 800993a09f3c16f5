//! Microphone capture and the learner's keyboard signals.
//!
//! The `cpal` input callback pushes samples into a lock-free ring buffer; a blocking
//! worker drains it into a 16-bit WAV file until told to stop.

use crate::terminal;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use cpal::{
    FromSample, Sample, SizedSample, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use hound::{WavSpec, WavWriter};
use ringbuf::{
    HeapProd, HeapRb,
    traits::{Consumer, Producer, Split},
};
use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};
use talko_core::speech::{CapturedAudio, LearnerInput, LearnerSignal};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::{Mutex, Notify},
};
use tracing::{debug, error, info, warn};

const RING_SECONDS: usize = 2;
const CHUNK_SAMPLES: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Converts a normalized sample to 16-bit PCM.
pub fn to_i16(sample: f32) -> i16 {
    (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Records the default input device into a WAV file.
pub struct MicrophoneCapture {
    path: PathBuf,
}

impl MicrophoneCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Records until `stop` is set, then returns the encoded file. Blocks the
    /// calling thread.
    pub fn record(&self, stop: Arc<AtomicBool>) -> Result<CapturedAudio> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No audio input device available")?;
        let supported = device
            .default_input_config()
            .context("Could not query the input device configuration")?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let config = supported.config();

        let ring = HeapRb::<f32>::new(sample_rate as usize * channels as usize * RING_SECONDS);
        let (producer, mut consumer) = ring.split();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, producer)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, producer)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, producer)?,
            other => bail!("Unsupported input sample format {other}"),
        };
        stream.play().context("Could not start recording")?;
        info!(sample_rate, channels, path = %self.path.display(), "Recording started");

        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&self.path, spec)
            .with_context(|| format!("Could not create {}", self.path.display()))?;

        let mut chunk = vec![0.0f32; CHUNK_SAMPLES];
        let mut written = 0usize;
        loop {
            let stopping = stop.load(Ordering::SeqCst);
            let popped = consumer.pop_slice(&mut chunk);
            for &sample in &chunk[..popped] {
                writer.write_sample(to_i16(sample))?;
            }
            written += popped;
            if popped == 0 {
                if stopping {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
        drop(stream);
        writer.finalize()?;

        let wav = fs::read(&self.path)
            .with_context(|| format!("Could not read back {}", self.path.display()))?;
        let samples = written / channels.max(1) as usize;
        debug!(samples, bytes = wav.len(), "Recording finished");
        Ok(CapturedAudio {
            wav,
            sample_rate,
            samples,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: HeapProd<f32>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    // A full ring drops samples rather than blocking the audio thread.
                    let _ = producer.try_push(sample.to_sample::<f32>());
                }
            },
            |err| error!(error = %err, "Audio input stream error"),
            None,
        )
        .context("Could not open the input stream")?;
    Ok(stream)
}

/// Ctrl+C, latched until someone takes it.
#[derive(Default)]
pub struct CancelSignal {
    raised: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// Creates a signal raised by every Ctrl+C the process receives.
    pub fn install() -> Arc<Self> {
        let signal = Arc::new(Self::default());
        let listener = signal.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Could not listen for Ctrl+C");
                    break;
                }
                debug!("Ctrl+C received");
                listener.raise();
            }
        });
        signal
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Clears the signal, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }

    /// Resolves once the signal is raised.
    pub async fn raised(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

/// A learner at the terminal: Enter to start and stop recording, Ctrl+C to stop the
/// recording or, at the prompt, the whole session.
pub struct TerminalLearner {
    microphone: Arc<MicrophoneCapture>,
    cancel: Arc<CancelSignal>,
    stdin: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalLearner {
    pub fn new(microphone: MicrophoneCapture, cancel: Arc<CancelSignal>) -> Self {
        Self {
            microphone: Arc::new(microphone),
            cancel,
            stdin: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Waits for Enter. False when stdin is closed.
    async fn enter(&self) -> bool {
        matches!(self.stdin.lock().await.next_line().await, Ok(Some(_)))
    }
}

#[async_trait]
impl LearnerInput for TerminalLearner {
    async fn await_ready(&self) -> LearnerSignal {
        // Ctrl+C pressed while the tutor was talking ends the session here.
        if self.cancel.take() {
            return LearnerSignal::Cancel;
        }
        terminal::ready_prompt();
        tokio::select! {
            line = self.enter() => {
                if line {
                    LearnerSignal::Ready
                } else {
                    info!("Input closed, ending session");
                    LearnerSignal::Cancel
                }
            }
            _ = self.cancel.raised() => {
                self.cancel.take();
                LearnerSignal::Cancel
            }
        }
    }

    async fn capture(&self) -> Result<CapturedAudio> {
        let stop = Arc::new(AtomicBool::new(false));
        let microphone = self.microphone.clone();
        let worker_stop = stop.clone();
        let mut worker = tokio::task::spawn_blocking(move || microphone.record(worker_stop));
        terminal::recording_started();

        let finished_early = tokio::select! {
            result = &mut worker => Some(result),
            _ = self.enter() => None,
            _ = self.cancel.raised() => {
                // Ctrl+C while recording only ends the recording.
                self.cancel.take();
                None
            }
        };
        stop.store(true, Ordering::SeqCst);
        let result = match finished_early {
            Some(result) => result,
            None => worker.await,
        };
        let audio = result.context("Recording worker panicked")??;
        terminal::recording_finished(audio.duration_secs());
        Ok(audio)
    }
}
