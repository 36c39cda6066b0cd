use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use snafu::{OptionExt, ResultExt};
use tokio::sync::oneshot;

use super::error::{
    BuildStreamSnafu, CaptureThreadSnafu, InputConfigSnafu, PlayStreamSnafu, SpeechResult,
    UnsupportedSampleFormatSnafu, UnsupportedSnafu,
};
use super::wav::downmix;

/// Frame energy at or above this RMS counts as speech.
const SPEECH_RMS: f32 = 0.01;
/// Quiet after speech that ends the utterance.
const TRAILING_SILENCE: Duration = Duration::from_millis(1_000);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn has_input_device() -> bool {
    cpal::default_host().default_input_device().is_some()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Microphone recording running on its own thread; `cpal::Stream` never
/// leaves that thread.
pub struct Capture {
    stop: std_mpsc::Sender<()>,
    ended: Option<oneshot::Receiver<()>>,
    worker: thread::JoinHandle<SpeechResult<CapturedAudio>>,
}

impl Capture {
    /// Opens the default input device and blocks until it is recording.
    pub fn start(max_duration: Duration) -> SpeechResult<Self> {
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<SpeechResult<()>>(1);
        let (stop, stop_rx) = std_mpsc::channel::<()>();
        let (ended_tx, ended) = oneshot::channel();

        let worker = thread::Builder::new()
            .name("parley-speech-capture".to_string())
            .spawn(move || run_capture(max_duration, ready_tx, stop_rx, ended_tx))
            .ok()
            .context(CaptureThreadSnafu {
                stage: "capture-spawn",
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop,
                ended: Some(ended),
                worker,
            }),
            Ok(Err(error)) => {
                let _ = worker.join();
                Err(error)
            }
            Err(_) => CaptureThreadSnafu {
                stage: "capture-ready",
            }
            .fail(),
        }
    }

    /// Resolves once recording stops by itself: trailing silence after speech
    /// or the recording limit.
    pub fn ended(&mut self) -> oneshot::Receiver<()> {
        self.ended.take().unwrap_or_else(|| oneshot::channel().1)
    }

    /// Stops recording and returns everything captured so far.
    pub fn finish(self) -> SpeechResult<CapturedAudio> {
        let _ = self.stop.send(());
        match self.worker.join() {
            Ok(result) => result,
            Err(_) => CaptureThreadSnafu {
                stage: "capture-join",
            }
            .fail(),
        }
    }
}

fn run_capture(
    max_duration: Duration,
    ready: std_mpsc::SyncSender<SpeechResult<()>>,
    stop: std_mpsc::Receiver<()>,
    ended: oneshot::Sender<()>,
) -> SpeechResult<CapturedAudio> {
    let opened = open_input(max_duration);
    let (stream, buffer, sample_rate, channels) = match opened {
        Ok(opened) => opened,
        Err(error) => {
            let _ = ready.send(Err(error));
            return CaptureThreadSnafu {
                stage: "capture-open",
            }
            .fail();
        }
    };
    let _ = ready.send(Ok(()));

    let started = Instant::now();
    let mut utterance = UtteranceEnd::new(sample_rate, channels, TRAILING_SILENCE);
    let mut scanned = 0;
    loop {
        let remaining = max_duration.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            tracing::debug!("recording limit reached");
            break;
        }
        match stop.recv_timeout(remaining.min(POLL_INTERVAL)) {
            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }

        let finished = match buffer.lock() {
            Ok(samples) => {
                let finished = utterance.feed(&samples[scanned..]);
                scanned = samples.len();
                finished
            }
            Err(_) => false,
        };
        if finished {
            tracing::debug!("silence after speech, ending capture");
            break;
        }
    }
    drop(stream);
    let _ = ended.send(());

    let interleaved = match buffer.lock() {
        Ok(mut samples) => std::mem::take(&mut *samples),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };

    tracing::debug!(
        frames = interleaved.len() / channels.max(1),
        sample_rate,
        "microphone capture finished"
    );

    Ok(CapturedAudio {
        samples: downmix(&interleaved, channels),
        sample_rate,
    })
}

/// Detects the end of an utterance: speech followed by a stretch of quiet.
/// Leading silence never ends it.
#[derive(Debug)]
struct UtteranceEnd {
    frame_len: usize,
    silence_len: usize,
    frame_energy: f32,
    frame_fill: usize,
    heard_speech: bool,
    quiet: usize,
}

impl UtteranceEnd {
    fn new(sample_rate: u32, channels: usize, trailing: Duration) -> Self {
        let per_second = (sample_rate as usize).saturating_mul(channels.max(1));
        Self {
            // 20 ms frames.
            frame_len: (per_second / 50).max(1),
            silence_len: (per_second as f64 * trailing.as_secs_f64()) as usize,
            frame_energy: 0.0,
            frame_fill: 0,
            heard_speech: false,
            quiet: 0,
        }
    }

    /// Consumes newly captured samples and reports whether the utterance ended.
    fn feed(&mut self, samples: &[f32]) -> bool {
        for sample in samples {
            self.frame_energy += sample * sample;
            self.frame_fill += 1;
            if self.frame_fill < self.frame_len {
                continue;
            }

            let rms = (self.frame_energy / self.frame_len as f32).sqrt();
            if rms >= SPEECH_RMS {
                self.heard_speech = true;
                self.quiet = 0;
            } else if self.heard_speech {
                self.quiet += self.frame_len;
            }
            self.frame_energy = 0.0;
            self.frame_fill = 0;
        }
        self.heard_speech && self.quiet >= self.silence_len
    }
}

type OpenedInput = (cpal::Stream, Arc<Mutex<Vec<f32>>>, u32, usize);

fn open_input(max_duration: Duration) -> SpeechResult<OpenedInput> {
    let host = cpal::default_host();
    let device = host.default_input_device().context(UnsupportedSnafu {
        stage: "capture-default-device",
        reason: "no audio input device",
    })?;

    let config = device.default_input_config().context(InputConfigSnafu {
        stage: "capture-default-config",
    })?;

    let sample_rate = config.sample_rate().0;
    let channels = usize::from(config.channels()).max(1);
    tracing::info!(
        sample_rate,
        channels,
        format = ?config.sample_format(),
        "cpal input opened"
    );

    let capacity = (sample_rate as usize)
        .saturating_mul(channels)
        .saturating_mul(max_duration.as_secs().max(1) as usize);
    let buffer = Arc::new(Mutex::new(Vec::<f32>::with_capacity(capacity.min(1 << 24))));
    let err_fn = |error: cpal::StreamError| tracing::warn!(error = %error, "audio input stream error");
    let stream_config: cpal::StreamConfig = config.clone().into();

    macro_rules! build_stream {
        ($t:ty) => {{
            let sink = Arc::clone(&buffer);
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[$t], _: &cpal::InputCallbackInfo| {
                        append_samples(data, &sink, capacity)
                    },
                    err_fn,
                    None,
                )
                .context(BuildStreamSnafu {
                    stage: "capture-build-stream",
                })?
        }};
    }

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream!(f32),
        cpal::SampleFormat::F64 => build_stream!(f64),
        cpal::SampleFormat::I8 => build_stream!(i8),
        cpal::SampleFormat::I16 => build_stream!(i16),
        cpal::SampleFormat::I32 => build_stream!(i32),
        cpal::SampleFormat::U8 => build_stream!(u8),
        cpal::SampleFormat::U16 => build_stream!(u16),
        cpal::SampleFormat::U32 => build_stream!(u32),
        other => {
            return UnsupportedSampleFormatSnafu {
                stage: "capture-sample-format",
                format: format!("{other:?}"),
            }
            .fail();
        }
    };

    stream.play().context(PlayStreamSnafu {
        stage: "capture-play",
    })?;

    Ok((stream, buffer, sample_rate, channels))
}

fn append_samples<T>(data: &[T], sink: &Mutex<Vec<f32>>, capacity: usize)
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    let Ok(mut samples) = sink.lock() else {
        return;
    };
    let room = capacity.saturating_sub(samples.len());
    samples.extend(
        data.iter()
            .take(room)
            .map(|sample| <f32 as cpal::FromSample<T>>::from_sample_(*sample)),
    );
}
