use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SpeechError {
    #[snafu(display("speech recognition is not supported: {reason}"))]
    Unsupported {
        stage: &'static str,
        reason: &'static str,
    },
    #[snafu(display("failed to query input config on `{stage}`: {source}"))]
    InputConfig {
        stage: &'static str,
        source: cpal::DefaultStreamConfigError,
    },
    #[snafu(display("failed to build input stream on `{stage}`: {source}"))]
    BuildStream {
        stage: &'static str,
        source: cpal::BuildStreamError,
    },
    #[snafu(display("failed to start input stream on `{stage}`: {source}"))]
    PlayStream {
        stage: &'static str,
        source: cpal::PlayStreamError,
    },
    #[snafu(display("input sample format {format} is not supported"))]
    UnsupportedSampleFormat { stage: &'static str, format: String },
    #[snafu(display("capture thread stopped unexpectedly on `{stage}`"))]
    CaptureThread { stage: &'static str },
    #[snafu(display("transcription failed: {source}"))]
    Transcription {
        stage: &'static str,
        source: parley_llm::CompletionError,
    },
}

pub type SpeechResult<T> = Result<T, SpeechError>;
