use std::path::PathBuf;

use snafu::Snafu;

/// Credential and session failures.
///
/// `Display` of [`AuthError::Rejected`] is the provider's own message so the
/// login view can show it to the user unchanged.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AuthError {
    #[snafu(display("{message}"))]
    Rejected {
        stage: &'static str,
        status: u16,
        message: String,
    },
    #[snafu(display("{provider} sign-in is not configured"))]
    ProviderNotConfigured {
        stage: &'static str,
        provider: &'static str,
    },
    #[snafu(display("identity API key is missing"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("identity request failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("identity response on `{stage}` could not be parsed: {source}"))]
    MalformedResponse {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to read session file {path:?}: {source}"))]
    ReadSession {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to write session file {path:?}: {source}"))]
    WriteSession {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to encode session file: {source}"))]
    EncodeSession {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type AuthResult<T> = Result<T, AuthError>;
