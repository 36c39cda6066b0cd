use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use gpui::*;
use gpui_component::{Theme, ThemeMode};
use parley_llm::{DEFAULT_COMPLETION_MODEL, DEFAULT_ENDPOINT, DEFAULT_TRANSCRIPTION_MODEL, ProviderConfig};
use parley_storage::DEFAULT_MESSAGE_LIMIT;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_PROVIDER_ID: &str = "openai";
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SPEECH_MAX_SECONDS: u64 = 15;
pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SESSION_FILE_NAME: &str = "session.json";
pub const DATABASE_FILE_NAME: &str = "messages.db";
pub const ENV_PREFIX: &str = "PARLEY_";

/// Well-known variables honoured below the settings file.
const ENV_FALLBACKS: [(&str, &str); 4] = [
    ("OPENAI_API_KEY", "api_key"),
    ("OPENAI_BASE_URL", "endpoint"),
    ("OPENAI_MODEL", "model"),
    ("FIREBASE_API_KEY", "firebase_api_key"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default)]
    pub firebase_api_key: String,
    /// Google ID token used for provider sign-in; empty disables the button's backend.
    #[serde(default)]
    pub google_id_token: String,
    #[serde(default)]
    pub database_path: String,
    #[serde(default = "default_message_limit")]
    pub message_limit: u32,
    #[serde(default = "default_speech_max_seconds")]
    pub speech_max_seconds: u64,
    #[serde(
        default = "default_theme_mode",
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme_mode: ThemeMode,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            completion_timeout_secs: default_completion_timeout_secs(),
            transcription_model: default_transcription_model(),
            firebase_api_key: String::new(),
            google_id_token: String::new(),
            database_path: String::new(),
            message_limit: default_message_limit(),
            speech_max_seconds: default_speech_max_seconds(),
            theme_mode: default_theme_mode(),
        }
    }
}

impl ChatSettings {
    /// Completion endpoint config, or `None` while no API key is set.
    pub fn to_provider_config(&self) -> Option<ProviderConfig> {
        if self.api_key.trim().is_empty() {
            return None;
        }

        let timeout = Some(Duration::from_secs(self.completion_timeout_secs));
        Some(
            ProviderConfig::new(&self.provider_id, &self.api_key, &self.endpoint)
                .with_timeout(timeout),
        )
    }

    pub fn speech_max_duration(&self) -> Duration {
        Duration::from_secs(self.speech_max_seconds)
    }

    pub fn google_id_token(&self) -> Option<String> {
        Some(self.google_id_token.clone()).filter(|token| !token.is_empty())
    }

    /// Location of the sqlite file; falls back to the platform data directory.
    pub fn database_location(&self) -> String {
        if !self.database_path.is_empty() {
            return self.database_path.clone();
        }

        SettingsStore::default_data_dir()
            .join(DATABASE_FILE_NAME)
            .to_string_lossy()
            .into_owned()
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = non_blank_or(self.provider_id, default_provider_id);
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = non_blank_or(self.endpoint, default_endpoint);
        self.model = non_blank_or(self.model, default_model);
        self.transcription_model =
            non_blank_or(self.transcription_model, default_transcription_model);
        self.firebase_api_key = self.firebase_api_key.trim().to_string();
        self.google_id_token = self.google_id_token.trim().to_string();
        self.database_path = self.database_path.trim().to_string();
        if self.message_limit == 0 {
            self.message_limit = default_message_limit();
        }
        if self.speech_max_seconds == 0 {
            self.speech_max_seconds = default_speech_max_seconds();
        }
        self
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract::<Self>().map(Self::normalized)
    }

    pub fn apply_theme(&self, window: Option<&mut Window>, cx: &mut App) {
        Theme::change(self.theme_mode, window, cx);
    }
}

/// Settings resolved once at startup.
pub struct SettingsStore {
    settings: Arc<ChatSettings>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn session_path(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(|dir| dir.join(SESSION_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(SESSION_FILE_NAME))
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(settings),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        self.settings.clone()
    }

    /// Defaults, then well-known env fallbacks, then the file, then `PARLEY_*`.
    pub fn figment(path: &Path) -> Figment {
        let fallbacks = Env::raw()
            .only(&ENV_FALLBACKS.map(|(variable, _)| variable))
            .map(|key| {
                ENV_FALLBACKS
                    .iter()
                    .find(|(variable, _)| key.as_str().eq_ignore_ascii_case(variable))
                    .map(|(_, field)| (*field).into())
                    .unwrap_or_else(|| key.into())
            });

        Figment::from(Serialized::defaults(ChatSettings::default()))
            .merge(fallbacks)
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    fn load_from_disk(path: &Path) -> ChatSettings {
        if !path.exists() {
            tracing::info!(path = ?path, "settings file not found, using defaults and environment");
        }

        match ChatSettings::from_figment(Self::figment(path)) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "failed to parse settings, using defaults");
                ChatSettings::default()
            }
        }
    }
}

fn non_blank_or(value: String, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_provider_id() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_transcription_model() -> String {
    DEFAULT_TRANSCRIPTION_MODEL.to_string()
}

fn default_completion_timeout_secs() -> u64 {
    DEFAULT_COMPLETION_TIMEOUT_SECS
}

fn default_message_limit() -> u32 {
    DEFAULT_MESSAGE_LIMIT
}

fn default_speech_max_seconds() -> u64 {
    DEFAULT_SPEECH_MAX_SECONDS
}

fn default_theme_mode() -> ThemeMode {
    ThemeMode::Light
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_theme_mode(&value))
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}
