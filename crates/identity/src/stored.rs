use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use super::error::{AuthResult, EncodeSessionSnafu, ReadSessionSnafu, WriteSessionSnafu};
use super::session::User;

/// Refresh session kept on disk between launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub refresh_token: String,
}

impl StoredSession {
    pub fn user(&self) -> User {
        User {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no session was saved or the file is unreadable JSON.
    pub fn load(&self) -> AuthResult<Option<StoredSession>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(source).context(ReadSessionSnafu {
                    stage: "session-file-read",
                    path: self.path.clone(),
                });
            }
        };

        match serde_json::from_str::<StoredSession>(&content) {
            Ok(session) => Ok(Some(session)),
            Err(error) => {
                tracing::warn!(path = ?self.path, error = %error, "ignoring corrupt session file");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &StoredSession) -> AuthResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(WriteSessionSnafu {
                stage: "session-file-create-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(session).context(EncodeSessionSnafu {
            stage: "session-file-encode",
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteSessionSnafu {
            stage: "session-file-write-temporary",
            path: temp_path.clone(),
        })?;
        std::fs::rename(&temp_path, &self.path).context(WriteSessionSnafu {
            stage: "session-file-rename",
            path: self.path.clone(),
        })?;

        Ok(())
    }

    pub fn clear(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(source).context(WriteSessionSnafu {
                stage: "session-file-remove",
                path: self.path.clone(),
            }),
        }
    }
}
