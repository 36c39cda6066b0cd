use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use snafu::{ResultExt, ensure};
use tokio::sync::watch;

use super::error::{
    AuthError, AuthResult, MalformedResponseSnafu, MissingApiKeySnafu, RejectedSnafu,
    TransportSnafu,
};
use super::session::{SessionPublisher, SessionState, User};
use super::stored::{SessionFile, StoredSession};
use super::token::{OAuthProvider, ProviderTokenSource, StaticTokenSource};
use super::{BoxFuture, IdentityProvider};

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_OAUTH_REQUEST_URI: &str = "http://localhost";

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub identity_base_url: String,
    pub token_base_url: String,
    pub session_path: Option<PathBuf>,
    pub oauth_request_uri: String,
}

impl FirebaseConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            token_base_url: DEFAULT_TOKEN_BASE_URL.to_string(),
            session_path: None,
            oauth_request_uri: DEFAULT_OAUTH_REQUEST_URI.to_string(),
        }
    }

    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = Some(path.into());
        self
    }

    pub fn with_base_urls(
        mut self,
        identity_base_url: impl Into<String>,
        token_base_url: impl Into<String>,
    ) -> Self {
        self.identity_base_url = identity_base_url.into();
        self.token_base_url = token_base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    user_id: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Maps a non-success response body to [`AuthError::Rejected`], keeping the
/// provider's message verbatim.
pub(crate) fn rejection_from_body(status: u16, body: &str, stage: &'static str) -> AuthError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("request failed with status {status}"));

    RejectedSnafu {
        stage,
        status,
        message,
    }
    .build()
}

/// Firebase Authentication over its REST endpoints.
pub struct FirebaseIdentity {
    config: FirebaseConfig,
    http: reqwest::Client,
    session: SessionPublisher,
    session_file: Option<SessionFile>,
    token_source: Arc<dyn ProviderTokenSource>,
}

impl FirebaseIdentity {
    pub fn new(config: FirebaseConfig) -> Self {
        Self::with_token_source(config, Arc::new(StaticTokenSource::default()))
    }

    pub fn with_token_source(
        config: FirebaseConfig,
        token_source: Arc<dyn ProviderTokenSource>,
    ) -> Self {
        let session_file = config.session_path.clone().map(SessionFile::new);
        Self {
            config,
            http: reqwest::Client::new(),
            session: SessionPublisher::new(),
            session_file,
            token_source,
        }
    }

    fn ensure_api_key(&self, stage: &'static str) -> AuthResult<()> {
        ensure!(!self.config.api_key.is_empty(), MissingApiKeySnafu { stage });
        Ok(())
    }

    fn identity_url(&self, action: &str) -> String {
        format!(
            "{}/accounts:{action}?key={}",
            self.config.identity_base_url.trim_end_matches('/'),
            self.config.api_key
        )
    }

    fn token_url(&self) -> String {
        format!(
            "{}/token?key={}",
            self.config.token_base_url.trim_end_matches('/'),
            self.config.api_key
        )
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        stage: &'static str,
    ) -> AuthResult<T> {
        let status = response.status();
        let body = response.text().await.context(TransportSnafu { stage })?;
        if !status.is_success() {
            return Err(rejection_from_body(status.as_u16(), &body, stage));
        }
        serde_json::from_str(&body).context(MalformedResponseSnafu { stage })
    }

    async fn post_account<B: Serialize>(
        &self,
        action: &str,
        body: &B,
        stage: &'static str,
    ) -> AuthResult<AccountResponse> {
        self.ensure_api_key(stage)?;
        let response = self
            .http
            .post(self.identity_url(action))
            .json(body)
            .send()
            .await
            .context(TransportSnafu { stage })?;
        Self::read_json(response, stage).await
    }

    fn persist(&self, stored: &StoredSession) {
        if let Some(file) = &self.session_file
            && let Err(error) = file.save(stored)
        {
            tracing::warn!(error = %error, "failed to persist session");
        }
    }

    fn forget(&self) {
        if let Some(file) = &self.session_file
            && let Err(error) = file.clear()
        {
            tracing::warn!(error = %error, "failed to remove persisted session");
        }
    }

    fn accept_account(&self, account: AccountResponse) -> User {
        let stored = StoredSession {
            uid: account.local_id,
            email: account.email,
            display_name: account.display_name,
            refresh_token: account.refresh_token,
        };
        self.persist(&stored);
        let user = stored.user();
        self.session.publish_signed_in(user.clone());
        user
    }

    async fn refresh(&self, stored: &StoredSession) -> AuthResult<RefreshResponse> {
        let stage = "session-refresh";
        self.ensure_api_key(stage)?;
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", stored.refresh_token.as_str()),
            ])
            .send()
            .await
            .context(TransportSnafu { stage })?;
        Self::read_json(response, stage).await
    }

    async fn restore_inner(&self) {
        let stored = match &self.session_file {
            Some(file) => match file.load() {
                Ok(stored) => stored,
                Err(error) => {
                    tracing::warn!(error = %error, "failed to load persisted session");
                    None
                }
            },
            None => None,
        };

        let Some(mut stored) = stored else {
            self.session.publish_signed_out();
            return;
        };

        match self.refresh(&stored).await {
            Ok(refreshed) => {
                if refreshed.user_id != stored.uid {
                    tracing::warn!(
                        stored = %stored.uid,
                        refreshed = %refreshed.user_id,
                        "refreshed session belongs to another user"
                    );
                    stored.uid = refreshed.user_id;
                }
                stored.refresh_token = refreshed.refresh_token;
                self.persist(&stored);
                self.session.publish_signed_in(stored.user());
            }
            Err(AuthError::Rejected { message, .. }) => {
                tracing::info!(reason = %message, "persisted session rejected");
                self.forget();
                self.session.publish_signed_out();
            }
            Err(error) => {
                tracing::warn!(error = %error, "session refresh unavailable, keeping stored profile");
                self.session.publish_signed_in(stored.user());
            }
        }
    }
}

impl IdentityProvider for FirebaseIdentity {
    fn session(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    fn restore<'a>(&'a self) -> BoxFuture<'a, ()> {
        Box::pin(self.restore_inner())
    }

    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, AuthResult<User>> {
        Box::pin(async move {
            let body = PasswordRequest {
                email: email.trim(),
                password,
                return_secure_token: true,
            };
            let account = self
                .post_account("signInWithPassword", &body, "sign-in-password")
                .await?;
            Ok(self.accept_account(account))
        })
    }

    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, AuthResult<User>> {
        Box::pin(async move {
            let body = PasswordRequest {
                email: email.trim(),
                password,
                return_secure_token: true,
            };
            let account = self.post_account("signUp", &body, "sign-up").await?;
            Ok(self.accept_account(account))
        })
    }

    fn sign_in_with_provider<'a>(
        &'a self,
        provider: OAuthProvider,
    ) -> BoxFuture<'a, AuthResult<User>> {
        Box::pin(async move {
            let id_token = self.token_source.id_token(provider).await?;
            let body = IdpRequest {
                post_body: format!(
                    "id_token={id_token}&providerId={}",
                    provider.provider_id()
                ),
                request_uri: &self.config.oauth_request_uri,
                return_idp_credential: true,
                return_secure_token: true,
            };
            let account = self
                .post_account("signInWithIdp", &body, "sign-in-provider")
                .await?;
            Ok(self.accept_account(account))
        })
    }

    fn sign_out<'a>(&'a self) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            if let Some(file) = &self.session_file {
                file.clear()?;
            }
            self.session.publish_signed_out();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_keeps_provider_message() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_NOT_FOUND","errors":[]}}"#;
        let error = rejection_from_body(400, body, "sign-in-password");

        assert!(matches!(error, AuthError::Rejected { status: 400, .. }));
        assert_eq!(error.to_string(), "EMAIL_NOT_FOUND");
    }

    #[test]
    fn rejection_without_json_body_reports_status() {
        let error = rejection_from_body(503, "<html>unavailable</html>", "sign-up");
        assert_eq!(error.to_string(), "request failed with status 503");
    }

    #[test]
    fn urls_include_action_and_key() {
        let identity = FirebaseIdentity::new(
            FirebaseConfig::new("KEY").with_base_urls("http://id.test/v1/", "http://tok.test/v1"),
        );
        assert_eq!(
            identity.identity_url("signUp"),
            "http://id.test/v1/accounts:signUp?key=KEY"
        );
        assert_eq!(identity.token_url(), "http://tok.test/v1/token?key=KEY");
    }

    #[tokio::test]
    async fn restore_without_saved_session_signs_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let identity = FirebaseIdentity::new(
            FirebaseConfig::new("KEY").with_session_path(dir.path().join("session.json")),
        );
        let receiver = identity.session();
        assert!(receiver.borrow().loading);

        identity.restore().await;
        assert_eq!(*receiver.borrow(), SessionState::signed_out());
    }

    #[tokio::test]
    async fn restore_keeps_profile_when_refresh_is_unreachable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        SessionFile::new(&path)
            .save(&StoredSession {
                uid: "u1".to_string(),
                email: Some("a@b.c".to_string()),
                display_name: None,
                refresh_token: "refresh".to_string(),
            })
            .expect("seed session");

        // No API key means the refresh cannot be attempted at all.
        let identity = FirebaseIdentity::new(FirebaseConfig::new("").with_session_path(&path));
        identity.restore().await;

        let state = identity.session().borrow().clone();
        assert!(!state.loading);
        assert_eq!(state.user.map(|user| user.uid), Some("u1".to_string()));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn sign_in_without_api_key_fails_fast() {
        let identity = FirebaseIdentity::new(FirebaseConfig::new("  "));
        let error = identity
            .sign_in("a@b.c", "secret")
            .await
            .expect_err("missing key");
        assert!(matches!(error, AuthError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn provider_sign_in_without_token_is_not_configured() {
        let identity = FirebaseIdentity::new(FirebaseConfig::new("KEY"));
        let error = identity
            .sign_in_with_provider(OAuthProvider::Google)
            .await
            .expect_err("no google token");
        assert!(matches!(error, AuthError::ProviderNotConfigured { .. }));
    }

    #[tokio::test]
    async fn sign_out_removes_saved_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        SessionFile::new(&path)
            .save(&StoredSession {
                uid: "u1".to_string(),
                email: None,
                display_name: None,
                refresh_token: "refresh".to_string(),
            })
            .expect("seed session");

        let identity = FirebaseIdentity::new(FirebaseConfig::new("KEY").with_session_path(&path));
        identity.sign_out().await.expect("sign out");

        assert!(!path.exists());
        assert_eq!(*identity.session().borrow(), SessionState::signed_out());
    }
}
