use super::BoxFuture;
use super::error::{AuthResult, ProviderNotConfiguredSnafu};

/// Federated identity providers accepted by the sign-in endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn provider_id(self) -> &'static str {
        match self {
            Self::Google => "google.com",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Google => "Google",
        }
    }
}

/// Supplies an ID token minted by the federated provider itself.
///
/// A desktop client cannot open the provider popup a browser would, so the
/// host decides where the token comes from.
pub trait ProviderTokenSource: Send + Sync {
    fn id_token<'a>(&'a self, provider: OAuthProvider) -> BoxFuture<'a, AuthResult<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokenSource {
    google_id_token: Option<String>,
}

impl StaticTokenSource {
    pub fn new(google_id_token: Option<String>) -> Self {
        Self {
            google_id_token: google_id_token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
        }
    }
}

impl ProviderTokenSource for StaticTokenSource {
    fn id_token<'a>(&'a self, provider: OAuthProvider) -> BoxFuture<'a, AuthResult<String>> {
        Box::pin(async move {
            match provider {
                OAuthProvider::Google => match &self.google_id_token {
                    Some(token) => Ok(token.clone()),
                    None => ProviderNotConfiguredSnafu {
                        stage: "provider-token",
                        provider: provider.label(),
                    }
                    .fail(),
                },
            }
        })
    }
}
