use std::future::Future;
use std::pin::Pin;

use tokio::sync::watch;

pub mod error;
pub mod firebase;
pub mod session;
pub mod stored;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use firebase::{FirebaseConfig, FirebaseIdentity};
pub use session::{SessionPublisher, SessionState, User};
pub use stored::{SessionFile, StoredSession};
pub use token::{OAuthProvider, ProviderTokenSource, StaticTokenSource};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identity session owner. Every successful sign-in, sign-up, restore or
/// sign-out is visible through [`IdentityProvider::session`].
pub trait IdentityProvider: Send + Sync {
    fn session(&self) -> watch::Receiver<SessionState>;

    /// Resolves the initial loading state from any persisted session.
    fn restore<'a>(&'a self) -> BoxFuture<'a, ()>;

    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, AuthResult<User>>;

    fn sign_up<'a>(&'a self, email: &'a str, password: &'a str) -> BoxFuture<'a, AuthResult<User>>;

    fn sign_in_with_provider<'a>(
        &'a self,
        provider: OAuthProvider,
    ) -> BoxFuture<'a, AuthResult<User>>;

    fn sign_out<'a>(&'a self) -> BoxFuture<'a, AuthResult<()>>;
}
