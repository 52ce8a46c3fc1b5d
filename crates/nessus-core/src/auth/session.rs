use tracing::{debug, info, warn};

use super::{Credentials, Token, TokenCache};
use crate::api::{ApiClient, ApiError, Result, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, no token looked at yet
    Uninitialized,
    Authenticated,
    /// Explicit logout; the persisted token is left alone
    LoggedOut,
    /// Login did not yield a usable token
    Failed,
}

/// Where the held token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Held or persisted token that passed the liveness check
    Cached,
    /// Issued by a login during this process
    Fresh,
}

/// Keeps one valid token for a set of credentials.
///
/// The token itself lives on the [`ApiClient`] so every operation sees the
/// same one. A session is not meant to be shared between concurrent callers.
pub struct Session<T, C> {
    credentials: Credentials,
    cache: C,
    client: ApiClient<T>,
    state: SessionState,
    last_source: Option<TokenSource>,
    persistence_warning: Option<ApiError>,
}

impl<T: Transport, C: TokenCache> Session<T, C> {
    pub fn new(credentials: Credentials, transport: T, cache: C) -> Self {
        let client = ApiClient::new(transport, credentials.base_url());
        Self {
            credentials,
            cache,
            client,
            state: SessionState::Uninitialized,
            last_source: None,
            persistence_warning: None,
        }
    }

    /// Build a session and authenticate it
    pub async fn connect(credentials: Credentials, transport: T, cache: C) -> Result<Self> {
        let mut session = Self::new(credentials, transport, cache);
        session.authenticate().await?;
        Ok(session)
    }

    /// Reuse a held or persisted token if the server still accepts it,
    /// otherwise log in once and persist the new token.
    pub async fn authenticate(&mut self) -> Result<Token> {
        let candidate = self.client.clear_token().or_else(|| self.cache.load());

        if let Some(token) = candidate {
            match self.client.check_auth(&token).await {
                Ok(true) => {
                    debug!("Existing token still valid");
                    return Ok(self.accept(token, TokenSource::Cached));
                }
                Ok(false) => {
                    info!("Existing token rejected, logging in");
                }
                Err(e) => {
                    warn!(error = %e, "Could not validate existing token, logging in");
                }
            }
        }

        self.login_and_persist().await
    }

    /// Drop the current token and log in again, e.g. after
    /// [`ApiError::AuthorizationExpired`].
    pub async fn relogin(&mut self) -> Result<Token> {
        if let Some(token) = self.client.clear_token() {
            if let Err(e) = self.client.logout(&token).await {
                warn!(error = %e, "Logout of previous token failed");
            }
        }
        self.login_and_persist().await
    }

    /// Tell the server to end the session and forget the token.
    /// Does nothing when no token is held.
    pub async fn logout(&mut self) -> Result<()> {
        let Some(token) = self.client.clear_token() else {
            return Ok(());
        };
        self.state = SessionState::LoggedOut;
        self.last_source = None;
        self.client.logout(&token).await
    }

    pub fn current_token(&self) -> Result<&Token> {
        self.client.token()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated && self.client.has_token()
    }

    pub fn last_source(&self) -> Option<TokenSource> {
        self.last_source
    }

    /// Failure from the most recent attempt to persist a fresh token
    pub fn persistence_warning(&self) -> Option<&ApiError> {
        self.persistence_warning.as_ref()
    }

    /// Operations run through the client, which carries the session token
    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    async fn login_and_persist(&mut self) -> Result<Token> {
        let login = self
            .client
            .login(self.credentials.username(), self.credentials.password())
            .await;

        let token = match login {
            Ok(token) => token,
            Err(e) => {
                self.state = SessionState::Failed;
                self.last_source = None;
                return Err(e);
            }
        };

        self.persistence_warning = match self.cache.save(&token) {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "Token not persisted, session is valid for this process only");
                Some(e)
            }
        };

        Ok(self.accept(token, TokenSource::Fresh))
    }

    fn accept(&mut self, token: Token, source: TokenSource) -> Token {
        self.client.set_token(token.clone());
        self.state = SessionState::Authenticated;
        self.last_source = Some(source);
        token
    }
}
