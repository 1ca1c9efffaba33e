use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use {
    tmibot_config::{AuthConfig, GrantKind},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    Result,
    callback_server::CallbackServer,
    flow::{Grant, OAuthFlow, TokenClient},
    state::AuthorizationState,
    types::Credential,
};

/// Sends the user to the authorization page.
pub type UrlOpener = Arc<dyn Fn(&str) + Send + Sync>;

/// How a credential is obtained from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenAcquisition {
    /// Direct POST of client id and secret.
    ClientCredentials,
    /// Browser redirect to a local callback listener, then code exchange.
    AuthorizationCode {
        listen_url: String,
        listen_port: u16,
        callback_path: String,
        timeout: Duration,
    },
}

impl TokenAcquisition {
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        match config.grant_kind() {
            GrantKind::ClientCredentials => Self::ClientCredentials,
            GrantKind::AuthorizationCode => {
                let path = config.callback_path.trim_start_matches('/');
                Self::AuthorizationCode {
                    listen_url: config.listen_url.trim_end_matches('/').to_string(),
                    listen_port: config.listen_port,
                    callback_path: format!("/{path}"),
                    timeout: config.callback_timeout(),
                }
            },
        }
    }
}

/// Acquires and validates credentials using the configured strategy.
pub struct TokenSource {
    strategy: TokenAcquisition,
    flow: OAuthFlow,
    client: TokenClient,
    opener: UrlOpener,
}

impl TokenSource {
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            strategy: TokenAcquisition::from_config(config),
            flow: OAuthFlow::new(config),
            client: TokenClient::new(config),
            opener: Arc::new(open_in_browser),
        }
    }

    /// Replace the default browser launcher.
    #[must_use]
    pub fn with_opener(mut self, opener: UrlOpener) -> Self {
        self.opener = opener;
        self
    }

    /// Run the configured strategy to obtain a fresh credential.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Credential> {
        match &self.strategy {
            TokenAcquisition::ClientCredentials => {
                self.client.exchange(Grant::ClientCredentials).await
            },
            TokenAcquisition::AuthorizationCode {
                listen_url,
                listen_port,
                callback_path,
                timeout,
            } => {
                let bind = SocketAddr::from((Ipv4Addr::LOCALHOST, *listen_port));
                let state = AuthorizationState::generate();
                // Bind first: the redirect may arrive as soon as the browser opens.
                let server =
                    CallbackServer::start(bind, callback_path, state.clone(), *timeout).await?;
                let port = server.local_addr().port();
                let redirect_uri = format!("{listen_url}:{port}{callback_path}");
                let url = self.flow.authorization_url(&redirect_uri, &state)?;

                info!(port, "waiting for oauth callback");
                (self.opener)(&url);

                let code = server.wait_for_code(cancel).await?;
                self.client
                    .exchange(Grant::AuthorizationCode {
                        code: &code,
                        redirect_uri: &redirect_uri,
                    })
                    .await
            },
        }
    }

    pub async fn validate(&self, credential: &Credential) -> Result<bool> {
        self.client.validate(credential).await
    }
}

fn open_in_browser(url: &str) {
    if let Err(e) = open::that(url) {
        warn!(error = %e, "could not open browser");
    }
    info!(%url, "authorize the bot at this URL");
}
