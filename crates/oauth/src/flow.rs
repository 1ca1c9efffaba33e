use {
    reqwest::{StatusCode, header::AUTHORIZATION},
    secrecy::{ExposeSecret, Secret},
    tmibot_config::AuthConfig,
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    Error, Result,
    state::AuthorizationState,
    types::{Credential, TokenResponse},
};

/// Builds the user-facing authorization URL for the authorization-code flow.
pub struct OAuthFlow {
    auth_url: String,
    client_id: String,
    scope: String,
}

impl OAuthFlow {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            auth_url: config.auth_url.clone(),
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
        }
    }

    /// Build the authorization URL carrying `state`.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &AuthorizationState,
    ) -> Result<String> {
        let mut url = Url::parse(&self.auth_url)
            .map_err(|source| Error::external("invalid auth_url", source))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri);
        if !self.scope.trim().is_empty() {
            url.query_pairs_mut().append_pair("scope", self.scope.trim());
        }
        url.query_pairs_mut().append_pair("state", state.as_str());
        Ok(url.to_string())
    }
}

/// Grant presented to the token endpoint.
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    ClientCredentials,
    AuthorizationCode {
        code: &'a str,
        redirect_uri: &'a str,
    },
}

impl Grant<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::AuthorizationCode { .. } => "authorization_code",
        }
    }
}

/// Talks to the provider's token and validation endpoints.
pub struct TokenClient {
    http: reqwest::Client,
    token_url: String,
    validate_url: String,
    client_id: String,
    client_secret: Option<Secret<String>>,
    grant_type: String,
}

impl TokenClient {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, config: &AuthConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            validate_url: config.validate_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            grant_type: config.grant_type.clone(),
        }
    }

    fn form(&self, grant: Grant<'_>) -> Vec<(&'static str, String)> {
        let mut form = vec![("client_id", self.client_id.clone())];
        match grant {
            Grant::ClientCredentials => {
                if let Some(secret) = &self.client_secret {
                    form.push(("client_secret", secret.expose_secret().clone()));
                }
                form.push(("grant_type", self.grant_type.clone()));
            },
            Grant::AuthorizationCode { code, redirect_uri } => {
                // Confidential clients must also authenticate here.
                if let Some(secret) = &self.client_secret {
                    form.push(("client_secret", secret.expose_secret().clone()));
                }
                form.push(("redirect_uri", redirect_uri.to_string()));
                form.push(("code", code.to_string()));
                form.push(("grant_type", "authorization_code".to_string()));
            },
        }
        form
    }

    /// POST the grant to the token endpoint and decode the credential.
    pub async fn exchange(&self, grant: Grant<'_>) -> Result<Credential> {
        debug!(token_url = %self.token_url, grant = grant.kind(), "requesting token");

        let resp = self
            .http
            .post(&self.token_url)
            .form(&self.form(grant))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "token endpoint rejected request");
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                reason: "non-success status".into(),
                body,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::TokenExchange {
                status: status.as_u16(),
                reason: format!("malformed token response: {e}"),
                body: body.clone(),
            })?;
        if token.access_token.is_empty() {
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                reason: "empty access_token".into(),
                body,
            });
        }

        let credential = Credential::from(token);
        debug!(
            token_type = %credential.token_type,
            expires_in = credential.expires_in_seconds,
            "token acquired"
        );
        Ok(credential)
    }

    /// Returns `true` only when the validation endpoint answers HTTP 200.
    pub async fn validate(&self, credential: &Credential) -> Result<bool> {
        let resp = self
            .http
            .get(&self.validate_url)
            .header(
                AUTHORIZATION,
                format!("OAuth {}", credential.access_token.expose_secret()),
            )
            .send()
            .await?;
        let valid = resp.status() == StatusCode::OK;
        debug!(status = resp.status().as_u16(), valid, "token validated");
        Ok(valid)
    }
}
