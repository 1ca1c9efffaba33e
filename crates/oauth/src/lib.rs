//! OAuth2 token acquisition for the chat bot.
//!
//! Two strategies share one [`TokenClient`]: the client-credentials grant and
//! the authorization-code grant, which stands up a short-lived
//! [`CallbackServer`] to receive the browser redirect.

pub mod callback_server;
pub mod error;
pub mod flow;
pub mod state;
pub mod strategy;
pub mod types;

pub use {
    callback_server::CallbackServer,
    error::{Error, Result},
    flow::{Grant, OAuthFlow, TokenClient},
    state::AuthorizationState,
    strategy::{TokenAcquisition, TokenSource, UrlOpener},
    types::Credential,
};
