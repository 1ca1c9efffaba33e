use {
    tmibot_chat::{CommandRegistry, Dispatcher, Session, StopReason},
    tmibot_config::BotConfig,
    tmibot_oauth::{Credential, TokenSource},
    tokio::sync::watch,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    FetchingToken,
    Connecting,
    Running,
}

/// How [`Supervisor::run`] ended when it did not hit a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The channel owner issued the shutdown command.
    Stopped,
    /// The external stop signal fired.
    Cancelled,
    /// Transient failures used up `max_restarts`.
    RestartsExhausted,
}

enum Acquired {
    Credential(Credential),
    Cancelled,
}

/// Drives token acquisition, connection, channel join and the read loop, and
/// restarts the session after transient failures.
pub struct Supervisor {
    config: BotConfig,
    tokens: TokenSource,
    commands: CommandRegistry,
    cancel: CancellationToken,
    state: watch::Sender<SupervisorState>,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        let tokens = TokenSource::from_config(&config.auth);
        Self {
            config,
            tokens,
            commands: CommandRegistry::builtin(),
            cancel: CancellationToken::new(),
            state: watch::Sender::new(SupervisorState::Idle),
        }
    }

    /// Token that stops the supervisor at the next line boundary when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SupervisorState) {
        self.state.send_replace(state);
    }

    /// Run until a clean stop, cancellation, exhausted restarts or a fatal
    /// error. Config and token errors are fatal; session errors are retried.
    pub async fn run(&self) -> Result<Outcome> {
        let result = self.supervise().await;
        self.set_state(SupervisorState::Idle);
        if let Err(e) = &result {
            error!(error = %e, "bot halted");
        }
        result
    }

    async fn supervise(&self) -> Result<Outcome> {
        for diagnostic in self.config.validate().into_result()? {
            warn!(%diagnostic, "config");
        }

        let mut credential = match self.acquire().await? {
            Acquired::Credential(c) => c,
            Acquired::Cancelled => return Ok(Outcome::Cancelled),
        };

        let chat = &self.config.chat;
        let dispatcher = Dispatcher::new(chat.owner(), self.commands.clone());
        let mut restarts: u32 = 0;
        let mut joined_before = false;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }

            // Never present a credential to a second join without re-checking it.
            if joined_before {
                match self.tokens.validate(&credential).await {
                    Ok(true) => {},
                    Ok(false) => {
                        warn!("token no longer valid, fetching a new one");
                        credential = match self.acquire().await? {
                            Acquired::Credential(c) => c,
                            Acquired::Cancelled => return Ok(Outcome::Cancelled),
                        };
                    },
                    Err(e) => {
                        warn!(error = %e, "token validation failed");
                        if !self.backoff(&mut restarts).await {
                            return Ok(self.give_up(restarts));
                        }
                        continue;
                    },
                }
            }

            self.set_state(SupervisorState::Connecting);
            let mut session = match Session::connect(chat, &self.cancel).await {
                Ok(session) => session,
                Err(tmibot_chat::Error::Cancelled) => return Ok(Outcome::Cancelled),
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "could not reach chat server");
                    if !self.backoff(&mut restarts).await {
                        return Ok(self.give_up(restarts));
                    }
                    continue;
                },
                Err(e) => return Err(e.into()),
            };

            joined_before = true;
            let result = match session.join_channel(&credential.irc_password()).await {
                Ok(()) => {
                    self.set_state(SupervisorState::Running);
                    // Only consecutive failures count against `max_restarts`.
                    restarts = 0;
                    session.run(&dispatcher, &self.cancel).await
                },
                Err(e) => {
                    session.disconnect().await;
                    Err(e)
                },
            };

            match result {
                Ok(StopReason::Shutdown) => {
                    info!("clean stop requested, not restarting");
                    return Ok(Outcome::Stopped);
                },
                Ok(StopReason::Cancelled) => return Ok(Outcome::Cancelled),
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "chat session ended unexpectedly");
                    if !self.backoff(&mut restarts).await {
                        return Ok(self.give_up(restarts));
                    }
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn acquire(&self) -> Result<Acquired> {
        self.set_state(SupervisorState::FetchingToken);
        match self.tokens.acquire(&self.cancel).await {
            Ok(credential) => {
                info!(
                    token_type = %credential.token_type,
                    expires_in = credential.expires_in_seconds,
                    "credential acquired"
                );
                Ok(Acquired::Credential(credential))
            },
            Err(tmibot_oauth::Error::Cancelled) => Ok(Acquired::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    /// Count a restart and wait the fixed backoff. Returns `false` when no
    /// further restart is allowed or the wait was cancelled.
    async fn backoff(&self, restarts: &mut u32) -> bool {
        *restarts += 1;
        if let Some(max) = self.config.supervisor.max_restarts
            && *restarts > max
        {
            return false;
        }
        let delay = self.config.supervisor.restart_backoff();
        info!(restart = *restarts, ?delay, "restarting chat session");
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    fn give_up(&self, restarts: u32) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        error!(restarts, "giving up after repeated session failures");
        Outcome::RestartsExhausted
    }
}
