use std::{
    num::NonZeroU32,
    time::{Duration, Instant},
};

use {
    futures::StreamExt,
    governor::{DefaultDirectRateLimiter, Quota, RateLimiter},
    tmibot_config::ChatConfig,
    tokio::{
        io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
        net::TcpStream,
    },
    tokio_util::{codec::FramedRead, sync::CancellationToken},
    tracing::{debug, info, trace, warn},
};

use crate::{
    Error, Result,
    codec::{ChatLineCodec, InboundLine},
    command::{Dispatcher, Flow},
    parser::{LineParser, PONG_LINE, ParsedEvent},
};

/// Longest inbound line accepted before it is discarded.
const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Per-connection settings derived from [`ChatConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub server_addr: String,
    /// Channel name without `#`.
    pub channel: String,
    pub bot_name: String,
    /// Minimum interval between two outbound chat messages.
    pub message_interval: Duration,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            server_addr: config.address(),
            channel: config.channel.trim_start_matches('#').to_string(),
            bot_name: config.bot_name.clone(),
            message_interval: config.message_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Reading,
    Closed,
}

/// Why [`Session::run`] returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An authorized shutdown command was received.
    Shutdown,
    /// The external stop signal fired.
    Cancelled,
}

/// One open connection to the chat server.
///
/// Owns the transport exclusively. Inbound lines are read without throttling;
/// outbound chat goes through [`Session::speak`], which holds a token bucket
/// allowing one message per configured interval.
pub struct Session<T> {
    reader: FramedRead<ReadHalf<T>, ChatLineCodec>,
    writer: WriteHalf<T>,
    settings: SessionSettings,
    parser: LineParser,
    limiter: DefaultDirectRateLimiter,
    started_at: Instant,
    state: SessionState,
}

impl Session<TcpStream> {
    /// Dial the chat server, retrying with exponential backoff up to
    /// `connect_retry.max_attempts` times.
    pub async fn connect(config: &ChatConfig, cancel: &CancellationToken) -> Result<Self> {
        let settings = SessionSettings::from_config(config);
        let retry = &config.connect_retry;
        let addr = settings.server_addr.clone();
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            info!(%addr, attempt, "connecting");
            let err = match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    info!(%addr, "connected");
                    return Self::new(stream, settings);
                },
                Err(e) => e,
            };

            if attempt >= max_attempts {
                return Err(Error::ConnectExhausted {
                    addr,
                    attempts: attempt,
                    source: err,
                });
            }
            let delay = retry.backoff(attempt);
            warn!(%addr, attempt, error = %err, ?delay, "failed to connect, retrying");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Session<T> {
    /// Wrap an already connected transport.
    pub fn new(transport: T, settings: SessionSettings) -> Result<Self> {
        let parser = LineParser::new().map_err(|e| Error::Pattern(e.to_string()))?;
        let quota = Quota::with_period(settings.message_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
        let (read, writer) = tokio::io::split(transport);

        Ok(Self {
            reader: FramedRead::new(read, ChatLineCodec::new(MAX_LINE_LENGTH)),
            writer,
            settings,
            parser,
            limiter: RateLimiter::direct(quota),
            started_at: Instant::now(),
            state: SessionState::Connected,
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Send the credential, nickname and join lines, in that order.
    ///
    /// Does not wait for the server to acknowledge; a failed join only shows
    /// up as missing channel traffic.
    pub async fn join_channel(&mut self, password: &str) -> Result<()> {
        info!(channel = %self.settings.channel, "joining");
        self.write_line(&format!("PASS {password}")).await?;
        self.write_line(&format!("NICK {}", self.settings.bot_name))
            .await?;
        self.write_line(&format!("JOIN #{}", self.settings.channel))
            .await?;
        info!(
            channel = %self.settings.channel,
            bot = %self.settings.bot_name,
            "joined channel"
        );
        Ok(())
    }

    /// Say `message` in the channel, waiting for the rate limiter if needed.
    pub async fn speak(&mut self, message: &str) -> Result<()> {
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }
        if self.state == SessionState::Closed {
            return Err(Error::NotConnected);
        }
        // One frame per call: embedded line breaks would smuggle extra commands.
        let message = message.replace(['\r', '\n'], " ");
        self.limiter.until_ready().await;
        self.write_line(&format!("PRIVMSG #{} {message}", self.settings.channel))
            .await
    }

    /// Read lines until shutdown, cancellation or a transport failure.
    ///
    /// The transport is closed before this returns, whatever the outcome.
    pub async fn run(
        &mut self,
        dispatcher: &Dispatcher,
        cancel: &CancellationToken,
    ) -> Result<StopReason> {
        let result = self.read_loop(dispatcher, cancel).await;
        self.disconnect().await;
        result
    }

    async fn read_loop(
        &mut self,
        dispatcher: &Dispatcher,
        cancel: &CancellationToken,
    ) -> Result<StopReason> {
        if self.state == SessionState::Closed {
            return Err(Error::NotConnected);
        }
        self.state = SessionState::Reading;
        info!(channel = %self.settings.channel, "watching channel");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StopReason::Cancelled),
                next = self.reader.next() => next,
            };
            let line = match next {
                Some(Ok(InboundLine::Text(line))) => line,
                Some(Ok(InboundLine::Overlong)) => {
                    warn!(max = MAX_LINE_LENGTH, "discarding overlong line");
                    continue;
                },
                Some(Ok(InboundLine::NotUtf8)) => {
                    warn!("discarding line that is not valid UTF-8");
                    continue;
                },
                Some(Err(e)) => return Err(Error::Transport(e)),
                None => return Err(Error::ConnectionClosed),
            };
            debug!(%line, "received");

            match self.parser.parse(&line) {
                ParsedEvent::Ping => {
                    self.write_line(PONG_LINE).await?;
                    trace!("answered keep-alive");
                },
                ParsedEvent::ChannelMessage(message) => {
                    debug!(
                        sender = %message.sender,
                        body = message.body.as_deref().unwrap_or_default(),
                        "channel message"
                    );
                    if dispatcher.dispatch(&message, self).await? == Flow::Stop {
                        return Ok(StopReason::Shutdown);
                    }
                },
                ParsedEvent::Unrecognized => {},
            }
        }
    }

    /// Close the transport and log the session uptime. Safe to call twice.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "error closing chat transport");
        }
        info!(
            addr = %self.settings.server_addr,
            uptime_secs = self.uptime().as_secs_f64(),
            "closed connection"
        );
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::NotConnected);
        }
        let frame = format!("{line}\r\n");
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl<T> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
