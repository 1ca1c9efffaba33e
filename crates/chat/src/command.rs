use std::{collections::HashMap, time::Duration};

use {
    tokio::io::{AsyncRead, AsyncWrite},
    tracing::{debug, info},
};

use crate::{Error, Result, parser::ChannelMessage, session::Session};

/// What the read loop should do after a message was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Result of running a command handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nothing,
    Say(String),
    Shutdown,
}

/// Inputs available to a command handler.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub sender: &'a str,
    pub argument: Option<&'a str>,
    pub uptime: Duration,
}

pub type Handler = fn(&CommandContext<'_>) -> Reply;

#[derive(Clone, Copy)]
struct CommandSpec {
    /// Only the channel owner may run it.
    owner_only: bool,
    handler: Handler,
}

/// Static mapping from command name to handler.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The commands the bot ships with.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("tbdown", true, |_| Reply::Shutdown);
        registry.register("genprompt", false, |_| {
            Reply::Say("I would be generating a prompt right now".into())
        });
        registry.register("uptime", false, |ctx| {
            Reply::Say(format!("Live for {}", format_uptime(ctx.uptime)))
        });
        registry.register("echo", true, |ctx| match ctx.argument {
            Some(arg) => Reply::Say(arg.to_string()),
            None => Reply::Nothing,
        });
        registry
    }

    pub fn register(&mut self, name: &'static str, owner_only: bool, handler: Handler) {
        self.commands
            .insert(name, CommandSpec { owner_only, handler });
    }

}

/// Routes channel messages carrying a command to their handler.
pub struct Dispatcher {
    owner: String,
    registry: CommandRegistry,
}

impl Dispatcher {
    pub fn new(owner: impl Into<String>, registry: CommandRegistry) -> Self {
        Self {
            owner: owner.into(),
            registry,
        }
    }

    /// Exact, case-sensitive comparison with the channel owner.
    #[must_use]
    pub fn is_owner(&self, sender: &str) -> bool {
        sender == self.owner
    }

    /// Decide what a message asks for, without touching the session.
    #[must_use]
    pub fn resolve(&self, message: &ChannelMessage, uptime: Duration) -> Reply {
        let Some(command) = &message.command else {
            return Reply::Nothing;
        };
        let Some(entry) = self.registry.commands.get(command.name.as_str()) else {
            debug!(command = %command.name, "ignoring unknown command");
            return Reply::Nothing;
        };
        if entry.owner_only && !self.is_owner(&message.sender) {
            info!(
                command = %command.name,
                sender = %message.sender,
                "ignoring privileged command from non-owner"
            );
            return Reply::Nothing;
        }

        (entry.handler)(&CommandContext {
            sender: &message.sender,
            argument: command.argument.as_deref(),
            uptime,
        })
    }

    /// Run the command in `message`, if any, against `session`.
    ///
    /// Replies go through the session's rate-limited [`Session::speak`].
    pub async fn dispatch<T>(
        &self,
        message: &ChannelMessage,
        session: &mut Session<T>,
    ) -> Result<Flow>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        match self.resolve(message, session.uptime()) {
            Reply::Nothing => Ok(Flow::Continue),
            Reply::Say(text) => match session.speak(&text).await {
                Ok(()) | Err(Error::EmptyMessage) => Ok(Flow::Continue),
                Err(e) => Err(e),
            },
            Reply::Shutdown => {
                info!(sender = %message.sender, "shutdown command received");
                session.disconnect().await;
                Ok(Flow::Stop)
            },
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.registry.commands.keys().collect();
        names.sort();
        f.debug_struct("Dispatcher")
            .field("owner", &self.owner)
            .field("commands", &names)
            .finish()
    }
}

fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
