use regex::Regex;

/// Keep-alive request sent by the chat server, compared verbatim.
pub const PING_LINE: &str = "PING :tmi.twitch.tv";

/// Reply to [`PING_LINE`].
pub const PONG_LINE: &str = "PONG :tmi.twitch.tv";

/// A `!command [argument]` embedded in a channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    pub name: String,
    pub argument: Option<String>,
}

/// Someone (possibly the bot itself) talked in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub sender: String,
    /// Channel segment of the line, without `#`. Not checked against the
    /// joined channel here.
    pub channel: String,
    pub body: Option<String>,
    pub command: Option<BotCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    Ping,
    ChannelMessage(ChannelMessage),
    Unrecognized,
}

/// Turns raw protocol lines into [`ParsedEvent`]s.
///
/// Owns its compiled patterns; build once and reuse. Parsing has no side
/// effects and never fails.
#[derive(Debug, Clone)]
pub struct LineParser {
    privmsg: Regex,
    command: Regex,
}

impl LineParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            privmsg: Regex::new(r"^:(\w+)!\w+@\S+ PRIVMSG #(\w+)(?: :(.*))?$")?,
            command: Regex::new(r"^!(\w+)(?:\s+(\w+))?")?,
        })
    }

    pub fn parse(&self, line: &str) -> ParsedEvent {
        if line == PING_LINE {
            return ParsedEvent::Ping;
        }
        let Some(caps) = self.privmsg.captures(line) else {
            return ParsedEvent::Unrecognized;
        };

        let body = caps.get(3).map(|m| m.as_str().to_string());
        let command = body.as_deref().and_then(|b| self.parse_command(b));
        ParsedEvent::ChannelMessage(ChannelMessage {
            sender: caps[1].to_string(),
            channel: caps[2].to_string(),
            body,
            command,
        })
    }

    /// Extract `!name [argument]` from a message body.
    pub fn parse_command(&self, body: &str) -> Option<BotCommand> {
        let caps = self.command.captures(body)?;
        Some(BotCommand {
            name: caps[1].to_string(),
            argument: caps.get(2).map(|m| m.as_str().to_string()),
        })
    }
}
