//! Chat protocol session for the bot.
//!
//! Raw lines from the chat server go through [`LineParser`], channel messages
//! carrying a `!command` go through the [`Dispatcher`], and everything the bot
//! says goes through the rate-limited [`Session::speak`].

pub mod codec;
pub mod command;
pub mod error;
pub mod parser;
pub mod session;

pub use {
    codec::{ChatLineCodec, InboundLine},
    command::{CommandContext, CommandRegistry, Dispatcher, Flow, Handler, Reply},
    error::{Error, Result},
    parser::{BotCommand, ChannelMessage, LineParser, PING_LINE, PONG_LINE, ParsedEvent},
    session::{Session, SessionSettings, SessionState, StopReason},
};
