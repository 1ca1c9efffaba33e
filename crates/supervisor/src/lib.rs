//! Startup ordering and restart policy for the chat bot.

pub mod error;
pub mod supervisor;

pub use {
    error::{Error, Result},
    supervisor::{Outcome, Supervisor, SupervisorState},
};
