//! Agent runtime: the [`Harness`] tool-use loop and what surrounds it.
//!
//! - [`harness::Harness`] runs the conversation loop. Start here.
//! - [`config::HarnessConfig`] holds model, round cap, token and retry
//!   settings and the optional response cache.
//! - [`events`] defines [`EventHandler`] and [`HarnessEvent`] for observing
//!   the loop, with [`LoggingHandler`], [`CompositeEventHandler`] and
//!   [`FnEventHandler`].
//! - [`session`] saves and restores conversations as compact records.
//! - [`heavy`] fans a task out to three expert prompts and merges them.

pub mod config;
pub mod events;
pub mod execution;
pub mod harness;
pub mod heavy;
pub mod session;

pub use config::HarnessConfig;
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, HarnessEvent, HarnessResult,
    LoggingHandler, NoopHandler,
};
pub use harness::{Harness, ROUND_LIMIT_MESSAGE};
pub use heavy::{HeavyConfig, HeavyResult, run_heavy};
pub use session::{Conversation, SessionError, SessionStore};
