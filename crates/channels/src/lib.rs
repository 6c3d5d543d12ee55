//! Chat transports and the compression bot.
//!
//! The bot is transport-agnostic: every channel yields `ChannelMessage`s and
//! accepts `OutboundMessage`s, and the runner wires them together.
//!
//! Available channels:
//! - **CLI**: interactive terminal chat (stdin/stdout, `/file <path>`)
//! - **Webhook**: inbound HTTP payloads with a per-chat reply outbox
//! - **Registry**: merges inbound streams and routes replies back

pub mod bot;
pub mod cli;
pub mod registry;
pub mod runner;
pub mod webhook;

pub use bot::{Admission, BotOutcome, CompressionBot, CompressionJob};
pub use cli::CliChannel;
pub use registry::ChannelRegistry;
pub use webhook::{WebhookChannel, WebhookConfig, sign_payload};
