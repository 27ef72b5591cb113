//! `tl-domain`: shared types for the tunelink crates.
//!
//! Errors, configuration, structured trace events, node version
//! negotiation, and the track/filter value objects that flow between the
//! REST client, the event socket, and players.

pub mod config;
pub mod error;
pub mod filters;
pub mod trace;
pub mod track;
pub mod version;

/// Discord guild snowflake.
pub type GuildId = u64;
/// Discord channel snowflake.
pub type ChannelId = u64;
/// Discord user snowflake.
pub type UserId = u64;
