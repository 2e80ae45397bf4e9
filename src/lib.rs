//! circlecast - turn short videos into round video notes
//!
//! This library crate exposes the bot's building blocks for the binary and
//! for integration testing.

pub mod bot;
pub mod config;
pub mod pipeline;
pub mod telegram;
