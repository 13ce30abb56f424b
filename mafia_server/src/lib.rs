//! HTTP/WebSocket gateway for Mafia game sessions.
//!
//! Translates REST requests and WebSocket messages into session intents,
//! and pushes per-player views whenever a session changes.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
