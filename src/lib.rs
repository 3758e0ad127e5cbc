//! obs-launcherd - WebSocket launcher service for OBS Studio.
//!
//! A small control-plane daemon: each WebSocket client gets a session, and
//! each session may launch and supervise at most one OBS Studio process.
//! The process is terminated when the session's connection goes away.

pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod supervisor;
