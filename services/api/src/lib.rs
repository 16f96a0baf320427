//! Colloquy API Library Crate
//!
//! Configuration, the HTTP surface that shows a running conversation, the
//! background scenario runner and the text-to-speech collaborator. The
//! `colloquy` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod runner;
pub mod state;
pub mod tts;
