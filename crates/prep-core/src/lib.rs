//! Core prep library (config, session, chat streaming, payloads, quiz).

pub mod api;
pub mod chat;
pub mod config;
pub mod logging;
pub mod payload;
pub mod quiz;
pub mod session;
pub mod stream;
