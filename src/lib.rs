//! Chat relay: forwards chat messages to a generative text provider over
//! HTTP, keeps per-session transcripts, and returns sanitised replies.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod subsystems;
