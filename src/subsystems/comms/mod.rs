//! Comms subsystem: external I/O channels.
//!
//! The only channel is [`axum_channel::AxumChannel`], an HTTP front end to
//! the [`ChatRelay`](crate::subsystems::chat::ChatRelay). It implements
//! [`Component`](crate::subsystems::runtime::Component) so it is started
//! and shut down through [`run_components`](crate::subsystems::runtime::run_components).

pub mod axum_channel;

pub use axum_channel::{AxumChannel, build_router};
