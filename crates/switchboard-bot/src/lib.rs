// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot side of the Switchboard relay protocol.
//!
//! A [`ConnectionMonitor`] keeps the bot registered with the relay and hands
//! each admitted chat event to an [`InboundHandler`] together with the
//! [`BotLink`] of the connection it arrived on. Handlers answer through a
//! [`ReplyDispatcher`], which takes care of stream ids and the terminal flag.

pub mod dispatcher;
pub mod echo;
pub mod event;
pub mod link;
pub mod monitor;
pub mod probe;
pub mod send;

pub use dispatcher::{IdleSignal, ReplyDispatcher};
pub use echo::EchoHandler;
pub use event::{Admission, InboundContext, InboundFilter};
pub use link::BotLink;
pub use monitor::{
    start_monitor, ConnectionMonitor, FixedInterval, InboundHandler, MonitorConfig,
    MonitorHandle, MonitorState, ReconnectStrategy,
};
pub use probe::{probe, ProbeResult};
pub use send::{send_image, send_message, SendResult};
