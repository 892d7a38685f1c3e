// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events channel: a long-lived duplex WebSocket to the server with
//! heartbeat, bounded queues, and reconnect-with-backoff.

mod backoff;
mod channel;
mod message;

pub use backoff::Backoff;
pub use channel::{EventsChannel, EventsError, EVENTS_PATH};
pub use message::EventMessage;
