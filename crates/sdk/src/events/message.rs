// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event frame: `{id, type, payload}` JSON text frames.

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One message on the events channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: i32,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventMessage {
    /// New message with a random id.
    pub fn new(msg_type: i32, payload: serde_json::Value) -> Self {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self { id, msg_type, payload }
    }
}
