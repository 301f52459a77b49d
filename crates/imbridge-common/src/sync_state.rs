// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Chats,
    Messages,
    Attachments,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Chats => "chats",
            Zone::Messages => "messages",
            Zone::Attachments => "attachments",
        }
    }
}

/// Per (login, zone) continuation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub zone: Zone,
    pub continuation_token: Option<Vec<u8>>,
    pub last_success_timestamp: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_timestamp: DateTime<Utc>,
}
