// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::portal::PortalId;

/// Suppresses resurrection of a portal from delayed cloud records whose
/// timestamp precedes deletion. Cleared only once a message
/// strictly later than `deleted_timestamp` arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionTombstone {
    pub portal_id: PortalId,
    pub deleted_timestamp: DateTime<Utc>,
    pub conversation_hash: String,
}
