// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Portal identity grammar.
//!
//! A portal is the sink-side conversation aggregate. Its id string is one of:
//! `tel:+<digits>`, `mailto:<lowercased-address>` or `gid:<lowercase-uuid>`.
//! Consumers rely on these prefixes for group/DM discrimination, so the
//! grammar here must never change shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortalId {
    /// `tel:+<digits>` or `mailto:<lower>`.
    Dm(String),
    /// `gid:<lower-uuid>`.
    Group(Uuid),
}

impl PortalId {
    pub fn dm_phone(e164: impl Into<String>) -> Self {
        PortalId::Dm(e164.into())
    }

    pub fn dm_email(lower_email: impl Into<String>) -> Self {
        PortalId::Dm(lower_email.into())
    }

    pub fn group(group_id: Uuid) -> Self {
        PortalId::Group(group_id)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, PortalId::Group(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PortalIdError {
    #[error("portal id has no recognized prefix: {0:?}")]
    UnknownPrefix(String),
    #[error("group portal id is not a valid uuid: {0:?}")]
    InvalidUuid(String),
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalId::Dm(uri) => write!(f, "{uri}"),
            PortalId::Group(uuid) => write!(f, "gid:{}", uuid.hyphenated()),
        }
    }
}

impl FromStr for PortalId {
    type Err = PortalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("gid:") {
            let uuid = Uuid::parse_str(rest)
                .map_err(|_| PortalIdError::InvalidUuid(rest.to_string()))?;
            return Ok(PortalId::Group(uuid));
        }
        if s.starts_with("tel:") || s.starts_with("mailto:") {
            return Ok(PortalId::Dm(s.to_string()));
        }
        Err(PortalIdError::UnknownPrefix(s.to_string()))
    }
}

impl TryFrom<String> for PortalId {
    type Error = PortalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortalId> for String {
    fn from(value: PortalId) -> Self {
        value.to_string()
    }
}
