// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Credential chain owned exclusively by the Auth Lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hashed password plus the long-lived device-trust token, both of which
/// must survive process restarts or the user is forced through 2FA again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongLivedCredentials {
    pub hashed_password: Vec<u8>,
    pub machine_identity: Vec<u8>,
}

/// Password-equivalent token. Server lifetime is on the order of hours;
/// the client-side expiry attached to it is a hint, never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordEquivalentToken {
    pub opaque_token: Vec<u8>,
    pub client_side_expiry_hint: DateTime<Utc>,
}

/// Derived from the PET; server lifetime ~24h.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDelegateToken {
    pub opaque_token: Vec<u8>,
    pub client_side_expiry_hint: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub long_lived: LongLivedCredentials,
    pub pet: Option<PasswordEquivalentToken>,
    pub delegate: Option<ServiceDelegateToken>,
}

/// Auth Lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    Absent,
    AwaitingTwoFactor,
    Fresh,
    TrustLost,
}
