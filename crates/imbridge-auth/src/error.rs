// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("opaque protocol error: {0:?}")]
    Opaque(opaque_ke::errors::ProtocolError),
    #[error("server requires two-factor confirmation before login can complete")]
    TwoFactorRequired,
    #[error("trust has been revoked; user must re-authenticate with id and password")]
    TrustLost,
    #[error("transient auth-service error: {0}")]
    Transient(String),
}

impl From<opaque_ke::errors::ProtocolError> for AuthError {
    fn from(err: opaque_ke::errors::ProtocolError) -> Self {
        AuthError::Opaque(err)
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
