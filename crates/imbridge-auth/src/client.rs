// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Collaborator boundary: the external auth service that fronts the OPAQUE
//! handshake and mints PET / service-delegate tokens. Implemented by the
//! protocol client; a fake implementation backs the unit tests below.

use async_trait::async_trait;
use imbridge_common::{PasswordEquivalentToken, ServiceDelegateToken};
use opaque_ke::{CredentialFinalization, CredentialRequest, CredentialResponse};

use crate::ciphersuite::BridgeCipherSuite;
use crate::error::AuthResult;

/// Outcome of completing (or re-running) the OPAQUE handshake.
pub enum LoginOutcome {
    Fresh {
        pet: PasswordEquivalentToken,
        machine_identity: Vec<u8>,
    },
    TwoFactorRequired,
}

#[async_trait]
pub trait AuthServiceClient: Send + Sync {
    /// KE1: client sends its blinded credential request, server replies
    /// with KE2.
    async fn start_login(
        &self,
        user_id: &str,
        request: CredentialRequest<BridgeCipherSuite>,
    ) -> AuthResult<CredentialResponse<BridgeCipherSuite>>;

    /// KE3: client sends its finalization; server either completes the
    /// login or demands a second factor.
    async fn finish_login(
        &self,
        user_id: &str,
        finalization: CredentialFinalization<BridgeCipherSuite>,
    ) -> AuthResult<LoginOutcome>;

    async fn submit_two_factor(&self, user_id: &str, code: &str) -> AuthResult<LoginOutcome>;

    /// Full re-SRP using the stored hashed password and machine identity,
    /// without prompting the user.
    async fn reauthenticate(
        &self,
        user_id: &str,
        hashed_password: &[u8],
        machine_identity: &[u8],
    ) -> AuthResult<LoginOutcome>;

    /// Exchanges a believed-valid PET for a fresh service-delegate token.
    async fn refresh_delegate(&self, pet: &[u8]) -> AuthResult<ServiceDelegateToken>;
}
