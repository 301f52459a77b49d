// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Auth Lifecycle state machine. Owns the credential
//! bundle exclusively and exposes a get-or-refresh operation for the
//! service-delegate token. Refreshes are serialized through a single
//! mutex: concurrent callers simply queue behind the in-flight refresh
//! rather than triggering their own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use imbridge_common::{AuthState, CredentialBundle, PasswordEquivalentToken};
use opaque_ke::ClientLogin;
use rand::rngs::OsRng;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ciphersuite::BridgeCipherSuite;
use crate::client::{AuthServiceClient, LoginOutcome};
use crate::error::{AuthError, AuthResult};

/// Persistence hook invoked after every successful credential refresh.
/// Implemented by the daemon's state-persistence layer.
#[async_trait]
pub trait CredentialSink: Send + Sync {
    async fn persist(&self, bundle: &CredentialBundle);
}

pub struct NoopCredentialSink;

#[async_trait]
impl CredentialSink for NoopCredentialSink {
    async fn persist(&self, _bundle: &CredentialBundle) {}
}

struct Inner {
    state: AuthState,
    bundle: Option<CredentialBundle>,
}

pub struct AuthLifecycle<C, S = NoopCredentialSink> {
    client: C,
    sink: S,
    user_id: String,
    inner: Mutex<Inner>,
}

impl<C: AuthServiceClient> AuthLifecycle<C, NoopCredentialSink> {
    pub fn new(client: C, user_id: impl Into<String>) -> Arc<Self> {
        Self::with_sink(client, NoopCredentialSink, user_id)
    }
}

impl<C: AuthServiceClient, S: CredentialSink> AuthLifecycle<C, S> {
    pub fn with_sink(client: C, sink: S, user_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client,
            sink,
            user_id: user_id.into(),
            inner: Mutex::new(Inner {
                state: AuthState::Absent,
                bundle: None,
            }),
        })
    }

    /// Restores a previously-persisted bundle. The restored PET's
    /// client-side expiry is never trusted: it is
    /// forced into the past so the first delegate request takes the
    /// refresh path unconditionally.
    pub async fn restore(self: &Arc<Self>, mut bundle: CredentialBundle) {
        if let Some(pet) = bundle.pet.as_mut() {
            pet.client_side_expiry_hint = Utc::now() - chrono::Duration::seconds(1);
        }
        let mut inner = self.inner.lock().await;
        inner.state = AuthState::Fresh;
        inner.bundle = Some(bundle);
    }

    pub async fn state(&self) -> AuthState {
        self.inner.lock().await.state
    }

    /// ABSENT → SRP handshake. `hashed_password` must
    /// already be the Argon2-stretched secret fed into the OPAQUE client.
    pub async fn begin_login(&self, hashed_password: &[u8]) -> AuthResult<()> {
        let mut inner = self.inner.lock().await;

        let mut client_rng = OsRng;
        let start_result = ClientLogin::<BridgeCipherSuite>::start(&mut client_rng, hashed_password)?;
        let server_message = self
            .client
            .start_login(&self.user_id, start_result.message)
            .await?;

        let identifiers = opaque_ke::Identifiers {
            client: Some(self.user_id.as_bytes()),
            server: None,
        };
        let finish_result = start_result
            .state
            .finish(
                hashed_password,
                server_message,
                opaque_ke::ClientLoginFinishParameters::new(None, identifiers, None),
            )
            .map_err(AuthError::from)?;

        let outcome = self
            .client
            .finish_login(&self.user_id, finish_result.message)
            .await?;

        self.apply_login_outcome(&mut inner, outcome, hashed_password.to_vec())
            .await
    }

    pub async fn submit_two_factor(&self, code: &str) -> AuthResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != AuthState::AwaitingTwoFactor {
            return Err(AuthError::Transient(
                "two-factor submission received outside AWAITING_2FA".to_string(),
            ));
        }
        let outcome = self.client.submit_two_factor(&self.user_id, code).await?;
        let hashed_password = inner
            .bundle
            .as_ref()
            .map(|b| b.long_lived.hashed_password.clone())
            .unwrap_or_default();
        self.apply_login_outcome(&mut inner, outcome, hashed_password)
            .await
    }

    async fn apply_login_outcome(
        &self,
        inner: &mut Inner,
        outcome: LoginOutcome,
        hashed_password: Vec<u8>,
    ) -> AuthResult<()> {
        match outcome {
            LoginOutcome::Fresh { pet, machine_identity } => {
                let bundle = CredentialBundle {
                    long_lived: imbridge_common::LongLivedCredentials {
                        hashed_password,
                        machine_identity,
                    },
                    pet: Some(pet),
                    delegate: None,
                };
                inner.state = AuthState::Fresh;
                inner.bundle = Some(bundle.clone());
                self.sink.persist(&bundle).await;
                Ok(())
            }
            LoginOutcome::TwoFactorRequired => {
                inner.state = AuthState::AwaitingTwoFactor;
                Ok(())
            }
        }
    }

    /// Get-or-refresh operation published to the protocol client.
    /// Treats the PET's client-side expiry as a hint: a near-expired
    /// or absent PET triggers re-SRP with the stored long-lived
    /// credentials before the delegate is refreshed.
    pub async fn ensure_delegate(&self) -> AuthResult<imbridge_common::ServiceDelegateToken> {
        let mut inner = self.inner.lock().await;

        // A still-fresh cached delegate stays in use even after trust is
        // lost; only once it too expires does TrustLost become a hard failure.
        if let Some(delegate) = self.delegate_if_fresh(&inner) {
            return Ok(delegate);
        }

        if inner.state == AuthState::TrustLost {
            return Err(AuthError::TrustLost);
        }

        let bundle = inner
            .bundle
            .clone()
            .ok_or_else(|| AuthError::Transient("no credential bundle available".to_string()))?;

        let pet = match self.pet_if_fresh(&bundle.pet) {
            Some(pet) => pet,
            None => self.reauthenticate(&mut inner, &bundle).await?,
        };

        self.refresh_delegate(&mut inner, &pet).await
    }

    /// Proactive refresh so the delegate
    /// refresh (~2 h) never discovers an expired PET mid-cascade.
    pub async fn proactive_pet_refresh(&self) -> AuthResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == AuthState::TrustLost {
            return Err(AuthError::TrustLost);
        }
        let bundle = inner
            .bundle
            .clone()
            .ok_or_else(|| AuthError::Transient("no credential bundle available".to_string()))?;
        self.reauthenticate(&mut inner, &bundle).await?;
        Ok(())
    }

    fn pet_if_fresh(&self, pet: &Option<PasswordEquivalentToken>) -> Option<PasswordEquivalentToken> {
        let pet = pet.as_ref()?;
        if pet.client_side_expiry_hint > Utc::now() {
            Some(pet.clone())
        } else {
            None
        }
    }

    fn delegate_if_fresh(&self, inner: &Inner) -> Option<imbridge_common::ServiceDelegateToken> {
        let delegate = inner.bundle.as_ref()?.delegate.as_ref()?;
        if delegate.client_side_expiry_hint > Utc::now() {
            Some(delegate.clone())
        } else {
            None
        }
    }

    async fn reauthenticate(
        &self,
        inner: &mut Inner,
        bundle: &CredentialBundle,
    ) -> AuthResult<PasswordEquivalentToken> {
        let outcome = self
            .client
            .reauthenticate(
                &self.user_id,
                &bundle.long_lived.hashed_password,
                &bundle.long_lived.machine_identity,
            )
            .await?;

        match outcome {
            LoginOutcome::Fresh { pet, machine_identity } => {
                let mut updated = bundle.clone();
                updated.long_lived.machine_identity = machine_identity;
                updated.pet = Some(pet.clone());
                inner.bundle = Some(updated.clone());
                inner.state = AuthState::Fresh;
                self.sink.persist(&updated).await;
                Ok(pet)
            }
            LoginOutcome::TwoFactorRequired => {
                warn!(user_id = %self.user_id, "re-SRP demanded two-factor; trust lost");
                inner.state = AuthState::TrustLost;
                Err(AuthError::TrustLost)
            }
        }
    }

    async fn refresh_delegate(
        &self,
        inner: &mut Inner,
        pet: &PasswordEquivalentToken,
    ) -> AuthResult<imbridge_common::ServiceDelegateToken> {
        let delegate = self.client.refresh_delegate(&pet.opaque_token).await?;
        if let Some(bundle) = inner.bundle.as_mut() {
            bundle.delegate = Some(delegate.clone());
            let snapshot = bundle.clone();
            self.sink.persist(&snapshot).await;
        }
        info!(user_id = %self.user_id, "service-delegate token refreshed");
        Ok(delegate)
    }
}

/// Gives the proactive-refresh timer in the daemon a type-erased handle
/// regardless of which `AuthServiceClient`/`CredentialSink` it was built
/// with.
pub fn refresh_interval(minutes: u64) -> Duration {
    Duration::from_secs(minutes * 60)
}
