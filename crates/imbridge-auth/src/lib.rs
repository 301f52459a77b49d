// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Acquires and refreshes the credential chain: machine
//! identity, password-equivalent token, service delegate.

pub mod ciphersuite;
pub mod client;
pub mod error;
pub mod lifecycle;

pub use ciphersuite::BridgeCipherSuite;
pub use client::{AuthServiceClient, LoginOutcome};
pub use error::{AuthError, AuthResult};
pub use lifecycle::{refresh_interval, AuthLifecycle, CredentialSink, NoopCredentialSink};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use imbridge_common::{AuthState, PasswordEquivalentToken, ServiceDelegateToken};
    use opaque_ke::{ClientRegistration, ClientRegistrationFinishParameters, ServerLogin,
        ServerLoginStartParameters, ServerSetup, Identifiers, ServerRegistration};
    use rand::rngs::OsRng;

    use super::*;

    /// Drives a full OPAQUE exchange server-side so the fake client can
    /// hand back protocol-correct responses instead of canned bytes.
    struct FakeAuthService {
        setup: ServerSetup<BridgeCipherSuite>,
        password_file: ServerRegistration<BridgeCipherSuite>,
        two_factor_countdown: AtomicU32,
        reauth_count: AtomicU32,
        force_trust_lost_on_reauth: std::sync::atomic::AtomicBool,
    }

    impl FakeAuthService {
        fn new(password: &[u8], two_factor_countdown: u32) -> Self {
            let mut rng = OsRng;
            let setup = ServerSetup::<BridgeCipherSuite>::new(&mut rng);
            let reg_start = ClientRegistration::<BridgeCipherSuite>::start(&mut rng, password).unwrap();
            let reg_response =
                ServerRegistration::<BridgeCipherSuite>::start(&setup, reg_start.message, b"bridge-user")
                    .unwrap();
            let identifiers = Identifiers {
                client: Some(b"bridge-user"),
                server: None,
            };
            let reg_finish = reg_start
                .state
                .finish(
                    &mut rng,
                    password,
                    reg_response.message,
                    ClientRegistrationFinishParameters::new(identifiers, None),
                )
                .unwrap();
            let password_file = ServerRegistration::<BridgeCipherSuite>::finish(reg_finish.message);
            Self {
                setup,
                password_file,
                two_factor_countdown: AtomicU32::new(two_factor_countdown),
                reauth_count: AtomicU32::new(0),
                force_trust_lost_on_reauth: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn wants_two_factor(&self) -> bool {
            self.two_factor_countdown.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                if v == 0 { None } else { Some(v - 1) }
            }).is_ok()
        }
    }

    #[async_trait]
    impl AuthServiceClient for Arc<FakeAuthService> {
        async fn start_login(
            &self,
            _user_id: &str,
            request: opaque_ke::CredentialRequest<BridgeCipherSuite>,
        ) -> AuthResult<opaque_ke::CredentialResponse<BridgeCipherSuite>> {
            let mut rng = OsRng;
            let server_login = ServerLogin::<BridgeCipherSuite>::start(
                &mut rng,
                &self.setup,
                Some(self.password_file.clone()),
                request,
                b"bridge-user",
                ServerLoginStartParameters::default(),
            )
            .map_err(AuthError::from)?;
            Ok(server_login.message)
        }

        async fn finish_login(
            &self,
            _user_id: &str,
            _finalization: opaque_ke::CredentialFinalization<BridgeCipherSuite>,
        ) -> AuthResult<LoginOutcome> {
            if self.wants_two_factor() {
                return Ok(LoginOutcome::TwoFactorRequired);
            }
            Ok(LoginOutcome::Fresh {
                pet: fresh_pet(),
                machine_identity: b"machine-identity-v1".to_vec(),
            })
        }

        async fn submit_two_factor(&self, _user_id: &str, _code: &str) -> AuthResult<LoginOutcome> {
            Ok(LoginOutcome::Fresh {
                pet: fresh_pet(),
                machine_identity: b"machine-identity-v1".to_vec(),
            })
        }

        async fn reauthenticate(
            &self,
            _user_id: &str,
            _hashed_password: &[u8],
            _machine_identity: &[u8],
        ) -> AuthResult<LoginOutcome> {
            self.reauth_count.fetch_add(1, Ordering::SeqCst);
            if self.force_trust_lost_on_reauth.load(Ordering::SeqCst) {
                return Ok(LoginOutcome::TwoFactorRequired);
            }
            Ok(LoginOutcome::Fresh {
                pet: fresh_pet(),
                machine_identity: b"machine-identity-v1".to_vec(),
            })
        }

        async fn refresh_delegate(&self, _pet: &[u8]) -> AuthResult<ServiceDelegateToken> {
            Ok(ServiceDelegateToken {
                opaque_token: b"delegate-token".to_vec(),
                client_side_expiry_hint: Utc::now() + Duration::hours(2),
            })
        }
    }

    fn fresh_pet() -> PasswordEquivalentToken {
        PasswordEquivalentToken {
            opaque_token: b"pet-token".to_vec(),
            client_side_expiry_hint: Utc::now() + Duration::minutes(60),
        }
    }

    #[tokio::test]
    async fn login_without_two_factor_reaches_fresh() {
        let service = Arc::new(FakeAuthService::new(b"hashed-secret", 0));
        let lifecycle = AuthLifecycle::new(service, "user-1");
        lifecycle.begin_login(b"hashed-secret").await.unwrap();
        assert_eq!(lifecycle.state().await, AuthState::Fresh);
    }

    #[tokio::test]
    async fn login_with_two_factor_then_submit_reaches_fresh() {
        let service = Arc::new(FakeAuthService::new(b"hashed-secret", 1));
        let lifecycle = AuthLifecycle::new(service, "user-1");
        lifecycle.begin_login(b"hashed-secret").await.unwrap();
        assert_eq!(lifecycle.state().await, AuthState::AwaitingTwoFactor);
        lifecycle.submit_two_factor("123456").await.unwrap();
        assert_eq!(lifecycle.state().await, AuthState::Fresh);
    }

    #[tokio::test]
    async fn restored_pet_is_treated_as_expired() {
        let service = Arc::new(FakeAuthService::new(b"hashed-secret", 0));
        let lifecycle = AuthLifecycle::new(service, "user-1");
        let bundle = imbridge_common::CredentialBundle {
            long_lived: imbridge_common::LongLivedCredentials {
                hashed_password: b"hashed-secret".to_vec(),
                machine_identity: b"machine-identity-v1".to_vec(),
            },
            pet: Some(PasswordEquivalentToken {
                opaque_token: b"stale-pet".to_vec(),
                client_side_expiry_hint: Utc::now() + Duration::hours(10),
            }),
            delegate: None,
        };
        lifecycle.restore(bundle).await;
        let delegate = lifecycle.ensure_delegate().await.unwrap();
        assert_eq!(delegate.opaque_token, b"delegate-token");
    }

    #[tokio::test]
    async fn trust_lost_when_reauth_demands_two_factor() {
        let service = Arc::new(FakeAuthService::new(b"hashed-secret", 0));
        service
            .force_trust_lost_on_reauth
            .store(true, Ordering::SeqCst);
        let lifecycle = AuthLifecycle::new(service, "user-1");

        // A PET that already looks expired forces ensure_delegate onto the
        // re-SRP path, which this fixture answers with a 2FA demand.
        let bundle = imbridge_common::CredentialBundle {
            long_lived: imbridge_common::LongLivedCredentials {
                hashed_password: b"hashed-secret".to_vec(),
                machine_identity: b"machine-identity-v1".to_vec(),
            },
            pet: Some(PasswordEquivalentToken {
                opaque_token: b"pet".to_vec(),
                client_side_expiry_hint: Utc::now() - Duration::seconds(1),
            }),
            delegate: None,
        };
        lifecycle.restore(bundle).await;
        let err = lifecycle.ensure_delegate().await.unwrap_err();
        assert!(matches!(err, AuthError::TrustLost));
        assert_eq!(lifecycle.state().await, AuthState::TrustLost);
    }
}
