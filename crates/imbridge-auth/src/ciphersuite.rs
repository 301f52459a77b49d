// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use argon2::Argon2;
use opaque_ke::CipherSuite;

/// OPAQUE ciphersuite for the initial-login SRP-style handshake.
/// Argon2 as the key-stretching function, matching the server's
/// expected hardness for a password-derived secret.
pub struct BridgeCipherSuite;

impl CipherSuite for BridgeCipherSuite {
    type OprfCs = opaque_ke::Ristretto255;
    type KeGroup = opaque_ke::Ristretto255;
    type KeyExchange = opaque_ke::key_exchange::tripledh::TripleDh;

    type Ksf = Argon2<'static>;
}
