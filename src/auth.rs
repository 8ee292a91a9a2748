//! Shared-secret tokens binding a role to an identifier.
//!
//! A token is the lowercase hex encoding of
//! `HMAC-SHA256(key = secret, message = "<role>|<id>")`. Every endpoint
//! derives its own token from the shared secret; the hub recomputes it
//! during the handshake and compares in constant time.
//!
//! # Example
//!
//! ```
//! use robot_relay::auth::TokenSigner;
//! use robot_relay::Role;
//!
//! let signer = TokenSigner::new("supersecret").unwrap();
//! let token = signer.sign(Role::Robot, "robot-001");
//! assert!(signer.verify(Role::Robot, "robot-001", &token));
//! assert!(!signer.verify(Role::Operator, "robot-001", &token));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};
use crate::identifiers::Role;

// ============================================================================
// Types
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// TokenSigner
// ============================================================================

/// Signs and verifies identity tokens with a shared secret.
///
/// Holds the keyed HMAC state, so each sign/verify only hashes the
/// `role|id` message. Cheap to clone.
#[derive(Clone)]
pub struct TokenSigner {
    keyed: HmacSha256,
}

impl TokenSigner {
    /// Creates a signer from the shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the secret is empty.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(Error::config("shared secret is empty"));
        }

        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::config(format!("invalid shared secret: {e}")))?;

        Ok(Self { keyed })
    }

    /// Computes the hex token for `role` and `id`.
    #[must_use]
    pub fn sign(&self, role: Role, id: &str) -> String {
        HEXLOWER.encode(&self.digest(role, id).finalize().into_bytes())
    }

    /// Checks a presented token in constant time.
    ///
    /// Only the exact lowercase hex token matches; other casings, invalid
    /// hex and wrong lengths never do.
    #[must_use]
    pub fn verify(&self, role: Role, id: &str, token: &str) -> bool {
        let Ok(presented) = HEXLOWER.decode(token.as_bytes()) else {
            return false;
        };

        self.digest(role, id).verify_slice(&presented).is_ok()
    }

    fn digest(&self, role: Role, id: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(role.as_str().as_bytes());
        mac.update(b"|");
        mac.update(id.as_bytes());
        mac
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("supersecret").expect("signer")
    }

    #[test]
    fn test_known_robot_token() {
        assert_eq!(
            signer().sign(Role::Robot, "robot-001"),
            "00ffe48a727caceaff810334c083e0d0e9cf694ffc84c82e8b0bba487ac02403"
        );
    }

    #[test]
    fn test_known_operator_token() {
        assert_eq!(
            signer().sign(Role::Operator, "ai-operator"),
            "2373f1fa5cbbb8b034e502242c59666cefed6d565ef42d689b40f29619514753"
        );
    }

    #[test]
    fn test_verify_accepts_own_token() {
        let signer = signer();
        let token = signer.sign(Role::Operator, "ai-operator");
        assert!(signer.verify(Role::Operator, "ai-operator", &token));
    }

    #[test]
    fn test_verify_rejects_other_casing() {
        let signer = signer();
        let token = signer.sign(Role::Robot, "robot-001");
        assert!(!signer.verify(Role::Robot, "robot-001", &token.to_uppercase()));

        let mixed: String = token
            .char_indices()
            .map(|(i, c)| if i % 2 == 0 { c.to_ascii_uppercase() } else { c })
            .collect();
        assert_ne!(mixed, token);
        assert!(!signer.verify(Role::Robot, "robot-001", &mixed));
    }

    #[test]
    fn test_verify_rejects_wrong_role_or_id() {
        let signer = signer();
        let token = signer.sign(Role::Robot, "R1");
        assert!(!signer.verify(Role::Operator, "R1", &token));
        assert!(!signer.verify(Role::Robot, "R2", &token));
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let other = TokenSigner::new("othersecret").expect("signer");
        let token = other.sign(Role::Robot, "R1");
        assert!(!signer().verify(Role::Robot, "R1", &token));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let signer = signer();
        assert!(!signer.verify(Role::Robot, "R1", ""));
        assert!(!signer.verify(Role::Robot, "R1", "not-hex"));
        assert!(!signer.verify(Role::Robot, "R1", "abcd"));
    }

    #[test]
    fn test_verify_rejects_truncated_token() {
        let signer = signer();
        let token = signer.sign(Role::Robot, "R1");
        assert!(!signer.verify(Role::Robot, "R1", &token[..62]));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let err = TokenSigner::new("").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", signer());
        assert!(!rendered.contains("supersecret"));
    }
}
