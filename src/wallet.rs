//! Wallet-side helpers: turning a password into the secret the node expects.

use crate::crypto::{derive_address, sha256_hex};

/// The secret sent to the node for a given password.
pub fn secret_from_password(password: &str) -> String {
    sha256_hex(password.as_bytes())
}

/// A password-derived wallet. Holds no state beyond the derived secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    secret: String,
}

impl Wallet {
    pub fn from_password(password: &str) -> Self {
        Self {
            secret: secret_from_password(password),
        }
    }

    /// Secret handed to `POST /transaction` as `pkey`.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn address(&self) -> String {
        derive_address(&self.secret)
    }
}
