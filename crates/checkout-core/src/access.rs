//! Member Access Grants
//!
//! A grant lets a buyer into the member area of a purchased product. At most one
//! grant exists per (buyer email, product); its credential is issued once and
//! never rotated by later approvals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Normalized form of an email used as the grant key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Freshly issued temporary credential. The plaintext only lives long enough
/// to be put into the welcome email.
#[derive(Clone, Debug)]
pub struct IssuedCredential {
    pub password: String,
    pub salt: String,
    pub hash: String,
}

impl IssuedCredential {
    /// Generate a random temporary password (formatted: xxxx-xxxx-xxxx)
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        let password = format!("{}-{}-{}", &raw[0..4], &raw[4..8], &raw[8..12]);
        let salt = Uuid::new_v4().simple().to_string();
        let hash = hash_credential(&salt, &password);
        Self { password, salt, hash }
    }
}

/// SHA-256 hex digest of `{salt}:{password}`
pub fn hash_credential(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Buyer access to a member-area product
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAccessGrant {
    /// Normalized buyer email
    pub email: String,
    pub product_id: String,
    pub credential_hash: String,
    pub salt: String,
    pub granted_at: DateTime<Utc>,

    /// Sale whose approval created the grant
    pub sale_id: Uuid,
}

impl MemberAccessGrant {
    pub fn new(email: &str, product_id: &str, sale_id: Uuid, credential: &IssuedCredential) -> Self {
        Self {
            email: normalize_email(email),
            product_id: product_id.to_string(),
            credential_hash: credential.hash.clone(),
            salt: credential.salt.clone(),
            granted_at: Utc::now(),
            sale_id,
        }
    }

    /// Grant key
    pub fn key(&self) -> (String, String) {
        (self.email.clone(), self.product_id.clone())
    }

    /// Check a password against the stored hash
    pub fn verify(&self, password: &str) -> bool {
        hash_credential(&self.salt, password) == self.credential_hash
    }
}
