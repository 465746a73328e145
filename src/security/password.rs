//! Password hashing.

use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, password: &str, encoded: &str) -> bool;
}

/// `hex(salt)$hex(sha256(pepper || salt || password))`.
#[derive(Debug, Clone, Default)]
pub struct SaltedSha256 {
    pepper: String,
}

impl SaltedSha256 {
    pub fn new(pepper: impl Into<String>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    fn digest(&self, salt: &[u8], password: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper.as_bytes());
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().to_vec()
    }
}

impl PasswordHasher for SaltedSha256 {
    fn hash(&self, password: &str) -> String {
        let salt: [u8; SALT_LEN] = rand::random();
        format!("{}${}", hex::encode(salt), hex::encode(self.digest(&salt, password)))
    }

    fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some((salt, expected)) = encoded.split_once('$') else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
            return false;
        };
        let actual = self.digest(&salt, password);
        actual.len() == expected.len()
            && actual
                .iter()
                .zip(&expected)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}
