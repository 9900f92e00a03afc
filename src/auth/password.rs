use std::sync::Arc;

use crate::error::{AppError, AppResult};

/// One-way salted password hashing.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, bcrypt::BcryptError>;

    /// Malformed digests verify as false.
    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(plaintext, self.cost)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match bcrypt::verify(plaintext, digest) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!("Stored password hash could not be checked: {}", e);
                false
            }
        }
    }
}

/// Runs on the blocking pool; bcrypt at production cost takes hundreds of
/// milliseconds.
pub async fn hash_password(
    hasher: Arc<dyn CredentialHasher>,
    plaintext: String,
) -> AppResult<String> {
    let digest = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;
    Ok(digest)
}

pub async fn verify_password(
    hasher: Arc<dyn CredentialHasher>,
    plaintext: String,
    digest: String,
) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
        .await
        .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptHasher {
        BcryptHasher::new(4)
    }

    #[test]
    fn hash_verifies_against_same_password() {
        let h = hasher();
        let digest = h.hash("pw1").unwrap();
        assert_ne!(digest, "pw1");
        assert!(h.verify("pw1", &digest));
        assert!(!h.verify("pw2", &digest));
    }

    #[test]
    fn hashes_are_salted() {
        let h = hasher();
        let a = h.hash("same").unwrap();
        let b = h.hash("same").unwrap();
        assert_ne!(a, b);
        assert!(h.verify("same", &a));
        assert!(h.verify("same", &b));
    }

    #[test]
    fn malformed_digest_does_not_verify() {
        assert!(!hasher().verify("pw", "not-a-bcrypt-hash"));
    }

    struct PanickingHasher;

    impl CredentialHasher for PanickingHasher {
        fn hash(&self, _plaintext: &str) -> Result<String, bcrypt::BcryptError> {
            panic!("hash exploded")
        }

        fn verify(&self, _plaintext: &str, _digest: &str) -> bool {
            panic!("verify exploded")
        }
    }

    #[tokio::test]
    async fn blocking_helpers_hash_and_verify() {
        let h: Arc<dyn CredentialHasher> = Arc::new(hasher());
        let digest = hash_password(h.clone(), "pw".to_string()).await.unwrap();
        assert!(verify_password(h.clone(), "pw".to_string(), digest.clone())
            .await
            .unwrap());
        assert!(!verify_password(h, "nope".to_string(), digest).await.unwrap());
    }

    #[tokio::test]
    async fn blocking_helpers_turn_task_panics_into_errors() {
        let h: Arc<dyn CredentialHasher> = Arc::new(PanickingHasher);
        assert!(matches!(
            hash_password(h.clone(), "pw".to_string()).await,
            Err(AppError::Internal(_))
        ));
        assert!(matches!(
            verify_password(h, "pw".to_string(), "x".to_string()).await,
            Err(AppError::Internal(_))
        ));
    }
}
