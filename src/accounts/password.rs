//! Password hashing with Argon2id.

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash as Argon2Hash, PasswordHasher as Argon2Hasher,
        PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::http::response::ApiError;

/// Argon2id hashing service.
///
/// Hashing and verification are CPU-bound, so both run on the blocking
/// thread pool rather than starving the async runtime.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// OWASP minimum recommended memory cost: 19 MiB.
    const MEMORY_COST: u32 = 19_456;
    const TIME_COST: u32 = 2;
    const PARALLELISM: u32 = 1;
    const OUTPUT_LEN: usize = 32;

    pub fn new() -> Self {
        let params = Params::new(
            Self::MEMORY_COST,
            Self::TIME_COST,
            Self::PARALLELISM,
            Some(Self::OUTPUT_LEN),
        )
        .expect("Invalid Argon2 parameters");

        Self { params }
    }

    /// Custom parameters, mainly for tests that cannot afford 19 MiB per hash.
    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        let params = Params::new(memory_cost, time_cost, parallelism, Some(Self::OUTPUT_LEN))
            .expect("Invalid Argon2 parameters");

        Self { params }
    }

    /// Hash a password into a PHC-format string.
    pub async fn hash(&self, password: String) -> Result<String, ApiError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password hash task panicked");
            ApiError::Internal
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "failed to hash password");
            ApiError::Internal
        })
    }

    /// Verify a password against a stored PHC string.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, ApiError> {
        tokio::task::spawn_blocking(move || {
            let parsed = match Argon2Hash::new(&hash) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::error!(error = %e, "stored password hash is malformed");
                    return Err(ApiError::Internal);
                }
            };
            // Parameters are carried inside the PHC string.
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password verify task panicked");
            ApiError::Internal
        })?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::with_params(4096, 1, 1)
    }

    #[tokio::test]
    async fn hash_and_verify_round_trip() {
        let hasher = fast_hasher();

        let hash = hasher.hash("secret123".into()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret123".into(), hash.clone()).await.unwrap());
        assert!(!hasher.verify("wrong".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        let hasher = fast_hasher();

        let h1 = hasher.hash("secret123".into()).await.unwrap();
        let h2 = hasher.hash("secret123".into()).await.unwrap();
        assert_ne!(h1, h2);
    }

    #[tokio::test]
    async fn malformed_stored_hash_is_internal_error() {
        let hasher = fast_hasher();

        let result = hasher.verify("secret123".into(), "not-a-phc-string".into()).await;
        assert!(matches!(result, Err(ApiError::Internal)));
    }
}
