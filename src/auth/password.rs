// Password hashing with Argon2id
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};
use crate::errors::{AppError, Result};

/// Check a candidate password against the configured minimum length
pub fn validate_password(password: &str, min_length: usize) -> Result<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if password.chars().count() < min_length {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            min_length
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id with OWASP recommended parameters
///
/// Parameters (OWASP 2023):
/// - Memory: 19 MiB (19456 KiB)
/// - Iterations: 2
/// - Parallelism: 1
/// - Output length: 32 bytes
pub fn hash_password(password: &str) -> Result<String> {
    let params = Params::new(19456, 2, 1, Some(32))
        .map_err(|e| AppError::Cryptographic(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Cryptographic(format!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a PHC hash in constant time.
///
/// The parameters are read from the hash itself, so hashes produced with
/// older parameters keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Cryptographic(format!("Failed to parse password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            tracing::error!("Password verification error: {}", e);
            Err(AppError::Cryptographic(format!("Password verification error: {}", e)))
        }
    }
}

/// Run the CPU-heavy hash on the blocking pool
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Run verification on the blocking pool
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}
