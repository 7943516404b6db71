use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::ErrorMessage;

/// Maximum allowed password length in characters
///
/// Argon2 is intentionally slow; an unbounded input lets a client burn CPU.
const MAX_PASSWORD_LENGTH: usize = 64;

/// Hash a password with Argon2id and a random salt
///
/// Output is a PHC string (`$argon2id$v=19$m=19456,t=2,p=1$<salt>$<hash>`),
/// which carries everything `compare` needs.
pub fn hash(password: impl Into<String>) -> Result<String, ErrorMessage> {
    let password = password.into();

    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }

    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ErrorMessage::HashingError)?
        .to_string();

    Ok(hashed_password)
}

/// Verify a password against a stored PHC hash (constant-time comparison)
///
/// # Returns
/// - `Ok(true)`: password matches
/// - `Ok(false)`: password doesn't match
/// - `Err(ErrorMessage)`: input rejected or stored hash is malformed
pub fn compare(password: &str, hashed_password: &str) -> Result<bool, ErrorMessage> {
    if password.is_empty() {
        return Err(ErrorMessage::EmptyPassword);
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH));
    }

    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|_| ErrorMessage::InvalidHashFormat)?;

    let password_matched = Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok();

    Ok(password_matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_compare() {
        let hashed = hash("correct horse").unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(compare("correct horse", &hashed).unwrap());
        assert!(!compare("battery staple", &hashed).unwrap());
    }

    #[test]
    fn rejects_empty_and_oversized_passwords() {
        assert_eq!(hash(""), Err(ErrorMessage::EmptyPassword));
        assert_eq!(
            hash("x".repeat(MAX_PASSWORD_LENGTH + 1)),
            Err(ErrorMessage::ExceededMaxPasswordLength(MAX_PASSWORD_LENGTH))
        );
    }

    #[test]
    fn malformed_hash_is_reported() {
        assert_eq!(
            compare("password", "not-a-phc-string"),
            Err(ErrorMessage::InvalidHashFormat)
        );
    }
}
