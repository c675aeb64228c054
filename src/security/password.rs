use crate::error::app_error::AppError;
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString};
use std::sync::LazyLock;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Punctuation accepted as the required special character.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:'\",.<>/?";

/// A real Argon2 hash generated once at startup, used as a timing decoy
/// so that login requests for non-existent users take the same time as
/// requests for existing users.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-never-matches", Salt::from(&salt))
        .expect("failed to generate dummy hash")
        .to_string()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordViolation {
    TooShort,
    MissingUppercase,
    MissingDigit,
    MissingSpecialCharacter,
}

impl PasswordViolation {
    pub fn message(self) -> &'static str {
        match self {
            PasswordViolation::TooShort => "must be at least 8 characters long",
            PasswordViolation::MissingUppercase => "must contain an uppercase letter",
            PasswordViolation::MissingDigit => "must contain a digit",
            PasswordViolation::MissingSpecialCharacter => "must contain a special character",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PasswordCheck {
    pub is_valid: bool,
    pub errors: Vec<PasswordViolation>,
}

/// Check a password against every rule independently. All violations are
/// collected rather than stopping at the first one, so clients can show the
/// complete list.
pub fn validate_password(password: &str) -> PasswordCheck {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(PasswordViolation::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(PasswordViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(PasswordViolation::MissingDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        errors.push(PasswordViolation::MissingSpecialCharacter);
    }

    PasswordCheck {
        is_valid: errors.is_empty(),
        errors,
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_string = SaltString::generate(&mut OsRng);
    let salt = Salt::from(&salt_string);
    let hash = PasswordHash::generate(Argon2::default(), password.as_bytes(), salt)
        .map_err(|e| AppError::password_hash("Failed to hash password", e))?;

    Ok(hash.to_string())
}

pub fn verify_password(stored_hash: &str, password: &str) -> Result<(), AppError> {
    let hash = PasswordHash::new(stored_hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .map_err(|_| AppError::InvalidCredentials)?;

    Ok(())
}

/// Perform a throwaway Argon2 verification to equalize response timing
/// regardless of whether the target account exists. This prevents attackers
/// from distinguishing existing vs non-existing accounts by measuring
/// response latency.
pub fn dummy_verify(password: &str) {
    let hash = PasswordHash::new(&DUMMY_HASH).expect("invalid dummy hash");
    let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_password_violates_all_four_rules() {
        let check = validate_password("abc");
        assert!(!check.is_valid);
        assert_eq!(check.errors.len(), 4);
        assert!(check.errors.contains(&PasswordViolation::TooShort));
        assert!(check.errors.contains(&PasswordViolation::MissingUppercase));
        assert!(check.errors.contains(&PasswordViolation::MissingDigit));
        assert!(check.errors.contains(&PasswordViolation::MissingSpecialCharacter));
    }

    #[test]
    fn conforming_password_passes_with_no_errors() {
        let check = validate_password("Abcdef1!");
        assert!(check.is_valid);
        assert!(check.errors.is_empty());
    }

    #[test]
    fn each_rule_is_reported_independently() {
        // Long enough, has digit and special char, but no uppercase
        let check = validate_password("abcdef1!");
        assert_eq!(check.errors, vec![PasswordViolation::MissingUppercase]);

        // Missing only the digit
        let check = validate_password("Abcdefg!");
        assert_eq!(check.errors, vec![PasswordViolation::MissingDigit]);

        // Missing only the special character
        let check = validate_password("Abcdefg1");
        assert_eq!(check.errors, vec![PasswordViolation::MissingSpecialCharacter]);
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("Abcdef1!").unwrap();
        assert!(verify_password(&hash, "Abcdef1!").is_ok());
        assert!(verify_password(&hash, "Abcdef1?").is_err());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("Abcdef1!").unwrap();
        let b = hash_password("Abcdef1!").unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn valid_passwords_satisfy_every_rule(password in "[a-z]{5,12}[A-Z][0-9][!@#$%]") {
            let check = validate_password(&password);
            prop_assert!(check.is_valid);
            prop_assert!(check.errors.is_empty());
        }

        #[test]
        fn lowercase_only_passwords_never_pass(password in "[a-z]{8,20}") {
            let check = validate_password(&password);
            prop_assert!(!check.is_valid);
            prop_assert!(check.errors.contains(&PasswordViolation::MissingUppercase));
        }
    }
}
