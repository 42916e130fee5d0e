//! Password strength rules.
//!
//! One rule set for every path that accepts a new password: self-service
//! change, admin-created accounts, and admin resets.

/// Characters accepted as "special" by the strength rules
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Outcome of checking a candidate password against the rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordStrength {
    pub long_enough: bool,
    pub has_uppercase: bool,
    pub has_lowercase: bool,
    pub has_digit: bool,
    pub has_special: bool,
}

impl PasswordStrength {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.long_enough
            && self.has_uppercase
            && self.has_lowercase
            && self.has_digit
            && self.has_special
    }

    /// Human-readable list of unmet requirements, for the error body
    #[must_use]
    pub fn failed_requirements(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.long_enough {
            failed.push("at least 8 characters");
        }
        if !self.has_uppercase {
            failed.push("an uppercase letter");
        }
        if !self.has_lowercase {
            failed.push("a lowercase letter");
        }
        if !self.has_digit {
            failed.push("a number");
        }
        if !self.has_special {
            failed.push("a special character");
        }
        failed
    }
}

/// Check a candidate password against the strength rules. Pure function,
/// no storage access; reuse checking lives with the password history.
#[must_use]
pub fn validate_strength(password: &str) -> PasswordStrength {
    PasswordStrength {
        long_enough: password.chars().count() >= MIN_PASSWORD_LENGTH,
        has_uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
        has_lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
        has_digit: password.chars().any(|c| c.is_ascii_digit()),
        has_special: password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password_passes() {
        let strength = validate_strength("LongEnough1!");
        assert!(strength.is_valid());
        assert!(strength.failed_requirements().is_empty());
    }

    #[test]
    fn test_too_short_fails_length_only() {
        let strength = validate_strength("Sh0rt!!");
        assert!(!strength.is_valid());
        assert!(!strength.long_enough);
        assert!(strength.has_uppercase);
        assert!(strength.has_lowercase);
        assert!(strength.has_digit);
        assert!(strength.has_special);
    }

    #[test]
    fn test_missing_uppercase_and_special() {
        let strength = validate_strength("longenough1");
        assert!(!strength.is_valid());
        assert!(!strength.has_uppercase);
        assert!(!strength.has_special);
        assert!(strength.long_enough);
        assert!(strength.has_lowercase);
        assert!(strength.has_digit);
        assert_eq!(
            strength.failed_requirements(),
            vec!["an uppercase letter", "a special character"]
        );
    }

    #[test]
    fn test_every_listed_special_character_counts() {
        for c in SPECIAL_CHARACTERS.chars() {
            let password = format!("Abcdefg1{c}");
            assert!(
                validate_strength(&password).is_valid(),
                "special character {c:?} not accepted"
            );
        }
    }

    #[test]
    fn test_unlisted_special_character_does_not_count() {
        let strength = validate_strength("Abcdefg1-");
        assert!(!strength.has_special);
        assert!(!strength.is_valid());
    }

    #[test]
    fn test_empty_password_fails_everything() {
        let strength = validate_strength("");
        assert!(!strength.long_enough);
        assert!(!strength.has_uppercase);
        assert!(!strength.has_lowercase);
        assert!(!strength.has_digit);
        assert!(!strength.has_special);
        assert_eq!(strength.failed_requirements().len(), 5);
    }
}
