use crate::services::states::config::PasswordValidationConfig;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome per criterion, keyed by the name shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PasswordValidation(pub BTreeMap<&'static str, bool>);

impl PasswordValidation {
    pub fn is_valid(&self) -> bool {
        self.0.values().all(|&ok| ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordValidator {
    characters: u32,
    upper: u32,
    lower: u32,
    numbers: u32,
    special: u32,
}

impl PasswordValidator {
    pub fn from_config(cfg: &PasswordValidationConfig) -> Self {
        if !cfg.enabled {
            return Self {
                characters: 0,
                upper: 0,
                lower: 0,
                numbers: 0,
                special: 0,
            };
        }
        Self {
            characters: cfg.min_length,
            upper: cfg.upper,
            lower: cfg.lower,
            numbers: cfg.number,
            special: cfg.special,
        }
    }

    pub fn validate(&self, password: &str) -> PasswordValidation {
        let (mut characters, mut upper, mut lower, mut numbers, mut special) = (0, 0, 0, 0, 0);
        for c in password.chars() {
            characters += 1;
            if c.is_uppercase() {
                upper += 1;
            } else if c.is_lowercase() {
                lower += 1;
            } else if c.is_numeric() {
                numbers += 1;
            } else {
                special += 1;
            }
        }
        PasswordValidation(BTreeMap::from([
            ("characters", characters >= self.characters),
            ("uppercase characters", upper >= self.upper),
            ("lowercase characters", lower >= self.lower),
            ("numbers", numbers >= self.numbers),
            ("special characters", special >= self.special),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> PasswordValidator {
        PasswordValidator::from_config(&PasswordValidationConfig {
            enabled: true,
            min_length: 8,
            upper: 1,
            lower: 1,
            number: 1,
            special: 1,
        })
    }

    #[test]
    fn reports_each_criterion() {
        let v = strict().validate("abcdefg");
        assert!(!v.is_valid());
        assert!(!v.0["characters"]);
        assert!(v.0["lowercase characters"]);
        assert!(!v.0["uppercase characters"]);
        assert!(strict().validate("Abcdef1!").is_valid());
    }

    #[test]
    fn disabled_accepts_anything() {
        let v = PasswordValidator::from_config(&PasswordValidationConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(v.validate("").is_valid());
    }
}
