//! Delivery-time estimation from postal codes.
//!
//! Admins maintain a table of digit prefixes such as `560`, `560*` (both
//! cover every code starting with 560) or `*` (everything). The most
//! specific matching pattern wins: a longer prefix beats a shorter one, and
//! a bare prefix beats a wildcard of the same length.

use std::fmt;

use serde::Serialize;

/// Window used when no pattern matches.
pub const DEFAULT_ESTIMATE: DeliveryEstimate = DeliveryEstimate {
    min_days: 5,
    max_days: 7,
};

const MAX_POSTAL_CODE_LENGTH: usize = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("postal code is required")]
    EmptyPostalCode,
    #[error("postal code may only contain letters and digits")]
    InvalidPostalCode,
    #[error("pattern must be digits, optionally ending with '*'")]
    InvalidPattern,
    #[error("delivery days must satisfy 1 <= min <= max")]
    InvalidDays,
}

/// A delivery window in business days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryEstimate {
    pub min_days: i32,
    pub max_days: i32,
}

impl fmt::Display for DeliveryEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = if self.max_days == 1 { "day" } else { "days" };
        if self.min_days == self.max_days {
            write!(f, "{} business {unit}", self.min_days)
        } else {
            write!(f, "{}-{} business {unit}", self.min_days, self.max_days)
        }
    }
}

/// One row of the delivery mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRule {
    pub pattern: String,
    pub min_days: i32,
    pub max_days: i32,
}

impl DeliveryRule {
    /// Build a rule from admin input, normalising the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] for malformed patterns or day ranges.
    pub fn new(pattern: &str, min_days: i32, max_days: i32) -> Result<Self, DeliveryError> {
        let pattern = normalize_pattern(pattern)?;
        if min_days < 1 || max_days < min_days {
            return Err(DeliveryError::InvalidDays);
        }
        Ok(Self {
            pattern,
            min_days,
            max_days,
        })
    }

    /// Specificity of this rule against `postal_code`, or `None` if it
    /// does not match. Higher is more specific.
    fn specificity(&self, postal_code: &str) -> Option<(usize, bool)> {
        match self.pattern.strip_suffix('*') {
            Some(prefix) => postal_code
                .starts_with(prefix)
                .then_some((prefix.len(), false)),
            None => postal_code
                .starts_with(self.pattern.as_str())
                .then_some((self.pattern.len(), true)),
        }
    }

    const fn estimate(&self) -> DeliveryEstimate {
        DeliveryEstimate {
            min_days: self.min_days,
            max_days: self.max_days,
        }
    }
}

/// Normalise a postal code: strip spaces and dashes, upper-case.
///
/// # Errors
///
/// Returns [`DeliveryError`] if the code is empty, too long, or has other characters.
pub fn normalize_postal_code(raw: &str) -> Result<String, DeliveryError> {
    let code: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase();
    if code.is_empty() {
        return Err(DeliveryError::EmptyPostalCode);
    }
    if code.len() > MAX_POSTAL_CODE_LENGTH || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DeliveryError::InvalidPostalCode);
    }
    Ok(code)
}

fn normalize_pattern(raw: &str) -> Result<String, DeliveryError> {
    let pattern = raw.trim().to_string();
    let literal = pattern.strip_suffix('*').unwrap_or(&pattern);
    if pattern.is_empty()
        || literal.len() > MAX_POSTAL_CODE_LENGTH
        || !literal.chars().all(|c| c.is_ascii_digit())
    {
        return Err(DeliveryError::InvalidPattern);
    }
    Ok(pattern)
}

/// Pick the delivery window for `postal_code`.
///
/// # Errors
///
/// Returns [`DeliveryError`] if the postal code is malformed.
pub fn estimate(
    postal_code: &str,
    rules: &[DeliveryRule],
    default: DeliveryEstimate,
) -> Result<DeliveryEstimate, DeliveryError> {
    let code = normalize_postal_code(postal_code)?;
    Ok(rules
        .iter()
        .filter_map(|rule| rule.specificity(&code).map(|score| (score, rule)))
        .max_by_key(|(score, _)| *score)
        .map_or(default, |(_, rule)| rule.estimate()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table() -> Vec<DeliveryRule> {
        vec![
            DeliveryRule::new("*", 6, 9).unwrap(),
            DeliveryRule::new("5*", 4, 6).unwrap(),
            DeliveryRule::new("560*", 2, 3).unwrap(),
            DeliveryRule::new("5600", 2, 2).unwrap(),
            DeliveryRule::new("110", 1, 2).unwrap(),
            DeliveryRule::new("560001", 1, 1).unwrap(),
        ]
    }

    #[test]
    fn test_longest_prefix_wins() {
        let rules = table();
        assert_eq!(
            estimate("561034", &rules, DEFAULT_ESTIMATE).unwrap(),
            DeliveryEstimate { min_days: 2, max_days: 3 }
        );
        assert_eq!(
            estimate("560099", &rules, DEFAULT_ESTIMATE).unwrap(),
            DeliveryEstimate { min_days: 2, max_days: 2 }
        );
        assert_eq!(
            estimate("500081", &rules, DEFAULT_ESTIMATE).unwrap(),
            DeliveryEstimate { min_days: 4, max_days: 6 }
        );
        assert_eq!(
            estimate("110001", &rules, DEFAULT_ESTIMATE).unwrap(),
            DeliveryEstimate { min_days: 1, max_days: 2 }
        );
        assert_eq!(
            estimate("700001", &rules, DEFAULT_ESTIMATE).unwrap(),
            DeliveryEstimate { min_days: 6, max_days: 9 }
        );
    }

    #[test]
    fn test_full_code_beats_wildcards() {
        assert_eq!(
            estimate("560 001", &table(), DEFAULT_ESTIMATE).unwrap(),
            DeliveryEstimate { min_days: 1, max_days: 1 }
        );
    }

    #[test]
    fn test_bare_prefix_beats_wildcard_of_same_length() {
        let rules = vec![
            DeliveryRule::new("560*", 3, 4).unwrap(),
            DeliveryRule::new("560", 1, 2).unwrap(),
        ];
        assert_eq!(
            estimate("560001", &rules, DEFAULT_ESTIMATE).unwrap(),
            DeliveryEstimate { min_days: 1, max_days: 2 }
        );
        assert_eq!(
            estimate("561001", &rules, DEFAULT_ESTIMATE).unwrap(),
            DEFAULT_ESTIMATE
        );
    }

    #[test]
    fn test_falls_back_to_default() {
        assert_eq!(estimate("999999", &[], DEFAULT_ESTIMATE).unwrap(), DEFAULT_ESTIMATE);
    }

    #[test]
    fn test_rejects_bad_postal_codes() {
        assert_eq!(estimate("  ", &[], DEFAULT_ESTIMATE), Err(DeliveryError::EmptyPostalCode));
        assert_eq!(
            estimate("56#001", &[], DEFAULT_ESTIMATE),
            Err(DeliveryError::InvalidPostalCode)
        );
    }

    #[test]
    fn test_rule_validation() {
        assert_eq!(DeliveryRule::new("56*0", 1, 2), Err(DeliveryError::InvalidPattern));
        assert_eq!(DeliveryRule::new("", 1, 2), Err(DeliveryError::InvalidPattern));
        assert_eq!(DeliveryRule::new("560*", 0, 2), Err(DeliveryError::InvalidDays));
        assert_eq!(DeliveryRule::new("560*", 4, 2), Err(DeliveryError::InvalidDays));
        assert_eq!(DeliveryRule::new("SW1*", 2, 4), Err(DeliveryError::InvalidPattern));
        assert_eq!(DeliveryRule::new("56a", 2, 4), Err(DeliveryError::InvalidPattern));
        assert_eq!(DeliveryRule::new(" 560* ", 2, 4).unwrap().pattern, "560*");
    }

    #[test]
    fn test_display() {
        assert_eq!(DEFAULT_ESTIMATE.to_string(), "5-7 business days");
        assert_eq!(
            DeliveryEstimate { min_days: 2, max_days: 2 }.to_string(),
            "2 business days"
        );
        assert_eq!(
            DeliveryEstimate { min_days: 1, max_days: 1 }.to_string(),
            "1 business day"
        );
    }
}
