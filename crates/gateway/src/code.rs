//! Session code generation and matching.

use rand::Rng;

use pairlink_config::{MIN_CODE_BYTES, SessionConfig};

/// Produces session codes of the form `<prefix><hex suffix>`, e.g. `SCP-4F0A9C`.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    prefix: String,
    suffix_bytes: usize,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl CodeGenerator {
    /// `suffix_bytes` is raised to [`MIN_CODE_BYTES`] if smaller.
    pub fn new(prefix: impl Into<String>, suffix_bytes: usize) -> Self {
        Self {
            prefix: normalize_code(&prefix.into()),
            suffix_bytes: suffix_bytes.max(MIN_CODE_BYTES),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.code_prefix.clone(), config.effective_code_bytes())
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::rng();
        let mut code = String::with_capacity(self.prefix.len() + self.suffix_bytes * 2);
        code.push_str(&self.prefix);
        for _ in 0..self.suffix_bytes {
            let byte: u8 = rng.random();
            code.push_str(&format!("{byte:02X}"));
        }
        code
    }

    /// Generate a code guaranteed to differ from `previous`.
    pub fn regenerate(&self, previous: &str) -> String {
        loop {
            let code = self.generate();
            if !codes_match(&code, previous) {
                return code;
            }
        }
    }
}

/// Canonical form used for comparison: trimmed, ASCII upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Case-insensitive, whitespace-tolerant comparison of a candidate code
/// against the active one.
pub fn codes_match(candidate: &str, active: &str) -> bool {
    safe_equal(&normalize_code(candidate), &normalize_code(active))
}

/// Constant-time string comparison (prevents timing attacks).
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_code_shape() {
        let code = CodeGenerator::default().generate();
        let suffix = code.strip_prefix("SCP-").unwrap_or_default();
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }

    #[test]
    fn suffix_never_shorter_than_minimum() {
        let code = CodeGenerator::new("X-", 1).generate();
        assert_eq!(code.len(), 2 + MIN_CODE_BYTES * 2);
    }

    #[test]
    fn longer_suffix_from_config() {
        let config = SessionConfig {
            code_prefix: "room-".into(),
            code_bytes: 5,
            ..SessionConfig::default()
        };
        let code = CodeGenerator::from_config(&config).generate();
        assert!(code.starts_with("ROOM-"));
        assert_eq!(code.len(), 5 + 10);
    }

    #[test]
    fn regenerate_always_differs() {
        let generator = CodeGenerator::default();
        let previous = generator.generate();
        for _ in 0..64 {
            assert_ne!(generator.regenerate(&previous), previous);
        }
    }

    #[test]
    fn matching_ignores_case_and_surrounding_whitespace() {
        assert!(codes_match("  scp-a1b2c3\n", "SCP-A1B2C3"));
        assert!(!codes_match("SCP-A1B2C4", "SCP-A1B2C3"));
        assert!(!codes_match("WRONG", "SCP-A1B2C3"));
        assert!(!codes_match("", "SCP-A1B2C3"));
    }
}
