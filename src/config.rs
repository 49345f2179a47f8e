//! Container configuration.

use crate::error::{Error, Result};

/// Default limit on container names, in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 64;

/// Default limit on prefix index keys, in bytes (sentinel excluded).
pub const DEFAULT_MAX_KEY_LEN: usize = 64;

/// Configuration shared by [`OrderedIndex`](crate::OrderedIndex) and
/// [`PrefixIndex`](crate::PrefixIndex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Longest accepted container name
    pub max_name_len: usize,
    /// Longest accepted prefix index key; unused by the ordered index
    pub max_key_len: usize,
    /// Capacity hint for link/node storage
    pub initial_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_key_len: DEFAULT_MAX_KEY_LEN,
            initial_capacity: 0,
        }
    }
}

impl Config {
    pub(crate) fn check_name(&self, name: &str) -> Result<()> {
        if name.len() > self.max_name_len {
            return Err(Error::NameTooLong {
                len: name.len(),
                max: self.max_name_len,
            });
        }
        Ok(())
    }

    pub(crate) fn check_key_len(&self, key: &[u8]) -> Result<()> {
        if key.len() > self.max_key_len {
            return Err(Error::KeyTooLong {
                len: key.len(),
                max: self.max_key_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_limit() {
        let config = Config::default();
        assert!(config.check_name("people").is_ok());
        assert!(config.check_name(&"x".repeat(64)).is_ok());
        assert_eq!(
            config.check_name(&"x".repeat(65)),
            Err(Error::NameTooLong { len: 65, max: 64 })
        );
    }

    #[test]
    fn test_key_limit() {
        let config = Config {
            max_key_len: 4,
            ..Config::default()
        };
        assert!(config.check_key_len(b"abcd").is_ok());
        assert!(config.check_key_len(b"").is_ok());
        assert_eq!(
            config.check_key_len(b"abcde"),
            Err(Error::KeyTooLong { len: 5, max: 4 })
        );
    }
}
