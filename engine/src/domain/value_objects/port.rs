//! Port Value Object

use crate::constants::port::{MAX_PORT, MIN_PORT};
use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A TCP port in the range 1-65535
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Validate a numeric port
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if !(MIN_PORT..=MAX_PORT).contains(&value) {
            return Err(DomainError::InvalidPort(format!(
                "{} is outside {}-{}",
                value, MIN_PORT, MAX_PORT
            )));
        }
        Ok(Self(value as u16))
    }

    /// Parse a port given as text
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let value = s
            .trim()
            .parse::<u32>()
            .map_err(|_| DomainError::InvalidPort(format!("'{}' is not a number", s)))?;
        Self::new(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u32> for Port {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Port {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(Port::new(0).is_err());
        assert_eq!(Port::new(1).unwrap().value(), 1);
        assert_eq!(Port::new(65535).unwrap().value(), 65535);
        assert!(Port::new(65536).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!(Port::parse("8080").unwrap().value(), 8080);
        assert_eq!(Port::parse(" 22 ").unwrap().value(), 22);
        assert!(matches!(Port::parse("http"), Err(DomainError::InvalidPort(_))));
        assert!(matches!(Port::parse("-1"), Err(DomainError::InvalidPort(_))));
        assert!(matches!(Port::parse(""), Err(DomainError::InvalidPort(_))));
    }

    #[test]
    fn test_deserialize_validates() {
        let port: Port = serde_json::from_str("443").unwrap();
        assert_eq!(port.value(), 443);
        assert!(serde_json::from_str::<Port>("0").is_err());
        assert!(serde_json::from_str::<Port>("70000").is_err());
    }
}
