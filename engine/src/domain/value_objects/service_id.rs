//! ServiceId Value Object

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a service definition, assigned by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(i64);

impl ServiceId {
    /// Placeholder id of a definition the repository has not stored yet
    pub const UNASSIGNED: ServiceId = ServiceId(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for ServiceId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ServiceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .ok()
            .filter(|v| *v > 0)
            .map(Self)
            .ok_or_else(|| format!("Invalid service id: '{}'. Expected a positive integer", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("42".parse::<ServiceId>().unwrap(), ServiceId::new(42));
        assert_eq!(" 7 ".parse::<ServiceId>().unwrap(), ServiceId::new(7));
        assert!("0".parse::<ServiceId>().is_err());
        assert!("-3".parse::<ServiceId>().is_err());
        assert!("web".parse::<ServiceId>().is_err());
    }

    #[test]
    fn test_unassigned() {
        assert!(!ServiceId::UNASSIGNED.is_assigned());
        assert!(ServiceId::new(1).is_assigned());
    }
}
