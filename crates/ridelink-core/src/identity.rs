//! Who the connection belongs to.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Account role. Some outbound messages are reserved for drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Requests and takes rides
    Rider,
    /// Accepts and drives trips
    Driver,
}

impl Role {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rider => "rider",
            Self::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rider" => Ok(Self::Rider),
            "driver" => Ok(Self::Driver),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identity recorded by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user id
    pub user_id: String,
    /// Role of the user
    pub role: Role,
}

impl Identity {
    /// Create an identity.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    /// Returns true for driver accounts.
    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_lowercase_only() {
        assert_eq!("driver".parse::<Role>(), Ok(Role::Driver));
        assert_eq!("rider".parse::<Role>(), Ok(Role::Rider));
        assert!("Driver".parse::<Role>().is_err());
    }

    #[test]
    fn driver_check() {
        assert!(Identity::new("u1", Role::Driver).is_driver());
        assert!(!Identity::new("u1", Role::Rider).is_driver());
    }
}
