use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Role assigned to an actor by the authentication collaborator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "sysadmin", alias = "system_admin")]
    SystemAdministrator,
    #[serde(alias = "admin")]
    Administrator,
    /// Data-entry role restricted to a home facility.
    Encoder,
    /// Read-only oversight role.
    #[serde(alias = "read_only")]
    Auditor,
    #[serde(alias = "general_user")]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdministrator => "system_administrator",
            Role::Administrator => "administrator",
            Role::Encoder => "encoder",
            Role::Auditor => "auditor",
            Role::User => "user",
        }
    }

    /// Facility-restricted roles only see and touch records of their home facility.
    pub fn is_facility_restricted(&self) -> bool {
        matches!(self, Role::Encoder)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "system_administrator" | "system_admin" | "sysadmin" => Ok(Role::SystemAdministrator),
            "administrator" | "admin" => Ok(Role::Administrator),
            "encoder" => Ok(Role::Encoder),
            "auditor" | "read_only" => Ok(Role::Auditor),
            "user" | "general_user" => Ok(Role::User),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Administrator);
        assert_eq!("system-administrator".parse::<Role>().unwrap(), Role::SystemAdministrator);
        assert_eq!("read only".parse::<Role>().unwrap(), Role::Auditor);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn deserializes_store_spelling() {
        let role: Role = serde_json::from_str("\"sysadmin\"").unwrap();
        assert_eq!(role, Role::SystemAdministrator);
        assert_eq!(serde_json::to_string(&Role::Encoder).unwrap(), "\"encoder\"");
    }

    #[test]
    fn scope_flags() {
        assert!(Role::Encoder.is_facility_restricted());
        assert!(!Role::Administrator.is_facility_restricted());
    }
}
