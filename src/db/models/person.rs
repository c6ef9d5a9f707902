use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Role carried by every person; gates which workflow actions they may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "person_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    System,
    Qrp,
    IfdaUser,
    IfdaManager,
    Ceo,
    CompanyOther,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::System,
        Role::Qrp,
        Role::IfdaUser,
        Role::IfdaManager,
        Role::Ceo,
        Role::CompanyOther,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "SYSTEM",
            Role::Qrp => "QRP",
            Role::IfdaUser => "IFDAUSER",
            Role::IfdaManager => "IFDAMANAGER",
            Role::Ceo => "CEO",
            Role::CompanyOther => "COMPANYOTHER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Compact person reference embedded in history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSummary {
    pub id: i32,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonFilter {
    pub role: Option<Role>,
}
