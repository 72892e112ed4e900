use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SupporterStatus {
    Online,
    Offline,
    Away,
}

impl fmt::Display for SupporterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupporterStatus::Online => write!(f, "online"),
            SupporterStatus::Offline => write!(f, "offline"),
            SupporterStatus::Away => write!(f, "away"),
        }
    }
}

impl FromStr for SupporterStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(SupporterStatus::Online),
            "offline" => Ok(SupporterStatus::Offline),
            "away" => Ok(SupporterStatus::Away),
            _ => Err(format!("Unknown supporter status: {}", s)),
        }
    }
}

/// Read-only view over `peer_supporters` joined with `users`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupporterProfile {
    pub supporter_id: i64,
    pub display_name: String,
    pub is_verified: bool,
    pub status: SupporterStatus,
}
