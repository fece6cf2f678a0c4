use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Self-declared gender, used by the matchmaking priority policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(format!("Invalid gender: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// The gender preferred by the partner selection policy
    pub fn opposite(&self) -> Gender {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

/// Session role of a user; exactly one holds at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Onboarding,
    Idle,
    Searching,
    Chatting,
}

impl UserStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "onboarding" => Ok(UserStatus::Onboarding),
            "idle" => Ok(UserStatus::Idle),
            "searching" => Ok(UserStatus::Searching),
            "chatting" => Ok(UserStatus::Chatting),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Onboarding => "onboarding",
            UserStatus::Idle => "idle",
            UserStatus::Searching => "searching",
            UserStatus::Chatting => "chatting",
        }
    }
}

/// User model keyed by the transport's opaque numeric id
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub xp: i64,
    pub balance: i64,
    pub warnings: i64,
    pub suspended_until: Option<NaiveDateTime>,
    pub status: UserStatus,
    pub partner_id: Option<i64>,
    pub last_activity: NaiveDateTime,
}

impl User {
    /// Phone and gender are both set; the user may leave onboarding
    pub fn is_profile_complete(&self) -> bool {
        self.phone.is_some() && self.gender.is_some()
    }

    /// Currently in a pairing
    pub fn is_chatting(&self) -> bool {
        self.status == UserStatus::Chatting
    }

    /// Partner id, only meaningful while chatting
    pub fn partner(&self) -> Option<i64> {
        if self.status == UserStatus::Chatting {
            self.partner_id
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_conversion() {
        assert_eq!(Gender::Male.as_str(), "male");
        assert_eq!(Gender::from_str("FEMALE").unwrap(), Gender::Female);
        assert!(Gender::from_str("other").is_err());
    }

    #[test]
    fn test_gender_opposite() {
        assert_eq!(Gender::Male.opposite(), Gender::Female);
        assert_eq!(Gender::Female.opposite(), Gender::Male);
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(UserStatus::Searching.as_str(), "searching");
        assert_eq!(UserStatus::from_str("chatting").unwrap(), UserStatus::Chatting);
        assert!(UserStatus::from_str("banned").is_err());
    }
}
