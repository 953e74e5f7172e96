use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::coerce;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
  #[default]
  Pending,
  Accepted,
  Rejected,
}

impl std::fmt::Display for PartnerStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Pending => write!(f, "pending"),
      Self::Accepted => write!(f, "accepted"),
      Self::Rejected => write!(f, "rejected"),
    }
  }
}

impl std::str::FromStr for PartnerStatus {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "accepted" => Ok(Self::Accepted),
      "rejected" => Ok(Self::Rejected),
      _ => Err(format!("Unknown partner status: {}", s)),
    }
  }
}

/// Answer to a pending invite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteResponse {
  Accepted,
  Rejected,
}

impl From<InviteResponse> for PartnerStatus {
  fn from(response: InviteResponse) -> Self {
    match response {
      InviteResponse::Accepted => PartnerStatus::Accepted,
      InviteResponse::Rejected => PartnerStatus::Rejected,
    }
  }
}

/// Link from `user_id` (who asked) to `partner_id` (who was asked)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerLink {
  #[serde(deserialize_with = "coerce::text")]
  pub id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub user_id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub partner_id: String,
  #[serde(deserialize_with = "coerce::or_default")]
  pub status: PartnerStatus,
  #[serde(deserialize_with = "coerce::flag")]
  pub is_favorite: bool,
  #[serde(deserialize_with = "coerce::timestamp")]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartnerLink {
  pub user_id: String,
  pub partner_id: String,
  pub status: PartnerStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSummary {
  #[serde(deserialize_with = "coerce::text")]
  pub id: String,
  #[serde(deserialize_with = "coerce::text")]
  pub name: String,
  #[serde(deserialize_with = "coerce::text")]
  pub username: String,
}

/// An invite as seen by one side, with the other side's summary embedded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerInvite {
  #[serde(deserialize_with = "coerce::text")]
  pub id: String,
  #[serde(deserialize_with = "coerce::or_default")]
  pub status: PartnerStatus,
  #[serde(deserialize_with = "coerce::timestamp")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(deserialize_with = "coerce::flag")]
  pub is_favorite: bool,
  pub counterpart: Option<UserSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartnerInvites {
  pub sent: Vec<PartnerInvite>,
  pub received: Vec<PartnerInvite>,
}
