use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full profile, returned only to the owner (`/api/auth/me`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub whatsapp_number: Option<String>,
    pub batch_number: Option<i64>,
    pub status: String,
    pub is_member: bool,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub about: Option<String>,
    pub skills: Option<String>,
    pub linkedin_url: Option<String>,
    pub website_url: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// The projection other members see: chat peers, comment authors.
#[derive(Serialize, Debug, Clone)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
}
