use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String, // argon2 hash, never exposed in JSON
    pub name: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location_city: Option<String>,
    pub location_country: Option<String>,
    pub timezone: Option<String>,
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub education_level: Option<String>,
    pub experience_level: Option<String>,
    pub email_connected: bool,
    pub email_connected_at: Option<OffsetDateTime>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_active_at: Option<OffsetDateTime>,
}

/// Columns supplied when inserting a user; the store assigns id, flags
/// and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub name: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location_city: Option<String>,
    pub location_country: Option<String>,
    pub timezone: Option<String>,
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub education_level: Option<String>,
    pub experience_level: Option<String>,
}

/// Partial update: `None` fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub location_city: Option<String>,
    pub location_country: Option<String>,
    pub timezone: Option<String>,
    pub job_title: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub education_level: Option<String>,
    pub experience_level: Option<String>,
    pub email_connected: Option<bool>,
    pub email_connected_at: Option<OffsetDateTime>,
}
