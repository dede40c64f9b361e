use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::users::repo_types::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
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

/// Partial update: absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
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
}

/// Public representation of a user; never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
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

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            phone: u.phone,
            age: u.age,
            location_city: u.location_city,
            location_country: u.location_country,
            timezone: u.timezone,
            job_title: u.job_title,
            industry: u.industry,
            company_size: u.company_size,
            education_level: u.education_level,
            experience_level: u.experience_level,
            email_connected: u.email_connected,
            email_connected_at: u.email_connected_at,
            is_active: u.is_active,
            is_verified: u.is_verified,
            created_at: u.created_at,
            updated_at: u.updated_at,
            last_active_at: u.last_active_at,
        }
    }
}

/// Confirmation body for the deactivation endpoint.
#[derive(Debug, Serialize)]
pub struct DeactivatedResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}
