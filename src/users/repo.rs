use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::error::ApiError;
use crate::users::repo_types::{NewUser, User, UserPatch};

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::DuplicateEmail => ApiError::Conflict("Email already registered".into()),
            RepoError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Persistence seam for the user entity. The store enforces email
/// uniqueness; implementations surface violations as `DuplicateEmail`.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, new: NewUser) -> Result<User, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError>;
    async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>, RepoError>;
    async fn deactivate(&self, id: i64) -> Result<Option<User>, RepoError>;
    async fn ping(&self) -> Result<(), RepoError>;
}

const USER_COLUMNS: &str = "id, email, hashed_password, name, phone, age, \
     location_city, location_country, timezone, job_title, industry, \
     company_size, education_level, experience_level, email_connected, \
     email_connected_at, is_active, is_verified, created_at, updated_at, \
     last_active_at";

pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique_err(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::DuplicateEmail,
        _ => RepoError::Database(e),
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, new: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"
            INSERT INTO users (email, hashed_password, name, phone, age,
                               location_city, location_country, timezone, job_title,
                               industry, company_size, education_level, experience_level)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&new.email)
            .bind(&new.hashed_password)
            .bind(&new.name)
            .bind(&new.phone)
            .bind(new.age)
            .bind(&new.location_city)
            .bind(&new.location_country)
            .bind(&new.timezone)
            .bind(&new.job_title)
            .bind(&new.industry)
            .bind(&new.company_size)
            .bind(&new.education_level)
            .bind(&new.experience_level)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique_err)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                name = COALESCE($3, name),
                phone = COALESCE($4, phone),
                age = COALESCE($5, age),
                location_city = COALESCE($6, location_city),
                location_country = COALESCE($7, location_country),
                timezone = COALESCE($8, timezone),
                job_title = COALESCE($9, job_title),
                industry = COALESCE($10, industry),
                company_size = COALESCE($11, company_size),
                education_level = COALESCE($12, education_level),
                experience_level = COALESCE($13, experience_level),
                email_connected = COALESCE($14, email_connected),
                email_connected_at = COALESCE($15, email_connected_at),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&patch.email)
            .bind(&patch.name)
            .bind(&patch.phone)
            .bind(patch.age)
            .bind(&patch.location_city)
            .bind(&patch.location_country)
            .bind(&patch.timezone)
            .bind(&patch.job_title)
            .bind(&patch.industry)
            .bind(&patch.company_size)
            .bind(&patch.education_level)
            .bind(&patch.experience_level)
            .bind(patch.email_connected)
            .bind(patch.email_connected_at)
            .fetch_optional(&self.db)
            .await
            .map_err(map_unique_err)?;
        Ok(user)
    }

    async fn deactivate(&self, id: i64) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"
            UPDATE users SET is_active = FALSE, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
