use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::{ApiError, FieldError};
use crate::users::dto::{CreateUserRequest, Pagination, UpdateUserRequest};
use crate::users::password::hash_password;
use crate::users::repo::UserRepo;
use crate::users::repo_types::{NewUser, User, UserPatch};

pub const MAX_PAGE_SIZE: i64 = 100;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are compared case-insensitively: lowercase at the boundary so the
/// unique constraint sees one canonical form.
pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn check_max_len(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>, max: usize) {
    if let Some(v) = value {
        if v.len() > max {
            errors.push(FieldError::new(
                field,
                format!("must be at most {max} characters"),
            ));
        }
    }
}

fn check_age(errors: &mut Vec<FieldError>, age: Option<i32>) {
    if let Some(a) = age {
        if !(13..=120).contains(&a) {
            errors.push(FieldError::new("age", "must be between 13 and 120"));
        }
    }
}

fn check_profile_fields(
    errors: &mut Vec<FieldError>,
    phone: &Option<String>,
    age: Option<i32>,
    location_city: &Option<String>,
    location_country: &Option<String>,
    timezone: &Option<String>,
    job_title: &Option<String>,
    industry: &Option<String>,
    company_size: &Option<String>,
    education_level: &Option<String>,
    experience_level: &Option<String>,
) {
    check_max_len(errors, "phone", phone, 20);
    check_age(errors, age);
    check_max_len(errors, "location_city", location_city, 100);
    check_max_len(errors, "location_country", location_country, 100);
    check_max_len(errors, "timezone", timezone, 50);
    check_max_len(errors, "job_title", job_title, 255);
    check_max_len(errors, "industry", industry, 100);
    check_max_len(errors, "company_size", company_size, 50);
    check_max_len(errors, "education_level", education_level, 100);
    check_max_len(errors, "experience_level", experience_level, 50);
}

fn validate_create(req: &CreateUserRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if !is_valid_email(&req.email) || req.email.len() > 255 {
        errors.push(FieldError::new("email", "Invalid email format"));
    }
    if req.name.trim().is_empty() || req.name.len() > 255 {
        errors.push(FieldError::new("name", "must be 1 to 255 characters"));
    }
    if req.password.len() < 8 {
        errors.push(FieldError::new("password", "must be at least 8 characters"));
    } else if req.password.len() > 100 {
        errors.push(FieldError::new("password", "must be at most 100 characters"));
    }
    check_profile_fields(
        &mut errors,
        &req.phone,
        req.age,
        &req.location_city,
        &req.location_country,
        &req.timezone,
        &req.job_title,
        &req.industry,
        &req.company_size,
        &req.education_level,
        &req.experience_level,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

fn validate_update(req: &UpdateUserRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if let Some(email) = &req.email {
        if !is_valid_email(email) || email.len() > 255 {
            errors.push(FieldError::new("email", "Invalid email format"));
        }
    }
    if let Some(name) = &req.name {
        if name.trim().is_empty() || name.len() > 255 {
            errors.push(FieldError::new("name", "must be 1 to 255 characters"));
        }
    }
    check_profile_fields(
        &mut errors,
        &req.phone,
        req.age,
        &req.location_city,
        &req.location_country,
        &req.timezone,
        &req.job_title,
        &req.industry,
        &req.company_size,
        &req.education_level,
        &req.experience_level,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

fn validate_pagination(p: &Pagination) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if p.limit < 1 || p.limit > MAX_PAGE_SIZE {
        errors.push(FieldError::new(
            "limit",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    if p.offset < 0 {
        errors.push(FieldError::new("offset", "must not be negative"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

pub async fn create_user(
    repo: &dyn UserRepo,
    mut req: CreateUserRequest,
) -> Result<User, ApiError> {
    req.email = normalize_email(&req.email);
    validate_create(&req)?;

    // Fast path; the unique constraint still catches concurrent inserts.
    if repo.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hashed_password =
        hash_password(&req.password).map_err(|e| ApiError::Internal(e.to_string()))?;

    let user = repo
        .insert(NewUser {
            email: req.email,
            hashed_password,
            name: req.name,
            phone: req.phone,
            age: req.age,
            location_city: req.location_city,
            location_country: req.location_country,
            timezone: req.timezone,
            job_title: req.job_title,
            industry: req.industry,
            company_size: req.company_size,
            education_level: req.education_level,
            experience_level: req.experience_level,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn get_user_by_id(repo: &dyn UserRepo, id: i64) -> Result<User, ApiError> {
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

pub async fn get_user_by_email(repo: &dyn UserRepo, email: &str) -> Result<User, ApiError> {
    repo.find_by_email(&normalize_email(email))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

pub async fn list_users(repo: &dyn UserRepo, p: Pagination) -> Result<Vec<User>, ApiError> {
    validate_pagination(&p)?;
    Ok(repo.list(p.limit, p.offset).await?)
}

pub async fn update_user(
    repo: &dyn UserRepo,
    id: i64,
    mut req: UpdateUserRequest,
) -> Result<User, ApiError> {
    validate_update(&req)?;

    let existing = get_user_by_id(repo, id).await?;

    if let Some(email) = req.email.take() {
        let email = normalize_email(&email);
        if email != existing.email {
            if repo.find_by_email(&email).await?.is_some() {
                warn!(user_id = id, email = %email, "email change collides");
                return Err(ApiError::Conflict("Email already registered".into()));
            }
            req.email = Some(email);
        }
    }

    // Connecting email for the first time stamps the connection moment.
    let email_connected_at = match req.email_connected {
        Some(true) if !existing.email_connected => Some(OffsetDateTime::now_utc()),
        _ => None,
    };

    let patch = UserPatch {
        email: req.email,
        name: req.name,
        phone: req.phone,
        age: req.age,
        location_city: req.location_city,
        location_country: req.location_country,
        timezone: req.timezone,
        job_title: req.job_title,
        industry: req.industry,
        company_size: req.company_size,
        education_level: req.education_level,
        experience_level: req.experience_level,
        email_connected: req.email_connected,
        email_connected_at,
    };

    let user = repo
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = user.id, "user updated");
    Ok(user)
}

pub async fn deactivate_user(repo: &dyn UserRepo, id: i64) -> Result<User, ApiError> {
    let user = repo
        .deactivate(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    info!(user_id = user.id, "user deactivated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::memory::MemoryUserRepo;

    fn create_request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.into(),
            name: "A".into(),
            password: "secret123".into(),
            phone: None,
            age: None,
            location_city: None,
            location_country: None,
            timezone: None,
            job_title: None,
            industry: None,
            company_size: None,
            education_level: None,
            experience_level: None,
        }
    }

    #[test]
    fn email_regex_accepts_and_rejects() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("missing-at.com"));
        assert!(!is_valid_email("no@tld"));
        assert!(!is_valid_email("spa ce@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[tokio::test]
    async fn create_assigns_id_and_equal_timestamps() {
        let repo = MemoryUserRepo::new();
        let user = create_user(&repo, create_request("a@x.com")).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.created_at, user.updated_at);
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert!(!user.email_connected);
    }

    #[tokio::test]
    async fn create_rejects_short_password_with_field_detail() {
        let repo = MemoryUserRepo::new();
        let mut req = create_request("a@x.com");
        req.password = "short".into();
        let err = create_user(&repo, req).await.unwrap_err();
        match err {
            ApiError::Validation(fields) => {
                assert!(fields.iter().any(|f| f.field == "password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_rejects_bad_email_and_blank_name() {
        let repo = MemoryUserRepo::new();
        let mut req = create_request("not-an-email");
        req.name = "  ".into();
        let err = create_user(&repo, req).await.unwrap_err();
        match err {
            ApiError::Validation(fields) => {
                assert!(fields.iter().any(|f| f.field == "email"));
                assert!(fields.iter().any(|f| f.field == "name"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_age() {
        let repo = MemoryUserRepo::new();
        let mut req = create_request("a@x.com");
        req.age = Some(12);
        assert!(matches!(
            create_user(&repo, req).await.unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_keeps_one_record() {
        let repo = MemoryUserRepo::new();
        create_user(&repo, create_request("a@x.com")).await.unwrap();
        let err = create_user(&repo, create_request("a@x.com")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let all = list_users(&repo, Pagination { limit: 10, offset: 0 })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_differing_only_in_case_conflicts() {
        let repo = MemoryUserRepo::new();
        create_user(&repo, create_request("a@x.com")).await.unwrap();
        let err = create_user(&repo, create_request("A@X.COM")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn lookup_by_id_and_email_agree() {
        let repo = MemoryUserRepo::new();
        let created = create_user(&repo, create_request("a@x.com")).await.unwrap();
        let by_id = get_user_by_id(&repo, created.id).await.unwrap();
        let by_email = get_user_by_email(&repo, "A@x.com").await.unwrap();
        assert_eq!(by_id.id, by_email.id);
    }

    #[tokio::test]
    async fn lookup_missing_user_is_not_found() {
        let repo = MemoryUserRepo::new();
        assert!(matches!(
            get_user_by_id(&repo, 42).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            get_user_by_email(&repo, "ghost@x.com").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn partial_update_leaves_absent_fields_alone() {
        let repo = MemoryUserRepo::new();
        let created = create_user(&repo, create_request("a@x.com")).await.unwrap();

        let updated = update_user(
            &repo,
            created.id,
            UpdateUserRequest {
                job_title: Some("Eng".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.job_title.as_deref(), Some("Eng"));
        assert_eq!(updated.name, "A");
        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn empty_update_only_bumps_updated_at() {
        let repo = MemoryUserRepo::new();
        let created = create_user(&repo, create_request("a@x.com")).await.unwrap();

        let updated = update_user(&repo, created.id, UpdateUserRequest::default())
            .await
            .unwrap();

        assert_eq!(updated.email, created.email);
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let repo = MemoryUserRepo::new();
        assert!(matches!(
            update_user(&repo, 7, UpdateUserRequest::default())
                .await
                .unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn email_change_collision_conflicts() {
        let repo = MemoryUserRepo::new();
        create_user(&repo, create_request("a@x.com")).await.unwrap();
        let second = create_user(&repo, create_request("b@x.com")).await.unwrap();

        let err = update_user(
            &repo,
            second.id,
            UpdateUserRequest {
                email: Some("A@x.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn email_change_to_own_address_is_a_no_op() {
        let repo = MemoryUserRepo::new();
        let created = create_user(&repo, create_request("a@x.com")).await.unwrap();
        let updated = update_user(
            &repo,
            created.id,
            UpdateUserRequest {
                email: Some("A@X.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.email, "a@x.com");
    }

    #[tokio::test]
    async fn connecting_email_stamps_timestamp_once() {
        let repo = MemoryUserRepo::new();
        let created = create_user(&repo, create_request("a@x.com")).await.unwrap();

        let connected = update_user(
            &repo,
            created.id,
            UpdateUserRequest {
                email_connected: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(connected.email_connected);
        let first_stamp = connected.email_connected_at.expect("stamp set on connect");

        let again = update_user(
            &repo,
            created.id,
            UpdateUserRequest {
                email_connected: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(again.email_connected_at, Some(first_stamp));
    }

    #[tokio::test]
    async fn deactivate_is_idempotent_and_record_stays_readable() {
        let repo = MemoryUserRepo::new();
        let created = create_user(&repo, create_request("a@x.com")).await.unwrap();

        let first = deactivate_user(&repo, created.id).await.unwrap();
        assert!(!first.is_active);

        let second = deactivate_user(&repo, created.id).await.unwrap();
        assert!(!second.is_active);

        let fetched = get_user_by_id(&repo, created.id).await.unwrap();
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn deactivate_missing_user_is_not_found() {
        let repo = MemoryUserRepo::new();
        assert!(matches!(
            deactivate_user(&repo, 99).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_respects_limit_and_offset() {
        let repo = MemoryUserRepo::new();
        for i in 0..5 {
            create_user(&repo, create_request(&format!("u{i}@x.com")))
                .await
                .unwrap();
        }

        let page = list_users(&repo, Pagination { limit: 2, offset: 0 })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, 1);

        let next = list_users(&repo, Pagination { limit: 2, offset: 2 })
            .await
            .unwrap();
        assert_eq!(next[0].id, 3);
    }

    #[tokio::test]
    async fn list_rejects_bad_pagination() {
        let repo = MemoryUserRepo::new();
        assert!(matches!(
            list_users(&repo, Pagination { limit: 0, offset: 0 })
                .await
                .unwrap_err(),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            list_users(&repo, Pagination { limit: 10, offset: -1 })
                .await
                .unwrap_err(),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            list_users(&repo, Pagination { limit: MAX_PAGE_SIZE + 1, offset: 0 })
                .await
                .unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn update_rejects_overlong_profile_field() {
        let repo = MemoryUserRepo::new();
        let created = create_user(&repo, create_request("a@x.com")).await.unwrap();
        let err = update_user(
            &repo,
            created.id,
            UpdateUserRequest {
                phone: Some("0".repeat(21)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
