//! Facility model - hospitals and administrators

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityInfo {
    pub id: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub registered_at: DateTime<Utc>,
}

/// Facility listing for the admin view
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FacilityOverview {
    pub id: Uuid,
    pub name: String,
    pub is_admin: bool,
    pub registered_at: DateTime<Utc>,
    pub batch_count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 255, message = "Facility name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "New passwords do not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub facility: FacilityInfo,
}

impl Facility {
    pub async fn create(
        pool: &PgPool,
        name: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Facility>(
            r#"
            INSERT INTO facilities (name, password_hash, is_admin)
            VALUES ($1, $2, $3)
            RETURNING id, name, password_hash, is_admin, registered_at
            "#
        )
        .bind(name)
        .bind(password_hash)
        .bind(is_admin)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Facility>(
            "SELECT id, name, password_hash, is_admin, registered_at FROM facilities WHERE name = $1"
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Facility>(
            "SELECT id, name, password_hash, is_admin, registered_at FROM facilities WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn admin_exists(pool: &PgPool) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM facilities WHERE is_admin)")
            .fetch_one(pool)
            .await
    }

    pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE facilities SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// All facilities with the number of batches each has uploaded
    pub async fn list_with_counts(pool: &PgPool) -> Result<Vec<FacilityOverview>, sqlx::Error> {
        sqlx::query_as::<_, FacilityOverview>(
            r#"
            SELECT f.id, f.name, f.is_admin, f.registered_at, COUNT(b.id) AS batch_count
            FROM facilities f
            LEFT JOIN batches b ON b.facility_id = f.id
            GROUP BY f.id
            ORDER BY f.registered_at
            "#
        )
        .fetch_all(pool)
        .await
    }

    pub fn verify_password(&self, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&self.password_hash)
            .map_err(|_| AppError::InternalError("Invalid password hash".to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn to_info(&self) -> FacilityInfo {
        FacilityInfo {
            id: self.id,
            name: self.name.clone(),
            is_admin: self.is_admin,
            registered_at: self.registered_at,
        }
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(password: &str) -> Facility {
        Facility {
            id: Uuid::new_v4(),
            name: "Korle Bu".to_string(),
            password_hash: hash_password(password).unwrap(),
            is_admin: false,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let f = facility("s3cret");
        assert!(f.verify_password("s3cret").unwrap());
        assert!(!f.verify_password("wrong").unwrap());
    }

    #[test]
    fn test_info_omits_hash() {
        let json = serde_json::to_value(facility("pw")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["name"], "Korle Bu");
    }

    #[test]
    fn test_credentials_validation() {
        let empty = Credentials { name: String::new(), password: "pw".into() };
        assert!(empty.validate().is_err());

        let ok = Credentials { name: "Ridge".into(), password: "pw".into() };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_confirm_password_must_match() {
        let req = ChangePasswordRequest {
            old_password: "a".into(),
            new_password: "b".into(),
            confirm_password: "c".into(),
        };
        assert!(req.validate().is_err());
    }
}
