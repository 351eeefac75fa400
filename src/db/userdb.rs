use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::{Profile, UserRole};

#[async_trait]
pub trait UserExt {
    async fn get_profile_by_id(&self, profile_id: Uuid) -> Result<Option<Profile>, Error>;

    async fn get_profile_by_principal(&self, principal_id: &str) -> Result<Option<Profile>, Error>;

    /// Identity resolver: look up the profile behind an authenticated
    /// principal, creating it on first sign-in. Concurrent first sign-ins
    /// race on the principal_id uniqueness constraint; the loser falls back
    /// to the lookup.
    async fn get_or_create_profile(
        &self,
        principal_id: &str,
        email: &str,
        name: &str,
    ) -> Result<Profile, Error>;

    async fn update_profile(
        &self,
        profile_id: Uuid,
        name: String,
        role: UserRole,
        district: String,
        city: String,
        phone: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<Profile, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_profile_by_id(&self, profile_id: Uuid) -> Result<Option<Profile>, Error> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT * FROM profiles WHERE id = $1"#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_profile_by_principal(&self, principal_id: &str) -> Result<Option<Profile>, Error> {
        sqlx::query_as::<_, Profile>(
            r#"SELECT * FROM profiles WHERE principal_id = $1"#,
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_or_create_profile(
        &self,
        principal_id: &str,
        email: &str,
        name: &str,
    ) -> Result<Profile, Error> {
        let inserted = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (principal_id, name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (principal_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(principal_id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(profile) = inserted {
            return Ok(profile);
        }

        // Lost the insert race or the profile already existed.
        self.get_profile_by_principal(principal_id)
            .await?
            .ok_or(Error::RowNotFound)
    }

    async fn update_profile(
        &self,
        profile_id: Uuid,
        name: String,
        role: UserRole,
        district: String,
        city: String,
        phone: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<Profile, Error> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET name = $2, role = $3, district = $4, city = $5,
                phone = $6, avatar_url = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .bind(name)
        .bind(role)
        .bind(district)
        .bind(city)
        .bind(phone)
        .bind(avatar_url)
        .fetch_one(&self.pool)
        .await
    }
}
