use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Requester,
    Company,
    Worker,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Requester => "requester",
            UserRole::Company => "company",
            UserRole::Worker => "worker",
            UserRole::Admin => "admin",
        }
    }

    /// Who may create job postings at all.
    pub fn may_post_jobs(&self) -> bool {
        match self {
            UserRole::Requester | UserRole::Company | UserRole::Admin => true,
            UserRole::Worker => false,
        }
    }

    /// Who posts free of charge, without quota or per-post payment.
    pub fn posts_free(&self) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Requester | UserRole::Company | UserRole::Worker => false,
        }
    }

    /// Whether an actor with this role may assign `target` to a profile.
    /// Admin is never self-granted; everything else is a free choice.
    pub fn may_grant(&self, target: UserRole) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Requester | UserRole::Company | UserRole::Worker => {
                target != UserRole::Admin
            }
        }
    }
}

/// Marketplace profile behind an authenticated principal. Created lazily on
/// first sign-in, never hard-deleted.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub principal_id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub district: String,
    pub city: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posting_policy_per_role() {
        assert!(UserRole::Requester.may_post_jobs());
        assert!(UserRole::Company.may_post_jobs());
        assert!(UserRole::Admin.may_post_jobs());
        assert!(!UserRole::Worker.may_post_jobs());

        assert!(UserRole::Admin.posts_free());
        assert!(!UserRole::Company.posts_free());
        assert!(!UserRole::Requester.posts_free());
    }

    #[test]
    fn admin_role_cannot_be_self_granted() {
        assert!(!UserRole::Requester.may_grant(UserRole::Admin));
        assert!(!UserRole::Company.may_grant(UserRole::Admin));
        assert!(!UserRole::Worker.may_grant(UserRole::Admin));

        assert!(UserRole::Admin.may_grant(UserRole::Admin));
        assert!(UserRole::Worker.may_grant(UserRole::Requester));
        assert!(UserRole::Requester.may_grant(UserRole::Company));
    }
}
