use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use super::jobdb::QUOTA_EXHAUSTED;
use crate::models::subscriptionmodel::{PlanType, Subscription};

/// The only statement that ever decrements quota. Conditional on activity,
/// validity and remaining allowance, so two concurrent consumers at
/// remaining_ads = 1 get exactly one row back. Shared with the
/// job-creation transaction in jobdb.
pub const CONSUME_QUOTA_SQL: &str = r#"
    UPDATE subscriptions
    SET remaining_ads = remaining_ads - 1
    WHERE id = $1
      AND status = 'active'::subscription_status
      AND expires_at > NOW()
      AND remaining_ads > 0
    RETURNING *
"#;

#[async_trait]
pub trait SubscriptionExt {
    /// Payment confirmation for the plan is externally supplied; this only
    /// records the purchased window and allowance.
    async fn create_subscription(
        &self,
        owner_id: Uuid,
        plan: PlanType,
    ) -> Result<Subscription, Error>;

    /// Latest active, unexpired subscription with quota left, if any.
    async fn get_active_subscription(&self, owner_id: Uuid) -> Result<Option<Subscription>, Error>;

    async fn get_subscription_by_id(&self, subscription_id: Uuid) -> Result<Option<Subscription>, Error>;

    /// Conditional single-statement decrement. Never read-then-write: two
    /// concurrent consumers at remaining_ads = 1 get exactly one success.
    async fn consume_quota(&self, subscription_id: Uuid) -> Result<Subscription, Error>;

    /// Flip active subscriptions whose window has passed to expired.
    /// Returns the number of rows updated.
    async fn mark_expired_subscriptions(&self) -> Result<u64, Error>;
}

#[async_trait]
impl SubscriptionExt for DBClient {
    async fn create_subscription(
        &self,
        owner_id: Uuid,
        plan: PlanType,
    ) -> Result<Subscription, Error> {
        let starts_at = Utc::now();
        let expires_at = starts_at + Duration::days(plan.duration_days());

        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (owner_id, plan, remaining_ads, starts_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(plan)
        .bind(plan.ad_allowance())
        .bind(starts_at)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_active_subscription(&self, owner_id: Uuid) -> Result<Option<Subscription>, Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE owner_id = $1
              AND status = 'active'::subscription_status
              AND expires_at > NOW()
              AND remaining_ads > 0
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_subscription_by_id(&self, subscription_id: Uuid) -> Result<Option<Subscription>, Error> {
        sqlx::query_as::<_, Subscription>(
            r#"SELECT * FROM subscriptions WHERE id = $1"#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn consume_quota(&self, subscription_id: Uuid) -> Result<Subscription, Error> {
        sqlx::query_as::<_, Subscription>(CONSUME_QUOTA_SQL)
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Protocol(QUOTA_EXHAUSTED.into()))
    }

    async fn mark_expired_subscriptions(&self) -> Result<u64, Error> {
        let updated = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'expired'::subscription_status
            WHERE status = 'active'::subscription_status AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_decrement_is_one_guarded_statement() {
        // A rewrite into read-then-write would lose the lost-update safety
        // of the conditional decrement; pin the statement's shape.
        assert!(CONSUME_QUOTA_SQL.contains("remaining_ads = remaining_ads - 1"));
        assert!(CONSUME_QUOTA_SQL.contains("remaining_ads > 0"));
        assert!(CONSUME_QUOTA_SQL.contains("expires_at > NOW()"));
        assert!(CONSUME_QUOTA_SQL.contains("status = 'active'::subscription_status"));
        assert!(CONSUME_QUOTA_SQL.contains("RETURNING *"));
    }
}
