use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "plan_type", rename_all = "snake_case")]
pub enum PlanType {
    Starter,
    Business,
}

impl PlanType {
    pub fn to_str(&self) -> &str {
        match self {
            PlanType::Starter => "starter",
            PlanType::Business => "business",
        }
    }

    /// Number of postings the plan grants.
    pub fn ad_allowance(&self) -> i32 {
        match self {
            PlanType::Starter => 5,
            PlanType::Business => 50,
        }
    }

    /// Validity window in days.
    pub fn duration_days(&self) -> i64 {
        match self {
            PlanType::Starter => 30,
            PlanType::Business => 365,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

#[derive(Debug, Clone, Deserialize, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub plan: PlanType,
    pub remaining_ads: i32,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the subscription entitles its owner to one more posting.
    pub fn entitles_posting(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at > now && self.remaining_ads > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(remaining: i32, status: SubscriptionStatus, expires_in: i64) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            plan: PlanType::Starter,
            remaining_ads: remaining,
            starts_at: now,
            expires_at: now + Duration::days(expires_in),
            status,
            created_at: now,
        }
    }

    #[test]
    fn plan_windows_and_allowances() {
        assert_eq!(PlanType::Starter.ad_allowance(), 5);
        assert_eq!(PlanType::Starter.duration_days(), 30);
        assert_eq!(PlanType::Business.ad_allowance(), 50);
        assert_eq!(PlanType::Business.duration_days(), 365);
    }

    #[test]
    fn entitlement_requires_quota_and_validity() {
        let now = Utc::now();
        assert!(subscription(1, SubscriptionStatus::Active, 10).entitles_posting(now));
        assert!(!subscription(0, SubscriptionStatus::Active, 10).entitles_posting(now));
        assert!(!subscription(1, SubscriptionStatus::Expired, 10).entitles_posting(now));
        assert!(!subscription(1, SubscriptionStatus::Active, -1).entitles_posting(now));
    }
}
