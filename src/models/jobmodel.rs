use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "job_category", rename_all = "snake_case")]
pub enum JobCategory {
    Cleaning,
    Moving,
    Delivery,
    Gardening,
    Repairs,
    Childcare,
    Tutoring,
    ItSupport,
    Beauty,
    Other,
}

impl JobCategory {
    pub fn to_str(&self) -> &str {
        match self {
            JobCategory::Cleaning => "cleaning",
            JobCategory::Moving => "moving",
            JobCategory::Delivery => "delivery",
            JobCategory::Gardening => "gardening",
            JobCategory::Repairs => "repairs",
            JobCategory::Childcare => "childcare",
            JobCategory::Tutoring => "tutoring",
            JobCategory::ItSupport => "it_support",
            JobCategory::Beauty => "beauty",
            JobCategory::Other => "other",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
pub enum JobType {
    OneOff,
    Recurring,
    Contract,
}

/// Job lifecycle. The assigned and working phases are collapsed into
/// `InProgress`: acceptance moves a job straight to work.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn can_accept_applications(&self) -> bool {
        *self == JobStatus::Open
    }

    pub fn can_settle(&self) -> bool {
        *self == JobStatus::InProgress
    }

    pub fn can_pause(&self) -> bool {
        *self == JobStatus::Open
    }

    pub fn can_reactivate(&self) -> bool {
        *self == JobStatus::Cancelled
    }

    pub fn can_delete(&self) -> bool {
        *self == JobStatus::Open
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "contract_type", rename_all = "snake_case")]
pub enum ContractType {
    FullTime,
    PartTime,
    Seasonal,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A posted unit of work. Exactly one of `fixed_price` / `hourly_rate` /
/// the contract's monthly salary is authoritative, selected by `job_type`;
/// `is_contract` must agree with the presence of a contract sub-record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub selected_worker_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: JobCategory,
    pub district: String,
    pub city: String,
    pub job_type: JobType,
    pub fixed_price: Option<BigDecimal>,
    pub hourly_rate: Option<BigDecimal>,
    pub is_contract: bool,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Present iff the job is not one-off. Days are 0 = Monday .. 6 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Schedule {
    pub id: Uuid,
    pub job_id: Uuid,
    pub days: Vec<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Present iff `job.is_contract`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contract {
    pub id: Uuid,
    pub job_id: Uuid,
    pub contract_type: ContractType,
    pub monthly_salary: BigDecimal,
    pub social_security: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    pub proposed_rate: BigDecimal,
    pub message: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_jobs_take_applications() {
        assert!(JobStatus::Open.can_accept_applications());
        assert!(!JobStatus::InProgress.can_accept_applications());
        assert!(!JobStatus::Completed.can_accept_applications());
        assert!(!JobStatus::Cancelled.can_accept_applications());
    }

    #[test]
    fn settlement_only_from_working_state() {
        assert!(JobStatus::InProgress.can_settle());
        assert!(!JobStatus::Open.can_settle());
        assert!(!JobStatus::Completed.can_settle());
    }

    #[test]
    fn pause_and_reactivate_are_inverses_on_open_jobs() {
        assert!(JobStatus::Open.can_pause());
        assert!(JobStatus::Cancelled.can_reactivate());
        assert!(!JobStatus::InProgress.can_pause());
        assert!(!JobStatus::Completed.can_reactivate());
    }

    #[test]
    fn deletion_limited_to_open_jobs() {
        assert!(JobStatus::Open.can_delete());
        assert!(!JobStatus::InProgress.can_delete());
        assert!(!JobStatus::Cancelled.can_delete());
    }
}
