use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::jobmodel::*;
use crate::models::ledgermodel::{PaymentMethod, Transaction};

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateJobDto {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters"))]
    pub title: String,

    #[validate(length(min = 10, max = 2000, message = "Description must be between 10 and 2000 characters"))]
    pub description: String,

    pub category: JobCategory,

    #[validate(length(min = 1, message = "District is required"))]
    pub district: String,

    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,

    pub job_type: JobType,

    #[validate(range(min = 1.0, message = "Fixed price must be positive"))]
    pub fixed_price: Option<f64>,

    #[validate(range(min = 1.0, message = "Hourly rate must be positive"))]
    pub hourly_rate: Option<f64>,

    pub schedule: Option<ScheduleDto>,

    pub contract: Option<ContractDto>,

    /// Externally confirmed per-post payment; consulted only when no
    /// subscription quota covers the posting.
    #[serde(default)]
    pub payment_confirmed: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ScheduleDto {
    /// 0 = Monday .. 6 = Sunday.
    pub days: Vec<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ContractDto {
    pub contract_type: ContractType,
    pub monthly_salary: f64,
    pub social_security: bool,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct SearchJobsDto {
    pub category: Option<JobCategory>,
    pub district: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateApplicationDto {
    #[validate(range(min = 1.0, message = "Proposed rate must be positive"))]
    pub proposed_rate: f64,

    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct SettleJobDto {
    #[validate(range(min = 0.01, message = "Amount must be positive"))]
    pub amount: f64,

    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct JobDetailResponse {
    pub job: Job,
    pub schedule: Option<Schedule>,
    pub contract: Option<Contract>,
}

#[derive(Debug, Serialize)]
pub struct AcceptApplicationResponse {
    pub job: Job,
    pub application: Application,
}

/// The completed job plus both halves of the settlement entry.
#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub job: Job,
    pub payment: Transaction,
    pub income: Transaction,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationQuery {
    pub fn limit_offset(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(50).min(100) as i64;
        let page = self.page.unwrap_or(1).max(1) as i64;
        (limit, (page - 1) * limit)
    }
}

// Response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub status: String,
    pub message: String,
    pub data: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationsResponse {
    pub status: String,
    pub message: String,
    pub data: Vec<Application>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_caps() {
        let q = PaginationQuery { page: None, limit: None };
        assert_eq!(q.limit_offset(), (50, 0));

        let q = PaginationQuery { page: Some(3), limit: Some(20) };
        assert_eq!(q.limit_offset(), (20, 40));

        let q = PaginationQuery { page: Some(0), limit: Some(500) };
        assert_eq!(q.limit_offset(), (100, 0));
    }
}
