use std::sync::Arc;

use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{
        db::DBClient,
        jobdb::{JobExt, NewContract, NewJobRecord, NewSchedule},
        ledgerdb::LedgerExt,
        subscriptiondb::SubscriptionExt,
    },
    dtos::jobdtos::*,
    models::{
        jobmodel::*,
        ledgermodel::Transaction,
        subscriptionmodel::Subscription,
        usermodel::{Profile, UserRole},
    },
    service::error::ServiceError,
};

/// How a job creation is paid for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostingEntitlement {
    Free,
    Subscription(Uuid),
    PaidPost,
}

#[derive(Debug, Clone)]
pub struct JobService {
    db_client: Arc<DBClient>,
}

impl JobService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self { db_client }
    }

    pub async fn create_job(&self, owner: &Profile, dto: CreateJobDto) -> Result<Job, ServiceError> {
        if !owner.role.may_post_jobs() {
            return Err(ServiceError::Forbidden(
                "Workers cannot create job postings".to_string(),
            ));
        }

        let record = build_record(&dto)?;
        let active = self
            .db_client
            .get_active_subscription(owner.id)
            .await
            .map_err(ServiceError::from_db)?;
        let entitlement = resolve_entitlement(owner.role, active.as_ref(), dto.payment_confirmed)?;

        let consume = match entitlement {
            PostingEntitlement::Subscription(id) => Some(id),
            PostingEntitlement::Free | PostingEntitlement::PaidPost => None,
        };

        let job = self
            .db_client
            .create_job(owner.id, &record, consume)
            .await
            .map_err(ServiceError::from_db)?;

        tracing::info!(job_id = %job.id, owner = %owner.id, "job created");
        Ok(job)
    }

    pub async fn job_detail(&self, job_id: Uuid) -> Result<JobDetailResponse, ServiceError> {
        let job = self.require_job(job_id).await?;
        let schedule = self
            .db_client
            .get_schedule_for_job(job_id)
            .await
            .map_err(ServiceError::from_db)?;
        let contract = self
            .db_client
            .get_contract_for_job(job_id)
            .await
            .map_err(ServiceError::from_db)?;

        Ok(JobDetailResponse { job, schedule, contract })
    }

    pub async fn pause_job(&self, caller: &Profile, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self.require_job(job_id).await?;
        require_manage(caller, &job)?;
        self.db_client.pause_job(job_id).await.map_err(ServiceError::from_db)
    }

    pub async fn reactivate_job(&self, caller: &Profile, job_id: Uuid) -> Result<Job, ServiceError> {
        let job = self.require_job(job_id).await?;
        require_manage(caller, &job)?;
        self.db_client
            .reactivate_job(job_id)
            .await
            .map_err(ServiceError::from_db)
    }

    pub async fn delete_job(&self, caller: &Profile, job_id: Uuid) -> Result<(), ServiceError> {
        let job = self.require_job(job_id).await?;
        require_manage(caller, &job)?;
        self.db_client.delete_job(job_id).await.map_err(ServiceError::from_db)
    }

    pub async fn apply(
        &self,
        worker: &Profile,
        job_id: Uuid,
        dto: CreateApplicationDto,
    ) -> Result<Application, ServiceError> {
        if worker.role != UserRole::Worker {
            return Err(ServiceError::Forbidden(
                "Only workers may apply to jobs".to_string(),
            ));
        }

        let job = self.require_job(job_id).await?;
        if job.owner_id == worker.id {
            return Err(ServiceError::Forbidden(
                "Cannot apply to your own job".to_string(),
            ));
        }

        let proposed_rate = to_money(dto.proposed_rate)?;
        let application = self
            .db_client
            .create_application(job_id, worker.id, proposed_rate, dto.message)
            .await
            .map_err(ServiceError::from_db)?;

        tracing::info!(job_id = %job_id, worker = %worker.id, "application submitted");
        Ok(application)
    }

    /// The accept cascade: target application accepted, job moved to the
    /// working state, every sibling pending application rejected — one
    /// atomic unit at the store level.
    pub async fn accept_application(
        &self,
        caller: &Profile,
        job_id: Uuid,
        application_id: Uuid,
    ) -> Result<(Job, Application), ServiceError> {
        let job = self.require_job(job_id).await?;
        require_owner(caller, &job)?;

        let application = self
            .db_client
            .get_application_by_id(application_id)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound("Application not found".to_string()))?;

        if application.job_id != job_id {
            return Err(ServiceError::NotFound(
                "Application does not belong to this job".to_string(),
            ));
        }

        let (job, application) = self
            .db_client
            .accept_application(job_id, application_id)
            .await
            .map_err(ServiceError::from_db)?;

        tracing::info!(
            job_id = %job.id,
            application = %application.id,
            worker = %application.worker_id,
            "application accepted"
        );
        Ok((job, application))
    }

    pub async fn reject_application(
        &self,
        caller: &Profile,
        application_id: Uuid,
    ) -> Result<Application, ServiceError> {
        let application = self
            .db_client
            .get_application_by_id(application_id)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound("Application not found".to_string()))?;

        let job = self.require_job(application.job_id).await?;
        require_owner(caller, &job)?;

        self.db_client
            .reject_application(application_id)
            .await
            .map_err(ServiceError::from_db)
    }

    /// Settlement records a payment event; it does not capture funds. The
    /// status transition and both ledger rows commit together or not at all.
    pub async fn settle_job(
        &self,
        caller: &Profile,
        job_id: Uuid,
        dto: SettleJobDto,
    ) -> Result<(Job, Transaction, Transaction), ServiceError> {
        let job = self.require_job(job_id).await?;
        require_owner(caller, &job)?;

        let amount = to_money(dto.amount)?;
        let (job, payment, income) = self
            .db_client
            .settle_job(job_id, amount, dto.payment_method)
            .await
            .map_err(ServiceError::from_db)?;

        tracing::info!(job_id = %job.id, "job settled");
        Ok((job, payment, income))
    }

    async fn require_job(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job_by_id(job_id)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound("Job not found".to_string()))
    }
}

fn require_owner(caller: &Profile, job: &Job) -> Result<(), ServiceError> {
    if job.owner_id != caller.id {
        return Err(ServiceError::Forbidden(
            "Not the owner of this job".to_string(),
        ));
    }
    Ok(())
}

fn require_manage(caller: &Profile, job: &Job) -> Result<(), ServiceError> {
    match caller.role {
        UserRole::Admin => Ok(()),
        UserRole::Requester | UserRole::Company | UserRole::Worker => require_owner(caller, job),
    }
}

fn to_money(value: f64) -> Result<BigDecimal, ServiceError> {
    BigDecimal::try_from(value)
        .map_err(|_| ServiceError::Validation("Invalid monetary amount".to_string()))
}

/// Validate price-field exclusivity and sub-record presence per job type,
/// then build the insertable record. Exactly one price representation is
/// authoritative; a schedule exists iff the job is not one-off; a contract
/// record exists iff the job is a contract.
fn build_record(dto: &CreateJobDto) -> Result<NewJobRecord, ServiceError> {
    let (fixed_price, hourly_rate, contract) = match dto.job_type {
        JobType::OneOff => {
            let price = dto
                .fixed_price
                .ok_or_else(|| validation("One-off jobs require a fixed price"))?;
            if dto.hourly_rate.is_some() || dto.contract.is_some() {
                return Err(validation("One-off jobs take only a fixed price"));
            }
            if dto.schedule.is_some() {
                return Err(validation("One-off jobs do not carry a schedule"));
            }
            (Some(to_money(price)?), None, None)
        }
        JobType::Recurring => {
            let rate = dto
                .hourly_rate
                .ok_or_else(|| validation("Recurring jobs require an hourly rate"))?;
            if dto.fixed_price.is_some() || dto.contract.is_some() {
                return Err(validation("Recurring jobs take only an hourly rate"));
            }
            (None, Some(to_money(rate)?), None)
        }
        JobType::Contract => {
            let contract = dto
                .contract
                .as_ref()
                .ok_or_else(|| validation("Contract jobs require contract terms"))?;
            if dto.fixed_price.is_some() || dto.hourly_rate.is_some() {
                return Err(validation("Contract jobs are priced by monthly salary"));
            }
            let record = NewContract {
                contract_type: contract.contract_type,
                monthly_salary: to_money(contract.monthly_salary)?,
                social_security: contract.social_security,
            };
            (None, None, Some(record))
        }
    };

    let schedule = match dto.job_type {
        JobType::OneOff => None,
        JobType::Recurring | JobType::Contract => {
            let schedule = dto
                .schedule
                .as_ref()
                .ok_or_else(|| validation("Recurring and contract jobs require a schedule"))?;
            Some(build_schedule(schedule)?)
        }
    };

    Ok(NewJobRecord {
        title: dto.title.clone(),
        description: dto.description.clone(),
        category: dto.category,
        district: dto.district.clone(),
        city: dto.city.clone(),
        job_type: dto.job_type,
        fixed_price,
        hourly_rate,
        schedule,
        contract,
    })
}

fn build_schedule(dto: &ScheduleDto) -> Result<NewSchedule, ServiceError> {
    if dto.days.is_empty() {
        return Err(validation("Schedule needs at least one day"));
    }
    if dto.days.iter().any(|d| !(0..=6).contains(d)) {
        return Err(validation("Schedule days must be between 0 and 6"));
    }
    if dto.start_time >= dto.end_time {
        return Err(validation("Schedule start must precede end"));
    }
    if let (Some(from), Some(to)) = (dto.date_from, dto.date_to) {
        if from > to {
            return Err(validation("Schedule date range is inverted"));
        }
    }

    Ok(NewSchedule {
        days: dto.days.clone(),
        start_time: dto.start_time,
        end_time: dto.end_time,
        date_from: dto.date_from,
        date_to: dto.date_to,
    })
}

fn validation(message: &str) -> ServiceError {
    ServiceError::Validation(message.to_string())
}

/// Decide how a posting is paid for: admins post free, an active
/// subscription with quota covers it, an externally confirmed per-post
/// payment covers it, and otherwise the creation conflicts.
pub fn resolve_entitlement(
    role: UserRole,
    active_subscription: Option<&Subscription>,
    payment_confirmed: bool,
) -> Result<PostingEntitlement, ServiceError> {
    if role.posts_free() {
        return Ok(PostingEntitlement::Free);
    }
    if let Some(subscription) = active_subscription {
        return Ok(PostingEntitlement::Subscription(subscription.id));
    }
    if payment_confirmed {
        return Ok(PostingEntitlement::PaidPost);
    }
    Err(ServiceError::Conflict(
        "No posting entitlement: active subscription quota or per-post payment required".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime, Utc};
    use crate::models::subscriptionmodel::{PlanType, SubscriptionStatus};

    fn one_off_dto() -> CreateJobDto {
        CreateJobDto {
            title: "Move a couch".to_string(),
            description: "Two flights of stairs, no elevator".to_string(),
            category: JobCategory::Moving,
            district: "Centrum".to_string(),
            city: "Rotterdam".to_string(),
            job_type: JobType::OneOff,
            fixed_price: Some(15.0),
            hourly_rate: None,
            schedule: None,
            contract: None,
            payment_confirmed: false,
        }
    }

    fn schedule_dto() -> ScheduleDto {
        ScheduleDto {
            days: vec![0, 2, 4],
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            date_from: None,
            date_to: None,
        }
    }

    fn active_subscription(remaining: i32) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            plan: PlanType::Starter,
            remaining_ads: remaining,
            starts_at: now,
            expires_at: now + Duration::days(10),
            status: SubscriptionStatus::Active,
            created_at: now,
        }
    }

    #[test]
    fn one_off_requires_exactly_a_fixed_price() {
        assert!(build_record(&one_off_dto()).is_ok());

        let mut dto = one_off_dto();
        dto.fixed_price = None;
        assert!(matches!(build_record(&dto), Err(ServiceError::Validation(_))));

        let mut dto = one_off_dto();
        dto.hourly_rate = Some(12.0);
        assert!(matches!(build_record(&dto), Err(ServiceError::Validation(_))));

        let mut dto = one_off_dto();
        dto.schedule = Some(schedule_dto());
        assert!(matches!(build_record(&dto), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn recurring_requires_hourly_rate_and_schedule() {
        let mut dto = one_off_dto();
        dto.job_type = JobType::Recurring;
        dto.fixed_price = None;
        dto.hourly_rate = Some(12.5);
        dto.schedule = Some(schedule_dto());
        let record = build_record(&dto).unwrap();
        assert!(record.hourly_rate.is_some());
        assert!(record.fixed_price.is_none());
        assert!(record.schedule.is_some());

        dto.schedule = None;
        assert!(matches!(build_record(&dto), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn contract_requires_contract_terms_and_flag_agreement() {
        let mut dto = one_off_dto();
        dto.job_type = JobType::Contract;
        dto.fixed_price = None;
        dto.schedule = Some(schedule_dto());
        dto.contract = Some(ContractDto {
            contract_type: ContractType::PartTime,
            monthly_salary: 1800.0,
            social_security: true,
        });
        let record = build_record(&dto).unwrap();
        assert!(record.contract.is_some());
        assert!(record.fixed_price.is_none() && record.hourly_rate.is_none());

        dto.contract = None;
        assert!(matches!(build_record(&dto), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn schedule_rejects_bad_days_and_inverted_times() {
        let mut schedule = schedule_dto();
        schedule.days = vec![7];
        assert!(build_schedule(&schedule).is_err());

        let mut schedule = schedule_dto();
        schedule.days.clear();
        assert!(build_schedule(&schedule).is_err());

        let mut schedule = schedule_dto();
        schedule.end_time = schedule.start_time;
        assert!(build_schedule(&schedule).is_err());
    }

    #[test]
    fn admin_posts_free_of_charge() {
        let entitlement = resolve_entitlement(UserRole::Admin, None, false).unwrap();
        assert_eq!(entitlement, PostingEntitlement::Free);
    }

    #[test]
    fn subscription_quota_covers_the_posting() {
        let subscription = active_subscription(1);
        let entitlement =
            resolve_entitlement(UserRole::Company, Some(&subscription), false).unwrap();
        assert_eq!(entitlement, PostingEntitlement::Subscription(subscription.id));
    }

    #[test]
    fn no_quota_and_no_payment_conflicts() {
        // Quota just ran out and no payment was confirmed.
        let result = resolve_entitlement(UserRole::Company, None, false);
        assert!(matches!(result, Err(ServiceError::Conflict(_))));

        let entitlement = resolve_entitlement(UserRole::Requester, None, true).unwrap();
        assert_eq!(entitlement, PostingEntitlement::PaidPost);
    }
}
