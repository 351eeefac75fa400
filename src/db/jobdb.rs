use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::types::BigDecimal;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use super::subscriptiondb::CONSUME_QUOTA_SQL;
use crate::models::jobmodel::*;
use crate::models::subscriptionmodel::Subscription;

/// Stable tags carried in `Error::Protocol` for state-machine violations
/// detected inside conditional updates. The service layer maps them to
/// Conflict responses.
pub const JOB_NOT_OPEN: &str = "job_not_open";
pub const JOB_NOT_CANCELLED: &str = "job_not_cancelled";
pub const APPLICATION_NOT_PENDING: &str = "application_not_pending";
pub const QUOTA_EXHAUSTED: &str = "quota_exhausted";

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub days: Vec<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewContract {
    pub contract_type: ContractType,
    pub monthly_salary: BigDecimal,
    pub social_security: bool,
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub title: String,
    pub description: String,
    pub category: JobCategory,
    pub district: String,
    pub city: String,
    pub job_type: JobType,
    pub fixed_price: Option<BigDecimal>,
    pub hourly_rate: Option<BigDecimal>,
    pub schedule: Option<NewSchedule>,
    pub contract: Option<NewContract>,
}

#[async_trait]
pub trait JobExt {
    /// Insert a job (plus schedule/contract sub-records) and, when the
    /// posting is covered by a subscription, consume one quota unit in the
    /// same transaction. The decrement is conditional; exhausted quota
    /// aborts the whole creation.
    async fn create_job(
        &self,
        owner_id: Uuid,
        record: &NewJobRecord,
        consume_subscription: Option<Uuid>,
    ) -> Result<Job, Error>;

    async fn get_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, Error>;

    async fn get_schedule_for_job(&self, job_id: Uuid) -> Result<Option<Schedule>, Error>;

    async fn get_contract_for_job(&self, job_id: Uuid) -> Result<Option<Contract>, Error>;

    async fn list_open_jobs(
        &self,
        category: Option<JobCategory>,
        district: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, Error>;

    async fn list_jobs_by_owner(&self, owner_id: Uuid) -> Result<Vec<Job>, Error>;

    async fn pause_job(&self, job_id: Uuid) -> Result<Job, Error>;

    async fn reactivate_job(&self, job_id: Uuid) -> Result<Job, Error>;

    async fn delete_job(&self, job_id: Uuid) -> Result<(), Error>;

    /// Insert an application iff the job is still open, in one statement.
    async fn create_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        proposed_rate: BigDecimal,
        message: String,
    ) -> Result<Application, Error>;

    async fn get_application_by_id(&self, application_id: Uuid) -> Result<Option<Application>, Error>;

    async fn list_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>, Error>;

    async fn list_applications_by_worker(&self, worker_id: Uuid) -> Result<Vec<Application>, Error>;

    /// The accept cascade, one transaction: job OPEN -> IN_PROGRESS with the
    /// selected worker, target application -> ACCEPTED, every sibling
    /// PENDING application -> REJECTED. Two concurrent accepts race on the
    /// conditional job update; exactly one commits.
    async fn accept_application(
        &self,
        job_id: Uuid,
        application_id: Uuid,
    ) -> Result<(Job, Application), Error>;

    async fn reject_application(&self, application_id: Uuid) -> Result<Application, Error>;
}

#[async_trait]
impl JobExt for DBClient {
    async fn create_job(
        &self,
        owner_id: Uuid,
        record: &NewJobRecord,
        consume_subscription: Option<Uuid>,
    ) -> Result<Job, Error> {
        let mut tx = self.pool.begin().await?;

        if let Some(subscription_id) = consume_subscription {
            // Same conditional decrement as the standalone consume path,
            // executed inside this transaction.
            let consumed = sqlx::query_as::<_, Subscription>(CONSUME_QUOTA_SQL)
                .bind(subscription_id)
                .fetch_optional(&mut *tx)
                .await?;

            if consumed.is_none() {
                return Err(Error::Protocol(QUOTA_EXHAUSTED.into()));
            }
        }

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs
            (owner_id, title, description, category, district, city,
             job_type, fixed_price, hourly_rate, is_contract)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.category)
        .bind(&record.district)
        .bind(&record.city)
        .bind(record.job_type)
        .bind(&record.fixed_price)
        .bind(&record.hourly_rate)
        .bind(record.contract.is_some())
        .fetch_one(&mut *tx)
        .await?;

        if let Some(schedule) = &record.schedule {
            sqlx::query(
                r#"
                INSERT INTO job_schedules (job_id, days, start_time, end_time, date_from, date_to)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(job.id)
            .bind(&schedule.days)
            .bind(schedule.start_time)
            .bind(schedule.end_time)
            .bind(schedule.date_from)
            .bind(schedule.date_to)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(contract) = &record.contract {
            sqlx::query(
                r#"
                INSERT INTO job_contracts (job_id, contract_type, monthly_salary, social_security)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(job.id)
            .bind(contract.contract_type)
            .bind(&contract.monthly_salary)
            .bind(contract.social_security)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(job)
    }

    async fn get_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        sqlx::query_as::<_, Job>(r#"SELECT * FROM jobs WHERE id = $1"#)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_schedule_for_job(&self, job_id: Uuid) -> Result<Option<Schedule>, Error> {
        sqlx::query_as::<_, Schedule>(r#"SELECT * FROM job_schedules WHERE job_id = $1"#)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_contract_for_job(&self, job_id: Uuid) -> Result<Option<Contract>, Error> {
        sqlx::query_as::<_, Contract>(r#"SELECT * FROM job_contracts WHERE job_id = $1"#)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_open_jobs(
        &self,
        category: Option<JobCategory>,
        district: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'open'::job_status
              AND ($1::job_category IS NULL OR category = $1)
              AND ($2::text IS NULL OR district = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(category)
        .bind(district)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_jobs_by_owner(&self, owner_id: Uuid) -> Result<Vec<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"SELECT * FROM jobs WHERE owner_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn pause_job(&self, job_id: Uuid) -> Result<Job, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'cancelled'::job_status, updated_at = NOW()
            WHERE id = $1 AND status = 'open'::job_status
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Protocol(JOB_NOT_OPEN.into()))
    }

    async fn reactivate_job(&self, job_id: Uuid) -> Result<Job, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'open'::job_status, updated_at = NOW()
            WHERE id = $1 AND status = 'cancelled'::job_status
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Protocol(JOB_NOT_CANCELLED.into()))
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<(), Error> {
        let deleted = sqlx::query(
            r#"DELETE FROM jobs WHERE id = $1 AND status = 'open'::job_status"#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if deleted.rows_affected() == 0 {
            return Err(Error::Protocol(JOB_NOT_OPEN.into()));
        }
        Ok(())
    }

    async fn create_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        proposed_rate: BigDecimal,
        message: String,
    ) -> Result<Application, Error> {
        sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO job_applications (job_id, worker_id, proposed_rate, message)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (
                SELECT 1 FROM jobs WHERE id = $1 AND status = 'open'::job_status
            )
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(proposed_rate)
        .bind(message)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Protocol(JOB_NOT_OPEN.into()))
    }

    async fn get_application_by_id(&self, application_id: Uuid) -> Result<Option<Application>, Error> {
        sqlx::query_as::<_, Application>(
            r#"SELECT * FROM job_applications WHERE id = $1"#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>, Error> {
        sqlx::query_as::<_, Application>(
            r#"SELECT * FROM job_applications WHERE job_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_applications_by_worker(&self, worker_id: Uuid) -> Result<Vec<Application>, Error> {
        sqlx::query_as::<_, Application>(
            r#"SELECT * FROM job_applications WHERE worker_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn accept_application(
        &self,
        job_id: Uuid,
        application_id: Uuid,
    ) -> Result<(Job, Application), Error> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'in_progress'::job_status,
                selected_worker_id = (
                    SELECT worker_id FROM job_applications WHERE id = $2
                ),
                updated_at = NOW()
            WHERE id = $1 AND status = 'open'::job_status
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::Protocol(JOB_NOT_OPEN.into()))?;

        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE job_applications
            SET status = 'accepted'::application_status
            WHERE id = $1 AND job_id = $2 AND status = 'pending'::application_status
            RETURNING *
            "#,
        )
        .bind(application_id)
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::Protocol(APPLICATION_NOT_PENDING.into()))?;

        sqlx::query(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status
            WHERE job_id = $1 AND id != $2 AND status = 'pending'::application_status
            "#,
        )
        .bind(job_id)
        .bind(application_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((job, application))
    }

    async fn reject_application(&self, application_id: Uuid) -> Result<Application, Error> {
        sqlx::query_as::<_, Application>(
            r#"
            UPDATE job_applications
            SET status = 'rejected'::application_status
            WHERE id = $1 AND status = 'pending'::application_status
            RETURNING *
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::Protocol(APPLICATION_NOT_PENDING.into()))
    }
}
