use async_trait::async_trait;
use sqlx::types::BigDecimal;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::jobmodel::Job;
use crate::models::ledgermodel::{PaymentMethod, Transaction};

pub const JOB_NOT_IN_PROGRESS: &str = "job_not_in_progress";
pub const JOB_HAS_NO_WORKER: &str = "job_has_no_worker";

#[async_trait]
pub trait LedgerExt {
    /// Settlement: move the job IN_PROGRESS -> COMPLETED and write the
    /// paired ledger rows, all in one transaction. The status update is
    /// conditional, so a second settle call conflicts instead of
    /// duplicating rows, and a failed ledger write rolls the status back.
    async fn settle_job(
        &self,
        job_id: Uuid,
        amount: BigDecimal,
        payment_method: PaymentMethod,
    ) -> Result<(Job, Transaction, Transaction), Error>;

    async fn list_transactions_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, Error>;

    async fn list_transactions_for_job(&self, job_id: Uuid) -> Result<Vec<Transaction>, Error>;
}

#[async_trait]
impl LedgerExt for DBClient {
    async fn settle_job(
        &self,
        job_id: Uuid,
        amount: BigDecimal,
        payment_method: PaymentMethod,
    ) -> Result<(Job, Transaction, Transaction), Error> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'completed'::job_status, updated_at = NOW()
            WHERE id = $1 AND status = 'in_progress'::job_status
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::Protocol(JOB_NOT_IN_PROGRESS.into()))?;

        let worker_id = job
            .selected_worker_id
            .ok_or_else(|| Error::Protocol(JOB_HAS_NO_WORKER.into()))?;

        let payment = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, transaction_type, amount, job_id, payment_method)
            VALUES ($1, 'payment'::transaction_type, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(job.owner_id)
        .bind(-amount.clone())
        .bind(job_id)
        .bind(payment_method)
        .fetch_one(&mut *tx)
        .await?;

        let income = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, transaction_type, amount, job_id, payment_method)
            VALUES ($1, 'income'::transaction_type, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(amount)
        .bind(job_id)
        .bind(payment_method)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((job, payment, income))
    }

    async fn list_transactions_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, Error> {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_transactions_for_job(&self, job_id: Uuid) -> Result<Vec<Transaction>, Error> {
        sqlx::query_as::<_, Transaction>(
            r#"SELECT * FROM transactions WHERE job_id = $1 ORDER BY created_at"#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }
}
