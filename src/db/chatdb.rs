use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::chatmodel::{Chat, Message};

#[async_trait]
pub trait ChatExt {
    /// Find-or-create keyed by (job_id, unordered participant pair). The
    /// lookup checks both orderings; creation relies on the pair uniqueness
    /// index, and a loser of a concurrent insert race retries the lookup
    /// instead of erroring. Never read-then-insert without the retry.
    async fn open_or_create_chat(
        &self,
        job_id: Uuid,
        requester_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Chat, Error>;

    async fn get_chat_by_id(&self, chat_id: Uuid) -> Result<Option<Chat>, Error>;

    async fn list_chats_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, Error>;

    /// Append a message with a server-assigned sent_at and bump the chat's
    /// last_message_at in the same transaction.
    async fn insert_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        body: String,
    ) -> Result<Message, Error>;

    /// History in ascending sent_at order.
    async fn get_chat_messages(
        &self,
        chat_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, Error>;

    /// Idempotent: stamps read_at only on unread messages not authored by
    /// the reader, so repeated calls leave timestamps untouched.
    async fn mark_messages_read(&self, chat_id: Uuid, reader_id: Uuid) -> Result<u64, Error>;

    async fn get_unread_count(&self, user_id: Uuid) -> Result<i64, Error>;
}

async fn find_chat(
    db: &DBClient,
    job_id: Uuid,
    a: Uuid,
    b: Uuid,
) -> Result<Option<Chat>, Error> {
    sqlx::query_as::<_, Chat>(
        r#"
        SELECT * FROM chats
        WHERE job_id = $1
          AND ((requester_id = $2 AND worker_id = $3)
            OR (requester_id = $3 AND worker_id = $2))
        "#,
    )
    .bind(job_id)
    .bind(a)
    .bind(b)
    .fetch_optional(&db.pool)
    .await
}

fn is_unique_violation(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[async_trait]
impl ChatExt for DBClient {
    async fn open_or_create_chat(
        &self,
        job_id: Uuid,
        requester_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Chat, Error> {
        if let Some(chat) = find_chat(self, job_id, requester_id, worker_id).await? {
            return Ok(chat);
        }

        let inserted = sqlx::query_as::<_, Chat>(
            r#"
            INSERT INTO chats (job_id, requester_id, worker_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(requester_id)
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(chat) => Ok(chat),
            Err(err) if is_unique_violation(&err) => {
                // Both participants raced on creation; the row now exists.
                find_chat(self, job_id, requester_id, worker_id)
                    .await?
                    .ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn get_chat_by_id(&self, chat_id: Uuid) -> Result<Option<Chat>, Error> {
        sqlx::query_as::<_, Chat>(r#"SELECT * FROM chats WHERE id = $1"#)
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_chats_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, Error> {
        sqlx::query_as::<_, Chat>(
            r#"
            SELECT * FROM chats
            WHERE requester_id = $1 OR worker_id = $1
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn insert_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        body: String,
    ) -> Result<Message, Error> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (chat_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(r#"UPDATE chats SET last_message_at = NOW() WHERE id = $1"#)
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    async fn get_chat_messages(
        &self,
        chat_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE chat_id = $1
            ORDER BY sent_at ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(chat_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_messages_read(&self, chat_id: Uuid, reader_id: Uuid) -> Result<u64, Error> {
        let updated = sqlx::query(
            r#"
            UPDATE messages
            SET read_at = NOW()
            WHERE chat_id = $1
              AND sender_id != $2
              AND read_at IS NULL
            "#,
        )
        .bind(chat_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected())
    }

    async fn get_unread_count(&self, user_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM messages m
            INNER JOIN chats c ON m.chat_id = c.id
            WHERE (c.requester_id = $1 OR c.worker_id = $1)
              AND m.sender_id != $1
              AND m.read_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }
}
