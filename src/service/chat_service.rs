use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::{
    db::{chatdb::ChatExt, db::DBClient, jobdb::JobExt},
    models::{
        chatmodel::{Chat, Message},
        usermodel::Profile,
    },
    service::error::ServiceError,
};

const CHANNEL_CAPACITY: usize = 256;

/// A locally echoed message awaiting server confirmation. Kept in the
/// outbox until the insert succeeds; preserved on failure so the input can
/// be retried.
#[derive(Debug, Clone, Serialize)]
pub struct PendingMessage {
    pub client_ref: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub queued_at: DateTime<Utc>,
}

/// Confirmation returned to the sender: the client_ref it supplied plus the
/// server record it reconciles to.
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub client_ref: Uuid,
    pub message: Message,
}

/// Per-job messaging channel: history, optimistic send with reconciliation,
/// live fan-out, read receipts. Delivery on the live feed is at-least-once;
/// consumers deduplicate by message id.
#[derive(Debug)]
pub struct ChatService {
    db_client: Arc<DBClient>,
    channels: Mutex<HashMap<Uuid, broadcast::Sender<Message>>>,
    outbox: Mutex<HashMap<Uuid, PendingMessage>>,
    send_locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl ChatService {
    pub fn new(db_client: Arc<DBClient>) -> Self {
        Self {
            db_client,
            channels: Mutex::new(HashMap::new()),
            outbox: Mutex::new(HashMap::new()),
            send_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Find-or-create the chat for (job, requester, worker). The pair must
    /// contain the job owner, and the caller must be part of it.
    pub async fn open_or_create(
        &self,
        caller: &Profile,
        job_id: Uuid,
        other_id: Uuid,
    ) -> Result<Chat, ServiceError> {
        if other_id == caller.id {
            return Err(ServiceError::Validation(
                "Cannot open a chat with yourself".to_string(),
            ));
        }

        let job = self
            .db_client
            .get_job_by_id(job_id)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound("Job not found".to_string()))?;

        let (requester_id, worker_id) = if caller.id == job.owner_id {
            (caller.id, other_id)
        } else if other_id == job.owner_id {
            (other_id, caller.id)
        } else {
            return Err(ServiceError::Forbidden(
                "Chat participants must include the job owner".to_string(),
            ));
        };

        self.db_client
            .open_or_create_chat(job_id, requester_id, worker_id)
            .await
            .map_err(ServiceError::from_db)
    }

    /// Optimistic send: the draft is held in the outbox keyed by client_ref
    /// while the insert runs. Success confirms and broadcasts; failure
    /// leaves the draft behind for retry. Insert and broadcast happen under
    /// a per-chat lock, so the feed delivers in sent_at order even when two
    /// senders race.
    pub async fn send(
        &self,
        caller: &Profile,
        chat_id: Uuid,
        client_ref: Uuid,
        body: String,
    ) -> Result<SendReceipt, ServiceError> {
        if body.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Message body cannot be empty".to_string(),
            ));
        }

        let chat = self.require_participant(caller, chat_id).await?;

        self.register_draft(PendingMessage {
            client_ref,
            chat_id: chat.id,
            sender_id: caller.id,
            body: body.clone(),
            queued_at: Utc::now(),
        });

        let lock = self.chat_lock(chat.id);
        let _ordered = lock.lock().await;

        match self.db_client.insert_message(chat.id, caller.id, body).await {
            Ok(message) => {
                self.confirm_draft(client_ref);
                self.publish(chat.id, message.clone());
                Ok(SendReceipt { client_ref, message })
            }
            Err(err) => {
                tracing::warn!(chat_id = %chat.id, %client_ref, "message send failed, draft kept");
                Err(ServiceError::from_db(err))
            }
        }
    }

    /// Drafts whose sends failed, preserved for retry.
    pub fn failed_drafts(&self, sender_id: Uuid) -> Vec<PendingMessage> {
        let outbox = self.outbox.lock().unwrap();
        let mut drafts: Vec<PendingMessage> = outbox
            .values()
            .filter(|draft| draft.sender_id == sender_id)
            .cloned()
            .collect();
        drafts.sort_by_key(|draft| draft.queued_at);
        drafts
    }

    pub fn discard_draft(&self, sender_id: Uuid, client_ref: Uuid) -> bool {
        let mut outbox = self.outbox.lock().unwrap();
        match outbox.get(&client_ref) {
            Some(draft) if draft.sender_id == sender_id => {
                outbox.remove(&client_ref);
                true
            }
            _ => false,
        }
    }

    /// Live feed of messages appended after subscription time, in
    /// non-decreasing sent_at order, at-least-once.
    pub async fn subscribe(
        &self,
        caller: &Profile,
        chat_id: Uuid,
    ) -> Result<broadcast::Receiver<Message>, ServiceError> {
        self.require_participant(caller, chat_id).await?;
        Ok(self.channel(chat_id).subscribe())
    }

    pub async fn history(
        &self,
        caller: &Profile,
        chat_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, ServiceError> {
        self.require_participant(caller, chat_id).await?;
        self.db_client
            .get_chat_messages(chat_id, limit, offset)
            .await
            .map_err(ServiceError::from_db)
    }

    pub async fn mark_read(&self, caller: &Profile, chat_id: Uuid) -> Result<u64, ServiceError> {
        self.require_participant(caller, chat_id).await?;
        self.db_client
            .mark_messages_read(chat_id, caller.id)
            .await
            .map_err(ServiceError::from_db)
    }

    pub async fn list_chats(
        &self,
        caller: &Profile,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, ServiceError> {
        self.db_client
            .list_chats_for_user(caller.id, limit, offset)
            .await
            .map_err(ServiceError::from_db)
    }

    pub async fn unread_count(&self, caller: &Profile) -> Result<i64, ServiceError> {
        self.db_client
            .get_unread_count(caller.id)
            .await
            .map_err(ServiceError::from_db)
    }

    async fn require_participant(
        &self,
        caller: &Profile,
        chat_id: Uuid,
    ) -> Result<Chat, ServiceError> {
        let chat = self
            .db_client
            .get_chat_by_id(chat_id)
            .await
            .map_err(ServiceError::from_db)?
            .ok_or_else(|| ServiceError::NotFound("Chat not found".to_string()))?;

        if !chat.has_participant(caller.id) {
            return Err(ServiceError::Forbidden(
                "Not a participant of this chat".to_string(),
            ));
        }
        Ok(chat)
    }

    /// Drop the chat's broadcast sender once its last feed has closed.
    /// Called by the socket handler after the forward loop ends.
    pub fn release_channel(&self, chat_id: Uuid) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(&chat_id) {
            if sender.receiver_count() == 0 {
                channels.remove(&chat_id);
            }
        }
    }

    fn channel(&self, chat_id: Uuid) -> broadcast::Sender<Message> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(chat_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn publish(&self, chat_id: Uuid, message: Message) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(&chat_id) {
            // Send fails only when no subscriber is listening; the idle
            // channel is pruned so quiet chats do not accumulate senders.
            if sender.send(message).is_err() {
                channels.remove(&chat_id);
            }
        }
    }

    /// One async mutex per chat; senders on the same chat serialize their
    /// insert-then-broadcast sequence through it.
    fn chat_lock(&self, chat_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.send_locks.lock().unwrap();
        locks.entry(chat_id).or_default().clone()
    }

    fn register_draft(&self, draft: PendingMessage) {
        self.outbox.lock().unwrap().insert(draft.client_ref, draft);
    }

    fn confirm_draft(&self, client_ref: Uuid) {
        self.outbox.lock().unwrap().remove(&client_ref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPool;
    use std::collections::HashSet;

    fn service() -> ChatService {
        let pool = PgPool::connect_lazy("postgres://localhost/worklink").unwrap();
        ChatService::new(Arc::new(DBClient::new(pool)))
    }

    fn message(chat_id: Uuid, body: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id,
            sender_id: Uuid::new_v4(),
            body: body.to_string(),
            sent_at: Utc::now(),
            read_at: None,
        }
    }

    fn draft(sender_id: Uuid) -> PendingMessage {
        PendingMessage {
            client_ref: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            sender_id,
            body: "hello".to_string(),
            queued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn confirmed_drafts_leave_the_outbox() {
        let svc = service();
        let sender = Uuid::new_v4();
        let pending = draft(sender);
        let client_ref = pending.client_ref;

        svc.register_draft(pending);
        assert_eq!(svc.failed_drafts(sender).len(), 1);

        svc.confirm_draft(client_ref);
        assert!(svc.failed_drafts(sender).is_empty());
    }

    #[tokio::test]
    async fn failed_drafts_are_preserved_for_retry_and_discardable() {
        let svc = service();
        let sender = Uuid::new_v4();
        let pending = draft(sender);
        let client_ref = pending.client_ref;
        let body = pending.body.clone();

        svc.register_draft(pending);
        let drafts = svc.failed_drafts(sender);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].body, body);

        // Another user cannot discard someone else's draft.
        assert!(!svc.discard_draft(Uuid::new_v4(), client_ref));
        assert!(svc.discard_draft(sender, client_ref));
        assert!(svc.failed_drafts(sender).is_empty());
    }

    #[tokio::test]
    async fn subscribers_receive_messages_in_publish_order() {
        let svc = service();
        let chat_id = Uuid::new_v4();
        let mut rx = svc.channel(chat_id).subscribe();

        let first = message(chat_id, "first");
        let second = message(chat_id, "second");
        svc.publish(chat_id, first.clone());
        svc.publish(chat_id, second.clone());

        assert_eq!(rx.recv().await.unwrap().id, first.id);
        assert_eq!(rx.recv().await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn duplicate_deliveries_are_deduplicated_by_id() {
        let svc = service();
        let chat_id = Uuid::new_v4();
        let mut rx = svc.channel(chat_id).subscribe();

        // At-least-once: the same message may arrive twice.
        let msg = message(chat_id, "once");
        svc.publish(chat_id, msg.clone());
        svc.publish(chat_id, msg.clone());

        let mut seen = HashSet::new();
        let mut delivered = Vec::new();
        for _ in 0..2 {
            let received = rx.recv().await.unwrap();
            if seen.insert(received.id) {
                delivered.push(received);
            }
        }
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, msg.id);
    }

    #[tokio::test]
    async fn same_chat_shares_one_send_lock() {
        let svc = service();
        let chat_id = Uuid::new_v4();

        assert!(Arc::ptr_eq(&svc.chat_lock(chat_id), &svc.chat_lock(chat_id)));
        assert!(!Arc::ptr_eq(
            &svc.chat_lock(chat_id),
            &svc.chat_lock(Uuid::new_v4())
        ));
    }

    #[tokio::test]
    async fn racing_senders_deliver_in_sent_at_order() {
        let svc = Arc::new(service());
        let chat_id = Uuid::new_v4();
        let mut rx = svc.channel(chat_id).subscribe();

        // Each task stamps and publishes under the same per-chat lock that
        // send() holds across insert and broadcast.
        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                let lock = svc.chat_lock(chat_id);
                let _ordered = lock.lock().await;
                let msg = Message {
                    id: Uuid::new_v4(),
                    chat_id,
                    sender_id: Uuid::new_v4(),
                    body: "racing".to_string(),
                    sent_at: Utc::now(),
                    read_at: None,
                };
                svc.publish(chat_id, msg);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut last_sent_at = None;
        for _ in 0..8 {
            let received = rx.recv().await.unwrap();
            if let Some(previous) = last_sent_at {
                assert!(received.sent_at >= previous);
            }
            last_sent_at = Some(received.sent_at);
        }
    }

    #[tokio::test]
    async fn publishing_to_a_deserted_chat_prunes_its_channel() {
        let svc = service();
        let chat_id = Uuid::new_v4();

        let rx = svc.channel(chat_id).subscribe();
        drop(rx);

        svc.publish(chat_id, message(chat_id, "nobody listening"));
        assert!(!svc.channels.lock().unwrap().contains_key(&chat_id));
    }

    #[tokio::test]
    async fn release_keeps_channels_with_live_subscribers() {
        let svc = service();
        let chat_id = Uuid::new_v4();
        let rx = svc.channel(chat_id).subscribe();

        svc.release_channel(chat_id);
        assert!(svc.channels.lock().unwrap().contains_key(&chat_id));

        drop(rx);
        svc.release_channel(chat_id);
        assert!(!svc.channels.lock().unwrap().contains_key(&chat_id));
    }

    #[tokio::test]
    async fn subscription_only_sees_messages_after_it_starts() {
        let svc = service();
        let chat_id = Uuid::new_v4();

        // Published before anyone listens: dropped, not replayed.
        svc.publish(chat_id, message(chat_id, "early"));

        let mut rx = svc.channel(chat_id).subscribe();
        let late = message(chat_id, "late");
        svc.publish(chat_id, late.clone());

        assert_eq!(rx.recv().await.unwrap().id, late.id);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
