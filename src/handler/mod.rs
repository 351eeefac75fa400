pub mod chat;
pub mod jobs;
pub mod subscriptions;
pub mod transactions;
pub mod users;
