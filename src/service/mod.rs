pub mod chat_service;
pub mod error;
pub mod job_service;
