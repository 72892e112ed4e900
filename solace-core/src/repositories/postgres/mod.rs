// src/repositories/postgres/mod.rs

pub mod chat_messages;
pub mod chat_sessions;
pub mod scheduled_sessions;
pub mod supporters;

pub use chat_messages::PostgresChatMessageRepository;
pub use chat_sessions::PostgresChatSessionRepository;
pub use scheduled_sessions::PostgresScheduledSessionRepository;
pub use supporters::PostgresSupporterRepository;
