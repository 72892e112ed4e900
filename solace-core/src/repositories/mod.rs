// src/repositories/mod.rs

pub use solace_common::traits::repository_traits::{
    ChatMessageRepository, ChatSessionRepository, ScheduledSessionRepository, SupporterRepository,
};

pub use postgres::{
    PostgresChatMessageRepository, PostgresChatSessionRepository,
    PostgresScheduledSessionRepository, PostgresSupporterRepository,
};

pub mod postgres;
