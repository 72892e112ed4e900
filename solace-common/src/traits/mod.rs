pub mod repository_traits;

pub use repository_traits::{
    ChatMessageRepository, ChatSessionRepository, ScheduledSessionRepository, SupporterRepository,
};
