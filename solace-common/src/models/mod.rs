pub mod chat;
pub mod identity;
pub mod realtime;
pub mod session;
pub mod supporter;

pub use chat::{
    ActiveChatSummary, ChatMessage, ChatSession, ChatSessionStatus, EnsureActiveChatSession,
    EnsureOutcome, MarkReadOutcome, NewChatMessage,
};
pub use identity::{Identity, Role};
pub use realtime::{ClientEvent, ConnectionId, RawId, ServerEvent};
pub use session::{NewScheduledSession, ScheduleRequest, ScheduledSession, SessionStatus, SessionType};
pub use supporter::{SupporterProfile, SupporterStatus};
