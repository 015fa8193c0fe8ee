pub mod conversation;
pub mod user;

pub use conversation::{
    Conversation, ConversationAnalysis, ConversationInitiation, ConversationMetadata,
    DeletionSettings, ToolCall, ToolResult, Transcript,
};
pub use user::AppUser;
