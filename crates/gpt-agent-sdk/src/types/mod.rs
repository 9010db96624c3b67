pub mod content;
pub mod message;
pub mod turn;

pub use content::ContentBlock;
pub use message::{AssistantMessage, ErrorMessage, Message, ResultMessage, SystemMessage, Usage};
pub use turn::{Role, Turn};
