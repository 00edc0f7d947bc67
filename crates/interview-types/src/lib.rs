//now people using the types library can use these types
pub mod api;
pub mod events;
pub mod session;
mod content;

//re-export types for easier access
pub use content::history::{HistoryEntry, Role};
pub use events::{ClientEvent, ServerEvent};
pub use session::{InterviewStyle, Language, SessionDescriptor, SessionId};
