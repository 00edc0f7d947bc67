pub mod error;
pub mod events;
pub mod realtime_api;
pub mod room;
pub mod session_api;
pub mod session_state;
pub mod templates;
pub mod transcript;
pub mod turn;

pub use error::RoomError;
pub use events::{Envelope, TransportEvent};
pub use realtime_api::SessionTransport;
pub use room::{InterviewRoom, RoomExit, RoomView, UserAction};
pub use session_state::{ConnectionStatus, InterviewSession, SessionPhase};
pub use turn::{Speaker, Turn, TurnKind};
