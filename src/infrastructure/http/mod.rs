pub mod chats;
pub mod commercials;
pub mod error;
pub mod realtime;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
