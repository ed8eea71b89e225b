pub mod assignment;
pub mod chat;
pub mod commercial;
pub mod connection_user;
pub mod ids;
pub mod message;

pub use assignment::*;
pub use chat::*;
pub use commercial::*;
pub use connection_user::*;
pub use ids::*;
pub use message::*;
