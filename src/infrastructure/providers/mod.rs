pub mod commercial_presence;

pub use commercial_presence::InMemoryCommercialPresence;
