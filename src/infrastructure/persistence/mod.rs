pub mod assignment_rules;
pub mod chats;
pub mod connection_registry;
pub mod messages;

pub use assignment_rules::InMemoryAssignmentRulesRepository;
pub use chats::InMemoryChatRepository;
pub use connection_registry::InMemoryConnectionRegistry;
pub use messages::InMemoryMessageRepository;
