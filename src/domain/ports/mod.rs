pub mod assignment_rules_repository;
pub mod chat_repository;
pub mod commercial_availability;
pub mod connection_repository;
pub mod event_bus;
pub mod message_repository;
pub mod realtime_transport;
pub mod task_spawner;
pub mod time_service;
