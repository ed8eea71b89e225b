use crate::domain::errors::DomainResult;
use crate::domain::events::DomainEvent;
use futures::Stream;
use std::pin::Pin;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<DomainEvent, String>> + Send>>;

pub trait EventBus: Send + Sync {
    /// Publish an event to all subscribers
    fn publish(&self, event: DomainEvent) -> DomainResult<()>;

    /// Publish a batch in order
    fn publish_all(&self, events: Vec<DomainEvent>) -> DomainResult<()> {
        for event in events {
            self.publish(event)?;
        }
        Ok(())
    }

    /// Subscribe to events
    /// Returns a stream of events, abstracting away underlying transport errors
    fn subscribe(&self) -> EventStream;
}
