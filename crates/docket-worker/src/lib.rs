//! Document change event bus and the stage workers that react to it.
//!
//! Workers never trust an event's payload: every event only names a document, and the
//! worker re-reads the stored record and re-evaluates its stage predicate before acting.
//! Duplicate or re-ordered deliveries therefore end in a no-op.

pub mod bus;
pub mod coordinator;
pub mod finalizer;

pub use bus::{
    create_event_bus, EventBus, EventPublisher, EventSubscriber, InMemoryEventBus,
    PgEventSubscriber, PgNotifyPublisher, PgSubscriptionSource, SubscriptionSource,
};
pub use coordinator::{
    Stage, StageHandler, StageOutcome, StageOutput, StageWorker, StageWorkerHandle,
};
pub use finalizer::{finalizer_worker, Finalizer};
