//! Event-driven observation of audit runs
//!
//! 1. **Event Types** (`types.rs`): the six events a run emits, from
//!    `RunStarted` to `ReportSynthesized`.
//!
//! 2. **Event Bus** (`bus.rs`): Tokio broadcast-based pub/sub with an
//!    optional in-memory journal and filtered subscriptions.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Executor   │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────┬───────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │   Journal    │
//!                      └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use audit_engine::events::{EventBus, EventFilter};
//!
//! let bus = EventBus::new().shared();
//! let mut progress = bus.subscribe_filtered(EventFilter::progress());
//!
//! let executor = GraphExecutor::new().with_event_bus(bus.clone());
//! tokio::spawn(async move {
//!     while let Some(event) = progress.next().await {
//!         println!("{}", event.event_type());
//!     }
//! });
//! ```

pub mod bus;
pub mod types;

// Re-export core types
pub use bus::{
    EventBus, EventBusError, EventBusResult, EventFilter, FilteredReceiver, SharedEventBus,
};
pub use types::AuditEvent;
