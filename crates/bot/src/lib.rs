//! Storefront dialogue bot
//!
//! Turns transport updates into dialogue transitions:
//! - **Events** (`events`) - inbound update model and its dialogue classification
//! - **Replies** (`replies`) - outbound messages, inline keyboards, reply sinks
//! - **Handlers** (`handlers`) - one handler per dialogue state and the registry binding them
//! - **Dispatcher** (`dispatcher`) - load session, ensure token, run handler, persist
//! - **Lanes** (`lanes`) - per-user ordered workers with a bound on active users
//! - **Polling** (`polling`) - update transport loop with reconnect/backoff
//!
//! # Architecture
//!
//! ```text
//! Transport → PollingRunner → LaneRouter → EventDispatcher → HandlerRegistry → Catalog
//!                                               ↓
//!                              SessionRepository   ReplySink → Transport
//! ```

pub mod dispatcher;
pub mod events;
pub mod handlers;
pub mod keyboards;
pub mod lanes;
pub mod polling;
pub mod replies;

pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use events::{EventPayload, InboundEvent, InboundHandler};
pub use handlers::{
    HandlerRegistry, HandlerReply, HandlerRequest, StateHandler, Storefront, ViewHandler,
};
pub use lanes::LaneRouter;
pub use polling::{
    NoopUpdateTransport, PollingRunner, ReconnectPolicy, RunnerError, TransportError,
    UpdateTransport,
};
pub use replies::{Button, DeliveryError, OutboundMessage, RecordingSink, ReplySink};
