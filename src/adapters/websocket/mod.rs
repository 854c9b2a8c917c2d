//! WebSocket adapters for real-time notification delivery.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ handler: upgrade → resolve identity → join → event loop      │
//! └──────────────────────────────────────────────────────────────┘
//!        │ inbound frames                    ▲ outbound frames
//!        ▼                                   │
//! ┌────────────────────┐   emissions   ┌──────────────────────────┐
//! │  EventDispatcher   │──────────────►│      ChannelRouter       │
//! │  (application)     │               │ USER_<id> │ GLOBAL_ADMIN │
//! └────────────────────┘               └──────────────────────────┘
//!        │ relay (optional)                  ▲
//!        ▼                                   │ remote emissions
//!   Redis pub/sub ───────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - frame codec
//! - [`channels`] - channel membership and fan-out
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod channels;
pub mod handler;
pub mod messages;

pub use channels::{ChannelRouter, RouterError, Subscription, DEFAULT_CHANNEL_CAPACITY};
pub use handler::{
    notification_router, ws_handler, HandshakeQuery, NotificationSocketState,
    DEFAULT_OUTBOUND_BUFFER,
};
pub use messages::{encode_frame, InboundFrame, UNKNOWN_EVENT_NAME};
