//! PressPilot Engage - inbound email-engagement webhook engine.
//!
//! Ingests delivery/open/click/bounce event batches from the email
//! provider, verifies their authenticity, deduplicates them against
//! at-least-once delivery, and atomically updates aggregate counters on
//! the associated campaign records.
//!
//! # Pipeline
//!
//! 1. **Signature gate**: ECDSA P-256 verification over the raw body
//!    ([`signature`])
//! 2. **Normalization**: per-event validation with failure isolation
//!    ([`normalize`])
//! 3. **Deduplication**: deterministic content-derived document ids
//!    ([`dedup`])
//! 4. **Persistence**: chunked atomic commits with commutative counter
//!    increments ([`persist`], [`store`])
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use engage::EngineConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load()?;
//!     engage::start_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dedup;
pub mod error;
pub mod event;
pub mod middleware;
pub mod normalize;
pub mod persist;
pub mod routes;
pub mod server;
pub mod signature;
pub mod state;
pub mod store;

pub use config::EngineConfig;
pub use error::{WebhookError, WebhookResult};
pub use event::{EngagementEvent, EventType, InboundEvent};
pub use server::{build_router, start_server};
pub use signature::SignaturePolicy;
pub use state::EngineState;
