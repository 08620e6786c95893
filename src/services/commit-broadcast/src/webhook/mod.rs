//! GitHub webhook intake
//!
//! - [`signature`]: `X-Hub-Signature-256` verification
//! - [`summary`]: commit digest passed to the post generator
//! - [`router`]: per-delivery flow from raw body to queued job

pub mod router;
pub mod signature;
pub mod summary;

pub use router::WebhookRouter;
pub use signature::{compute_signature, signature_header, verify};
pub use summary::summarize;
