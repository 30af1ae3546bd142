//! Token-review webhook: the wire contract and the authenticator behind it.

pub mod authenticator;
pub mod wire;

pub use authenticator::{ReviewOutcome, TokenReviewAuthenticator};
pub use wire::{TokenReviewRequest, TokenReviewResponse};
