//! Application layer containing the reconciliation engine.
//!
//! This module defines the `LinkEngine` which acts as the primary entry point
//! for attaching a payment method to an account. Confirmation arrives
//! out-of-band on the backend, so the engine converges by polling through the
//! `Reconciler`, with the `ResumeHandler` forcing early probes when the host
//! returns to the foreground.

pub mod engine;
pub mod reconciler;
pub mod resume;
pub mod verifier;
