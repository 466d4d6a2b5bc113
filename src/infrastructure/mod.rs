//! Adapters behind the domain ports: in-memory implementations for tests and
//! embedding, and an HTTP gateway when the `gateway-http` feature is enabled.

#[cfg(feature = "gateway-http")]
pub mod http;
pub mod in_memory;
