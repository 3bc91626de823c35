//! Integration tests for extraction and the retrieval service.
//!
//! Everything runs offline: the service tests use the hashing embedder and a
//! scratch LanceDB directory per test.

pub mod extraction_integration;
pub mod service_integration;
