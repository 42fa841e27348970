//! Dependency-aware API test-orchestration engine.
//!
//! Ingests an `OpenAPI` document, decomposes each operation into typed
//! variables, infers producer/consumer dependencies between endpoints
//! (deterministic rules plus an optional LLM pass), and executes the
//! resulting graph layer by layer against a live environment.

pub mod cli;
pub mod constants;
pub mod dependencies;
pub mod environment;
pub mod error;
pub mod executor;
pub mod fs;
pub mod httpclient;
pub mod interactive;
pub mod logging;
pub mod model;
pub mod planner;
pub mod reporting;
pub mod source;
pub mod spec;
pub mod store;
pub mod variables;
