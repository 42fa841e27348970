//! Decomposition of an operation's parameters and body schema into typed
//! `Variable` rows (C3).

pub mod extractor;
