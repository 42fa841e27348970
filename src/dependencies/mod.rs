//! Dependency inference and confirmation: the deterministic linker (C4),
//! the LLM analyzer and its unified post-processing pipeline (C5), and the
//! registry that promotes a candidate into a confirmed edge (C6).

pub mod deterministic;
pub mod llm;
pub mod registry;

pub use llm::{analyze, AnalysisInput, ChatClient, ChatMessage, ChatOptions, ChatRequest, ChatResponse};
pub use registry::{confirm_candidate, confirm_manual};
