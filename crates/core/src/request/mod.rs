//! Client request generation and end-to-end orchestration (spec §1's
//! external "request-arrival client" collaborator, specified concretely
//! here, plus the orchestration glue of spec §4.5).

pub mod client;
pub mod orchestration;

pub use client::{Client, InferRequest};
pub use orchestration::Orchestrator;
