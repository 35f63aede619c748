//! Extension loading workflow.
//!
//! Fetches untrusted extension modules by URL, resolves id collisions with
//! the user and hands the result to the host runtime. Dialog rendering and
//! the runtime itself are collaborators behind traits.

pub mod dialog;
pub mod fetcher;
pub mod messages;
pub mod resolver;
pub mod workflow;
