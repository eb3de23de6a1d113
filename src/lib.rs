//! herogen - generate small npm packages with an LLM and publish them
//!
//! An idea becomes one or more package proposals; each proposed function and
//! its test are generated, assembled into an installable package, tested with
//! `npm`, pushed to a new GitHub repository and optionally published to npm.

pub mod cli;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod publish;
pub mod schema;
pub mod util;
pub mod writer;
