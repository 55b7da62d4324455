//! Agent Architect: build, test and tune LLM agent personas.
//!
//! Documents, links and sector research become a tagged knowledge buffer;
//! the buffer and the persona fields are assembled into instruction text;
//! generated scenarios grade those instructions and failed answers feed a
//! rewrite. Every generative step goes through the [`providers::TextOracle`]
//! and [`providers::SearchOracle`] capabilities; all state goes through
//! [`store::Gateway`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;
pub mod providers;

pub mod knowledge;
pub mod summarizer;

pub mod agent;
pub mod assembler;
pub mod conversation;
pub mod discovery;
pub mod optimizer;
pub mod simulation;

pub mod architect;
pub mod store;
