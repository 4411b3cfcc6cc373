//! Batch orchestration of AI employee tasks for ad automation.
//!
//! Every user submits one configuration block per employee. A batch run
//! parses those blocks ([`parser`]), keeps the tasks that are due today and
//! whose dependencies are present, in execution order ([`sequencer`]), then
//! runs each user's tasks one after another ([`dispatcher`]) while users run
//! concurrently under a bounded pool ([`scheduler`]).

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod employees;
pub mod error;
pub mod openai;
pub mod parser;
pub mod provider;
pub mod publisher;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;
pub mod sequencer;
pub mod services;
pub mod sqlite_store;
pub mod storage;
pub mod store;
pub mod ui;
