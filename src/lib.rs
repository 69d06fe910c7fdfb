//! Command-line client for custom applications on the DataRobot platform.
//!
//! The crate is layered leaf first: [`api`] wraps the REST API, [`upload`]
//! streams a project directory into a source version, [`poller`] waits for
//! asynchronous jobs, and [`cli`] composes them into the `drapps` commands.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod poller;
pub mod upload;
