//! Core library behind the `sfenv` binary: exporting the current org session to an
//! env file and running the account query against the org's REST API.

pub mod command;
pub mod config;
pub mod envfile;
pub mod export;
pub mod keys;
pub mod query;
pub mod remote;
pub mod session;
