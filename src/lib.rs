pub mod classify;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod invocation;
pub mod listener;
pub mod logging;
pub mod paths;
pub mod platform;
pub mod results;
pub mod task;
pub mod validation;
pub mod worker;
