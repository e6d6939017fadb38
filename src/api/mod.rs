pub mod diff;
pub mod error;
pub mod handler_utils;
pub mod server;
