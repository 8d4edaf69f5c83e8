pub mod api;
pub mod config;
pub mod logging;
pub mod rpc;
pub mod stopper;
pub mod swap;
pub mod test_utils;
pub mod wallet;
