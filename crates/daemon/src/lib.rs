//! GramSeva API daemon: leak report store, prediction service supervisor,
//! mock module endpoints and realtime feed.

pub mod config;
pub mod http;
pub mod leak_store;
pub mod mock;
pub mod prediction;
pub mod realtime;
