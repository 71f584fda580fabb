pub mod board;
pub mod config;
pub mod document;
pub mod graph;
pub mod layout;
pub mod persistence;
pub mod server;
#[doc(hidden)]
pub mod test_support;
