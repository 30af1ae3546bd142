pub mod audit;
pub mod config;
pub mod errors;
pub mod identity;
pub mod review;
pub mod server;
pub mod session;
pub mod store;
