pub mod auction;
pub mod bidding;
pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod notification;
pub mod push;
pub mod query;
pub mod scheduler;
pub mod store;
