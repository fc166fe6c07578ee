pub mod autobid;
pub mod commands;
pub mod engine;
pub mod model;
