pub mod agent;
pub mod assets;
pub mod backend;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod session;
pub mod speech;
pub mod tools;
