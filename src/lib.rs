pub mod client;
pub mod config;
pub mod identity;
pub mod models;
pub mod routes;
pub mod state;
pub mod tracker;
