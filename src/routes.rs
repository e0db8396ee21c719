// src/routes.rs

pub mod bearer;
pub mod error;
pub mod login;
pub mod routes;
pub mod tasks;
