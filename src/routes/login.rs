pub mod login_handlers;
pub mod login_models;
