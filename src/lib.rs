#![doc = "The `taskkeeper` library crate."]
#![doc = ""]
#![doc = "Accounts, owner-scoped tasks with subtasks and file attachments, the bearer"]
#![doc = "token gate, and the HTTP routes. The binary (`main.rs`) only loads configuration"]
#![doc = "and starts the server around [`app::configure`]."]

pub mod app;
pub mod auth;
pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod store;

pub use error::AppError;
