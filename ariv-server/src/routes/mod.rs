pub mod chat;
pub mod eval;
pub mod health;
pub mod models;
