pub mod chat;
pub mod health;
pub mod quiz;
pub mod sessions;
pub mod topics;
