pub mod chat;
pub mod dedup;
pub mod quiz;
pub mod session;
pub mod topics;

#[cfg(test)]
pub(crate) mod fakes;
