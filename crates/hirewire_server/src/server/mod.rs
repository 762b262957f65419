#![forbid(unsafe_code)]

pub mod auth;
pub mod authorize;
pub mod chat;
pub mod connection;
pub mod health;
pub mod hub;

#[cfg(test)]
mod chat_tests;

#[cfg(test)]
mod hub_tests;
