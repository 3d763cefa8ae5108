pub mod auth;
pub mod commands;
pub mod config;
pub mod discord;
pub mod error;
pub mod helix;
pub mod render;
pub mod strings;

#[cfg(test)]
mod test_support;
