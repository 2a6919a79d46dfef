//! Business operations behind the HTTP handlers

pub mod auth;
pub mod users;
