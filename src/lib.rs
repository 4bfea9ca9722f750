//! Core library for calendar-oauth-connect
pub mod config;
pub mod db;
pub mod error;
pub mod digest;
pub mod pkce;
pub mod token;
pub mod api;
pub mod session;
pub mod connect;
