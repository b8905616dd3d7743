//! HTTP handlers

pub mod health;
pub mod auth;
pub mod uploads;
pub mod batches;
pub mod admin;
pub mod model;
