/*
 * Responsibility
 * - crate の module tree (main.rs と tests/ から共有)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;
