pub mod api;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod columns;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod generator;
pub mod handlers;
pub mod middleware;
pub mod modules;
pub mod server;
pub mod services;
pub mod types;

pub use server::{app, AppState};
