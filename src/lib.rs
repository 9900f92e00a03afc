// Library exports for the blog server
// This allows integration tests to build the app with their own stores

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
