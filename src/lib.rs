/// Study group server library.
/// Exposes the membership engine, invitation workflow, presence tracker, and
/// the HTTP/WebSocket surface for the binary and the integration tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod groups;
pub mod handlers;
pub mod invitations;
pub mod membership;
pub mod server;
