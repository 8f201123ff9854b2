// Request and response shapes of the HTTP API
pub mod auth;
pub mod campaign;
pub mod job;
pub mod workspace;
