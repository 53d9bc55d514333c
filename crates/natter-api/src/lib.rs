pub mod auth;
pub mod error;
pub mod identity;
pub mod messages;
pub mod middleware;
pub mod profiles;
pub mod routes;
pub mod state;
pub mod validation;
