pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{AccessScope, AuthError, AuthStateChange};
pub use services::{AuthService, AuthStateHub, AuthSubscription, RoleResolver};
