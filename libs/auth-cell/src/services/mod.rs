pub mod events;
pub mod role;
pub mod session;

pub use events::{AuthStateHub, AuthSubscription};
pub use role::RoleResolver;
pub use session::AuthService;
