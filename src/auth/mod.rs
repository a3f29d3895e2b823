//! Bearer authentication with role-based access control.
//!
//! Access tokens (15 min) travel in the `Authorization` header and are
//! verified statelessly. Refresh tokens (7 days) live only in an HttpOnly
//! cookie and are exchanged at `/auth/refresh`.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{
    REFRESH_COOKIE_NAME, bearer_token, clear_refresh_cookie, get_cookie, refresh_cookie,
};
pub use errors::ApiAuthError;
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use ip::extract_client_ip;
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;
