//! Request authentication over two parallel methods.
//!
//! A server-side session (random id in an HttpOnly cookie, resolved through the
//! sessions table) or a stateless bearer access token. Refresh tokens are
//! never accepted here; they are only exchanged at the refresh endpoint.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod state;
mod types;

pub use cookie::{CookiePolicy, REFRESH_COOKIE_NAME, SESSION_COOKIE_NAME, SameSite, get_cookie};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Auth, BearerAuth, ClientMeta, OptionalAuth, SessionAuth};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
pub use types::{AuthMethod, AuthenticatedUser};
