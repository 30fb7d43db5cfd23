//! Authentication state traits and macro.

use crate::accounts::Accounts;
use crate::db::Database;
use crate::jwt::JwtConfig;

/// Trait for state types that provide what the auth extractors need.
pub trait HasAuthBackend {
    fn accounts(&self) -> &Accounts;

    /// Whether client IPs come from proxy headers.
    fn trust_proxy(&self) -> bool;

    fn jwt(&self) -> &JwtConfig {
        self.accounts().credentials().jwt()
    }

    fn db(&self) -> &Database {
        self.accounts().db()
    }
}

/// Implements `HasAuthBackend` for a router state with `accounts: Accounts`
/// and `trust_proxy: bool` fields.
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn accounts(&self) -> &$crate::accounts::Accounts {
                &self.accounts
            }
            fn trust_proxy(&self) -> bool {
                self.trust_proxy
            }
        }
    };
}
