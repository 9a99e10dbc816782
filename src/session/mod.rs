//! Cookie-held sessions and the access-token refresh guard

pub mod claims;
pub mod cookie;
pub mod guard;
pub mod principal;

pub use claims::{AuthenticatedUser, ClaimMap};
pub use cookie::SessionCookies;
pub use guard::{GuardOutcome, RefreshGuard, RefreshOutcome, TokenRefresher};
pub use principal::{SessionPrincipal, TokenBundle};
