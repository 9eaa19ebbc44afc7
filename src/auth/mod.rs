//! Authentication module for DreamVault
//!
//! Dual-token sessions for web and mobile clients.
//! - Signed access/refresh tokens (HS256 JWT)
//! - Single-slot refresh store with rotation on every use
//! - Bearer-then-cookie credential resolution
//! - Social sign-in exchange as a relying party
//! - Admin gate backed by the user directory

pub mod clock;
pub mod cookies;
pub mod gate;
pub mod jwt;
pub mod resolver;
pub mod service;
pub mod social;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cookies::{CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE};
pub use gate::AuthorizationGate;
pub use jwt::{Claims, IssuedToken, TokenCodec, TokenError, TokenKind};
pub use resolver::{CredentialResolver, CredentialSource, ResolvedUser};
pub use service::{IssuedSession, OnboardingPrefill, SessionIssuer, SocialOutcome};
pub use social::{HttpSocialProvider, ProviderError, ProviderIdentity, SocialProvider};
pub use store::{MemoryRefreshStore, PgRefreshStore, RefreshStore, TokenDigest};
