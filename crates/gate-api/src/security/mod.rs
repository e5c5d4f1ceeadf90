//! # Security
//!
//! Request filter chain and the static policy it enforces.

pub mod authn;
pub mod authz;
pub mod chain;
pub mod cors;
pub mod csrf;
pub mod headers;
pub mod policy;

pub use authn::{AuthenticatedPrincipal, IdentityVerifier, NoIdentity, StaticTokenVerifier};
pub use chain::{enforce, Filter, FilterChain, Outcome, RequestHead};
pub use csrf::{CsrfTokens, CSRF_COOKIE, CSRF_HEADER};
pub use policy::{PolicyError, Requirement, SecurityPolicy, WEBHOOK_PATH};
