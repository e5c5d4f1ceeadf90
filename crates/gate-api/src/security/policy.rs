//! # Security Policy
//!
//! Static, process-wide request policy: which paths are public, which
//! cross-origin callers are trusted, the response hardening headers, and
//! the anti-forgery token settings. Built once at startup and shared
//! read-only by every filter stage.

use axum::http::{HeaderName, Method};
use cookie::SameSite;
use secrecy::SecretString;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;
use uuid::Uuid;

/// Provider callback path; reserved and exempt from identity and CSRF checks
pub const WEBHOOK_PATH: &str = "/stripe/webhook";

/// Fixed Content-Security-Policy
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'";

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_ALLOWED_METHODS: &str = "GET,POST,OPTIONS";
const DEFAULT_ALLOWED_HEADERS: &str = "Authorization,Content-Type,X-XSRF-TOKEN,Idempotency-Key";
const DEFAULT_HSTS_MAX_AGE_SECS: u64 = 31_536_000;
const DEFAULT_CSRF_TTL_SECS: u64 = 43_200;
const DEFAULT_PREFLIGHT_MAX_AGE_SECS: u64 = 1_800;

/// Errors raised while assembling the policy
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid CORS origin '{0}': expected scheme://host[:port]")]
    InvalidOrigin(String),

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("invalid header name '{0}'")]
    InvalidHeader(String),

    #[error("invalid value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },

    #[error("{0} does not form a valid header value")]
    InvalidHeaderValue(&'static str),

    #[error("CSRF signing key rejected")]
    CsrfKey,
}

// =============================================================================
// Path patterns
// =============================================================================

/// Ant-style path pattern
///
/// - `/health` matches exactly
/// - `/api/public/**` matches `/api/public` and everything below it
/// - `*` matches exactly one path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<String>,
    any_suffix: bool,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let (base, any_suffix) = match raw.strip_suffix("/**") {
            Some(base) => (base.to_string(), true),
            None => (raw.clone(), false),
        };

        Self {
            segments: split_segments(&base),
            raw,
            any_suffix,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let segments = split_segments(path);

        if segments.len() < self.segments.len()
            || (!self.any_suffix && segments.len() != self.segments.len())
        {
            return false;
        }

        self.segments
            .iter()
            .zip(segments.iter())
            .all(|(pattern, segment)| pattern == "*" || pattern == segment)
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Access rules
// =============================================================================

/// What a request must carry to reach a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
}

/// One row of the ordered access table
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

impl AccessRule {
    pub fn new(pattern: &str, requirement: Requirement) -> Self {
        Self {
            pattern: PathPattern::new(pattern),
            requirement,
        }
    }
}

/// Public endpoints; everything else requires a principal
pub fn default_access_rules() -> Vec<AccessRule> {
    vec![
        AccessRule::new("/health", Requirement::Public),
        AccessRule::new("/api/public/**", Requirement::Public),
        AccessRule::new(WEBHOOK_PATH, Requirement::Public),
        AccessRule::new("/**", Requirement::Authenticated),
    ]
}

// =============================================================================
// CORS
// =============================================================================

/// Cross-origin allow-lists
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    /// Serialized origins, e.g. `http://localhost:3000`
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<HeaderName>,
    pub max_age: Duration,
}

impl CorsPolicy {
    /// Parse comma-separated allow-lists
    pub fn parse(origins: &str, methods: &str, headers: &str) -> Result<Self, PolicyError> {
        let allowed_origins = split_list(origins)
            .map(normalize_origin)
            .collect::<Result<Vec<_>, _>>()?;

        let allowed_methods = split_list(methods)
            .map(|m| {
                Method::from_str(&m.to_ascii_uppercase())
                    .map_err(|_| PolicyError::InvalidMethod(m.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let allowed_headers = split_list(headers)
            .map(|h| {
                HeaderName::from_str(h).map_err(|_| PolicyError::InvalidHeader(h.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allowed_origins,
            allowed_methods,
            allowed_headers,
            max_age: Duration::from_secs(DEFAULT_PREFLIGHT_MAX_AGE_SECS),
        })
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }

    pub fn is_method_allowed(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Check an `Access-Control-Request-Headers` list
    pub fn are_headers_allowed(&self, requested: &str) -> bool {
        split_list(requested).all(|name| {
            self.allowed_headers
                .iter()
                .any(|allowed| allowed.as_str().eq_ignore_ascii_case(name))
        })
    }

    /// Value for `Access-Control-Allow-Methods`
    pub fn methods_value(&self) -> String {
        self.allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn normalize_origin(raw: &str) -> Result<String, PolicyError> {
    let url = Url::parse(raw).map_err(|_| PolicyError::InvalidOrigin(raw.to_string()))?;
    let origin = url.origin();

    if !origin.is_tuple() || !matches!(url.scheme(), "http" | "https") {
        return Err(PolicyError::InvalidOrigin(raw.to_string()));
    }

    Ok(origin.ascii_serialization())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Response hardening
// =============================================================================

/// Strict-Transport-Security settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsts {
    pub max_age: u64,
    pub include_subdomains: bool,
}

impl Hsts {
    pub fn header_value(&self) -> String {
        if self.include_subdomains {
            format!("max-age={}; includeSubDomains", self.max_age)
        } else {
            format!("max-age={}", self.max_age)
        }
    }
}

// =============================================================================
// CSRF
// =============================================================================

/// Parse the `SameSite` attribute of the anti-forgery cookie
pub fn parse_same_site(raw: &str) -> Result<SameSite, PolicyError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        _ => Err(PolicyError::InvalidSetting {
            name: "CSRF_COOKIE_SAME_SITE",
            value: raw.to_string(),
        }),
    }
}

/// Anti-forgery token settings
#[derive(Debug)]
pub struct CsrfPolicy {
    pub secret: SecretString,
    pub ttl: Duration,
    pub cookie_secure: bool,
    pub same_site: SameSite,
    /// Paths exempt from the token check
    pub bypass: Vec<PathPattern>,
}

impl CsrfPolicy {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            ttl: Duration::from_secs(DEFAULT_CSRF_TTL_SECS),
            cookie_secure: false,
            same_site: SameSite::Lax,
            bypass: vec![
                PathPattern::new("/health"),
                PathPattern::new("/api/public/**"),
                PathPattern::new(WEBHOOK_PATH),
            ],
        }
    }

    pub fn is_bypassed(&self, path: &str) -> bool {
        self.bypass.iter().any(|p| p.matches(path))
    }

    /// Browsers drop `SameSite=None` cookies that are not `Secure`
    pub fn secure_cookie(&self) -> bool {
        self.cookie_secure || self.same_site.is_none()
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Complete request policy shared by the filter chain
#[derive(Debug)]
pub struct SecurityPolicy {
    pub access_rules: Vec<AccessRule>,
    pub cors: CorsPolicy,
    pub content_security_policy: String,
    pub hsts: Hsts,
    pub csrf: CsrfPolicy,
}

impl SecurityPolicy {
    /// Load from environment variables
    ///
    /// Optional env vars:
    /// - `CORS_ALLOWED_ORIGINS`, `CORS_ALLOWED_METHODS`, `CORS_ALLOWED_HEADERS`
    /// - `HSTS_MAX_AGE_SECS`, `HSTS_INCLUDE_SUBDOMAINS`
    /// - `CSRF_SECRET`, `CSRF_TOKEN_TTL_SECS`
    /// - `CSRF_COOKIE_SECURE`, `CSRF_COOKIE_SAME_SITE`
    pub fn from_env() -> Result<Self, PolicyError> {
        Self::from_lookup(|key: &str| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PolicyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cors = CorsPolicy::parse(
            &setting("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            &setting("CORS_ALLOWED_METHODS").unwrap_or_else(|| DEFAULT_ALLOWED_METHODS.to_string()),
            &setting("CORS_ALLOWED_HEADERS").unwrap_or_else(|| DEFAULT_ALLOWED_HEADERS.to_string()),
        )?;

        let hsts = Hsts {
            max_age: parse_setting(
                "HSTS_MAX_AGE_SECS",
                setting("HSTS_MAX_AGE_SECS"),
                DEFAULT_HSTS_MAX_AGE_SECS,
            )?,
            include_subdomains: parse_flag(
                "HSTS_INCLUDE_SUBDOMAINS",
                setting("HSTS_INCLUDE_SUBDOMAINS"),
                true,
            )?,
        };

        let secret = match setting("CSRF_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("CSRF_SECRET not set; tokens will not survive a restart");
                format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
            }
        };

        let ttl_secs = parse_setting(
            "CSRF_TOKEN_TTL_SECS",
            setting("CSRF_TOKEN_TTL_SECS"),
            DEFAULT_CSRF_TTL_SECS,
        )?;
        if ttl_secs == 0 {
            return Err(PolicyError::InvalidSetting {
                name: "CSRF_TOKEN_TTL_SECS",
                value: "0".to_string(),
            });
        }

        let mut csrf = CsrfPolicy::new(secret);
        csrf.ttl = Duration::from_secs(ttl_secs);
        csrf.cookie_secure =
            parse_flag("CSRF_COOKIE_SECURE", setting("CSRF_COOKIE_SECURE"), false)?;
        if let Some(same_site) = setting("CSRF_COOKIE_SAME_SITE") {
            csrf.same_site = parse_same_site(&same_site)?;
        }

        Ok(Self {
            access_rules: default_access_rules(),
            cors,
            content_security_policy: CONTENT_SECURITY_POLICY.to_string(),
            hsts,
            csrf,
        })
    }

    /// First matching rule decides; unmatched paths require a principal
    pub fn requirement_for(&self, path: &str) -> Requirement {
        self.access_rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.requirement)
            .unwrap_or(Requirement::Authenticated)
    }
}

fn parse_setting<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, PolicyError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| PolicyError::InvalidSetting { name, value }),
        None => Ok(default),
    }
}

fn parse_flag(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, PolicyError> {
    match raw {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(PolicyError::InvalidSetting { name, value }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_path_patterns() {
        let exact = PathPattern::new("/health");
        assert!(exact.matches("/health"));
        assert!(exact.matches("/health/"));
        assert!(!exact.matches("/health/deep"));
        assert!(!exact.matches("/healthz"));

        let prefix = PathPattern::new("/api/public/**");
        assert!(prefix.matches("/api/public"));
        assert!(prefix.matches("/api/public/csrf"));
        assert!(prefix.matches("/api/public/a/b"));
        assert!(!prefix.matches("/api/publicity"));
        assert!(!prefix.matches("/api/billing/checkout"));

        let segment = PathPattern::new("/api/*/checkout");
        assert!(segment.matches("/api/billing/checkout"));
        assert!(!segment.matches("/api/checkout"));

        assert!(PathPattern::new("/**").matches("/"));
    }

    #[test]
    fn test_access_table() {
        let policy = SecurityPolicy::from_lookup(lookup(&[])).unwrap();

        assert_eq!(policy.requirement_for("/health"), Requirement::Public);
        assert_eq!(policy.requirement_for("/api/public/pricing"), Requirement::Public);
        assert_eq!(policy.requirement_for(WEBHOOK_PATH), Requirement::Public);
        assert_eq!(
            policy.requirement_for("/api/billing/checkout"),
            Requirement::Authenticated
        );
        assert_eq!(policy.requirement_for("/anything"), Requirement::Authenticated);
    }

    #[test]
    fn test_defaults() {
        let policy = SecurityPolicy::from_lookup(lookup(&[])).unwrap();

        assert_eq!(policy.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert!(policy.cors.is_method_allowed(&Method::POST));
        assert!(!policy.cors.is_method_allowed(&Method::DELETE));
        assert!(policy.cors.are_headers_allowed("content-type, x-xsrf-token"));
        assert!(!policy.cors.are_headers_allowed("x-custom"));
        assert_eq!(policy.hsts.header_value(), "max-age=31536000; includeSubDomains");
        assert_eq!(policy.csrf.ttl, Duration::from_secs(43_200));
        assert!(!policy.csrf.secure_cookie());
    }

    #[test]
    fn test_overrides() {
        let policy = SecurityPolicy::from_lookup(lookup(&[
            ("CORS_ALLOWED_ORIGINS", "https://app.example.com/, http://localhost:5173"),
            ("CORS_ALLOWED_METHODS", "get,post"),
            ("HSTS_MAX_AGE_SECS", "600"),
            ("HSTS_INCLUDE_SUBDOMAINS", "false"),
            ("CSRF_COOKIE_SAME_SITE", "none"),
        ]))
        .unwrap();

        assert!(policy.cors.is_origin_allowed("https://app.example.com"));
        assert!(policy.cors.is_origin_allowed("http://localhost:5173"));
        assert_eq!(policy.cors.methods_value(), "GET,POST");
        assert_eq!(policy.hsts.header_value(), "max-age=600");
        assert_eq!(policy.csrf.same_site, SameSite::None);
        assert!(policy.csrf.secure_cookie());
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(matches!(
            SecurityPolicy::from_lookup(lookup(&[("CORS_ALLOWED_ORIGINS", "localhost")])),
            Err(PolicyError::InvalidOrigin(_))
        ));
        assert!(matches!(
            SecurityPolicy::from_lookup(lookup(&[("CORS_ALLOWED_HEADERS", "bad header")])),
            Err(PolicyError::InvalidHeader(_))
        ));
        assert!(SecurityPolicy::from_lookup(lookup(&[("HSTS_MAX_AGE_SECS", "-1")])).is_err());
        assert!(SecurityPolicy::from_lookup(lookup(&[("CSRF_TOKEN_TTL_SECS", "0")])).is_err());
        assert!(SecurityPolicy::from_lookup(lookup(&[("CSRF_COOKIE_SECURE", "maybe")])).is_err());
        assert!(matches!(
            SecurityPolicy::from_lookup(lookup(&[("CSRF_COOKIE_SAME_SITE", "sometimes")])),
            Err(PolicyError::InvalidSetting { name: "CSRF_COOKIE_SAME_SITE", .. })
        ));
    }

    #[test]
    fn test_parse_same_site() {
        assert_eq!(parse_same_site("Strict").unwrap(), SameSite::Strict);
        assert_eq!(parse_same_site(" lax ").unwrap(), SameSite::Lax);
        assert_eq!(parse_same_site("NONE").unwrap(), SameSite::None);
        assert!(parse_same_site("").is_err());
    }

    #[test]
    fn test_csrf_bypass() {
        let csrf = CsrfPolicy::new("secret");
        assert!(csrf.is_bypassed("/health"));
        assert!(csrf.is_bypassed("/api/public/csrf"));
        assert!(csrf.is_bypassed(WEBHOOK_PATH));
        assert!(!csrf.is_bypassed("/api/billing/checkout"));
    }
}
