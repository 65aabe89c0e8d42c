//! Default configuration values shared between synthesis and runtime
//!
//! These constants ensure the constructs and the handlers they deploy agree
//! on names and limits without either side restating them.

/// The only region where CloudFront-scoped WAF ACLs, Lambda@Edge functions
/// and CloudFront certificates can be created
pub const REQUIRED_EDGE_REGION: &str = "us-east-1";

/// Default header carrying the shared secret from the edge to the API
pub const DEFAULT_HEADER_NAME: &str = "x-origin-verify";

/// Default parameter-store prefix for cross-region publication
pub const DEFAULT_SSM_PREFIX: &str = "/shieldgate/security/";

/// Default secret rotation interval in days
pub const DEFAULT_ROTATION_DAYS: u32 = 7;

/// Default WAF rate limit (requests per client IP per 5-minute window)
pub const DEFAULT_RATE_LIMIT: u32 = 2000;

/// Smallest non-zero rate limit WAF accepts
pub const MIN_RATE_LIMIT: u32 = 10;

/// Default secret cache TTL in seconds for both runtime handlers
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default length of the generated shared-secret value
pub const DEFAULT_SECRET_LENGTH: u32 = 32;

/// Default API Gateway stage name
pub const DEFAULT_STAGE_NAME: &str = "prod";

/// Path pattern the CDN routes to the API origin
pub const API_PATH_PATTERN: &str = "/api/*";

/// Principal reported by the authorizer when no token subject is available
pub const ANONYMOUS_PRINCIPAL: &str = "origin-verified";

// Serde default functions for struct field defaults

/// Returns the default header name
pub fn default_header_name() -> String {
    DEFAULT_HEADER_NAME.to_string()
}

/// Returns the default cache TTL
pub fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

/// Returns the default parameter-store prefix
pub fn default_ssm_prefix() -> String {
    DEFAULT_SSM_PREFIX.to_string()
}
