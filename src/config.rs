//! Nested configuration tree for the auth/authz/defense core.
//!
//! Every section is `#[serde(default)]` with a matching `Default` impl so
//! partial YAML/env overlays are always valid, loaded through [`figment`].

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Root configuration object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// RBAC role/permission/policy configuration.
    pub rbac: RbacConfig,
    /// Defense pipeline configuration.
    pub defense: DefenseConfig,
    /// Error handling configuration.
    pub error: ErrorConfig,
    /// Audit configuration.
    pub audit: AuditConfig,
    /// Circuit breaker configuration, keyed by scope name.
    pub breaker: HashMap<String, BreakerConfig>,
}

impl Config {
    /// Load configuration from an optional YAML file overlaid with
    /// `AUTHGUARD_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file does not exist, cannot be
    /// parsed, or the resulting tree fails [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("AUTHGUARD_").split("__"));

        let config: Self = figment.extract().map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants that cannot be expressed through
    /// `serde` alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for the disallowed `*` origin + credentials
    /// CORS combination and for malformed CIDR/time-range condition strings
    /// in policy rules.
    pub fn validate(&self) -> Result<()> {
        self.defense.cors.validate()?;
        for policy in &self.rbac.policies {
            for rule in &policy.rules {
                rule.conditions.validate()?;
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────
// auth
// ─────────────────────────────────────────────────────────────────────────

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The primary (and, without `multi_auth`, only) scheme tried.
    pub primary_method: CredentialKind,
    /// Try every configured provider in order; first success wins.
    pub multi_auth: bool,
    /// Schemes to try, in order, when `multi_auth` is enabled.
    pub supported_methods: Vec<CredentialKind>,
    /// Order in which the extractor attempts each credential source.
    pub extraction_order: Vec<CredentialSource>,
    /// Allow requests with no credential at all to proceed as anonymous.
    pub allow_anonymous: bool,
    /// JWT/bearer provider parameters.
    pub jwt: JwtConfig,
    /// API key provider parameters.
    pub api_key: ApiKeyConfig,
    /// HTTP Basic provider parameters.
    pub basic: BasicConfig,
    /// HMAC signature provider parameters.
    pub hmac: HmacConfig,
    /// mTLS provider parameters.
    pub mtls: MtlsProviderConfig,
    /// Token store configuration.
    pub token_store: TokenStoreConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            primary_method: CredentialKind::Bearer,
            multi_auth: false,
            supported_methods: vec![CredentialKind::Bearer],
            extraction_order: vec![
                CredentialSource::AuthorizationHeader,
                CredentialSource::CustomHeader,
                CredentialSource::QueryParam,
                CredentialSource::Cookie,
                CredentialSource::HmacHeaders,
                CredentialSource::PeerCertificate,
            ],
            allow_anonymous: false,
            jwt: JwtConfig::default(),
            api_key: ApiKeyConfig::default(),
            basic: BasicConfig::default(),
            hmac: HmacConfig::default(),
            mtls: MtlsProviderConfig::default(),
            token_store: TokenStoreConfig::default(),
        }
    }
}

/// Tagged credential scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Username/password over `Authorization: Basic`.
    Basic,
    /// Opaque or JWT bearer token.
    Bearer,
    /// API key via header/query/cookie.
    ApiKey,
    /// HMAC request signature.
    Hmac,
    /// Mutual-TLS client certificate.
    MutualTls,
}

/// Where the extractor looks for a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// `Authorization: <prefix> <value>` header.
    AuthorizationHeader,
    /// Configured custom header (e.g. `X-API-Key`).
    CustomHeader,
    /// Configured query parameter.
    QueryParam,
    /// Configured cookie.
    Cookie,
    /// HMAC signature/timestamp/nonce header triplet.
    HmacHeaders,
    /// TLS peer certificate chain.
    PeerCertificate,
}

/// JWT / bearer-token provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Allow-listed signature algorithms (e.g. `["HS256", "RS256"]`). `none`
    /// is always rejected regardless of this list.
    pub algorithm_allow_list: Vec<String>,
    /// Expected issuer claim.
    pub issuer: Option<String>,
    /// Acceptable audience claims.
    pub audience: Vec<String>,
    /// Clock-skew leeway applied to `exp`/`nbf`/`iat`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
    /// Reference to key material (resolved by the injected key-material
    /// collaborator; never the raw secret itself in config).
    pub key_material_ref: Option<String>,
    /// Access token time-to-live.
    #[serde(with = "humantime_serde")]
    pub access_ttl: Duration,
    /// Refresh token time-to-live.
    #[serde(with = "humantime_serde")]
    pub refresh_ttl: Duration,
    /// Fraction of `access_ttl` remaining below which refresh is advised.
    pub refresh_threshold: f32,
    /// Reject tokens with no `exp` claim.
    pub require_expiry: bool,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            algorithm_allow_list: vec!["HS256".to_string()],
            issuer: None,
            audience: Vec::new(),
            leeway: Duration::from_secs(60),
            key_material_ref: None,
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            refresh_threshold: 0.25,
            require_expiry: true,
        }
    }
}

/// API key provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyConfig {
    /// Header name carrying the key (e.g. `X-API-Key`).
    pub header: String,
    /// Query parameter name carrying the key.
    pub query: String,
    /// Optional prefix the header value must start with.
    pub prefix: Option<String>,
    /// Hash keys at rest (store/compare digests, not raw values).
    pub hashing: bool,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            header: "X-API-Key".to_string(),
            query: "api_key".to_string(),
            prefix: None,
            hashing: true,
        }
    }
}

/// HTTP Basic provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    /// Realm advertised in `WWW-Authenticate`.
    pub realm: String,
    /// Hash passwords at rest.
    pub hashing: bool,
    /// Minimum acceptable password length (password policy).
    pub min_password_length: usize,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            realm: "authguard".to_string(),
            hashing: true,
            min_password_length: 8,
        }
    }
}

/// HMAC signature provider parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HmacConfig {
    /// MAC algorithm name (e.g. `"HMAC-SHA256"`).
    pub algorithm: String,
    /// Header carrying the signature.
    pub signature_header: String,
    /// Header carrying the Unix-seconds timestamp.
    pub timestamp_header: String,
    /// Header carrying the nonce.
    pub nonce_header: String,
    /// Maximum acceptable clock skew between request timestamp and now.
    #[serde(with = "humantime_serde")]
    pub skew: Duration,
    /// Request headers included in the canonical string, in order.
    pub signed_headers: Vec<String>,
}

impl Default for HmacConfig {
    fn default() -> Self {
        Self {
            algorithm: "HMAC-SHA256".to_string(),
            signature_header: "X-Signature".to_string(),
            timestamp_header: "X-Timestamp".to_string(),
            nonce_header: "X-Nonce".to_string(),
            skew: Duration::from_secs(300),
            signed_headers: vec!["host".to_string(), "content-type".to_string()],
        }
    }
}

/// mTLS provider parameters (client-certificate authentication mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MtlsProviderConfig {
    /// Whether a peer certificate must be present for this provider to run.
    pub require_client_cert: bool,
    /// Certificate field used as the subject ID (`cn`, `spiffe_uri`, …).
    pub subject_field: String,
}

impl Default for MtlsProviderConfig {
    fn default() -> Self {
        Self {
            require_client_cert: true,
            subject_field: "cn".to_string(),
        }
    }
}

/// Token-store backing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenStoreConfig {
    /// Store kind: `"memory"` (the only backend this crate ships) or a
    /// name the caller resolves to an injected [`crate::token::TokenStore`].
    pub kind: String,
    /// Background reaper sweep interval.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            kind: "memory".to_string(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// rbac
// ─────────────────────────────────────────────────────────────────────────

/// RBAC + policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RbacConfig {
    /// Role definitions.
    pub roles: Vec<RoleConfig>,
    /// Permission definitions (labels for policy/audit reference).
    pub permissions: Vec<PermissionConfig>,
    /// Policies, evaluated with deny-overrides semantics.
    pub policies: Vec<PolicyConfig>,
}

/// A role definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Unique role ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Direct permission patterns (`"resource:action"`, wildcards allowed).
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Parent role IDs this role inherits from.
    #[serde(default)]
    pub inherits: Vec<String>,
}

/// A permission label, associating an ID with a resource/action pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    /// Optional label ID.
    pub id: String,
    /// Resource pattern.
    pub resource: String,
    /// Action pattern.
    pub action: String,
}

/// A named policy rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Unique policy ID.
    pub id: String,
    /// `Allow` or `Deny`.
    pub effect: PolicyEffect,
    /// Ordered rules within this policy.
    #[serde(default)]
    pub rules: Vec<PolicyRuleConfig>,
}

/// Policy effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    /// Grants access when the rule matches.
    Allow,
    /// Denies access when the rule matches; deny always wins.
    Deny,
}

/// A single policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRuleConfig {
    /// Optional rule ID, reported as `applied_rule_id` when decisive.
    #[serde(default)]
    pub id: Option<String>,
    /// Resource pattern.
    pub resource: String,
    /// Action pattern.
    pub action: String,
    /// Conditions that must all hold for this rule to match.
    #[serde(default)]
    pub conditions: ConditionSet,
}

/// Conditions recognized by the policy evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionSet {
    /// `"HH:MM-HH:MM"` local wall-clock time range.
    pub time_range: Option<String>,
    /// `"a.b.c.d/n"` CIDR the client IP must fall within.
    pub ip_cidr: Option<String>,
    /// Exact-match attribute conditions (`key` -> required value).
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ConditionSet {
    /// Validate the condition strings are well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `time_range` or `ip_cidr` cannot be
    /// parsed.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref tr) = self.time_range {
            crate::policy::parse_time_range(tr)
                .map_err(|e| Error::Config(format!("invalid time_range '{tr}': {e}")))?;
        }
        if let Some(ref cidr) = self.ip_cidr {
            crate::policy::parse_cidr(cidr)
                .map_err(|e| Error::Config(format!("invalid ip_cidr '{cidr}': {e}")))?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────
// defense
// ─────────────────────────────────────────────────────────────────────────

/// Defense-pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DefenseConfig {
    /// CORS filter configuration.
    pub cors: CorsConfig,
    /// CSRF filter configuration.
    pub csrf: CsrfConfig,
    /// Security headers filter configuration.
    pub headers: SecurityHeadersConfig,
    /// Input validation limits.
    pub input_validation: InputValidationConfig,
    /// Threat-pattern detection configuration.
    pub threat_detection: ThreatDetectionConfig,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,
    /// Paths exempted from the entire defense chain (health checks, etc).
    pub skip_paths: Vec<String>,
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable the CORS filter.
    pub enabled: bool,
    /// Allowed origins (exact match, or `*.domain` suffix match).
    pub allowed_origins: Vec<String>,
    /// Allowed methods advertised on preflight.
    pub allowed_methods: Vec<String>,
    /// Allowed headers advertised on preflight.
    pub allowed_headers: Vec<String>,
    /// Headers exposed to the client on actual responses.
    pub expose_headers: Vec<String>,
    /// Whether to allow credentialed requests.
    pub allow_credentials: bool,
    /// Preflight cache lifetime.
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec!["Authorization".to_string(), "Content-Type".to_string()],
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age: Duration::from_secs(600),
        }
    }
}

impl CorsConfig {
    /// Refuse `*` in `allowed_origins` combined with `allow_credentials` at
    /// configuration-load time — disallowed by the CORS standard itself,
    /// and a known credential leak when browsers are lenient about it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the combination is present.
    pub fn validate(&self) -> Result<()> {
        if self.allow_credentials && self.allowed_origins.iter().any(|o| o == "*") {
            return Err(Error::Config(
                "CORS: allow_credentials=true cannot be combined with a '*' allowed origin"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// CSRF configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Enable the CSRF filter.
    pub enabled: bool,
    /// Header carrying the CSRF token.
    pub header: String,
    /// Form field carrying the CSRF token (when not in a header).
    pub field: String,
    /// Token time-to-live.
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
    /// Paths exempt from CSRF enforcement.
    pub exempt_paths: Vec<String>,
    /// Methods that never require a CSRF token.
    pub safe_methods: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header: "X-CSRF-Token".to_string(),
            field: "csrf_token".to_string(),
            token_ttl: Duration::from_secs(3600),
            exempt_paths: Vec::new(),
            safe_methods: vec![
                "GET".to_string(),
                "HEAD".to_string(),
                "OPTIONS".to_string(),
                "TRACE".to_string(),
            ],
        }
    }
}

/// Security response headers configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    /// Enable the security-headers filter.
    pub enabled: bool,
    /// `Content-Security-Policy` value.
    pub content_security_policy: Option<String>,
    /// `X-Frame-Options` value.
    pub x_frame_options: Option<String>,
    /// `X-Content-Type-Options` value.
    pub x_content_type_options: Option<String>,
    /// `X-XSS-Protection` value.
    pub x_xss_protection: Option<String>,
    /// `Strict-Transport-Security` value.
    pub strict_transport_security: Option<String>,
    /// `Referrer-Policy` value.
    pub referrer_policy: Option<String>,
    /// `Permissions-Policy` value.
    pub permissions_policy: Option<String>,
    /// Additional custom headers.
    pub custom: HashMap<String, String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_security_policy: Some("default-src 'self'".to_string()),
            x_frame_options: Some("DENY".to_string()),
            x_content_type_options: Some("nosniff".to_string()),
            x_xss_protection: Some("1; mode=block".to_string()),
            strict_transport_security: Some("max-age=63072000; includeSubDomains".to_string()),
            referrer_policy: Some("no-referrer".to_string()),
            permissions_policy: Some("geolocation=(), microphone=(), camera=()".to_string()),
            custom: HashMap::new(),
        }
    }
}

/// Input validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputValidationConfig {
    /// Enable input validation.
    pub enabled: bool,
    /// Maximum total request size in bytes.
    pub max_request_size: usize,
    /// Maximum total header size in bytes.
    pub max_header_size: usize,
    /// Maximum number of query parameters.
    pub max_query_params: usize,
    /// Maximum number of form fields.
    pub max_form_fields: usize,
    /// Maximum length of any single string field.
    pub max_string_length: usize,
    /// Maximum JSON object nesting depth.
    pub max_object_depth: usize,
    /// Maximum JSON array length.
    pub max_array_length: usize,
    /// Accepted `Content-Type` values.
    pub allowed_content_types: Vec<String>,
    /// Characters rejected outright in any string field.
    pub disallowed_chars: Vec<char>,
    /// Reject any string field containing a U+FFFD replacement character —
    /// the marker a lossy UTF-8 conversion upstream leaves behind when the
    /// original bytes on the wire weren't valid UTF-8 in the first place.
    pub require_utf8: bool,
    /// Reject on any violation rather than best-effort sanitizing.
    pub strict_mode: bool,
    /// Block the request (403) on violation, vs. audit-only.
    pub block_on_violation: bool,
    /// Maximum multi-level URL-decode iterations before rejecting.
    pub max_decode_iterations: u8,
}

impl Default for InputValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_request_size: 10 * 1024 * 1024,
            max_header_size: 16 * 1024,
            max_query_params: 100,
            max_form_fields: 200,
            max_string_length: 64 * 1024,
            max_object_depth: 32,
            max_array_length: 10_000,
            allowed_content_types: vec![
                "application/json".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ],
            disallowed_chars: vec!['\0'],
            require_utf8: true,
            strict_mode: true,
            block_on_violation: true,
            max_decode_iterations: 2,
        }
    }
}

/// Threat-pattern detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatDetectionConfig {
    /// Enable threat-pattern scanning.
    pub enabled: bool,
    /// Scan for SQL injection patterns.
    pub sql: bool,
    /// Scan for cross-site scripting patterns.
    pub xss: bool,
    /// Scan for command-injection patterns.
    pub cmd: bool,
    /// Scan for path-traversal patterns.
    pub path: bool,
    /// Block (403 + audit) on match, vs. audit-only.
    pub block: bool,
    /// Emit an audit event on match (independent of `block`).
    pub log: bool,
    /// Additional operator-supplied regex patterns.
    pub custom_patterns: Vec<String>,
    /// Maximum URL-decode passes attempted before treating the value itself
    /// as suspicious (an encoding depth beyond this cap is rejected
    /// outright, not decoded further).
    pub max_decode_iterations: u8,
}

impl Default for ThreatDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sql: true,
            xss: true,
            cmd: true,
            path: true,
            block: true,
            log: true,
            custom_patterns: Vec::new(),
            max_decode_iterations: 2,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,
    /// Requests allowed per window.
    pub requests_per_window: u32,
    /// Window size.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Burst allowance above the steady rate.
    pub burst: u32,
    /// Idle eviction sweep interval for per-key limiter state.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 100,
            window: Duration::from_secs(60),
            burst: 20,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// error / audit / breaker
// ─────────────────────────────────────────────────────────────────────────

/// Error-handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// Collapse inner causes into generic wire messages (default: on).
    pub secure_error_mode: bool,
    /// Field names redacted from audit/log output unless
    /// `log_sensitive_data` is set.
    pub redact_fields: Vec<String>,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            secure_error_mode: true,
            redact_fields: vec![
                "password".to_string(),
                "secret".to_string(),
                "token".to_string(),
                "key".to_string(),
                "client_secret".to_string(),
                "private_key".to_string(),
                "api_key".to_string(),
            ],
        }
    }
}

/// Audit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable audit event emission.
    pub enabled: bool,
    /// Minimum `tracing`-style level to emit.
    pub log_level: String,
    /// Event kinds to emit (empty = all).
    pub event_types: Vec<String>,
    /// Include the request body in audit events (subject to redaction).
    pub include_request_body: bool,
    /// Include the response body in audit events (subject to redaction).
    pub include_response_body: bool,
    /// Redact sensitive fields in audit output.
    pub redact_sensitive: bool,
    /// Bypass redaction entirely (development only).
    pub log_sensitive_data: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
            event_types: Vec::new(),
            include_request_body: false,
            include_response_body: false,
            redact_sensitive: true,
            log_sensitive_data: false,
        }
    }
}

/// Per-scope circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Enable this breaker.
    pub enabled: bool,
    /// Consecutive failures before tripping `Closed` -> `Open`.
    pub max_failures: u32,
    /// Time to wait before admitting a half-open probe.
    #[serde(with = "humantime_serde")]
    pub reset_timeout: Duration,
    /// Maximum concurrent half-open probes.
    pub half_open_max_calls: u32,
    /// Consecutive half-open successes required to close.
    pub success_threshold: u32,
    /// Deadline applied to the protected operation.
    #[serde(with = "humantime_serde")]
    pub op_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failures: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
            success_threshold: 3,
            op_timeout: Duration::from_secs(10),
        }
    }
}

/// Human-readable `Duration` (de)serialization (`"30s"`, `"5m"`, `"100ms"`,
/// or a bare integer of seconds).
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize a [`Duration`] as `"<seconds>s"`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize a human-readable duration string (`"30s"`, `"5m"`,
    /// `"100ms"`) or a bare integer of seconds.
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed.
    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(secs) = s.strip_suffix("ms") {
            return secs
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom);
        }
        if let Some(secs) = s.strip_suffix('s') {
            return secs
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom);
        }
        if let Some(mins) = s.strip_suffix('m') {
            return mins
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom);
        }
        if let Some(hours) = s.strip_suffix('h') {
            return hours
                .parse::<u64>()
                .map(|h| Duration::from_secs(h * 3600))
                .map_err(serde::de::Error::custom);
        }
        s.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(serde::de::Error::custom)
    }
}
