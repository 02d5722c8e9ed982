//! Credential extraction.

use crate::config::{AuthConfig, CredentialSource};
use crate::request::Request;
use crate::{Error, Result};

/// Raw material a client presents to prove identity.
///
/// Extracted per request, never persisted, and cleared from memory after
/// verification (callers should drop the `Credential` as soon as
/// [`crate::auth::AuthProviderSet::authenticate`] returns).
#[derive(Debug, Clone)]
pub enum Credential {
    /// `Authorization: Basic <base64(user:pass)>`.
    Basic {
        /// Username.
        user: String,
        /// Password.
        password: String,
    },
    /// `Authorization: <scheme-hint> <token>`.
    Bearer {
        /// Opaque or JWT token value.
        token: String,
        /// The scheme prefix actually seen (`"Bearer"`, custom, …).
        scheme_hint: String,
    },
    /// API key delivered via header, query, or cookie.
    ApiKey {
        /// The key value.
        value: String,
        /// Where it was found.
        location_hint: CredentialSource,
    },
    /// HMAC request signature triplet, plus everything the signature
    /// actually has to cover.
    Hmac {
        /// Signature value (hex or base64, provider-dependent).
        signature: String,
        /// Unix-seconds timestamp.
        timestamp: String,
        /// Opaque nonce.
        nonce: String,
        /// Request method, as seen on the wire (e.g. `"POST"`).
        method: String,
        /// Request path, as seen on the wire.
        path: String,
        /// The configured signed headers, as `(name, value)` pairs taken
        /// from the actual request — not just the names — so the
        /// signature binds to what the header actually says, not merely
        /// that it was present.
        signed_headers: Vec<(String, String)>,
    },
    /// TLS peer certificate chain (DER-encoded, leaf first).
    PeerCertificate {
        /// Certificate chain, leaf first.
        chain: Vec<Vec<u8>>,
    },
}

impl Credential {
    /// The scheme tag, for provider dispatch.
    #[must_use]
    pub fn kind(&self) -> crate::config::CredentialKind {
        use crate::config::CredentialKind as K;
        match self {
            Self::Basic { .. } => K::Basic,
            Self::Bearer { .. } => K::Bearer,
            Self::ApiKey { .. } => K::ApiKey,
            Self::Hmac { .. } => K::Hmac,
            Self::PeerCertificate { .. } => K::MutualTls,
        }
    }
}

/// Extracts a [`Credential`] from a request per the configured order.
pub struct CredentialExtractor<'a> {
    config: &'a AuthConfig,
}

impl<'a> CredentialExtractor<'a> {
    /// Build an extractor bound to the given auth configuration.
    #[must_use]
    pub fn new(config: &'a AuthConfig) -> Self {
        Self { config }
    }

    /// Attempt extraction in configured order, returning the first match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialMalformed`] when a source is present but
    /// malformed (e.g. wrong `Authorization` prefix) — this never falls
    /// through to the next extractor. Returns
    /// [`Error::CredentialMissing`] when nothing matches and anonymous
    /// access is not enabled.
    pub fn extract(&self, request: &Request) -> Result<Option<Credential>> {
        for source in &self.config.extraction_order {
            if let Some(credential) = self.try_source(*source, request)? {
                return Ok(Some(credential));
            }
        }

        if self.config.allow_anonymous {
            Ok(None)
        } else {
            Err(Error::CredentialMissing)
        }
    }

    fn try_source(&self, source: CredentialSource, request: &Request) -> Result<Option<Credential>> {
        match source {
            CredentialSource::AuthorizationHeader => self.try_authorization_header(request),
            CredentialSource::CustomHeader => self.try_custom_header(request),
            CredentialSource::QueryParam => self.try_query_param(request),
            CredentialSource::Cookie => self.try_cookie(request),
            CredentialSource::HmacHeaders => self.try_hmac_headers(request),
            CredentialSource::PeerCertificate => self.try_peer_certificate(request),
        }
    }

    fn try_authorization_header(&self, request: &Request) -> Result<Option<Credential>> {
        let Some(raw) = request.header("authorization") else {
            return Ok(None);
        };

        if let Some(rest) = case_insensitive_strip_prefix(raw, "basic ") {
            let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, rest)
                .map_err(|_| Error::CredentialMalformed("invalid base64 in Basic credential".into()))?;
            let decoded = String::from_utf8(decoded)
                .map_err(|_| Error::CredentialMalformed("Basic credential is not UTF-8".into()))?;
            let (user, password) = decoded
                .split_once(':')
                .ok_or_else(|| Error::CredentialMalformed("Basic credential missing ':'".into()))?;
            return Ok(Some(Credential::Basic {
                user: user.to_string(),
                password: password.to_string(),
            }));
        }

        if let Some(rest) = case_insensitive_strip_prefix(raw, "bearer ") {
            return Ok(Some(Credential::Bearer {
                token: rest.to_string(),
                scheme_hint: "Bearer".to_string(),
            }));
        }

        // An `Authorization` header is present but its prefix doesn't match
        // a scheme we understand: malformed, never silently skipped.
        Err(Error::CredentialMalformed(
            "unrecognized Authorization scheme".to_string(),
        ))
    }

    fn try_custom_header(&self, request: &Request) -> Result<Option<Credential>> {
        let header = self.config.api_key.header.to_ascii_lowercase();
        let Some(raw) = request.header(&header) else {
            return Ok(None);
        };

        let value = match &self.config.api_key.prefix {
            Some(prefix) => match case_insensitive_strip_prefix(raw, &format!("{prefix} ")) {
                Some(rest) => rest,
                None => {
                    return Err(Error::CredentialMalformed(format!(
                        "{} header missing expected prefix",
                        self.config.api_key.header
                    )))
                }
            },
            None => raw,
        };

        Ok(Some(Credential::ApiKey {
            value: value.to_string(),
            location_hint: CredentialSource::CustomHeader,
        }))
    }

    fn try_query_param(&self, request: &Request) -> Result<Option<Credential>> {
        let Some(value) = request.query(&self.config.api_key.query) else {
            return Ok(None);
        };
        Ok(Some(Credential::ApiKey {
            value: value.to_string(),
            location_hint: CredentialSource::QueryParam,
        }))
    }

    fn try_cookie(&self, request: &Request) -> Result<Option<Credential>> {
        let Some(value) = request.cookie("authguard_session") else {
            return Ok(None);
        };
        Ok(Some(Credential::Bearer {
            token: value.to_string(),
            scheme_hint: "cookie".to_string(),
        }))
    }

    fn try_hmac_headers(&self, request: &Request) -> Result<Option<Credential>> {
        let hmac = &self.config.hmac;
        let sig = request.header(&hmac.signature_header.to_ascii_lowercase());
        let ts = request.header(&hmac.timestamp_header.to_ascii_lowercase());
        let nonce = request.header(&hmac.nonce_header.to_ascii_lowercase());

        match (sig, ts, nonce) {
            (Some(signature), Some(timestamp), Some(nonce)) => {
                let mut signed_headers = Vec::with_capacity(hmac.signed_headers.len());
                for name in &hmac.signed_headers {
                    let value = request.header(&name.to_ascii_lowercase()).ok_or_else(|| {
                        Error::CredentialMalformed(format!(
                            "HMAC signed header '{name}' is missing from the request"
                        ))
                    })?;
                    signed_headers.push((name.clone(), value.to_string()));
                }
                Ok(Some(Credential::Hmac {
                    signature: signature.to_string(),
                    timestamp: timestamp.to_string(),
                    nonce: nonce.to_string(),
                    method: request.method.clone(),
                    path: request.path.clone(),
                    signed_headers,
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(Error::CredentialMalformed(
                "incomplete HMAC signature/timestamp/nonce triplet".to_string(),
            )),
        }
    }

    fn try_peer_certificate(&self, request: &Request) -> Result<Option<Credential>> {
        match &request.tls_peer_chain {
            Some(chain) if !chain.is_empty() => Ok(Some(Credential::PeerCertificate {
                chain: chain.clone(),
            })),
            _ => Ok(None),
        }
    }
}

/// Case-insensitive `strip_prefix`, matching on the ASCII-lowercased value.
fn case_insensitive_strip_prefix<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() < prefix.len() {
        return None;
    }
    let (head, tail) = value.split_at(prefix.len());
    if head.eq_ignore_ascii_case(prefix) {
        Some(tail)
    } else {
        None
    }
}

/// Extract the leftmost trusted client IP from an `X-Forwarded-For` style
/// header value, trimmed of surrounding whitespace.
#[must_use]
pub fn leftmost_forwarded_ip(header_value: &str) -> Option<&str> {
    header_value.split(',').next().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use std::collections::HashMap;

    fn request_with_header(name: &str, value: &str) -> Request {
        let mut headers = HashMap::new();
        headers.insert(name.to_ascii_lowercase(), value.to_string());
        Request {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers,
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        }
    }

    #[test]
    fn extracts_bearer_token() {
        let config = AuthConfig::default();
        let extractor = CredentialExtractor::new(&config);
        let request = request_with_header("authorization", "Bearer abc123");
        let cred = extractor.extract(&request).unwrap().unwrap();
        match cred {
            Credential::Bearer { token, .. } => assert_eq!(token, "abc123"),
            _ => panic!("expected Bearer"),
        }
    }

    #[test]
    fn extracts_basic_credential() {
        let config = AuthConfig::default();
        let extractor = CredentialExtractor::new(&config);
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b"alice:hunter2",
        );
        let request = request_with_header("authorization", &format!("Basic {encoded}"));
        let cred = extractor.extract(&request).unwrap().unwrap();
        match cred {
            Credential::Basic { user, password } => {
                assert_eq!(user, "alice");
                assert_eq!(password, "hunter2");
            }
            _ => panic!("expected Basic"),
        }
    }

    #[test]
    fn rejects_unrecognized_prefix_instead_of_falling_through() {
        let config = AuthConfig::default();
        let extractor = CredentialExtractor::new(&config);
        let request = request_with_header("authorization", "Digest abc123");
        let err = extractor.extract(&request).unwrap_err();
        assert!(matches!(err, Error::CredentialMalformed(_)));
    }

    #[test]
    fn missing_credential_without_anonymous_is_an_error() {
        let config = AuthConfig::default();
        let extractor = CredentialExtractor::new(&config);
        let request = Request {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        };
        assert!(matches!(
            extractor.extract(&request).unwrap_err(),
            Error::CredentialMissing
        ));
    }

    #[test]
    fn missing_credential_with_anonymous_returns_none() {
        let mut config = AuthConfig::default();
        config.allow_anonymous = true;
        let extractor = CredentialExtractor::new(&config);
        let request = Request {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        };
        assert!(extractor.extract(&request).unwrap().is_none());
    }

    #[test]
    fn hmac_extraction_captures_actual_header_values_method_and_path() {
        let mut config = AuthConfig::default();
        config.hmac.signed_headers = vec!["host".to_string()];
        let extractor = CredentialExtractor::new(&config);
        let mut headers = HashMap::new();
        headers.insert("x-signature".to_string(), "abc123".to_string());
        headers.insert("x-timestamp".to_string(), "1700000000".to_string());
        headers.insert("x-nonce".to_string(), "nonce-1".to_string());
        headers.insert("host".to_string(), "api.example.com".to_string());
        let request = Request {
            method: "POST".to_string(),
            path: "/widgets".to_string(),
            headers,
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        };
        let cred = extractor.extract(&request).unwrap().unwrap();
        match cred {
            Credential::Hmac {
                method,
                path,
                signed_headers,
                ..
            } => {
                assert_eq!(method, "POST");
                assert_eq!(path, "/widgets");
                assert_eq!(signed_headers, vec![("host".to_string(), "api.example.com".to_string())]);
            }
            _ => panic!("expected Hmac"),
        }
    }

    #[test]
    fn hmac_extraction_rejects_missing_signed_header() {
        let mut config = AuthConfig::default();
        config.hmac.signed_headers = vec!["host".to_string()];
        let extractor = CredentialExtractor::new(&config);
        let mut headers = HashMap::new();
        headers.insert("x-signature".to_string(), "abc123".to_string());
        headers.insert("x-timestamp".to_string(), "1700000000".to_string());
        headers.insert("x-nonce".to_string(), "nonce-1".to_string());
        let request = Request {
            method: "POST".to_string(),
            path: "/widgets".to_string(),
            headers,
            query: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
            remote_addr: None,
            tls_peer_chain: None,
        };
        assert!(matches!(extractor.extract(&request), Err(Error::CredentialMalformed(_))));
    }

    #[test]
    fn leftmost_forwarded_ip_trims_whitespace() {
        assert_eq!(
            leftmost_forwarded_ip(" 203.0.113.7 , 10.0.0.1"),
            Some("203.0.113.7")
        );
    }
}
