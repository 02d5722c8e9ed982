//! Threat-pattern detection filter.
//!
//! Strips control characters, null bytes, and zero-width characters — the
//! bytes a homograph or terminal-escape attack relies on — from every
//! string in a JSON tree, decodes URL-encoding in bounded passes so a
//! maliciously nested `%25%25..` payload can't force unbounded work, then
//! matches the decoded text against the injection families named in
//! configuration.

use std::borrow::Cow;

use async_trait::async_trait;
use regex::RegexSet;
use serde_json::Value;

use super::{Filter, FilterOutcome};
use crate::config::ThreatDetectionConfig;
use crate::error::{Error, Result};
use crate::request::RequestContext;

const SQL_PATTERNS: &[&str] = &[
    r"(?i)\b(union\s+select|select\s+.*\s+from|insert\s+into|drop\s+table|delete\s+from)\b",
    r"(?i)('\s*or\s*'1'\s*=\s*'1|--\s*$|;\s*--)",
];
const XSS_PATTERNS: &[&str] = &[
    r"(?i)<script[\s>]",
    r"(?i)javascript:",
    r"(?i)on(error|load|click|mouseover)\s*=",
];
const CMD_PATTERNS: &[&str] = &[r"[;&|`]\s*(rm|curl|wget|bash|sh|nc)\b", r"\$\([^)]*\)"];
const PATH_PATTERNS: &[&str] = &[r"\.\./", r"\.\.\\", r"(?i)%2e%2e[/\\]"];

fn is_unsafe_control(c: char) -> bool {
    let code = c as u32;
    (code <= 0x1F && code != 0x09 && code != 0x0A && code != 0x0D)
        || (0x80..=0x9F).contains(&code)
        || c == '\u{200B}'
        || c == '\u{200C}'
        || c == '\u{200D}'
        || c == '\u{FEFF}'
        || c == '\u{2028}'
        || c == '\u{2029}'
}

fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if s.chars().any(is_unsafe_control) {
        Cow::Owned(s.chars().filter(|c| !is_unsafe_control(*c)).collect())
    } else {
        Cow::Borrowed(s)
    }
}

fn url_decode_once(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Scans inbound strings (path, query, headers, body) for SQL/XSS/command/
/// path-traversal patterns, after stripping control characters and
/// reversing a bounded number of URL-decode passes.
pub struct ThreatDetectionFilter {
    config: ThreatDetectionConfig,
    patterns: RegexSet,
}

impl ThreatDetectionFilter {
    /// Build a filter from configuration, compiling the enabled pattern
    /// families plus any operator-supplied custom patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a custom pattern fails to compile.
    pub fn new(config: ThreatDetectionConfig) -> Result<Self> {
        let mut patterns: Vec<String> = Vec::new();
        if config.sql {
            patterns.extend(SQL_PATTERNS.iter().map(|s| (*s).to_string()));
        }
        if config.xss {
            patterns.extend(XSS_PATTERNS.iter().map(|s| (*s).to_string()));
        }
        if config.cmd {
            patterns.extend(CMD_PATTERNS.iter().map(|s| (*s).to_string()));
        }
        if config.path {
            patterns.extend(PATH_PATTERNS.iter().map(|s| (*s).to_string()));
        }
        patterns.extend(config.custom_patterns.iter().cloned());

        let set = RegexSet::new(&patterns).map_err(|e| Error::Config(format!("invalid threat detection pattern: {e}")))?;
        Ok(Self { config, patterns: set })
    }

    /// Repeatedly URL-decodes `value` until it reaches a fixed point, up to
    /// `max_decode_iterations` passes. `None` means the value was still
    /// changing when the budget ran out — an encoding depth beyond the
    /// configured cap, which is itself treated as suspicious rather than
    /// decoded further.
    fn decode_bounded(&self, value: &str) -> Option<String> {
        let mut current = value.to_string();
        for _ in 0..self.config.max_decode_iterations {
            let decoded = url_decode_once(&current);
            if decoded == current {
                return Some(current);
            }
            current = decoded;
        }
        None
    }

    fn scan_str(&self, value: &str) -> bool {
        let cleaned = strip_control_chars(value);
        match self.decode_bounded(&cleaned) {
            Some(decoded) => self.patterns.is_match(&decoded) || self.patterns.is_match(&cleaned),
            None => true,
        }
    }

    fn scan_value(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.scan_str(s),
            Value::Array(items) => items.iter().any(|v| self.scan_value(v)),
            Value::Object(map) => map.iter().any(|(k, v)| self.scan_str(k) || self.scan_value(v)),
            _ => false,
        }
    }
}

#[async_trait]
impl Filter for ThreatDetectionFilter {
    fn name(&self) -> &'static str {
        "threat_detection"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn before(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        if !self.config.enabled {
            return Ok(FilterOutcome::Continue);
        }

        let suspicious = self.scan_str(&ctx.request.path)
            || ctx.request.query.iter().any(|(k, v)| self.scan_str(k) || self.scan_str(v))
            || ctx.request.body.as_ref().is_some_and(|b| self.scan_value(b));

        if !suspicious {
            return Ok(FilterOutcome::Continue);
        }

        if self.config.block {
            Err(Error::ThreatDetected(format!("suspicious pattern in request to {}", ctx.request.path)))
        } else {
            Ok(FilterOutcome::Continue)
        }
    }
}
