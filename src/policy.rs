//! Condition-based policy evaluator with deny-overrides semantics.
//!
//! Pattern matching uses one glob subset shared with RBAC permission
//! matching: exact match, `"*"` (match everything), `"prefix*"`,
//! `"*suffix"`, `"*contains*"`.
//! Deny-overrides: any matching `deny` rule wins regardless of rule order;
//! among several matches, the most literal (least wildcarded) rule is
//! reported as `applied_rule_id`.

use std::net::Ipv4Addr;

use crate::config::{ConditionSet, PolicyConfig, PolicyEffect, PolicyRuleConfig};
use crate::principal::Principal;

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Access is permitted.
    Allow {
        /// The rule ID that granted access, if the matching rule had one.
        applied_rule_id: Option<String>,
    },
    /// Access is denied.
    Deny {
        /// The rule ID that denied access, if a rule matched explicitly.
        /// `None` means no rule matched at all (implicit default-deny).
        applied_rule_id: Option<String>,
    },
}

/// Evaluation-time request facts consulted by rule conditions.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Client IP, if known.
    pub client_ip: Option<Ipv4Addr>,
    /// Minutes since local midnight (0..1440).
    pub minute_of_day: u32,
    /// The principal whose attributes back `attribute.<key>` conditions.
    pub principal: &'a Principal,
}

/// Compiled policy engine: a flat, ordered list of policies, each carrying
/// its own rule set, evaluated in full on every call (no caching — rule
/// sets are small and conditions are request-dependent).
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policies: Vec<PolicyConfig>,
}

impl PolicyEngine {
    /// Wrap the configured policy list. Condition strings are assumed
    /// already validated by [`crate::config::ConditionSet::validate`] at
    /// config-load time.
    #[must_use]
    pub fn new(policies: Vec<PolicyConfig>) -> Self {
        Self { policies }
    }

    /// Evaluate `resource`/`action` for `ctx`, applying deny-overrides
    /// across every policy's rules.
    #[must_use]
    pub fn evaluate(&self, resource: &str, action: &str, ctx: &EvalContext) -> Decision {
        let mut best_deny: Option<&PolicyRuleConfig> = None;
        let mut best_allow: Option<&PolicyRuleConfig> = None;

        for policy in &self.policies {
            for rule in &policy.rules {
                if !rule_matches(rule, resource, action, ctx) {
                    continue;
                }
                match policy.effect {
                    PolicyEffect::Deny => {
                        if more_specific(rule, best_deny) {
                            best_deny = Some(rule);
                        }
                    }
                    PolicyEffect::Allow => {
                        if more_specific(rule, best_allow) {
                            best_allow = Some(rule);
                        }
                    }
                }
            }
        }

        if let Some(rule) = best_deny {
            return Decision::Deny {
                applied_rule_id: rule.id.clone(),
            };
        }
        if let Some(rule) = best_allow {
            return Decision::Allow {
                applied_rule_id: rule.id.clone(),
            };
        }
        Decision::Deny {
            applied_rule_id: None,
        }
    }
}

fn more_specific(candidate: &PolicyRuleConfig, current: Option<&PolicyRuleConfig>) -> bool {
    match current {
        None => true,
        Some(existing) => specificity(candidate) > specificity(existing),
    }
}

/// Higher is more literal. A pattern with no `*` anywhere is most specific.
fn specificity(rule: &PolicyRuleConfig) -> u8 {
    let mut score = 0;
    if !rule.resource.contains('*') {
        score += 2;
    }
    if !rule.action.contains('*') {
        score += 1;
    }
    score
}

fn rule_matches(rule: &PolicyRuleConfig, resource: &str, action: &str, ctx: &EvalContext) -> bool {
    match_pattern(&rule.resource, resource)
        && match_pattern(&rule.action, action)
        && conditions_match(&rule.conditions, ctx)
}

fn conditions_match(conditions: &ConditionSet, ctx: &EvalContext) -> bool {
    if let Some(ref tr) = conditions.time_range {
        match parse_time_range(tr) {
            Ok(range) => {
                if !time_in_range(ctx.minute_of_day, range) {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }

    if let Some(ref cidr) = conditions.ip_cidr {
        match (ctx.client_ip, parse_cidr(cidr)) {
            (Some(ip), Ok(parsed)) => {
                if !ip_in_cidr(ip, parsed) {
                    return false;
                }
            }
            _ => return false,
        }
    }

    for (key, expected) in &conditions.attributes {
        match ctx.principal.attributes.get(key) {
            Some(actual) if actual == expected => {}
            _ => return false,
        }
    }

    true
}

/// Glob subset matcher: `"*"`, `"prefix*"`, `"*suffix"`, `"*contains*"`, exact.
#[must_use]
pub fn match_pattern(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(inner) = pattern.strip_prefix('*').and_then(|p| p.strip_suffix('*')) {
        if !inner.is_empty() {
            return value.contains(inner);
        }
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return value.ends_with(suffix);
    }
    pattern == value
}

/// Parse a `"HH:MM-HH:MM"` local wall-clock range into minute-of-day bounds.
///
/// # Errors
///
/// Returns an error string if the format or component ranges are invalid.
pub fn parse_time_range(s: &str) -> Result<(u32, u32), String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| format!("expected 'HH:MM-HH:MM', got '{s}'"))?;
    Ok((parse_clock(start)?, parse_clock(end)?))
}

fn parse_clock(s: &str) -> Result<u32, String> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'HH:MM', got '{s}'"))?;
    let hours: u32 = h.parse().map_err(|_| format!("invalid hour '{h}'"))?;
    let minutes: u32 = m.parse().map_err(|_| format!("invalid minute '{m}'"))?;
    if hours > 23 || minutes > 59 {
        return Err(format!("time out of range '{s}'"));
    }
    Ok(hours * 60 + minutes)
}

/// `true` if `minute_of_day` falls within `range`, handling ranges that wrap
/// past midnight (e.g. `22:00-06:00`).
#[must_use]
pub fn time_in_range(minute_of_day: u32, range: (u32, u32)) -> bool {
    let (start, end) = range;
    if start <= end {
        minute_of_day >= start && minute_of_day < end
    } else {
        minute_of_day >= start || minute_of_day < end
    }
}

/// Parse an IPv4 CIDR string (`"10.0.0.0/8"`) into an address/prefix-length
/// pair.
///
/// # Errors
///
/// Returns an error string if the address or prefix length is invalid.
pub fn parse_cidr(s: &str) -> Result<(Ipv4Addr, u8), String> {
    let (addr, len) = s
        .split_once('/')
        .ok_or_else(|| format!("expected 'a.b.c.d/n', got '{s}'"))?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| format!("invalid IPv4 address '{addr}'"))?;
    let len: u8 = len.parse().map_err(|_| format!("invalid prefix length '{len}'"))?;
    if len > 32 {
        return Err(format!("prefix length out of range '{len}'"));
    }
    Ok((addr, len))
}

/// `true` if `ip` falls within `cidr`.
#[must_use]
pub fn ip_in_cidr(ip: Ipv4Addr, cidr: (Ipv4Addr, u8)) -> bool {
    let (network, prefix_len) = cidr;
    if prefix_len == 0 {
        return true;
    }
    let mask = u32::MAX << (32 - prefix_len as u32);
    (u32::from(ip) & mask) == (u32::from(network) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rule(id: Option<&str>, resource: &str, action: &str) -> PolicyRuleConfig {
        PolicyRuleConfig {
            id: id.map(str::to_string),
            resource: resource.to_string(),
            action: action.to_string(),
            conditions: ConditionSet::default(),
        }
    }

    fn ctx(principal: &Principal) -> EvalContext<'_> {
        EvalContext {
            client_ip: None,
            minute_of_day: 12 * 60,
            principal,
        }
    }

    #[test]
    fn deny_overrides_matching_allow() {
        let engine = PolicyEngine::new(vec![
            PolicyConfig {
                id: "allow-all".to_string(),
                effect: PolicyEffect::Allow,
                rules: vec![rule(Some("a1"), "*", "*")],
            },
            PolicyConfig {
                id: "deny-delete".to_string(),
                effect: PolicyEffect::Deny,
                rules: vec![rule(Some("d1"), "*", "delete")],
            },
        ]);
        let principal = Principal::new("alice");
        let decision = engine.evaluate("events", "delete", &ctx(&principal));
        assert_eq!(
            decision,
            Decision::Deny {
                applied_rule_id: Some("d1".to_string())
            }
        );
    }

    #[test]
    fn no_matching_rule_is_implicit_deny() {
        let engine = PolicyEngine::new(vec![PolicyConfig {
            id: "allow-read".to_string(),
            effect: PolicyEffect::Allow,
            rules: vec![rule(Some("a1"), "events", "read")],
        }]);
        let principal = Principal::new("alice");
        let decision = engine.evaluate("events", "write", &ctx(&principal));
        assert_eq!(
            decision,
            Decision::Deny {
                applied_rule_id: None
            }
        );
    }

    #[test]
    fn literal_rule_preferred_over_wildcard_for_reporting() {
        let engine = PolicyEngine::new(vec![PolicyConfig {
            id: "mixed".to_string(),
            effect: PolicyEffect::Allow,
            rules: vec![
                rule(Some("wild"), "*", "*"),
                rule(Some("literal"), "events", "read"),
            ],
        }]);
        let principal = Principal::new("alice");
        let decision = engine.evaluate("events", "read", &ctx(&principal));
        assert_eq!(
            decision,
            Decision::Allow {
                applied_rule_id: Some("literal".to_string())
            }
        );
    }

    #[test]
    fn attribute_condition_must_match_exactly() {
        let mut rule_with_condition = rule(Some("dept"), "reports", "read");
        rule_with_condition.conditions.attributes =
            HashMap::from([("department".to_string(), "finance".to_string())]);
        let engine = PolicyEngine::new(vec![PolicyConfig {
            id: "dept-scoped".to_string(),
            effect: PolicyEffect::Allow,
            rules: vec![rule_with_condition],
        }]);

        let matching = Principal::new("alice").with_attribute("department", "finance");
        assert_eq!(
            engine.evaluate("reports", "read", &ctx(&matching)),
            Decision::Allow {
                applied_rule_id: Some("dept-scoped".to_string())
            }
        );

        let non_matching = Principal::new("bob").with_attribute("department", "sales");
        assert_eq!(
            engine.evaluate("reports", "read", &ctx(&non_matching)),
            Decision::Deny {
                applied_rule_id: None
            }
        );
    }

    #[test]
    fn time_range_condition_gates_access() {
        let mut rule_with_condition = rule(Some("business-hours"), "vault", "open");
        rule_with_condition.conditions.time_range = Some("09:00-17:00".to_string());
        let engine = PolicyEngine::new(vec![PolicyConfig {
            id: "hours".to_string(),
            effect: PolicyEffect::Allow,
            rules: vec![rule_with_condition],
        }]);

        let principal = Principal::new("alice");
        let mut inside = ctx(&principal);
        inside.minute_of_day = 10 * 60;
        assert!(matches!(
            engine.evaluate("vault", "open", &inside),
            Decision::Allow { .. }
        ));

        let mut outside = ctx(&principal);
        outside.minute_of_day = 22 * 60;
        assert!(matches!(
            engine.evaluate("vault", "open", &outside),
            Decision::Deny { .. }
        ));
    }

    #[test]
    fn ip_cidr_condition_gates_access() {
        let mut rule_with_condition = rule(Some("internal"), "admin", "access");
        rule_with_condition.conditions.ip_cidr = Some("10.0.0.0/8".to_string());
        let engine = PolicyEngine::new(vec![PolicyConfig {
            id: "internal-only".to_string(),
            effect: PolicyEffect::Allow,
            rules: vec![rule_with_condition],
        }]);

        let principal = Principal::new("alice");
        let mut inside = ctx(&principal);
        inside.client_ip = Some("10.1.2.3".parse().unwrap());
        assert!(matches!(
            engine.evaluate("admin", "access", &inside),
            Decision::Allow { .. }
        ));

        let mut outside = ctx(&principal);
        outside.client_ip = Some("203.0.113.5".parse().unwrap());
        assert!(matches!(
            engine.evaluate("admin", "access", &outside),
            Decision::Deny { .. }
        ));
    }

    #[test]
    fn wraparound_time_range_spans_midnight() {
        assert!(time_in_range(23 * 60, (22 * 60, 6 * 60)));
        assert!(time_in_range(2 * 60, (22 * 60, 6 * 60)));
        assert!(!time_in_range(12 * 60, (22 * 60, 6 * 60)));
    }

    #[test]
    fn parse_cidr_rejects_bad_prefix() {
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("not-an-ip/8").is_err());
    }

    #[test]
    fn parse_time_range_rejects_bad_clock() {
        assert!(parse_time_range("25:00-04:00").is_err());
        assert!(parse_time_range("garbage").is_err());
    }

    #[test]
    fn match_pattern_glob_subset() {
        assert!(match_pattern("*", "anything"));
        assert!(match_pattern("events*", "events:read"));
        assert!(match_pattern("*read", "events:read"));
        assert!(match_pattern("*ven*", "events"));
        assert!(!match_pattern("events", "other"));
    }
}
