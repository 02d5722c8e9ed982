//! Pipeline composer: wires the credential extractor, authentication
//! dispatcher, RBAC/policy authorization, and defense filters into the one
//! entry point a transport adapter calls per request.

use std::sync::Arc;

use tracing::instrument;

use crate::audit::{AuditEvent, AuditEventKind, Auditor, Severity};
use crate::auth::api_key::ApiKeyProvider;
use crate::auth::basic::BasicProvider;
use crate::auth::bearer::BearerProvider;
use crate::auth::hmac::{HmacProvider, NonceCache};
use crate::auth::jwt::{JwtKeyResolver, JwtProvider};
use crate::auth::mtls::MtlsProvider;
use crate::auth::{AuthProvider, AuthProviderSet, HmacKeyResolver, UserDirectory};
use crate::breaker::BreakerRegistry;
use crate::config::Config;
use crate::credential::CredentialExtractor;
use crate::defense::cors::CorsFilter;
use crate::defense::csrf::CsrfFilter;
use crate::defense::headers::SecurityHeadersFilter;
use crate::defense::rate_limit::RateLimitFilter;
use crate::defense::skip_paths::SkipPaths;
use crate::defense::threat::ThreatDetectionFilter;
use crate::defense::validation::InputValidationFilter;
use crate::defense::{Filter, FilterOutcome};
use crate::error::{Error, ErrorKind, Result};
use crate::policy::{Decision, EvalContext, PolicyEngine};
use crate::rbac::RbacEngine;
use crate::request::{RequestContext, Response};
use crate::token::TokenStore;

/// Injected collaborators the pipeline cannot construct on its own: where
/// tokens live, where passwords/API keys are looked up, and the key
/// material used to verify JWTs/HMAC signatures.
pub struct PipelineDependencies {
    /// Backing store for opaque bearer tokens.
    pub token_store: Arc<dyn TokenStore>,
    /// Username/password and API-key lookup.
    pub user_directory: Arc<dyn UserDirectory>,
    /// Offline JWT verification key resolver. `None` means the JWT
    /// provider is not registered and opaque bearer tokens are verified
    /// against `token_store` instead.
    pub jwt_key_resolver: Option<Arc<dyn JwtKeyResolver>>,
    /// HMAC signing key resolver.
    pub hmac_key_resolver: Option<Arc<dyn HmacKeyResolver>>,
}

/// What the pipeline decided for an inbound request before it ever reaches
/// a handler.
pub enum PipelineOutcome {
    /// Proceed to the handler with `ctx.principal()` attached.
    Continue,
    /// A filter (CORS preflight) answered the request directly.
    ShortCircuit(Response),
}

/// The assembled request pipeline: defense filters, credential extraction,
/// authentication, and RBAC/policy authorization.
pub struct Pipeline {
    config: Config,
    filters: Vec<Box<dyn Filter>>,
    skip_paths: SkipPaths,
    auth: AuthProviderSet,
    rbac: RbacEngine,
    policy: PolicyEngine,
    breaker: BreakerRegistry,
    auditor: Auditor,
}

impl Pipeline {
    /// Assemble a pipeline from configuration and its injected
    /// collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the RBAC role graph is invalid (cycles,
    /// unknown parent roles) or a threat-detection pattern fails to compile.
    pub fn build(config: Config, deps: PipelineDependencies) -> Result<Self> {
        let rbac = RbacEngine::build(&config.rbac)?;
        let policy = PolicyEngine::new(config.rbac.policies.clone());
        let breaker = BreakerRegistry::new(config.breaker.clone(), crate::config::BreakerConfig::default());
        let auditor = Auditor::new(config.audit.clone());
        let skip_paths = SkipPaths::new(&config.defense.skip_paths);

        let providers = build_providers(&config, &deps);
        let auth = AuthProviderSet::new(config.auth.clone(), providers);

        let filters = build_filters(&config)?;

        Ok(Self {
            config,
            filters,
            skip_paths,
            auth,
            rbac,
            policy,
            breaker,
            auditor,
        })
    }

    /// Circuit breaker registry for protecting downstream calls the
    /// handler makes after this pipeline grants access.
    #[must_use]
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breaker
    }

    /// Run the full pipeline for an inbound request, authorizing against
    /// `resource`/`action`.
    ///
    /// # Errors
    ///
    /// Returns whichever [`Error`] the first failing stage produced
    /// (credential extraction, authentication, defense filter, or
    /// authorization). Every error is recorded in `ctx.errors` before being
    /// returned.
    #[instrument(skip_all, fields(correlation_id = %ctx.correlation_id, resource, action))]
    pub async fn process(&self, ctx: &mut RequestContext, resource: &str, action: &str) -> Result<PipelineOutcome> {
        if !self.skip_paths.matches(&ctx.request.path) {
            if let Some(outcome) = self.run_defense_before(ctx).await? {
                return Ok(outcome);
            }
        }

        self.authenticate(ctx).await?;
        self.authorize(ctx, resource, action)?;

        Ok(PipelineOutcome::Continue)
    }

    /// Decorate an outbound response with every filter's `after` hook
    /// (security headers, CORS). Always call this even on an error path.
    pub async fn decorate_response(&self, ctx: &RequestContext, response: &mut Response) {
        for filter in &self.filters {
            filter.after(ctx, response).await;
        }
    }

    async fn run_defense_before(&self, ctx: &mut RequestContext) -> Result<Option<PipelineOutcome>> {
        for filter in &self.filters {
            match filter.before(ctx).await {
                Ok(FilterOutcome::Continue) => {}
                Ok(FilterOutcome::ShortCircuit(response)) => {
                    return Ok(Some(PipelineOutcome::ShortCircuit(response)));
                }
                Err(err) => {
                    self.record_and_audit(ctx, filter.name(), &err);
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    async fn authenticate(&self, ctx: &mut RequestContext) -> Result<()> {
        let extractor = CredentialExtractor::new(&self.config.auth);
        let credential = match extractor.extract(&ctx.request) {
            Ok(c) => c,
            Err(err) => {
                self.record_and_audit(ctx, "auth", &err);
                return Err(err);
            }
        };

        let Some(credential) = credential else {
            // Anonymous access explicitly allowed; no principal attached.
            return Ok(());
        };

        match self.auth.authenticate(&credential).await {
            Ok(mut principal) => {
                let resolved = self.rbac.resolve_permissions(&principal.roles);
                principal.permissions.extend(resolved);
                self.auditor.emit(AuditEvent {
                    kind: AuditEventKind::AuthSuccess,
                    correlation_id: Some(ctx.correlation_id.clone()),
                    subject: Some(principal.subject_id.clone()),
                    resource: None,
                    action: None,
                    outcome: "authenticated".to_string(),
                    timestamp: crate::audit::now_unix(),
                    detail: serde_json::Map::new(),
                });
                ctx.attach_principal(principal);
                Ok(())
            }
            Err(err) => {
                self.record_and_audit(ctx, "auth", &err);
                Err(err)
            }
        }
    }

    fn authorize(&self, ctx: &mut RequestContext, resource: &str, action: &str) -> Result<()> {
        let Some(principal) = ctx.principal() else {
            let err = Error::Unauthorized("no principal attached for an authorization check".to_string());
            self.record_and_audit(ctx, "authz", &err);
            return Err(err);
        };

        if !RbacEngine::has_permission(&principal.permissions, resource, action) {
            let err = Error::InsufficientPermissions {
                resource: resource.to_string(),
                action: action.to_string(),
            };
            self.record_and_audit(ctx, "rbac", &err);
            return Err(err);
        }

        let eval_ctx = EvalContext {
            client_ip: ctx.request.client_ip().and_then(|ip| ip.parse().ok()),
            minute_of_day: minute_of_day_now(),
            principal,
        };

        match self.policy.evaluate(resource, action, &eval_ctx) {
            Decision::Allow { applied_rule_id } => {
                self.auditor.emit(AuditEvent {
                    kind: AuditEventKind::AuthzDecision,
                    correlation_id: Some(ctx.correlation_id.clone()),
                    subject: Some(principal.subject_id.clone()),
                    resource: Some(resource.to_string()),
                    action: Some(action.to_string()),
                    outcome: applied_rule_id.unwrap_or_else(|| "granted".to_string()),
                    timestamp: crate::audit::now_unix(),
                    detail: serde_json::Map::new(),
                });
                Ok(())
            }
            Decision::Deny { applied_rule_id } => {
                let err = Error::PolicyDenied(applied_rule_id.unwrap_or_else(|| "no matching rule".to_string()));
                self.record_and_audit(ctx, "policy", &err);
                Err(err)
            }
        }
    }

    fn record_and_audit(&self, ctx: &mut RequestContext, component: &str, err: &Error) {
        let severity = match err.kind() {
            ErrorKind::Internal => Severity::Critical,
            ErrorKind::RateLimited | ErrorKind::ThreatBlocked | ErrorKind::CircuitOpen => Severity::Warning,
            _ => Severity::Info,
        };
        ctx.errors.record(component, err, severity);

        let kind = match err.kind() {
            ErrorKind::RateLimited | ErrorKind::ThreatBlocked | ErrorKind::CsrfFailed => {
                AuditEventKind::SuspiciousActivity
            }
            ErrorKind::AccessDenied => AuditEventKind::AuthzDecision,
            _ => AuditEventKind::AuthFailure,
        };
        self.auditor.emit(AuditEvent {
            kind,
            correlation_id: Some(ctx.correlation_id.clone()),
            subject: ctx.principal().map(|p| p.subject_id.clone()),
            resource: None,
            action: None,
            outcome: format!("{:?}", err.kind()),
            timestamp: crate::audit::now_unix(),
            detail: serde_json::Map::new(),
        });
    }
}

fn minute_of_day_now() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    ((secs / 60) % 1440) as u32
}

fn build_providers(config: &Config, deps: &PipelineDependencies) -> Vec<Box<dyn AuthProvider>> {
    let mut providers: Vec<Box<dyn AuthProvider>> = Vec::new();

    providers.push(Box::new(BasicProvider::new(deps.user_directory.clone(), config.auth.basic.clone())));
    providers.push(Box::new(ApiKeyProvider::new(deps.user_directory.clone(), config.auth.api_key.clone())));
    providers.push(Box::new(MtlsProvider::new(config.auth.mtls.clone())));

    if let Some(hmac_resolver) = deps.hmac_key_resolver.clone() {
        providers.push(Box::new(HmacProvider::new(
            hmac_resolver,
            Arc::new(NonceCache::new()),
            config.auth.hmac.clone(),
            "hmac-client",
        )));
    }

    // Only one provider may claim `CredentialKind::Bearer`: JWT verification
    // when key material was injected, else opaque tokens against the store
    //.
    if let Some(jwt_resolver) = deps.jwt_key_resolver.clone() {
        providers.push(Box::new(JwtProvider::new(jwt_resolver, config.auth.jwt.clone())));
    } else {
        providers.push(Box::new(BearerProvider::new(deps.token_store.clone())));
    }

    providers
}

/// Builds the defense chain and orders it by each filter's `priority()`,
/// dropping any filter whose configuration currently reports it disabled —
/// a hardcoded literal order would silently survive a filter being
/// reordered or a new one being added without updating this function.
fn build_filters(config: &Config) -> Result<Vec<Box<dyn Filter>>> {
    let mut filters: Vec<Box<dyn Filter>> = vec![
        Box::new(CorsFilter::new(config.defense.cors.clone())),
        Box::new(RateLimitFilter::new(config.defense.rate_limit.clone())),
        Box::new(InputValidationFilter::new(config.defense.input_validation.clone())),
        Box::new(ThreatDetectionFilter::new(config.defense.threat_detection.clone())?),
        Box::new(CsrfFilter::new(config.defense.csrf.clone())),
        Box::new(SecurityHeadersFilter::new(config.defense.headers.clone())),
    ];
    filters.retain(|f| f.enabled());
    filters.sort_by_key(|f| f.priority());
    Ok(filters)
}
