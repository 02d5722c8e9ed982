//! End-to-end exercises of the assembled [`authguard::pipeline::Pipeline`]:
//! credential extraction, authentication, RBAC/policy authorization, and
//! the defense filter chain, wired together the way an embedding transport
//! adapter would use them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use authguard::auth::jwt::SharedSecretResolver;
use authguard::auth::InMemoryUserDirectory;
use authguard::config::{Config, CredentialKind, CredentialSource, RoleConfig};
use authguard::error::Error;
use authguard::pipeline::{Pipeline, PipelineDependencies};
use authguard::request::{Request, RequestContext, Response};
use authguard::token::InMemoryTokenStore;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

const JWT_SECRET: &[u8] = b"integration-test-signing-secret";

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: i64,
    roles: Vec<String>,
}

fn jwt_for(sub: &str, roles: Vec<String>, exp_offset: i64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        exp: now_secs() + exp_offset,
        roles,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(JWT_SECRET)).unwrap()
}

fn deps() -> PipelineDependencies {
    PipelineDependencies {
        token_store: Arc::new(InMemoryTokenStore::new()),
        user_directory: Arc::new(InMemoryUserDirectory::new()),
        jwt_key_resolver: Some(Arc::new(SharedSecretResolver::new(JWT_SECRET.to_vec()))),
        hmac_key_resolver: None,
    }
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.auth.primary_method = CredentialKind::Bearer;
    config.auth.extraction_order = vec![CredentialSource::AuthorizationHeader];
    config.rbac.roles = vec![RoleConfig {
        id: "editor".to_string(),
        name: "Editor".to_string(),
        permissions: vec!["articles:write".to_string(), "articles:read".to_string()],
        inherits: Vec::new(),
    }];
    config.defense.cors.enabled = false;
    config.defense.csrf.enabled = false;
    config.defense.headers.enabled = false;
    config.defense.rate_limit.enabled = false;
    config.defense.threat_detection.enabled = false;
    config.defense.input_validation.enabled = false;
    config
}

fn bearer_request(path: &str, token: &str) -> Request {
    let mut headers = HashMap::new();
    headers.insert("authorization".to_string(), format!("Bearer {token}"));
    Request {
        method: "POST".to_string(),
        path: path.to_string(),
        headers,
        query: HashMap::new(),
        cookies: HashMap::new(),
        body: None,
        remote_addr: None,
        tls_peer_chain: None,
    }
}

#[tokio::test]
async fn jwt_authenticated_editor_is_granted_write_access() {
    let pipeline = Pipeline::build(base_config(), deps()).unwrap();
    let token = jwt_for("alice", vec!["editor".to_string()], 3600);
    let mut ctx = RequestContext::new(bearer_request("/articles/42", &token));

    let outcome = pipeline.process(&mut ctx, "articles", "write").await;

    assert!(outcome.is_ok());
    assert!(ctx.is_authenticated());
    assert_eq!(ctx.principal().unwrap().subject_id, "alice");
}

#[tokio::test]
async fn expired_jwt_is_rejected_before_authorization() {
    let pipeline = Pipeline::build(base_config(), deps()).unwrap();
    let token = jwt_for("alice", vec!["editor".to_string()], -3600);
    let mut ctx = RequestContext::new(bearer_request("/articles/42", &token));

    let outcome = pipeline.process(&mut ctx, "articles", "write").await;

    assert!(outcome.is_err());
    assert!(!ctx.is_authenticated());
    assert!(!ctx.errors.errors.is_empty());
}

#[tokio::test]
async fn authenticated_principal_without_permission_is_denied() {
    let pipeline = Pipeline::build(base_config(), deps()).unwrap();
    let token = jwt_for("bob", vec!["editor".to_string()], 3600);
    let mut ctx = RequestContext::new(bearer_request("/articles/42", &token));

    let outcome = pipeline.process(&mut ctx, "articles", "delete").await;

    assert!(matches!(outcome, Err(Error::InsufficientPermissions { .. })));
    assert!(ctx.is_authenticated());
}

#[tokio::test]
async fn threat_detection_blocks_malicious_query_before_authentication_runs() {
    let mut config = base_config();
    config.defense.threat_detection.enabled = true;
    config.defense.threat_detection.sql = true;
    let pipeline = Pipeline::build(config, deps()).unwrap();

    let token = jwt_for("alice", vec!["editor".to_string()], 3600);
    let mut request = bearer_request("/articles/search", &token);
    request.query.insert("q".to_string(), "' OR '1'='1".to_string());
    let mut ctx = RequestContext::new(request);

    let outcome = pipeline.process(&mut ctx, "articles", "read").await;

    assert!(matches!(outcome, Err(Error::ThreatDetected(_))));
    assert!(!ctx.is_authenticated());
}

#[tokio::test]
async fn decorate_response_applies_security_headers_from_a_short_circuited_request() {
    let mut config = base_config();
    config.defense.headers.enabled = true;
    let pipeline = Pipeline::build(config, deps()).unwrap();

    let token = jwt_for("alice", vec!["editor".to_string()], 3600);
    let ctx = RequestContext::new(bearer_request("/articles/42", &token));
    let mut response = Response::default();

    pipeline.decorate_response(&ctx, &mut response).await;

    assert_eq!(response.headers.get("X-Frame-Options"), Some(&"DENY".to_string()));
}

#[tokio::test]
async fn breaker_exposed_by_pipeline_opens_after_repeated_downstream_failures() {
    let pipeline = Pipeline::build(base_config(), deps()).unwrap();

    for _ in 0..10 {
        let _ = pipeline
            .breakers()
            .call("downstream", || async { Err::<(), Error>(Error::Internal("boom".to_string())) })
            .await;
    }

    let result = pipeline
        .breakers()
        .call("downstream", || async { Ok::<_, Error>(()) })
        .await;
    assert!(matches!(result, Err(Error::CircuitOpen { .. })));
}

#[tokio::test]
async fn anonymous_request_passes_authentication_but_fails_authorization() {
    let mut config = base_config();
    config.auth.allow_anonymous = true;
    let pipeline = Pipeline::build(config, deps()).unwrap();

    let request = Request {
        method: "GET".to_string(),
        path: "/articles".to_string(),
        headers: HashMap::new(),
        query: HashMap::new(),
        cookies: HashMap::new(),
        body: None,
        remote_addr: None,
        tls_peer_chain: None,
    };
    let mut ctx = RequestContext::new(request);

    let outcome = pipeline.process(&mut ctx, "articles", "read").await;

    // Authenticating with no credential succeeds as anonymous, but with no
    // principal attached, authorization has nothing to check permissions
    // against and refuses the request.
    assert!(matches!(outcome, Err(Error::Unauthorized(_))));
    assert!(!ctx.is_authenticated());
}
