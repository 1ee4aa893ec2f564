//! Integration tests for the portal HTTP surface.
//!
//! Drives the real router through the full middleware stack with
//! in-memory stores behind it: audit capture, session authentication,
//! permission guards, and the admin endpoints.
//!
//! Run with: cargo test --package portico-server --test integration_tests

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use portico_audit::{
    AuditAction, AuditFilter, AuditOutcome, AuditRecord, MemoryStore, RecordDetail,
};
use portico_auth::{
    MemoryAuthStore, NewPermission, NewRole, Permission, Role, RoleAssignment, RolePermission,
    User,
};
use portico_core::PorticoConfig;
use portico_server::routes::create_router;
use portico_server::AppState;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "sup3r-secret";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(PorticoConfig::default())
    }

    fn with_config(config: PorticoConfig) -> Self {
        let state = AppState::assemble(
            config,
            Arc::new(MemoryAuthStore::new()),
            Arc::new(MemoryStore::new()),
        );
        let router = create_router(state.clone());
        Self { router, state }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Wait for the background audit writer, then fetch everything it
    /// persisted.
    async fn records(&self) -> Vec<AuditRecord> {
        self.state.recorder.flush().await;
        self.state
            .audit_store
            .query(AuditFilter::default())
            .await
            .unwrap()
    }

    /// Register and verify an account, grant the listed permissions
    /// through a fresh role, and log in over HTTP.
    async fn seed_admin(&self, name: &str, grants: &[(&str, &str)]) -> (User, String) {
        let email = format!("{name}@example.com");
        let user = self.state.accounts.register(&email, PASSWORD).await.unwrap();
        let user = self.state.accounts.verify_email(user.id).await.unwrap();

        let role = Role::new(NewRole {
            name: format!("{name}-role"),
            display_name: format!("{name} role"),
            description: None,
            is_system: false,
        });
        self.state.auth_store.insert_role(&role).await.unwrap();

        for (resource, action) in grants {
            let permission = Permission::new(NewPermission {
                resource: resource.to_string(),
                action: action.to_string(),
                description: None,
            });
            self.state
                .auth_store
                .insert_permission(&permission)
                .await
                .unwrap();
            self.state
                .auth_store
                .attach_permission(&RolePermission {
                    role_id: role.id,
                    permission_id: permission.id,
                })
                .await
                .unwrap();
        }

        self.state
            .auth_store
            .assign_role(&RoleAssignment::new(user.id, role.id, None))
            .await
            .unwrap();

        let token = self.login(&email, PASSWORD).await;
        (user, token)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .send(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        body["token"].as_str().unwrap().to_string()
    }
}

fn request(method: &str, path: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn http_detail(record: &AuditRecord) -> &portico_audit::HttpDetail {
    match &record.detail {
        RecordDetail::Http(detail) => detail,
        other => panic!("expected http detail, got {other:?}"),
    }
}

// ===== Audit middleware =====

#[tokio::test]
async fn test_health_endpoints_bypass_the_audit_trail() {
    let app = TestApp::new();

    let response = app.send(request("GET", "/healthz", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.send(request("GET", "/api/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(app.records().await.is_empty());
}

#[tokio::test]
async fn test_successful_reads_stay_out_of_the_log() {
    let app = TestApp::new();
    let (_, token) = app.seed_admin("reader", &[("roles", "read")]).await;

    let response = app
        .send(request("GET", "/api/admin/roles", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let records = app.records().await;
    assert!(!records.is_empty()); // the seeding login is there
    assert!(records
        .iter()
        .all(|r| r.action != AuditAction::Read && r.action != AuditAction::List));
}

#[tokio::test]
async fn test_failed_reads_are_recorded() {
    let app = TestApp::new();

    let response = app.send(request("GET", "/api/admin/roles", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let records = app.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.action, AuditAction::List);
    assert_eq!(record.resource, "roles");
    assert_eq!(record.outcome, AuditOutcome::Failure);
    assert!(record.actor_id.is_none());

    let detail = http_detail(record);
    assert_eq!(detail.status, 401);
    assert_eq!(detail.error.as_deref(), Some("authentication required"));
    assert!(detail.duration_ms < 10_000);
}

#[tokio::test]
async fn test_unrouted_api_paths_still_classify() {
    let app = TestApp::new();

    let response = app
        .send(request(
            "POST",
            "/api/admin/registrations/reg-7812/approve",
            None,
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let records = app.records().await;
    let record = records
        .iter()
        .find(|r| r.action == AuditAction::Approve)
        .unwrap();
    assert_eq!(record.resource, "registrations");
    assert_eq!(record.resource_id.as_deref(), Some("reg-7812"));
    assert_eq!(record.outcome, AuditOutcome::Failure);
}

#[tokio::test]
async fn test_registration_redacts_credentials() {
    let app = TestApp::new();

    let response = app
        .send(request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": "newuser@example.com",
                "password": "hunter2hunter2"
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let records = app.records().await;
    let record = records
        .iter()
        .find(|r| r.action == AuditAction::Create && r.resource == "auth")
        .unwrap();

    let detail = http_detail(record);
    let body = detail.body.as_ref().unwrap();
    assert_eq!(body["password"], "[REDACTED]");
    assert_eq!(body["email"], "newuser@example.com");

    let changes = record.changes.as_ref().unwrap();
    assert_eq!(changes.after.as_ref().unwrap()["password"], "[REDACTED]");
}

#[tokio::test]
async fn test_actor_entity_and_ip_on_record() {
    let app = TestApp::new();
    let (user, token) = app.seed_admin("ivy", &[("roles", "create")]).await;
    let entity = Uuid::new_v4();

    let mut req = request(
        "POST",
        "/api/admin/roles",
        Some(&token),
        Some(json!({ "name": "ops" })),
    );
    req.headers_mut()
        .insert("x-acting-entity", entity.to_string().parse().unwrap());
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.50".parse().unwrap());

    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let records = app.records().await;
    let record = records
        .iter()
        .find(|r| r.action == AuditAction::Create && r.resource == "roles")
        .unwrap();
    assert_eq!(record.actor_id, Some(user.id));
    assert_eq!(record.acting_entity_id, Some(entity));
    assert_eq!(record.ip_address, "203.0.113.50");
}

#[tokio::test]
async fn test_peer_address_backfills_client_ip() {
    let app = TestApp::new();
    let user = app
        .state
        .accounts
        .register("peer@example.com", PASSWORD)
        .await
        .unwrap();
    app.state.accounts.verify_email(user.id).await.unwrap();

    // the connect-info make-service stores the peer as a request extension
    let peer: SocketAddr = "198.51.100.24:55310".parse().unwrap();
    let mut req = request(
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "peer@example.com", "password": PASSWORD })),
    );
    req.extensions_mut().insert(ConnectInfo(peer));
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::OK);

    // with no forwarding headers, both the middleware record and the
    // manual login event fall back to the socket address
    let records = app.records().await;
    let from_peer: Vec<_> = records
        .iter()
        .filter(|r| r.ip_address == "198.51.100.24")
        .collect();
    assert!(from_peer.iter().any(|r| matches!(r.detail, RecordDetail::Http(_))));
    assert!(from_peer.iter().any(|r| matches!(r.detail, RecordDetail::Auth(_))));

    // a forwarding header still wins over the socket
    let mut req = request(
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "peer@example.com", "password": PASSWORD })),
    );
    req.extensions_mut().insert(ConnectInfo(peer));
    req.headers_mut()
        .insert("x-forwarded-for", "203.0.113.77".parse().unwrap());
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::OK);

    let records = app.records().await;
    assert!(records
        .iter()
        .any(|r| r.ip_address == "203.0.113.77" && matches!(r.detail, RecordDetail::Auth(_))));
}

// ===== Authentication flows =====

#[tokio::test]
async fn test_me_reports_roles_and_permissions() {
    let app = TestApp::new();
    let (user, token) = app
        .seed_admin("carol", &[("notes", "read"), ("notes", "export")])
        .await;

    let response = app.send(request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert_eq!(body["roles"][0], "carol-role");
    let permissions: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(permissions.contains(&"notes.read"));
    assert!(permissions.contains(&"notes.export"));

    // credential material never serializes
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_lockout_engages_after_repeated_failures() {
    let mut config = PorticoConfig::default();
    config.auth.max_failed_logins = 3;
    let app = TestApp::with_config(config);

    let user = app
        .state
        .accounts
        .register("locked@example.com", PASSWORD)
        .await
        .unwrap();
    app.state.accounts.verify_email(user.id).await.unwrap();

    for _ in 0..3 {
        let response = app
            .send(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "locked@example.com", "password": "wrong-password" })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // the correct password is refused while the window holds
    let response = app
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "locked@example.com", "password": PASSWORD })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert_eq!(body["error"], "account temporarily locked");

    // every attempt left a login failure, and the manual events carry
    // the reason
    let records = app.records().await;
    let failures: Vec<_> = records
        .iter()
        .filter(|r| r.action == AuditAction::Login && r.outcome == AuditOutcome::Failure)
        .collect();
    assert!(failures.len() >= 4);
    assert!(failures.iter().any(|r| matches!(
        &r.detail,
        RecordDetail::Auth(d) if d.reason.as_deref() == Some("account locked")
    )));
}

#[tokio::test]
async fn test_refresh_rotation_over_http() {
    let app = TestApp::new();
    let user = app
        .state
        .accounts
        .register("rotate@example.com", PASSWORD)
        .await
        .unwrap();
    app.state.accounts.verify_email(user.id).await.unwrap();

    let response = app
        .send(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "rotate@example.com", "password": PASSWORD })),
        ))
        .await;
    let issued = response_json(response).await;
    let refresh_token = issued["refresh_token"].as_str().unwrap().to_string();

    let response = app
        .send(request(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = response_json(response).await;
    assert_ne!(rotated["token"], issued["token"]);

    // the spent refresh token reads as invalid
    let response = app
        .send(request(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_and_is_idempotent() {
    let app = TestApp::new();
    let (user, token) = app.seed_admin("harry", &[]).await;

    let response = app
        .send(request("POST", "/api/auth/logout", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // logging out again is still a success
    let response = app
        .send(request("POST", "/api/auth/logout", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let records = app.records().await;
    assert!(records
        .iter()
        .any(|r| r.action == AuditAction::Logout && r.actor_id == Some(user.id)));
}

// ===== Permission guards =====

#[tokio::test]
async fn test_guards_anonymous_vs_unauthorized() {
    let app = TestApp::new();
    let (_, token) = app.seed_admin("dave", &[("permissions", "read")]).await;

    let response = app.send(request("GET", "/api/admin/roles", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(request("GET", "/api/admin/roles", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(request("GET", "/api/admin/permissions", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_revocation_effective_next_request() {
    let app = TestApp::new();
    let (user, token) = app.seed_admin("erin", &[("roles", "read")]).await;

    let response = app
        .send(request("GET", "/api/admin/roles", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // pull the role out from under the live session
    let roles = app.state.resolver.user_roles(user.id).await.unwrap();
    app.state
        .auth_store
        .unassign_role(user.id, roles[0].id)
        .await
        .unwrap();

    let response = app
        .send(request("GET", "/api/admin/roles", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ===== Role administration =====

#[tokio::test]
async fn test_role_lifecycle_snapshots() {
    let app = TestApp::new();
    let (user, token) = app
        .seed_admin(
            "frank",
            &[("roles", "create"), ("roles", "update"), ("roles", "delete")],
        )
        .await;

    let response = app
        .send(request(
            "POST",
            "/api/admin/roles",
            Some(&token),
            Some(json!({ "name": "underwriter", "display_name": "Underwriter" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    let role_id = created["id"].as_str().unwrap().to_string();

    let response = app
        .send(request(
            "PUT",
            &format!("/api/admin/roles/{role_id}"),
            Some(&token),
            Some(json!({ "display_name": "Senior Underwriter" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let records = app.records().await;
    let update = records
        .iter()
        .find(|r| r.action == AuditAction::Update && r.resource == "roles")
        .unwrap();
    assert_eq!(update.actor_id, Some(user.id));
    assert_eq!(update.resource_id.as_deref(), Some(role_id.as_str()));
    let changes = update.changes.as_ref().unwrap();
    assert_eq!(changes.before.as_ref().unwrap()["display_name"], "Underwriter");
    assert_eq!(
        changes.after.as_ref().unwrap()["display_name"],
        "Senior Underwriter"
    );

    let response = app
        .send(request(
            "DELETE",
            &format!("/api/admin/roles/{role_id}"),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let records = app.records().await;
    let deletion = records
        .iter()
        .find(|r| r.action == AuditAction::Delete && r.resource == "roles")
        .unwrap();
    let before = deletion.changes.as_ref().unwrap().before.as_ref().unwrap();
    assert_eq!(before["name"], "underwriter");
}

#[tokio::test]
async fn test_attach_detach_over_http() {
    let app = TestApp::new();
    let (_, token) = app
        .seed_admin(
            "grace",
            &[
                ("roles", "read"),
                ("roles", "create"),
                ("roles", "update"),
                ("permissions", "create"),
            ],
        )
        .await;

    let response = app
        .send(request(
            "POST",
            "/api/admin/roles",
            Some(&token),
            Some(json!({ "name": "analyst" })),
        ))
        .await;
    let role_id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .send(request(
            "POST",
            "/api/admin/permissions",
            Some(&token),
            Some(json!({ "resource": "notes", "action": "read" })),
        ))
        .await;
    let permission_id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let attach_path = format!("/api/admin/roles/{role_id}/permissions/{permission_id}");
    for _ in 0..2 {
        let response = app
            .send(request("POST", &attach_path, Some(&token), None))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app
        .send(request(
            "GET",
            &format!("/api/admin/roles/{role_id}"),
            Some(&token),
            None,
        ))
        .await;
    let detail = response_json(response).await;
    assert_eq!(detail["permissions"].as_array().unwrap().len(), 1);

    for _ in 0..2 {
        let response = app
            .send(request("DELETE", &attach_path, Some(&token), None))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app
        .send(request(
            "GET",
            &format!("/api/admin/roles/{role_id}"),
            Some(&token),
            None,
        ))
        .await;
    let detail = response_json(response).await;
    assert!(detail["permissions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_suspension_snapshot_and_sessions() {
    let app = TestApp::new();
    let (admin, admin_token) = app.seed_admin("admin", &[("users", "update")]).await;

    let member = app
        .state
        .accounts
        .register("member@example.com", PASSWORD)
        .await
        .unwrap();
    app.state.accounts.verify_email(member.id).await.unwrap();
    let member_token = app.login("member@example.com", PASSWORD).await;

    let response = app
        .send(request(
            "PATCH",
            &format!("/api/admin/users/{}/status", member.id),
            Some(&admin_token),
            Some(json!({ "status": "suspended" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // the member's token no longer authenticates
    let response = app
        .send(request("GET", "/api/auth/me", Some(&member_token), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let records = app.records().await;
    let change = records
        .iter()
        .find(|r| r.action == AuditAction::Update && r.resource == "users")
        .unwrap();
    assert_eq!(change.actor_id, Some(admin.id));
    let changes = change.changes.as_ref().unwrap();
    assert_eq!(changes.before.as_ref().unwrap()["status"], "active");
    assert_eq!(changes.after.as_ref().unwrap()["status"], "suspended");
}

#[tokio::test]
async fn test_unknown_status_value_is_a_bad_request() {
    let app = TestApp::new();
    let (_, token) = app.seed_admin("nina", &[("users", "update")]).await;

    let response = app
        .send(request(
            "PATCH",
            &format!("/api/admin/users/{}/status", Uuid::new_v4()),
            Some(&token),
            Some(json!({ "status": "banned" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ===== Audit reporting =====

#[tokio::test]
async fn test_audit_endpoint_filters_and_fetches_by_id() {
    let app = TestApp::new();
    let (_, token) = app.seed_admin("auditor", &[("audit", "read")]).await;

    // produce a failure record alongside the seeding login
    let response = app
        .send(request("GET", "/api/admin/permissions", Some(&token), None))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    app.records().await; // drain the queue before querying over HTTP

    let response = app
        .send(request(
            "GET",
            "/api/admin/audit?action=login&outcome=success",
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let items = body.as_array().unwrap().clone();
    assert!(!items.is_empty());
    assert!(items
        .iter()
        .all(|r| r["action"] == "login" && r["outcome"] == "success"));

    let id = items[0]["id"].as_str().unwrap();
    let response = app
        .send(request(
            "GET",
            &format!("/api/admin/audit/{id}"),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // unknown vocabulary is rejected, not silently ignored
    let response = app
        .send(request(
            "GET",
            "/api/admin/audit?action=promote",
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
