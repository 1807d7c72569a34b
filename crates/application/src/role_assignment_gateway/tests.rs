use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Notify};

use rolegate_core::{AppError, AppResult, CallerIdentity, ClaimSet, SubjectId};
use rolegate_domain::{
    AuditEntry, AuditOutcome, IdempotencyKey, Role, RoleAssignmentRequest, RoleAssignmentResult,
    RoleChangeRecord, UserRecord,
};

use crate::{
    AttemptInfo, AuditQuery, AuditRepository, AuditWriteOutcome, ClaimWriteOutcome,
    IdentityProvider, IdentityStore, RateLimitRepository, RateLimitRule, RateLimitService,
    RetryPolicy, RoleClaimWrite, VerifiedToken,
};

use super::RoleAssignmentGateway;

fn ok<T>(result: AppResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("unexpected error: {error}"),
    }
}

fn subject(value: &str) -> SubjectId {
    ok(SubjectId::new(value))
}

fn claims(value: Value) -> ClaimSet {
    match value {
        Value::Object(map) => ClaimSet::new(map),
        other => panic!("claims must be a JSON object, got {other}"),
    }
}

fn caller(id: &str, claim_value: Value) -> CallerIdentity {
    ok(CallerIdentity::new(
        subject(id),
        claims(claim_value),
        Utc::now(),
    ))
}

fn admin(id: &str) -> CallerIdentity {
    caller(id, json!({ "admin": true }))
}

fn request(target: &str, role: &str, key: Option<&str>) -> RoleAssignmentRequest {
    RoleAssignmentRequest {
        target_subject_id: Some(target.to_owned()),
        role: Some(role.to_owned()),
        idempotency_key: key.map(str::to_owned),
    }
}

fn key(value: &str) -> IdempotencyKey {
    ok(IdempotencyKey::new(value))
}

#[derive(Default)]
struct FakeIdentityProvider {
    tokens: HashMap<String, VerifiedToken>,
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn verify_token(&self, raw_token: &str) -> AppResult<VerifiedToken> {
        self.tokens
            .get(raw_token)
            .cloned()
            .ok_or_else(|| AppError::InvalidToken("signature mismatch".to_owned()))
    }
}

/// Pauses a claim write until released.
struct ClaimWriteGate {
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct StoreState {
    users: HashMap<SubjectId, UserRecord>,
    changes: HashMap<IdempotencyKey, RoleChangeRecord>,
}

#[derive(Default)]
struct FakeIdentityStore {
    state: Mutex<StoreState>,
    store_calls: AtomicUsize,
    claim_writes: AtomicUsize,
    unavailable_claim_writes: AtomicUsize,
    gate: Option<Arc<ClaimWriteGate>>,
}

impl FakeIdentityStore {
    fn with_users(users: &[(&str, Option<Role>)]) -> Self {
        let store = Self::default();
        store.seed(users);
        store
    }

    fn seed(&self, users: &[(&str, Option<Role>)]) {
        let mut state = self.state.try_lock().unwrap_or_else(|_| panic!("store locked"));
        for (id, role) in users {
            state
                .users
                .insert(subject(id), UserRecord::new(subject(id), *role));
        }
    }

    async fn role_of(&self, id: &str) -> Option<Role> {
        self.state
            .lock()
            .await
            .users
            .get(&subject(id))
            .and_then(|user| user.role)
    }
}

#[async_trait]
impl IdentityStore for FakeIdentityStore {
    async fn get_user(&self, subject: &SubjectId) -> AppResult<Option<UserRecord>> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.users.get(subject).cloned())
    }

    async fn apply_role_claim(&self, write: RoleClaimWrite) -> AppResult<ClaimWriteOutcome> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .unavailable_claim_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(AppError::StoreUnavailable("connection refused".to_owned()));
        }

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut state = self.state.lock().await;
        if let Some(existing) = state.changes.get(&write.idempotency_key) {
            return Ok(ClaimWriteOutcome::AlreadyApplied(existing.clone()));
        }

        let applied_at = Utc::now();
        let Some(user) = state.users.get_mut(&write.target) else {
            return Err(AppError::TargetNotFound(write.target.to_string()));
        };
        let previous_role = user.role;
        user.role = Some(write.role);
        user.last_modified_at = applied_at;
        user.last_modified_by = Some(write.actor.clone());

        let record = RoleChangeRecord {
            idempotency_key: write.idempotency_key.clone(),
            actor: write.actor,
            target: write.target,
            previous_role,
            new_role: write.role,
            applied_at,
            fingerprint: write.fingerprint,
        };
        state.changes.insert(write.idempotency_key, record.clone());
        self.claim_writes.fetch_add(1, Ordering::SeqCst);

        Ok(ClaimWriteOutcome::Applied(record))
    }

    async fn find_role_change(&self, key: &IdempotencyKey) -> AppResult<Option<RoleChangeRecord>> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().await.changes.get(key).cloned())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeAuditRepository {
    entries: Mutex<Vec<AuditEntry>>,
    unavailable_keyed_writes: AtomicUsize,
}

impl FakeAuditRepository {
    async fn entries_with_outcome(&self, outcome: AuditOutcome) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.outcome == outcome)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn write_audit_if_absent(
        &self,
        key: &IdempotencyKey,
        entry: AuditEntry,
    ) -> AppResult<AuditWriteOutcome> {
        if self
            .unavailable_keyed_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
        {
            return Err(AppError::StoreUnavailable("audit store timeout".to_owned()));
        }

        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries
            .iter()
            .find(|stored| stored.idempotency_key.as_ref() == Some(key))
        {
            return Ok(AuditWriteOutcome {
                inserted: false,
                existing: Some(existing.clone()),
            });
        }

        entries.push(entry);
        Ok(AuditWriteOutcome {
            inserted: true,
            existing: None,
        })
    }

    async fn append_entry(&self, entry: AuditEntry) -> AppResult<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> AppResult<Option<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| entry.idempotency_key.as_ref() == Some(key))
            .cloned())
    }

    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeRateLimitRepository {
    counts: Mutex<HashMap<String, i32>>,
}

#[async_trait]
impl RateLimitRepository for FakeRateLimitRepository {
    async fn record_attempt(
        &self,
        key: &str,
        max_attempts: i32,
        _window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(key.to_owned()).or_insert(0);
        let attempt_count = *count + 1;
        if attempt_count <= max_attempts {
            *count = attempt_count;
        }
        Ok(AttemptInfo {
            attempt_count,
            oldest_attempt_at: Utc::now(),
        })
    }

    async fn cleanup_expired(&self, _before: DateTime<Utc>) -> AppResult<u64> {
        Ok(0)
    }
}

struct Harness {
    gateway: RoleAssignmentGateway,
    store: Arc<FakeIdentityStore>,
    audit: Arc<FakeAuditRepository>,
}

fn harness_with(store: FakeIdentityStore, provider: FakeIdentityProvider) -> Harness {
    let store = Arc::new(store);
    let audit = Arc::new(FakeAuditRepository::default());
    let gateway = RoleAssignmentGateway::new(
        Arc::new(provider),
        store.clone(),
        audit.clone(),
        RateLimitService::new(Arc::new(FakeRateLimitRepository::default())),
    )
    .with_retry_policy(RetryPolicy::no_retry());

    Harness {
        gateway,
        store,
        audit,
    }
}

fn harness(users: &[(&str, Option<Role>)]) -> Harness {
    harness_with(
        FakeIdentityStore::with_users(users),
        FakeIdentityProvider::default(),
    )
}

// verify_caller

fn provider_with(token: &str, subject_id: &str, claim_value: Value) -> FakeIdentityProvider {
    FakeIdentityProvider {
        tokens: HashMap::from([(
            token.to_owned(),
            VerifiedToken {
                subject: subject_id.to_owned(),
                claims: claims(claim_value),
                issued_at: Utc::now(),
            },
        )]),
    }
}

#[tokio::test]
async fn verify_caller_extracts_claims() {
    let h = harness_with(
        FakeIdentityStore::default(),
        provider_with("good", "admin-1", json!({ "admin": true })),
    );

    let identity = ok(h.gateway.verify_caller("good").await);

    assert_eq!(identity.subject().as_str(), "admin-1");
    assert_eq!(identity.claims().bool_claim("admin"), Some(true));
}

#[tokio::test]
async fn verify_caller_rejects_unverifiable_token() {
    let h = harness_with(
        FakeIdentityStore::default(),
        provider_with("good", "admin-1", json!({ "admin": true })),
    );

    assert!(matches!(
        h.gateway.verify_caller("forged").await,
        Err(AppError::InvalidToken(_))
    ));
    assert!(matches!(
        h.gateway.verify_caller("   ").await,
        Err(AppError::InvalidToken(_))
    ));
}

#[tokio::test]
async fn verify_caller_requires_claim_set() {
    let h = harness_with(
        FakeIdentityStore::default(),
        provider_with("bare", "user-1", json!({})),
    );

    assert!(matches!(
        h.gateway.verify_caller("bare").await,
        Err(AppError::MissingClaims(_))
    ));
}

// authorize

#[test]
fn authorize_requires_boolean_admin_claim() {
    let h = harness(&[]);

    for claim_value in [
        json!({ "admin": false }),
        json!({ "admin": "true" }),
        json!({ "admin": 1 }),
        json!({ "role": "admin" }),
    ] {
        let result = h.gateway.authorize(
            &caller("user-1", claim_value),
            &request("u123", "editor", None),
        );
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    }
}

#[test]
fn authorize_rejects_unknown_and_missing_roles() {
    let h = harness(&[]);
    let actor = admin("admin-1");

    assert!(matches!(
        h.gateway.authorize(&actor, &request("u123", "superuser", None)),
        Err(AppError::UnknownRole(_))
    ));

    let missing_role = RoleAssignmentRequest {
        target_subject_id: Some("u123".to_owned()),
        role: None,
        idempotency_key: None,
    };
    assert!(matches!(
        h.gateway.authorize(&actor, &missing_role),
        Err(AppError::UnknownRole(_))
    ));
}

#[test]
fn authorize_requires_target() {
    let h = harness(&[]);
    let missing_target = RoleAssignmentRequest {
        target_subject_id: None,
        role: Some("editor".to_owned()),
        idempotency_key: None,
    };

    assert!(matches!(
        h.gateway.authorize(&admin("admin-1"), &missing_target),
        Err(AppError::TargetNotFound(_))
    ));
    assert!(matches!(
        h.gateway
            .authorize(&admin("admin-1"), &request("  ", "editor", None)),
        Err(AppError::TargetNotFound(_))
    ));
}

#[test]
fn authorize_denies_self_demotion() {
    let h = harness(&[]);

    let result = h
        .gateway
        .authorize(&admin("admin-1"), &request("admin-1", "viewer", None));
    assert!(matches!(result, Err(AppError::SelfDemotionDenied(_))));

    let editor_admin = caller("admin-2", json!({ "admin": true, "role": "editor" }));
    let result = h
        .gateway
        .authorize(&editor_admin, &request("admin-2", "viewer", None));
    assert!(matches!(result, Err(AppError::SelfDemotionDenied(_))));
}

#[test]
fn authorize_allows_same_role_for_other_subject_and_self_promotion() {
    let h = harness(&[]);

    let other = h
        .gateway
        .authorize(&admin("admin-1"), &request("u123", "viewer", None));
    assert!(other.is_ok_and(|change| change.role() == Role::Viewer));

    let editor_admin = caller("admin-2", json!({ "admin": true, "role": "editor" }));
    assert!(
        h.gateway
            .authorize(&editor_admin, &request("admin-2", "admin", None))
            .is_ok()
    );
    assert!(
        h.gateway
            .authorize(&editor_admin, &request("admin-2", "editor", None))
            .is_ok()
    );
}

proptest! {
    #[test]
    fn non_admin_callers_are_always_denied(
        admin_claim in prop_oneof![
            Just(Value::Null),
            Just(Value::Bool(false)),
            "[a-z]{0,6}".prop_map(Value::String),
            any::<i64>().prop_map(Value::from),
        ],
        target in proptest::option::of("[a-z0-9 ]{0,10}"),
        role in proptest::option::of("[a-z]{0,10}"),
    ) {
        let h = harness(&[]);
        let actor = caller("user-1", json!({ "admin": admin_claim, "email_verified": true }));
        let request = RoleAssignmentRequest {
            target_subject_id: target,
            role,
            idempotency_key: None,
        };

        prop_assert!(matches!(
            h.gateway.authorize(&actor, &request),
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn unrecognized_roles_are_rejected_for_admins(role in "[a-zA-Z_]{1,12}") {
        prop_assume!(Role::from_transport(&role).is_err());
        let h = harness(&[]);

        prop_assert!(matches!(
            h.gateway.authorize(&admin("admin-1"), &request("u123", &role, None)),
            Err(AppError::UnknownRole(_))
        ));
    }
}

// apply_role_change and assign_role

#[tokio::test]
async fn assign_role_applies_and_audits() {
    let h = harness(&[("u123", Some(Role::Viewer))]);

    let result = ok(h
        .gateway
        .assign_role(&admin("admin-1"), request("u123", "editor", Some("k1")))
        .await);

    assert_eq!(result.target.as_str(), "u123");
    assert_eq!(result.role, Role::Editor);
    assert_eq!(h.store.role_of("u123").await, Some(Role::Editor));

    let applied = h.audit.entries_with_outcome(AuditOutcome::Applied).await;
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].old_role, Some(Role::Viewer));
    assert_eq!(applied[0].actor.as_str(), "admin-1");
    assert_eq!(applied[0].idempotency_key, Some(key("k1")));
}

#[tokio::test]
async fn repeated_key_returns_identical_result_once() {
    let h = harness(&[("u123", Some(Role::Viewer))]);
    let actor = admin("admin-1");

    let first = ok(h
        .gateway
        .assign_role(&actor, request("u123", "editor", Some("k1")))
        .await);
    let second = ok(h
        .gateway
        .assign_role(&actor, request("u123", "editor", Some("k1")))
        .await);

    assert_eq!(first, second);
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 1);
    assert_eq!(h.audit.entries.lock().await.len(), 1);
}

#[tokio::test]
async fn concurrent_requests_with_shared_key_apply_once() {
    let h = harness(&[("u123", Some(Role::Viewer))]);
    let Ok(change) = h
        .gateway
        .authorize(&admin("admin-1"), &request("u123", "editor", None))
    else {
        panic!("authorization failed");
    };
    let shared_key = key("race-key");

    let (first, second) = tokio::join!(
        h.gateway.apply_role_change(&change, &shared_key),
        h.gateway.apply_role_change(&change, &shared_key),
    );
    let (first, second) = (ok(first), ok(second));

    assert_eq!(first.role, Role::Editor);
    assert_eq!(first, second);
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.audit.entries_with_outcome(AuditOutcome::Applied).await.len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_on_multi_thread_runtime_apply_once() {
    let h = harness(&[("u123", Some(Role::Viewer))]);
    let actor = admin("admin-1");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let gateway = h.gateway.clone();
            let actor = actor.clone();
            tokio::spawn(async move {
                gateway
                    .assign_role(&actor, request("u123", "editor", Some("burst")))
                    .await
            })
        })
        .collect();

    let mut results: Vec<RoleAssignmentResult> = Vec::new();
    for task in tasks {
        match task.await {
            Ok(result) => results.push(ok(result)),
            Err(error) => panic!("task failed: {error}"),
        }
    }

    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 1);
    assert_eq!(h.audit.entries.lock().await.len(), 1);
}

#[tokio::test]
async fn missing_target_is_denied_and_audited() {
    let h = harness(&[]);

    let result = h
        .gateway
        .assign_role(&admin("admin-1"), request("ghost", "viewer", Some("k1")))
        .await;

    assert!(matches!(result, Err(AppError::TargetNotFound(_))));
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 0);
    let denied = h.audit.entries_with_outcome(AuditOutcome::Denied).await;
    assert_eq!(denied.len(), 1);
    assert!(denied[0].idempotency_key.is_none());
}

#[tokio::test]
async fn policy_rejections_never_reach_the_store() {
    let h = harness(&[("u123", Some(Role::Viewer))]);

    let result = h
        .gateway
        .assign_role(
            &caller("user-1", json!({ "admin": false })),
            request("u123", "editor", Some("k1")),
        )
        .await;

    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    assert_eq!(h.store.store_calls.load(Ordering::SeqCst), 0);
    assert!(h.audit.entries.lock().await.is_empty());
}

#[tokio::test]
async fn store_unavailable_is_retried_with_backoff() {
    let store = FakeIdentityStore::with_users(&[("u123", Some(Role::Viewer))]);
    store.unavailable_claim_writes.store(2, Ordering::SeqCst);
    let h = harness_with(store, FakeIdentityProvider::default());
    let gateway = h.gateway.clone().with_retry_policy(RetryPolicy::new(
        3,
        Duration::from_millis(1),
        Duration::from_millis(4),
    ));

    let result = gateway
        .assign_role(&admin("admin-1"), request("u123", "editor", Some("k1")))
        .await;

    assert!(result.is_ok_and(|result| result.role == Role::Editor));
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 1);
    assert_eq!(h.audit.entries.lock().await.len(), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_store_unavailable_with_failed_audit() {
    let store = FakeIdentityStore::with_users(&[("u123", Some(Role::Viewer))]);
    store.unavailable_claim_writes.store(5, Ordering::SeqCst);
    let h = harness_with(store, FakeIdentityProvider::default());

    let result = h
        .gateway
        .assign_role(&admin("admin-1"), request("u123", "editor", Some("k1")))
        .await;

    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    assert_eq!(h.store.role_of("u123").await, Some(Role::Viewer));
    assert_eq!(
        h.audit.entries_with_outcome(AuditOutcome::Failed).await.len(),
        1
    );
}

#[tokio::test]
async fn missing_audit_entry_is_repaired_without_rewriting_claim() {
    let h = harness(&[("u123", Some(Role::Viewer))]);
    h.audit.unavailable_keyed_writes.store(2, Ordering::SeqCst);
    let actor = admin("admin-1");

    let first = h
        .gateway
        .assign_role(&actor, request("u123", "editor", Some("k1")))
        .await;
    assert!(matches!(first, Err(AppError::StoreUnavailable(_))));
    assert_eq!(h.store.role_of("u123").await, Some(Role::Editor));
    assert!(h.audit.entries.lock().await.is_empty());

    let second = ok(h
        .gateway
        .assign_role(&actor, request("u123", "editor", Some("k1")))
        .await);

    assert_eq!(second.role, Role::Editor);
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 1);
    let applied = h.audit.entries_with_outcome(AuditOutcome::Applied).await;
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].recorded_at, second.applied_at);
    assert!(
        h.audit
            .entries_with_outcome(AuditOutcome::Failed)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn committed_claim_is_audited_as_applied_when_keyed_audit_write_fails() {
    let h = harness(&[("u123", Some(Role::Viewer))]);
    h.audit.unavailable_keyed_writes.store(1, Ordering::SeqCst);
    let actor = admin("admin-1");

    let result = ok(h
        .gateway
        .assign_role(&actor, request("u123", "editor", Some("k1")))
        .await);

    assert_eq!(result.role, Role::Editor);
    assert_eq!(h.store.role_of("u123").await, Some(Role::Editor));
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 1);

    let entries = h.audit.entries.lock().await.clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, AuditOutcome::Applied);
    assert_eq!(entries[0].old_role, Some(Role::Viewer));
    assert_eq!(entries[0].idempotency_key, Some(key("k1")));
    assert_eq!(entries[0].recorded_at, result.applied_at);
}

#[tokio::test]
async fn reused_key_returns_recorded_result() {
    let h = harness(&[("u123", Some(Role::Viewer)), ("u456", None)]);
    let actor = admin("admin-1");

    let first = ok(h
        .gateway
        .assign_role(&actor, request("u123", "editor", Some("k1")))
        .await);
    let reused = ok(h
        .gateway
        .assign_role(&actor, request("u456", "admin", Some("k1")))
        .await);

    assert_eq!(first, reused);
    assert_eq!(h.store.role_of("u456").await, None);
}

#[tokio::test]
async fn rate_limit_rejects_without_store_interaction() {
    let h = harness(&[("u1", None), ("u2", None), ("u3", None), ("u4", None)]);
    let gateway = h
        .gateway
        .clone()
        .with_rate_limit_rule(RateLimitRule::new("role_change", 3, 60));
    let actor = admin("admin-1");

    for target in ["u1", "u2", "u3"] {
        assert!(
            gateway
                .assign_role(&actor, request(target, "viewer", None))
                .await
                .is_ok()
        );
    }
    let calls_before = h.store.store_calls.load(Ordering::SeqCst);

    let limited = gateway
        .assign_role(&actor, request("u4", "viewer", None))
        .await;

    assert!(matches!(limited, Err(AppError::RateLimited(_))));
    assert_eq!(h.store.claim_writes.load(Ordering::SeqCst), 3);
    assert_eq!(h.store.store_calls.load(Ordering::SeqCst), calls_before);

    let other_actor = gateway
        .assign_role(&admin("admin-2"), request("u4", "viewer", None))
        .await;
    assert!(other_actor.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_caller_does_not_cancel_commit() {
    let gate = Arc::new(ClaimWriteGate {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let store = FakeIdentityStore {
        gate: Some(gate.clone()),
        ..FakeIdentityStore::default()
    };
    store.seed(&[("u123", Some(Role::Viewer))]);
    let h = harness_with(store, FakeIdentityProvider::default());

    let gateway = h.gateway.clone();
    let caller_task = tokio::spawn(async move {
        gateway
            .assign_role(&admin("admin-1"), request("u123", "editor", Some("k1")))
            .await
    });

    gate.entered.notified().await;
    caller_task.abort();
    gate.release.notify_one();

    let mut committed = false;
    for _ in 0..200 {
        if h.audit
            .find_by_idempotency_key(&key("k1"))
            .await
            .is_ok_and(|entry| entry.is_some())
        {
            committed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(committed);
    assert_eq!(h.store.role_of("u123").await, Some(Role::Editor));

    let observed = ok(h.gateway.lookup_role_assignment(&admin("admin-1"), "k1").await);
    assert_eq!(observed.role, Role::Editor);
}

// queries

#[tokio::test]
async fn lookup_requires_admin_and_known_key() {
    let h = harness(&[("u123", Some(Role::Viewer))]);

    assert!(matches!(
        h.gateway
            .lookup_role_assignment(&caller("user-1", json!({ "admin": false })), "k1")
            .await,
        Err(AppError::PermissionDenied(_))
    ));
    assert!(matches!(
        h.gateway
            .lookup_role_assignment(&admin("admin-1"), "missing")
            .await,
        Err(AppError::TargetNotFound(_))
    ));
}

#[tokio::test]
async fn audit_listing_filters_by_target_and_outcome() {
    let h = harness(&[("u123", Some(Role::Viewer)), ("u456", None)]);
    let actor = admin("admin-1");

    assert!(
        h.gateway
            .assign_role(&actor, request("u123", "editor", None))
            .await
            .is_ok()
    );
    assert!(
        h.gateway
            .assign_role(&actor, request("u456", "viewer", None))
            .await
            .is_ok()
    );
    assert!(
        h.gateway
            .assign_role(&actor, request("ghost", "viewer", None))
            .await
            .is_err()
    );

    let for_target = ok(h
        .gateway
        .list_audit_entries(
            &actor,
            AuditQuery {
                target: Some(subject("u456")),
                ..AuditQuery::default()
            },
        )
        .await);
    assert_eq!(for_target.len(), 1);
    assert_eq!(for_target[0].new_role, Role::Viewer);

    let denied = ok(h
        .gateway
        .list_audit_entries(
            &actor,
            AuditQuery {
                outcome: Some(AuditOutcome::Denied),
                limit: 0,
                ..AuditQuery::default()
            },
        )
        .await);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].target.as_str(), "ghost");

    assert!(matches!(
        h.gateway
            .list_audit_entries(
                &caller("user-1", json!({ "role": "editor" })),
                AuditQuery::default()
            )
            .await,
        Err(AppError::PermissionDenied(_))
    ));
}
