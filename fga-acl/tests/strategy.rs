use chrono::{DateTime, Utc};
use fga_acl::backend::{
    BoxFuture, CheckRequest, Consistency, ListObjectsRequest, ListUsersRequest, ObjectStream,
    ReadPage, ReadRequest, StoredTuple,
};
use fga_acl::{
    AclError, CollectSink, Column, FgaBackend, MockBackend, PermissionFact, QueryPredicate,
    RelationPolicy, Strategy, Subject,
};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

fn plan(predicate: QueryPredicate) -> Strategy {
    Strategy::classify(&predicate, RelationPolicy::Required).unwrap()
}

async fn run(strategy: &Strategy, backend: &dyn FgaBackend, sink: &mut CollectSink) -> Result<(), AclError> {
    strategy.execute(backend, sink, &CancellationToken::new()).await
}

fn tuple(user: &str, relation: &str, object: &str) -> StoredTuple {
    StoredTuple {
        user: user.into(),
        relation: relation.into(),
        object: object.into(),
        timestamp: DateTime::from_timestamp(1_700_000_000, 0),
    }
}

/// Backend replaying canned read pages and list results, recording every request.
#[derive(Default)]
struct ScriptedBackend {
    pages: Mutex<VecDeque<Result<ReadPage, AclError>>>,
    reads: Mutex<Vec<ReadRequest>>,
    subjects: Vec<Subject>,
    objects: Vec<Result<String, AclError>>,
}

impl ScriptedBackend {
    fn with_pages(pages: Vec<Result<ReadPage, AclError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Default::default()
        }
    }

    fn reads(&self) -> Vec<ReadRequest> {
        self.reads.lock().unwrap().clone()
    }
}

impl FgaBackend for ScriptedBackend {
    fn store_id(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> Option<&str> {
        Some("model-1")
    }

    fn check(&self, _request: CheckRequest) -> BoxFuture<'_, Result<bool, AclError>> {
        Box::pin(async { Ok(false) })
    }

    fn streamed_list_objects(
        &self,
        _request: ListObjectsRequest,
    ) -> BoxFuture<'_, Result<ObjectStream, AclError>> {
        let objects = self.objects.clone();
        Box::pin(async move {
            let stream: ObjectStream = Box::pin(futures_util::stream::iter(objects));
            Ok(stream)
        })
    }

    fn list_users(
        &self,
        _request: ListUsersRequest,
    ) -> BoxFuture<'_, Result<Vec<Subject>, AclError>> {
        let subjects = self.subjects.clone();
        Box::pin(async move { Ok(subjects) })
    }

    fn read(&self, request: ReadRequest) -> BoxFuture<'_, Result<ReadPage, AclError>> {
        self.reads.lock().unwrap().push(request);
        let page = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ReadPage::default()));
        Box::pin(async move { page })
    }
}

/// Backend whose calls never complete.
struct StalledBackend;

impl FgaBackend for StalledBackend {
    fn store_id(&self) -> &str {
        "stalled"
    }

    fn model_id(&self) -> Option<&str> {
        None
    }

    fn check(&self, _request: CheckRequest) -> BoxFuture<'_, Result<bool, AclError>> {
        Box::pin(std::future::pending())
    }

    fn streamed_list_objects(
        &self,
        _request: ListObjectsRequest,
    ) -> BoxFuture<'_, Result<ObjectStream, AclError>> {
        Box::pin(async {
            let stream: ObjectStream = Box::pin(futures_util::stream::pending());
            Ok(stream)
        })
    }

    fn list_users(
        &self,
        _request: ListUsersRequest,
    ) -> BoxFuture<'_, Result<Vec<Subject>, AclError>> {
        Box::pin(std::future::pending())
    }

    fn read(&self, _request: ReadRequest) -> BoxFuture<'_, Result<ReadPage, AclError>> {
        Box::pin(std::future::pending())
    }
}

// ── Check ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_check_allowed_emits_one_row() {
    let mock = MockBackend::new().with_model_id("model-1");
    mock.add_tuple("user:alice", "viewer", "doc:d1");
    let strategy = plan(
        QueryPredicate::new()
            .object("doc", "d1")
            .subject("user", "alice")
            .relation("viewer"),
    );

    let before = Utc::now();
    let mut sink = CollectSink::new();
    run(&strategy, &mock, &mut sink).await.unwrap();

    let rows = sink.into_rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(
        (
            row.object_type.as_str(),
            row.object_id.as_str(),
            row.subject_type.as_str(),
            row.subject_id.as_str(),
            row.relation.as_str(),
        ),
        ("doc", "d1", "user", "alice", "viewer")
    );
    assert_eq!(row.allowed, Some(true));
    assert_eq!(row.policy_version.as_deref(), Some("model-1"));
    assert!(row.evaluated_at.unwrap() >= before);
}

#[tokio::test]
async fn test_check_denied_emits_nothing() {
    let mock = MockBackend::new();
    let strategy = plan(
        QueryPredicate::new()
            .object("doc", "d1")
            .subject("user", "bob")
            .relation("viewer"),
    );

    let mut sink = CollectSink::new();
    run(&strategy, &mock, &mut sink).await.unwrap();
    assert!(sink.is_empty());
    assert_eq!(mock.calls().total(), 1);
}

#[tokio::test]
async fn test_zero_budget_issues_no_call() {
    let mock = MockBackend::new();
    mock.add_tuple("user:alice", "viewer", "doc:d1");
    let strategy = plan(
        QueryPredicate::new()
            .object("doc", "d1")
            .subject("user", "alice")
            .relation("viewer"),
    );

    let mut sink = CollectSink::with_limit(0);
    run(&strategy, &mock, &mut sink).await.unwrap();
    assert!(sink.is_empty());
    assert_eq!(mock.calls().total(), 0);
}

// ── Forward expansion ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_objects_respects_budget() {
    let mock = MockBackend::new();
    for i in 0..10 {
        mock.add_tuple("user:alice", "viewer", &format!("doc:{}", i));
    }
    let strategy = plan(
        QueryPredicate::new()
            .with(Column::ObjectType, "doc")
            .subject("user", "alice")
            .relation("viewer"),
    );

    let mut sink = CollectSink::with_limit(3);
    run(&strategy, &mock, &mut sink).await.unwrap();

    let ids: Vec<&str> = sink.rows().iter().map(|r| r.object_id.as_str()).collect();
    assert_eq!(ids, vec!["0", "1", "2"]);
    assert!(sink.rows().iter().all(|r| r.allowed.is_none()));
    let first = sink.rows()[0].evaluated_at;
    assert!(sink.rows().iter().all(|r| r.evaluated_at == first));
}

#[tokio::test]
async fn test_list_objects_empty_is_not_an_error() {
    let mock = MockBackend::new();
    let strategy = plan(
        QueryPredicate::new()
            .with(Column::ObjectType, "doc")
            .subject("user", "alice")
            .relation("viewer"),
    );

    let mut sink = CollectSink::new();
    run(&strategy, &mock, &mut sink).await.unwrap();
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_list_objects_stream_error_aborts() {
    let backend = ScriptedBackend {
        objects: vec![
            Ok("doc:1".into()),
            Err(AclError::Timeout),
            Ok("doc:2".into()),
        ],
        ..Default::default()
    };
    let strategy = plan(
        QueryPredicate::new()
            .with(Column::ObjectType, "doc")
            .subject("user", "alice")
            .relation("viewer"),
    );

    let mut sink = CollectSink::new();
    let result = run(&strategy, &backend, &mut sink).await;
    assert_eq!(result, Err(AclError::Timeout));
    assert_eq!(sink.len(), 1);
}

// ── Reverse expansion ──────────────────────────────────────────────────

#[tokio::test]
async fn test_list_users_emits_concrete_subjects() {
    let mock = MockBackend::new();
    mock.add_tuple("user:alice", "viewer", "doc:d1");
    mock.add_tuple("user:bob", "viewer", "doc:d1");
    mock.add_tuple("user:carol", "viewer", "doc:d2");
    let strategy = plan(
        QueryPredicate::new()
            .object("doc", "d1")
            .with(Column::SubjectType, "user")
            .relation("viewer"),
    );

    let mut sink = CollectSink::new();
    run(&strategy, &mock, &mut sink).await.unwrap();

    let ids: Vec<&str> = sink.rows().iter().map(|r| r.subject_id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_list_users_rejects_usersets() {
    let mock = MockBackend::new();
    mock.add_tuple("user:alice", "viewer", "doc:d1");
    mock.add_tuple("group:eng#member", "viewer", "doc:d1");
    let strategy = plan(
        QueryPredicate::new()
            .object("doc", "d1")
            .with(Column::SubjectType, "group")
            .relation("viewer"),
    );

    let mut sink = CollectSink::new();
    let result = run(&strategy, &mock, &mut sink).await;
    assert_eq!(result, Err(AclError::UnsupportedSubjectKind("userset".into())));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_list_users_rejects_wildcard_before_emitting() {
    let backend = ScriptedBackend {
        subjects: vec![
            Subject::Concrete { kind: "user".into(), id: "alice".into() },
            Subject::Wildcard { kind: "user".into() },
        ],
        ..Default::default()
    };
    let strategy = plan(
        QueryPredicate::new()
            .object("doc", "d1")
            .with(Column::SubjectType, "user")
            .relation("viewer"),
    );

    let mut sink = CollectSink::new();
    let result = run(&strategy, &backend, &mut sink).await;
    assert_eq!(result, Err(AclError::UnsupportedSubjectKind("wildcard".into())));
    assert!(sink.is_empty());
}

// ── Tuple scan ─────────────────────────────────────────────────────────

fn page(tuples: Vec<StoredTuple>, token: &str) -> Result<ReadPage, AclError> {
    Ok(ReadPage {
        tuples,
        continuation_token: token.into(),
    })
}

#[tokio::test]
async fn test_read_follows_continuation_tokens() {
    let backend = ScriptedBackend::with_pages(vec![
        page(vec![tuple("user:alice", "viewer", "doc:1")], "t1"),
        page(vec![tuple("user:bob", "viewer", "doc:1")], "t2"),
        page(vec![tuple("user:carol", "viewer", "doc:1")], ""),
    ]);
    let strategy = plan(QueryPredicate::new().object("doc", "1").relation("viewer"));

    let mut sink = CollectSink::new();
    run(&strategy, &backend, &mut sink).await.unwrap();

    let reads = backend.reads();
    let tokens: Vec<&str> = reads.iter().map(|r| r.continuation_token.as_str()).collect();
    assert_eq!(tokens, vec!["", "t1", "t2"]);
    assert!(reads.iter().all(|r| r.page_size == Some(100)));
    assert!(reads
        .iter()
        .all(|r| r.consistency == Consistency::HigherConsistency));
    assert_eq!(sink.len(), 3);
    assert_eq!(sink.rows()[0].evaluated_at, DateTime::from_timestamp(1_700_000_000, 0));
}

#[tokio::test]
async fn test_read_stops_when_budget_runs_out() {
    let backend = ScriptedBackend::with_pages(vec![
        page(
            vec![
                tuple("user:alice", "viewer", "doc:1"),
                tuple("user:bob", "viewer", "doc:1"),
            ],
            "t1",
        ),
        page(vec![tuple("user:carol", "viewer", "doc:1")], "t2"),
        page(vec![tuple("user:dave", "viewer", "doc:1")], ""),
    ]);
    let strategy = plan(QueryPredicate::new().object("doc", "1").relation("viewer"));

    let mut sink = CollectSink::with_limit(2);
    run(&strategy, &backend, &mut sink).await.unwrap();

    assert_eq!(sink.len(), 2);
    let reads = backend.reads();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].page_size, Some(2));
}

#[tokio::test]
async fn test_read_error_mid_scan_aborts() {
    let backend = ScriptedBackend::with_pages(vec![
        page(vec![tuple("user:alice", "viewer", "doc:1")], "t1"),
        Err(AclError::BackendUnavailable("connection reset".into())),
        page(vec![tuple("user:carol", "viewer", "doc:1")], ""),
    ]);
    let strategy = plan(QueryPredicate::new().object("doc", "1").relation("viewer"));

    let mut sink = CollectSink::new();
    let result = run(&strategy, &backend, &mut sink).await;

    assert!(matches!(result, Err(AclError::BackendUnavailable(_))));
    assert_eq!(sink.len(), 1);
    assert_eq!(backend.reads().len(), 2);
}

#[tokio::test]
async fn test_unfiltered_scan_matches_client_side() {
    let mock = MockBackend::new();
    mock.add_tuple("user:alice", "viewer", "doc:1");
    mock.add_tuple("user:bob", "viewer", "doc:2");
    mock.add_tuple("user:alice", "editor", "folder:1");
    mock.add_tuple("user:alice", "viewer", "folder:2");
    let strategy = plan(QueryPredicate::new().subject("user", "alice").relation("viewer"));

    let mut sink = CollectSink::new();
    run(&strategy, &mock, &mut sink).await.unwrap();

    let objects: Vec<String> = sink
        .rows()
        .iter()
        .map(|r: &PermissionFact| format!("{}:{}", r.object_type, r.object_id))
        .collect();
    assert_eq!(objects, vec!["doc:1".to_string(), "folder:2".to_string()]);
}

#[tokio::test]
async fn test_client_filtered_scan_reads_full_pages() {
    let mock = MockBackend::new();
    for i in 0..500 {
        mock.add_tuple(&format!("user:u{}", i), "viewer", &format!("doc:{}", i));
    }
    mock.add_tuple("user:alice", "viewer", "doc:last");
    let strategy = plan(QueryPredicate::new().subject("user", "alice").relation("viewer"));

    let mut sink = CollectSink::with_limit(1);
    run(&strategy, &mock, &mut sink).await.unwrap();

    assert_eq!(sink.len(), 1);
    assert_eq!(sink.rows()[0].object_id, "last");
    // 501 tuples at 100 per page.
    assert_eq!(mock.calls().read.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_half_bound_subject_reads_full_pages() {
    let backend = ScriptedBackend::with_pages(vec![page(
        vec![
            tuple("user:bob", "viewer", "doc:1"),
            tuple("group:alice", "viewer", "doc:1"),
        ],
        "",
    )]);
    let strategy = plan(
        QueryPredicate::new()
            .object("doc", "1")
            .with(Column::SubjectId, "alice")
            .relation("viewer"),
    );

    let mut sink = CollectSink::with_limit(1);
    run(&strategy, &backend, &mut sink).await.unwrap();

    assert_eq!(sink.rows()[0].subject_type, "group");
    assert_eq!(backend.reads()[0].page_size, Some(100));
    assert_eq!(backend.reads()[0].filter.as_ref().map(|f| f.user.as_str()), Some(""));
}

// ── Cancellation ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancelled_before_start() {
    let mock = MockBackend::new();
    let strategy = plan(QueryPredicate::new().relation("viewer"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut sink = CollectSink::new();
    let result = strategy.execute(&mock, &mut sink, &cancel).await;
    assert_eq!(result, Err(AclError::Cancelled));
    assert_eq!(mock.calls().total(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_pending_call() {
    let strategies = [
        plan(
            QueryPredicate::new()
                .object("doc", "d1")
                .subject("user", "alice")
                .relation("viewer"),
        ),
        plan(
            QueryPredicate::new()
                .with(Column::ObjectType, "doc")
                .subject("user", "alice")
                .relation("viewer"),
        ),
        plan(
            QueryPredicate::new()
                .object("doc", "d1")
                .with(Column::SubjectType, "user")
                .relation("viewer"),
        ),
        plan(QueryPredicate::new().relation("viewer")),
    ];

    for strategy in &strategies {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut sink = CollectSink::new();
        let result = strategy.execute(&StalledBackend, &mut sink, &cancel).await;
        assert_eq!(result, Err(AclError::Cancelled), "strategy {}", strategy.name());
    }
}
