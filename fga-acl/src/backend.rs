//! Backend trait and request/response shapes for the OpenFGA RPCs.
//!
//! [`FgaBackend`] is the seam between the retrieval strategies and the
//! remote service. Requests carry no store id: every implementation injects
//! the store it was resolved against.
//!
//! Provided implementations:
//! - [`GrpcBackend`](crate::grpc::GrpcBackend): production gRPC client over tonic
//! - [`MockBackend`]: in-memory mock for tests

use crate::error::AclError;
use crate::ident;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Boxed future returned by [`FgaBackend`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Server-streamed object identifiers (`type:id`).
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<String, AclError>> + Send>>;

/// Per-request read consistency hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Consistency {
    #[default]
    Unspecified,
    MinimizeLatency,
    /// Trade latency for read-after-write correctness.
    HigherConsistency,
}

/// Is `user` related to `object` by `relation`? Identifiers are `type:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub user: String,
    pub relation: String,
    pub object: String,
    pub consistency: Consistency,
}

/// Which objects of `object_type` can `user` reach under `relation`?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub user: String,
    pub relation: String,
    pub object_type: String,
    pub consistency: Consistency,
}

/// Which subjects of `subject_type` have `relation` on the object?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersRequest {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub subject_type: String,
    pub consistency: Consistency,
}

/// Tuple-key filter of a read. Empty fields are unset.
///
/// `object` is either `type:id` or `type:` (all objects of a type, which
/// requires `user`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleFilter {
    pub user: String,
    pub relation: String,
    pub object: String,
}

/// One page of a stored-tuple scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRequest {
    /// `None` reads every tuple in the store.
    pub filter: Option<TupleFilter>,
    pub page_size: Option<i32>,
    /// Empty for the first page.
    pub continuation_token: String,
    pub consistency: Consistency,
}

/// A relationship tuple as stored in the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTuple {
    pub user: String,
    pub relation: String,
    pub object: String,
    /// When the tuple was written.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Result of a read. An empty `continuation_token` ends the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPage {
    pub tuples: Vec<StoredTuple>,
    pub continuation_token: String,
}

/// A subject returned by list users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A concrete subject such as `user:alice`.
    Concrete { kind: String, id: String },
    /// Every member of a relation on an object, such as `group:eng#member`.
    Set { kind: String, id: String, relation: String },
    /// Every subject of a type, such as `user:*`.
    Wildcard { kind: String },
}

impl Subject {
    /// Parse a tuple user field (`type:id`, `type:id#relation` or `type:*`).
    pub fn parse(user: &str) -> Subject {
        let (kind, rest) = ident::decode(user);
        if rest == "*" {
            return Subject::Wildcard { kind: kind.to_string() };
        }
        match rest.split_once('#') {
            Some((id, relation)) => Subject::Set {
                kind: kind.to_string(),
                id: id.to_string(),
                relation: relation.to_string(),
            },
            None => Subject::Concrete {
                kind: kind.to_string(),
                id: rest.to_string(),
            },
        }
    }

    /// The subject type.
    pub fn kind(&self) -> &str {
        match self {
            Subject::Concrete { kind, .. }
            | Subject::Set { kind, .. }
            | Subject::Wildcard { kind } => kind,
        }
    }
}

/// Typed facade over the OpenFGA RPCs the permission table needs.
pub trait FgaBackend: Send + Sync + 'static {
    /// The store every request is sent to.
    fn store_id(&self) -> &str;

    /// The authorization model evaluating requests are pinned to, if any.
    fn model_id(&self) -> Option<&str>;

    /// Single authorization check.
    fn check(&self, request: CheckRequest) -> BoxFuture<'_, Result<bool, AclError>>;

    /// Open a server stream of reachable objects.
    fn streamed_list_objects(
        &self,
        request: ListObjectsRequest,
    ) -> BoxFuture<'_, Result<ObjectStream, AclError>>;

    /// Bounded list of subjects related to an object.
    fn list_users(&self, request: ListUsersRequest)
        -> BoxFuture<'_, Result<Vec<Subject>, AclError>>;

    /// One page of stored tuples.
    fn read(&self, request: ReadRequest) -> BoxFuture<'_, Result<ReadPage, AclError>>;

    /// Release transport resources. Called once, when the connection leaves
    /// the [`ConnectionManager`](crate::connection::ConnectionManager).
    fn close(&self) {}
}

// ── MockBackend ────────────────────────────────────────────────────────

/// Number of calls made to each RPC of a [`MockBackend`].
#[derive(Debug, Default)]
pub struct CallCounts {
    pub check: AtomicUsize,
    pub list_objects: AtomicUsize,
    pub list_users: AtomicUsize,
    pub read: AtomicUsize,
}

impl CallCounts {
    /// Total number of RPCs issued.
    pub fn total(&self) -> usize {
        self.check.load(Ordering::SeqCst)
            + self.list_objects.load(Ordering::SeqCst)
            + self.list_users.load(Ordering::SeqCst)
            + self.read.load(Ordering::SeqCst)
    }
}

const MOCK_DEFAULT_PAGE_SIZE: usize = 50;

/// In-memory mock backend for testing.
///
/// Stores tuples in insertion order. Only performs direct tuple lookups,
/// it does **not** model transitive relationships like a real OpenFGA
/// server would. Reads paginate by offset, using the decimal offset of the
/// next page as continuation token.
///
/// # Example
///
/// ```
/// use fga_acl::MockBackend;
///
/// let mock = MockBackend::new();
/// mock.add_tuple("user:alice", "viewer", "doc:1");
/// assert!(mock.has_tuple("user:alice", "viewer", "doc:1"));
/// ```
pub struct MockBackend {
    store_id: String,
    model_id: Option<String>,
    tuples: Arc<RwLock<Vec<StoredTuple>>>,
    calls: Arc<CallCounts>,
    closed: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    pub fn new() -> Self {
        Self {
            store_id: "mock-store".to_string(),
            model_id: None,
            tuples: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(CallCounts::default()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report `model_id` as the pinned authorization model.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Add a relationship tuple, stamped with the current time.
    pub fn add_tuple(&self, user: &str, relation: &str, object: &str) {
        self.add_tuple_at(user, relation, object, Utc::now());
    }

    /// Add a relationship tuple with an explicit write timestamp.
    pub fn add_tuple_at(&self, user: &str, relation: &str, object: &str, at: DateTime<Utc>) {
        let mut tuples = self.tuples.write().unwrap_or_else(PoisonError::into_inner);
        if !tuples
            .iter()
            .any(|t| t.user == user && t.relation == relation && t.object == object)
        {
            tuples.push(StoredTuple {
                user: user.to_string(),
                relation: relation.to_string(),
                object: object.to_string(),
                timestamp: Some(at),
            });
        }
    }

    /// Remove a relationship tuple.
    pub fn remove_tuple(&self, user: &str, relation: &str, object: &str) {
        self.tuples
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|t| !(t.user == user && t.relation == relation && t.object == object));
    }

    /// Check if a tuple exists (direct lookup only, no transitive evaluation).
    pub fn has_tuple(&self, user: &str, relation: &str, object: &str) -> bool {
        self.snapshot()
            .iter()
            .any(|t| t.user == user && t.relation == relation && t.object == object)
    }

    /// Shared call counters, usable after the mock has been moved into a manager.
    pub fn calls(&self) -> Arc<CallCounts> {
        self.calls.clone()
    }

    /// Shared counter of `close()` calls.
    pub fn close_count(&self) -> Arc<AtomicUsize> {
        self.closed.clone()
    }

    fn snapshot(&self) -> Vec<StoredTuple> {
        self.tuples.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn filtered(&self, filter: Option<&TupleFilter>) -> Vec<StoredTuple> {
        let tuples = self.snapshot();
        let Some(filter) = filter else {
            return tuples;
        };
        let (object_type, object_id) = ident::decode(&filter.object);
        tuples
            .into_iter()
            .filter(|t| {
                let (kind, id) = ident::decode(&t.object);
                kind == object_type
                    && (object_id.is_empty() || id == object_id)
                    && (filter.user.is_empty() || t.user == filter.user)
                    && (filter.relation.is_empty() || t.relation == filter.relation)
            })
            .collect()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FgaBackend for MockBackend {
    fn store_id(&self) -> &str {
        &self.store_id
    }

    fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    fn check(&self, request: CheckRequest) -> BoxFuture<'_, Result<bool, AclError>> {
        self.calls.check.fetch_add(1, Ordering::SeqCst);
        let result = self.has_tuple(&request.user, &request.relation, &request.object);
        Box::pin(async move { Ok(result) })
    }

    fn streamed_list_objects(
        &self,
        request: ListObjectsRequest,
    ) -> BoxFuture<'_, Result<ObjectStream, AclError>> {
        self.calls.list_objects.fetch_add(1, Ordering::SeqCst);
        let objects: Vec<Result<String, AclError>> = self
            .snapshot()
            .into_iter()
            .filter(|t| {
                t.user == request.user
                    && t.relation == request.relation
                    && ident::decode(&t.object).0 == request.object_type
            })
            .map(|t| Ok(t.object))
            .collect();
        Box::pin(async move {
            let stream: ObjectStream = Box::pin(futures_util::stream::iter(objects));
            Ok(stream)
        })
    }

    fn list_users(
        &self,
        request: ListUsersRequest,
    ) -> BoxFuture<'_, Result<Vec<Subject>, AclError>> {
        self.calls.list_users.fetch_add(1, Ordering::SeqCst);
        let object = ident::encode(&request.object_type, &request.object_id);
        let subjects = self
            .snapshot()
            .into_iter()
            .filter(|t| t.object == object && t.relation == request.relation)
            .map(|t| Subject::parse(&t.user))
            .filter(|s| s.kind() == request.subject_type)
            .collect();
        Box::pin(async move { Ok(subjects) })
    }

    fn read(&self, request: ReadRequest) -> BoxFuture<'_, Result<ReadPage, AclError>> {
        self.calls.read.fetch_add(1, Ordering::SeqCst);
        let tuples = self.filtered(request.filter.as_ref());
        let page = paginate(tuples, &request);
        Box::pin(async move { page })
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn paginate(tuples: Vec<StoredTuple>, request: &ReadRequest) -> Result<ReadPage, AclError> {
    let offset = if request.continuation_token.is_empty() {
        0
    } else {
        request
            .continuation_token
            .parse::<usize>()
            .map_err(|_| AclError::BackendRpc {
                code: "InvalidArgument".into(),
                message: "invalid continuation token".into(),
            })?
    };
    let size = request
        .page_size
        .and_then(|s| usize::try_from(s).ok())
        .filter(|s| *s > 0)
        .unwrap_or(MOCK_DEFAULT_PAGE_SIZE);
    let end = offset.saturating_add(size).min(tuples.len());
    let continuation_token = if end < tuples.len() {
        end.to_string()
    } else {
        String::new()
    };
    Ok(ReadPage {
        tuples: tuples.get(offset..end).unwrap_or_default().to_vec(),
        continuation_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_keeps_writing_after_a_panicked_writer() {
        let mock = MockBackend::new();
        mock.add_tuple("user:alice", "viewer", "doc:d1");

        let tuples = Arc::clone(&mock.tuples);
        let panicked = std::thread::spawn(move || {
            let _guard = tuples.write().unwrap();
            panic!("writer panicked");
        })
        .join();
        assert!(panicked.is_err());
        assert!(mock.tuples.is_poisoned());

        mock.add_tuple("user:bob", "viewer", "doc:d1");
        assert!(mock.has_tuple("user:alice", "viewer", "doc:d1"));
        assert!(mock.has_tuple("user:bob", "viewer", "doc:d1"));

        mock.remove_tuple("user:alice", "viewer", "doc:d1");
        assert!(!mock.has_tuple("user:alice", "viewer", "doc:d1"));
    }

    #[test]
    fn test_subject_parse() {
        assert_eq!(
            Subject::parse("user:alice"),
            Subject::Concrete { kind: "user".into(), id: "alice".into() }
        );
        assert_eq!(
            Subject::parse("group:eng#member"),
            Subject::Set {
                kind: "group".into(),
                id: "eng".into(),
                relation: "member".into(),
            }
        );
        assert_eq!(Subject::parse("user:*"), Subject::Wildcard { kind: "user".into() });
    }

    #[tokio::test]
    async fn test_mock_read_paginates_by_offset() {
        let mock = MockBackend::new();
        for i in 0..5 {
            mock.add_tuple("user:alice", "viewer", &format!("doc:{}", i));
        }

        let first = mock
            .read(ReadRequest { page_size: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(first.tuples.len(), 2);
        assert_eq!(first.continuation_token, "2");

        let last = mock
            .read(ReadRequest {
                page_size: Some(10),
                continuation_token: first.continuation_token,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(last.tuples.len(), 3);
        assert!(last.continuation_token.is_empty());
        assert_eq!(mock.calls().read.load(Ordering::SeqCst), 2);
    }
}
