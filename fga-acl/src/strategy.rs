//! Query-shape classification and the four retrieval strategies.
//!
//! [`Strategy::classify`] is the single decision table mapping bound
//! predicate columns to a backend operation:
//!
//! | bound columns                                 | strategy                      |
//! |-----------------------------------------------|-------------------------------|
//! | object type+id, subject type+id               | [`Strategy::Check`]           |
//! | subject type+id, object type                  | [`Strategy::ListObjects`]     |
//! | object type+id, subject type                  | [`Strategy::ListUsers`]       |
//! | anything else                                 | [`Strategy::ReadTuples`]      |
//!
//! Rows are pushed into a [`FactSink`], whose remaining budget is checked
//! before every backend page and every row. Running out of budget ends the
//! query without error; cancellation ends it with [`AclError::Cancelled`].

use crate::backend::{
    CheckRequest, Consistency, FgaBackend, ListObjectsRequest, ListUsersRequest, ReadRequest,
    StoredTuple, Subject, TupleFilter,
};
use crate::config::RelationPolicy;
use crate::error::AclError;
use crate::fact::{Column, PermissionFact, QueryPredicate};
use crate::ident;
use crate::sink::FactSink;
use chrono::Utc;
use futures_util::StreamExt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Largest page requested from a tuple read. Scans filtered on the client
/// always use it; only exact server-side filters shrink the page to the budget.
pub const MAX_READ_PAGE_SIZE: u64 = 100;

/// Fully bound subject, object and relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPlan {
    pub object_type: String,
    pub object_id: String,
    pub subject_type: String,
    pub subject_id: String,
    pub relation: String,
}

/// Subject and object type bound: objects reachable from the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListObjectsPlan {
    pub object_type: String,
    pub subject_type: String,
    pub subject_id: String,
    pub relation: String,
}

/// Object and subject type bound: subjects reachable to the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersPlan {
    pub object_type: String,
    pub object_id: String,
    pub subject_type: String,
    pub relation: String,
}

/// Cursor-paginated scan of stored tuples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTuplesPlan {
    /// Server-side filter, `None` when no object type is bound.
    pub filter: Option<TupleFilter>,
    /// Applied to every decoded tuple before it is emitted.
    pub predicate: QueryPredicate,
}

impl ReadTuplesPlan {
    /// Whether every tuple the server returns also satisfies the predicate.
    ///
    /// A half-bound subject is not sent to the server, and without a filter
    /// any bound column is checked on the client.
    pub fn is_exact(&self) -> bool {
        match self.filter {
            Some(_) => {
                self.predicate.get(Column::SubjectType).is_some()
                    == self.predicate.get(Column::SubjectId).is_some()
            }
            None => Column::ALL.iter().all(|c| self.predicate.get(*c).is_none()),
        }
    }

    fn page_size(&self, remaining: u64) -> i32 {
        let size = if self.is_exact() {
            remaining.min(MAX_READ_PAGE_SIZE)
        } else {
            MAX_READ_PAGE_SIZE
        };
        size as i32
    }
}

/// The retrieval strategy chosen for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Single check.
    Check(CheckPlan),
    /// Forward expansion through streamed list objects.
    ListObjects(ListObjectsPlan),
    /// Reverse expansion through list users.
    ListUsers(ListUsersPlan),
    /// Raw tuple scan.
    ReadTuples(ReadTuplesPlan),
}

impl Strategy {
    /// Pick the strategy for `predicate`. No backend call is made.
    ///
    /// Fails with [`AclError::MissingPredicate`] when `relation` is unbound
    /// under [`RelationPolicy::Required`], and with
    /// [`AclError::InvalidFilterCombination`] when the bound columns cannot
    /// be expressed as a tuple read.
    pub fn classify(predicate: &QueryPredicate, policy: RelationPolicy) -> Result<Strategy, AclError> {
        let get = |column| predicate.get(column).map(str::to_string);
        let relation = get(Column::Relation);

        if relation.is_none() && policy == RelationPolicy::Required {
            return Err(AclError::MissingPredicate(Column::Relation.as_str()));
        }

        if let Some(relation) = relation.clone() {
            match (
                get(Column::ObjectType),
                get(Column::ObjectId),
                get(Column::SubjectType),
                get(Column::SubjectId),
            ) {
                (Some(object_type), Some(object_id), Some(subject_type), Some(subject_id)) => {
                    return Ok(Strategy::Check(CheckPlan {
                        object_type,
                        object_id,
                        subject_type,
                        subject_id,
                        relation,
                    }));
                }
                (Some(object_type), None, Some(subject_type), Some(subject_id)) => {
                    return Ok(Strategy::ListObjects(ListObjectsPlan {
                        object_type,
                        subject_type,
                        subject_id,
                        relation,
                    }));
                }
                (Some(object_type), Some(object_id), Some(subject_type), None) => {
                    return Ok(Strategy::ListUsers(ListUsersPlan {
                        object_type,
                        object_id,
                        subject_type,
                        relation,
                    }));
                }
                _ => {}
            }
        }

        Ok(Strategy::ReadTuples(ReadTuplesPlan {
            filter: tuple_filter(predicate)?,
            predicate: predicate.clone(),
        }))
    }

    /// Short name of the strategy, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Check(_) => "check",
            Strategy::ListObjects(_) => "list_objects",
            Strategy::ListUsers(_) => "list_users",
            Strategy::ReadTuples(_) => "read_tuples",
        }
    }

    /// Run the strategy against `backend`, pushing rows into `sink`.
    pub async fn execute(
        &self,
        backend: &dyn FgaBackend,
        sink: &mut dyn FactSink,
        cancel: &CancellationToken,
    ) -> Result<(), AclError> {
        if cancel.is_cancelled() {
            return Err(AclError::Cancelled);
        }
        if sink.rows_remaining() == 0 {
            tracing::debug!(strategy = self.name(), "row budget exhausted before start");
            return Ok(());
        }

        match self {
            Strategy::Check(plan) => check(plan, backend, sink, cancel).await,
            Strategy::ListObjects(plan) => list_objects(plan, backend, sink, cancel).await,
            Strategy::ListUsers(plan) => list_users(plan, backend, sink, cancel).await,
            Strategy::ReadTuples(plan) => read_tuples(plan, backend, sink, cancel).await,
        }
    }
}

/// Server-side read filter for the bound columns.
///
/// Without an object type no filter can be sent and the whole store is
/// scanned. An object type without an id needs a fully bound subject.
fn tuple_filter(predicate: &QueryPredicate) -> Result<Option<TupleFilter>, AclError> {
    let object_type = predicate.get(Column::ObjectType);
    let object_id = predicate.get(Column::ObjectId);

    let Some(object_type) = object_type else {
        if object_id.is_some() {
            return Err(AclError::InvalidFilterCombination(
                "object_id requires object_type".into(),
            ));
        }
        return Ok(None);
    };

    let user = match (predicate.get(Column::SubjectType), predicate.get(Column::SubjectId)) {
        (Some(kind), Some(id)) => ident::encode(kind, id),
        _ if object_id.is_none() => {
            return Err(AclError::InvalidFilterCombination(
                "subject_type and subject_id are required when object_type is set without object_id"
                    .into(),
            ));
        }
        _ => String::new(),
    };

    Ok(Some(TupleFilter {
        user,
        relation: predicate.get(Column::Relation).unwrap_or_default().to_string(),
        object: ident::encode(object_type, object_id.unwrap_or_default()),
    }))
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, AclError>>,
) -> Result<T, AclError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AclError::Cancelled),
        result = fut => result,
    }
}

/// Hand `fact` to the sink, waiting for room unless `cancel` fires first.
async fn emit(
    sink: &mut dyn FactSink,
    fact: PermissionFact,
    cancel: &CancellationToken,
) -> Result<(), AclError> {
    cancellable(cancel, async {
        sink.emit(fact).await;
        Ok(())
    })
    .await
}

async fn check(
    plan: &CheckPlan,
    backend: &dyn FgaBackend,
    sink: &mut dyn FactSink,
    cancel: &CancellationToken,
) -> Result<(), AclError> {
    let request = CheckRequest {
        user: ident::encode(&plan.subject_type, &plan.subject_id),
        relation: plan.relation.clone(),
        object: ident::encode(&plan.object_type, &plan.object_id),
        consistency: Consistency::HigherConsistency,
    };
    tracing::debug!(
        user = %request.user,
        relation = %request.relation,
        object = %request.object,
        "checking permission"
    );

    let allowed = cancellable(cancel, backend.check(request)).await?;
    if allowed {
        let fact = PermissionFact::new(
            &plan.object_type,
            &plan.object_id,
            &plan.subject_type,
            &plan.subject_id,
            &plan.relation,
        )
        .with_allowed(true)
        .with_policy_version(backend.model_id())
        .with_evaluated_at(Some(Utc::now()));
        emit(sink, fact, cancel).await?;
    }
    Ok(())
}

async fn list_objects(
    plan: &ListObjectsPlan,
    backend: &dyn FgaBackend,
    sink: &mut dyn FactSink,
    cancel: &CancellationToken,
) -> Result<(), AclError> {
    let request = ListObjectsRequest {
        user: ident::encode(&plan.subject_type, &plan.subject_id),
        relation: plan.relation.clone(),
        object_type: plan.object_type.clone(),
        consistency: Consistency::Unspecified,
    };
    tracing::debug!(
        user = %request.user,
        relation = %request.relation,
        object_type = %request.object_type,
        "listing objects"
    );

    let opened_at = Utc::now();
    let mut objects = cancellable(cancel, backend.streamed_list_objects(request)).await?;
    let mut emitted = 0usize;

    while sink.rows_remaining() > 0 {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AclError::Cancelled),
            next = objects.next() => next,
        };
        let Some(object) = next else {
            break;
        };
        let object = object?;
        let (_, object_id) = ident::decode(&object);

        let fact = PermissionFact::new(
            &plan.object_type,
            object_id,
            &plan.subject_type,
            &plan.subject_id,
            &plan.relation,
        )
        .with_policy_version(backend.model_id())
        .with_evaluated_at(Some(opened_at));
        emit(sink, fact, cancel).await?;
        emitted += 1;
    }

    tracing::debug!(rows = emitted, "list objects finished");
    Ok(())
}

async fn list_users(
    plan: &ListUsersPlan,
    backend: &dyn FgaBackend,
    sink: &mut dyn FactSink,
    cancel: &CancellationToken,
) -> Result<(), AclError> {
    let request = ListUsersRequest {
        object_type: plan.object_type.clone(),
        object_id: plan.object_id.clone(),
        relation: plan.relation.clone(),
        subject_type: plan.subject_type.clone(),
        consistency: Consistency::HigherConsistency,
    };
    tracing::debug!(
        object_type = %request.object_type,
        object_id = %request.object_id,
        relation = %request.relation,
        subject_type = %request.subject_type,
        "listing users"
    );

    let subjects = cancellable(cancel, backend.list_users(request)).await?;
    let evaluated_at = Utc::now();

    // Reject the whole result before emitting anything: a partial answer
    // would read as "no other subjects".
    let concrete = subjects
        .into_iter()
        .map(|subject| match subject {
            Subject::Concrete { kind, id } => Ok((kind, id)),
            Subject::Set { .. } => Err(AclError::UnsupportedSubjectKind("userset".into())),
            Subject::Wildcard { .. } => Err(AclError::UnsupportedSubjectKind("wildcard".into())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (subject_type, subject_id) in concrete {
        if sink.rows_remaining() == 0 {
            break;
        }
        let fact = PermissionFact::new(
            &plan.object_type,
            &plan.object_id,
            subject_type,
            subject_id,
            &plan.relation,
        )
        .with_policy_version(backend.model_id())
        .with_evaluated_at(Some(evaluated_at));
        emit(sink, fact, cancel).await?;
    }
    Ok(())
}

async fn read_tuples(
    plan: &ReadTuplesPlan,
    backend: &dyn FgaBackend,
    sink: &mut dyn FactSink,
    cancel: &CancellationToken,
) -> Result<(), AclError> {
    tracing::debug!(filter = ?plan.filter, exact = plan.is_exact(), "reading tuples");

    let mut continuation_token = String::new();
    let mut pages = 0usize;
    loop {
        let remaining = sink.rows_remaining();
        if remaining == 0 {
            break;
        }

        let request = ReadRequest {
            filter: plan.filter.clone(),
            page_size: Some(plan.page_size(remaining)),
            continuation_token: std::mem::take(&mut continuation_token),
            consistency: Consistency::HigherConsistency,
        };
        let page = cancellable(cancel, backend.read(request)).await?;
        pages += 1;
        tracing::trace!(page = pages, tuples = page.tuples.len(), "read page");

        for tuple in page.tuples {
            if cancel.is_cancelled() {
                return Err(AclError::Cancelled);
            }
            if sink.rows_remaining() == 0 {
                return Ok(());
            }
            let fact = tuple_fact(tuple);
            if plan.predicate.matches(&fact) {
                emit(sink, fact, cancel).await?;
            }
        }

        if page.continuation_token.is_empty() {
            break;
        }
        continuation_token = page.continuation_token;
    }
    Ok(())
}

/// A stored tuple as a fact, stamped with the tuple's own write time.
fn tuple_fact(tuple: StoredTuple) -> PermissionFact {
    let (object_type, object_id) = ident::decode(&tuple.object);
    let (subject_type, subject_id) = ident::decode(&tuple.user);
    PermissionFact::new(object_type, object_id, subject_type, subject_id, &tuple.relation)
        .with_evaluated_at(tuple.timestamp)
}
