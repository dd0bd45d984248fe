//! The `sys_acl_permission` table: schema and query entry point.

use crate::config::FgaConfig;
use crate::connection::ConnectionManager;
use crate::error::AclError;
use crate::fact::QueryPredicate;
use crate::grpc::GrpcConnector;
use crate::sink::FactSink;
use crate::strategy::Strategy;
use tokio_util::sync::CancellationToken;

/// Name of the permission table exposed to the host.
pub const TABLE_NAME: &str = "sys_acl_permission";

/// Column value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Bool,
    Timestamp,
}

/// Description of one output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnType,
    pub description: &'static str,
    /// Whether the column accepts an equality predicate.
    pub key: bool,
}

/// Output columns, in row order.
pub const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "object_type",
        kind: ColumnType::String,
        description: "Logical type of the protected object",
        key: true,
    },
    ColumnSpec {
        name: "object_id",
        kind: ColumnType::String,
        description: "Application-level identifier of the object",
        key: true,
    },
    ColumnSpec {
        name: "subject_type",
        kind: ColumnType::String,
        description: "Type of the subject (e.g. 'user', 'group', 'service')",
        key: true,
    },
    ColumnSpec {
        name: "subject_id",
        kind: ColumnType::String,
        description: "Identifier of the subject (user ID, group ID etc)",
        key: true,
    },
    ColumnSpec {
        name: "relation",
        kind: ColumnType::String,
        description: "Relation to check (e.g. 'reader', 'writer')",
        key: true,
    },
    ColumnSpec {
        name: "allowed",
        kind: ColumnType::Bool,
        description: "Result of a single check; only set when every key column is bound",
        key: false,
    },
    ColumnSpec {
        name: "policy_version",
        kind: ColumnType::String,
        description: "Authorization model used to evaluate this permission",
        key: false,
    },
    ColumnSpec {
        name: "evaluated_at",
        kind: ColumnType::Timestamp,
        description: "When the permission was evaluated, or when the tuple was written",
        key: false,
    },
];

/// A named connection as supplied by the host.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub name: String,
    pub config: FgaConfig,
}

impl ConnectionProfile {
    pub fn new(name: impl Into<String>, config: FgaConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// Query entry point of the permission table.
///
/// Clonable and safe to share between concurrent queries: the only shared
/// state is the connection cache.
///
/// # Example
///
/// ```ignore
/// use fga_acl::{CollectSink, ConnectionProfile, FgaConfig, PermissionTable, QueryPredicate};
/// use tokio_util::sync::CancellationToken;
///
/// let table = PermissionTable::grpc();
/// let profile = ConnectionProfile::new("default", FgaConfig::default().with_env_fallback());
/// let predicate = QueryPredicate::new()
///     .subject("user", "alice")
///     .object("doc", "d1")
///     .relation("viewer");
///
/// let mut sink = CollectSink::with_limit(10);
/// table.list(&profile, &predicate, &mut sink, &CancellationToken::new()).await?;
/// ```
#[derive(Clone)]
pub struct PermissionTable {
    connections: ConnectionManager,
}

impl PermissionTable {
    /// A table resolving connections through `connections`.
    pub fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    /// A table backed by gRPC connections.
    pub fn grpc() -> Self {
        Self::new(ConnectionManager::new(GrpcConnector))
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Stream the facts matching `predicate` into `sink`.
    ///
    /// The predicate is classified before any connection is opened, so
    /// classification errors never reach the backend.
    pub async fn list(
        &self,
        profile: &ConnectionProfile,
        predicate: &QueryPredicate,
        sink: &mut dyn FactSink,
        cancel: &CancellationToken,
    ) -> Result<(), AclError> {
        tracing::debug!(connection = %profile.name, ?predicate, "list permissions");

        let strategy = Strategy::classify(predicate, profile.config.relation_policy)?;
        tracing::debug!(strategy = strategy.name(), "query classified");

        if cancel.is_cancelled() {
            return Err(AclError::Cancelled);
        }
        if sink.rows_remaining() == 0 {
            tracing::debug!(strategy = strategy.name(), "row budget exhausted before connecting");
            return Ok(());
        }

        let connection = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AclError::Cancelled),
            connection = self.connections.get(&profile.name, &profile.config) => connection?,
        };

        strategy.execute(connection.backend(), sink, cancel).await
    }

    /// Close every cached connection.
    pub fn shutdown(&self) {
        self.connections.shutdown();
    }
}
