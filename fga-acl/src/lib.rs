//! ACL permission queries over OpenFGA.
//!
//! This crate answers "which (subject, relation, object) facts hold?" against
//! an [OpenFGA](https://openfga.dev/) store, given equality predicates on five
//! columns: `object_type`, `object_id`, `subject_type`, `subject_id` and
//! `relation`. It is meant to sit behind a tabular query host that forwards
//! predicates and a row limit, and expects a stream of rows back.
//!
//! # Overview
//!
//! Which columns are bound decides the backend operation:
//!
//! - everything bound → one `Check`; a single row iff allowed
//! - subject + object type → `StreamedListObjects`
//! - object + subject type → `ListUsers`
//! - anything else → paginated `Read` of the stored tuples
//!
//! A denied check or an empty listing is zero rows, never an error.
//!
//! # Setup
//!
//! ```ignore
//! use fga_acl::{ChannelSink, ConnectionProfile, FgaConfig, PermissionTable, QueryPredicate};
//! use tokio_util::sync::CancellationToken;
//!
//! // One table per process; connections are cached by name.
//! let table = PermissionTable::grpc();
//! let profile = ConnectionProfile::new(
//!     "default",
//!     FgaConfig::new("http://localhost:8081").with_env_fallback(),
//! );
//!
//! let predicate = QueryPredicate::new()
//!     .subject("user", "alice")
//!     .with(fga_acl::Column::ObjectType, "doc")
//!     .relation("viewer");
//!
//! let (mut sink, mut rows) = ChannelSink::new(Some(100));
//! let cancel = CancellationToken::new();
//! tokio::spawn(async move {
//!     while let Some(row) = rows.recv().await {
//!         println!("{:?}", row);
//!     }
//! });
//! table.list(&profile, &predicate, &mut sink, &cancel).await?;
//!
//! table.shutdown();
//! ```
//!
//! # Architecture
//!
//! - **[`PermissionTable`]**: the entry point. Classifies, fetches a connection,
//!   runs the strategy.
//! - **[`Strategy`]**: the closed set of retrieval strategies and the decision
//!   table that picks one.
//! - **[`ConnectionManager`]**: name-keyed connection cache with at most one
//!   live connection per name.
//! - **[`FgaBackend`]**: typed facade over the OpenFGA RPCs.
//!   [`GrpcBackend`] is the production implementation.
//! - **[`FactSink`]**: where rows go, and how many more are wanted.
//!
//! # Testing
//!
//! Use the mock backend:
//!
//! ```
//! use fga_acl::{CollectSink, MockBackend, QueryPredicate, RelationPolicy, Strategy};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test_block_on(async {
//! let mock = MockBackend::new();
//! mock.add_tuple("user:alice", "viewer", "doc:d1");
//!
//! let predicate = QueryPredicate::new()
//!     .subject("user", "alice")
//!     .object("doc", "d1")
//!     .relation("viewer");
//! let strategy = Strategy::classify(&predicate, RelationPolicy::Required).unwrap();
//!
//! let mut sink = CollectSink::new();
//! strategy.execute(&mock, &mut sink, &CancellationToken::new()).await.unwrap();
//! assert_eq!(sink.len(), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod fact;
pub mod grpc;
pub mod ident;
/// Raw OpenFGA wire types and client.
pub mod proto;
pub mod sink;
pub mod strategy;
pub mod table;

// Re-exports
pub use backend::{FgaBackend, MockBackend, Subject};
pub use config::{FgaConfig, RelationPolicy, TlsConfig};
pub use connection::{CachedConnection, ConnectionManager, Connector};
pub use error::AclError;
pub use fact::{Column, PermissionFact, QueryPredicate};
pub use grpc::{GrpcBackend, GrpcConnector};
pub use sink::{ChannelSink, CollectSink, FactSink};
pub use strategy::Strategy;
pub use table::{ConnectionProfile, PermissionTable, TABLE_NAME};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::FgaConfig;
    pub use crate::error::AclError;
    pub use crate::fact::{Column, PermissionFact, QueryPredicate};
    pub use crate::sink::{CollectSink, FactSink};
    pub use crate::table::{ConnectionProfile, PermissionTable};
}
