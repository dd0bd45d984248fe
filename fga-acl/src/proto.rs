//! Wire types and client for the `openfga.v1.OpenFGAService` RPCs this crate calls.
//!
//! Laid out the way `tonic-build` emits a package, restricted to the messages
//! and fields that are sent or read. Fields not listed here are skipped on
//! decode and never sent. Tags follow `openfga/v1/openfga_service.proto` and
//! `openfga/v1/openfga.proto`.

use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

const SERVICE: &str = "openfga.v1.OpenFGAService";

// ── Shared types ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ConsistencyPreference {
    Unspecified = 0,
    MinimizeLatency = 100,
    HigherConsistency = 200,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TupleKey {
    #[prost(string, tag = "1")]
    pub user: String,
    #[prost(string, tag = "2")]
    pub relation: String,
    #[prost(string, tag = "3")]
    pub object: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tuple {
    #[prost(message, optional, tag = "1")]
    pub key: Option<TupleKey>,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Object {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(string, tag = "2")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UsersetUser {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "3")]
    pub relation: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypedWildcard {
    #[prost(string, tag = "1")]
    pub r#type: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct User {
    #[prost(oneof = "user::User", tags = "1, 2, 3")]
    pub user: Option<user::User>,
}

/// Nested message and enum types in `User`.
pub mod user {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum User {
        #[prost(message, tag = "1")]
        Object(super::Object),
        #[prost(message, tag = "2")]
        Userset(super::UsersetUser),
        #[prost(message, tag = "3")]
        Wildcard(super::TypedWildcard),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserTypeFilter {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(string, tag = "2")]
    pub relation: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Store {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, optional, tag = "3")]
    pub created_at: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub updated_at: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "5")]
    pub deleted_at: Option<::prost_types::Timestamp>,
}

/// Only the id is read; type definitions are skipped.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthorizationModel {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub schema_version: String,
}

// ── Check ──────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckRequestTupleKey {
    #[prost(string, tag = "1")]
    pub user: String,
    #[prost(string, tag = "2")]
    pub relation: String,
    #[prost(string, tag = "3")]
    pub object: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckRequest {
    #[prost(string, tag = "1")]
    pub store_id: String,
    #[prost(message, optional, tag = "2")]
    pub tuple_key: Option<CheckRequestTupleKey>,
    #[prost(string, tag = "4")]
    pub authorization_model_id: String,
    #[prost(enumeration = "ConsistencyPreference", tag = "7")]
    pub consistency: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckResponse {
    #[prost(bool, tag = "1")]
    pub allowed: bool,
}

// ── StreamedListObjects ────────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamedListObjectsRequest {
    #[prost(string, tag = "1")]
    pub store_id: String,
    #[prost(string, tag = "2")]
    pub authorization_model_id: String,
    #[prost(string, tag = "3")]
    pub r#type: String,
    #[prost(string, tag = "4")]
    pub relation: String,
    #[prost(string, tag = "5")]
    pub user: String,
    #[prost(enumeration = "ConsistencyPreference", tag = "8")]
    pub consistency: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamedListObjectsResponse {
    #[prost(string, tag = "1")]
    pub object: String,
}

// ── ListUsers ──────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListUsersRequest {
    #[prost(string, tag = "1")]
    pub store_id: String,
    #[prost(string, tag = "2")]
    pub authorization_model_id: String,
    #[prost(message, optional, tag = "3")]
    pub object: Option<Object>,
    #[prost(string, tag = "4")]
    pub relation: String,
    #[prost(message, repeated, tag = "5")]
    pub user_filters: Vec<UserTypeFilter>,
    #[prost(enumeration = "ConsistencyPreference", tag = "8")]
    pub consistency: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListUsersResponse {
    #[prost(message, repeated, tag = "1")]
    pub users: Vec<User>,
}

// ── Read ───────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequestTupleKey {
    #[prost(string, tag = "1")]
    pub user: String,
    #[prost(string, tag = "2")]
    pub relation: String,
    #[prost(string, tag = "3")]
    pub object: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub store_id: String,
    #[prost(message, optional, tag = "2")]
    pub tuple_key: Option<ReadRequestTupleKey>,
    /// `google.protobuf.Int32Value`
    #[prost(message, optional, tag = "3")]
    pub page_size: Option<i32>,
    #[prost(string, tag = "4")]
    pub continuation_token: String,
    #[prost(enumeration = "ConsistencyPreference", tag = "5")]
    pub consistency: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResponse {
    #[prost(message, repeated, tag = "1")]
    pub tuples: Vec<Tuple>,
    #[prost(string, tag = "2")]
    pub continuation_token: String,
}

// ── Stores and models ──────────────────────────────────────────────────

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetStoreRequest {
    #[prost(string, tag = "1")]
    pub store_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetStoreResponse {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, optional, tag = "3")]
    pub created_at: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub updated_at: Option<::prost_types::Timestamp>,
    #[prost(message, optional, tag = "5")]
    pub deleted_at: Option<::prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStoresRequest {
    /// `google.protobuf.Int32Value`
    #[prost(message, optional, tag = "1")]
    pub page_size: Option<i32>,
    #[prost(string, tag = "2")]
    pub continuation_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStoresResponse {
    #[prost(message, repeated, tag = "1")]
    pub stores: Vec<Store>,
    #[prost(string, tag = "2")]
    pub continuation_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadAuthorizationModelRequest {
    #[prost(string, tag = "1")]
    pub store_id: String,
    #[prost(string, tag = "2")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadAuthorizationModelResponse {
    #[prost(message, optional, tag = "1")]
    pub authorization_model: Option<AuthorizationModel>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadAuthorizationModelsRequest {
    #[prost(string, tag = "1")]
    pub store_id: String,
    /// `google.protobuf.Int32Value`
    #[prost(message, optional, tag = "2")]
    pub page_size: Option<i32>,
    #[prost(string, tag = "3")]
    pub continuation_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadAuthorizationModelsResponse {
    #[prost(message, repeated, tag = "1")]
    pub authorization_models: Vec<AuthorizationModel>,
    #[prost(string, tag = "2")]
    pub continuation_token: String,
}

// ── Client ─────────────────────────────────────────────────────────────

/// Client for the OpenFGA service over a tonic [`Channel`].
///
/// Cheap to clone: clones share the underlying HTTP/2 connection.
#[derive(Debug, Clone)]
pub struct OpenFgaServiceClient {
    inner: tonic::client::Grpc<Channel>,
}

impl OpenFgaServiceClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Limits the maximum size of a decoded message.
    pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
        self.inner = self.inner.max_decoding_message_size(limit);
        self
    }

    pub async fn check(
        &mut self,
        request: tonic::Request<CheckRequest>,
    ) -> Result<tonic::Response<CheckResponse>, tonic::Status> {
        self.unary(request, "Check", "/openfga.v1.OpenFGAService/Check").await
    }

    pub async fn streamed_list_objects(
        &mut self,
        request: tonic::Request<StreamedListObjectsRequest>,
    ) -> Result<tonic::Response<tonic::Streaming<StreamedListObjectsResponse>>, tonic::Status> {
        let (path, request) = self
            .prepare(
                request,
                "StreamedListObjects",
                "/openfga.v1.OpenFGAService/StreamedListObjects",
            )
            .await?;
        let codec = tonic::codec::ProstCodec::default();
        self.inner.server_streaming(request, path, codec).await
    }

    pub async fn list_users(
        &mut self,
        request: tonic::Request<ListUsersRequest>,
    ) -> Result<tonic::Response<ListUsersResponse>, tonic::Status> {
        self.unary(request, "ListUsers", "/openfga.v1.OpenFGAService/ListUsers").await
    }

    pub async fn read(
        &mut self,
        request: tonic::Request<ReadRequest>,
    ) -> Result<tonic::Response<ReadResponse>, tonic::Status> {
        self.unary(request, "Read", "/openfga.v1.OpenFGAService/Read").await
    }

    pub async fn get_store(
        &mut self,
        request: tonic::Request<GetStoreRequest>,
    ) -> Result<tonic::Response<GetStoreResponse>, tonic::Status> {
        self.unary(request, "GetStore", "/openfga.v1.OpenFGAService/GetStore").await
    }

    pub async fn list_stores(
        &mut self,
        request: tonic::Request<ListStoresRequest>,
    ) -> Result<tonic::Response<ListStoresResponse>, tonic::Status> {
        self.unary(request, "ListStores", "/openfga.v1.OpenFGAService/ListStores").await
    }

    pub async fn read_authorization_model(
        &mut self,
        request: tonic::Request<ReadAuthorizationModelRequest>,
    ) -> Result<tonic::Response<ReadAuthorizationModelResponse>, tonic::Status> {
        self.unary(
            request,
            "ReadAuthorizationModel",
            "/openfga.v1.OpenFGAService/ReadAuthorizationModel",
        )
        .await
    }

    pub async fn read_authorization_models(
        &mut self,
        request: tonic::Request<ReadAuthorizationModelsRequest>,
    ) -> Result<tonic::Response<ReadAuthorizationModelsResponse>, tonic::Status> {
        self.unary(
            request,
            "ReadAuthorizationModels",
            "/openfga.v1.OpenFGAService/ReadAuthorizationModels",
        )
        .await
    }

    /// Wait for the channel, then tag the request with its method.
    async fn prepare<M>(
        &mut self,
        mut request: tonic::Request<M>,
        method: &'static str,
        path: &'static str,
    ) -> Result<(PathAndQuery, tonic::Request<M>), tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e)))?;
        request
            .extensions_mut()
            .insert(tonic::GrpcMethod::new(SERVICE, method));
        Ok((PathAndQuery::from_static(path), request))
    }

    async fn unary<M1, M2>(
        &mut self,
        request: tonic::Request<M1>,
        method: &'static str,
        path: &'static str,
    ) -> Result<tonic::Response<M2>, tonic::Status>
    where
        M1: ::prost::Message + Send + Sync + 'static,
        M2: ::prost::Message + Default + Send + Sync + 'static,
    {
        let (path, request) = self.prepare(request, method, path).await?;
        let codec = tonic::codec::ProstCodec::default();
        self.inner.unary(request, path, codec).await
    }
}
