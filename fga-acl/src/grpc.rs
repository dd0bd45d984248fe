//! Production gRPC backend over the [`proto`](crate::proto) client.

use crate::backend::{
    BoxFuture, CheckRequest, Consistency, FgaBackend, ListObjectsRequest, ListUsersRequest,
    ObjectStream, ReadPage, ReadRequest, StoredTuple, Subject,
};
use crate::config::FgaConfig;
use crate::connection::Connector;
use crate::error::AclError;
use crate::proto::{self, ConsistencyPreference, OpenFgaServiceClient};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

/// Page size used while listing stores.
const STORE_PAGE_SIZE: i32 = 100;

/// Maximum size of a decoded response message.
const MAX_DECODING_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(60);
const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(10);

/// gRPC backend bound to one resolved store.
///
/// The model id is only pinned when configured. Otherwise requests leave
/// `authorization_model_id` empty and the server evaluates against its
/// latest model.
///
/// The tonic client is cheap to clone (shares the underlying HTTP/2 channel),
/// and the channel dials lazily: nothing is sent until the first RPC.
///
/// # Example
///
/// ```ignore
/// use fga_acl::{FgaConfig, GrpcBackend};
///
/// let config = FgaConfig::new("http://localhost:8081").with_env_fallback();
/// let backend = GrpcBackend::connect(&config).await?;
/// println!("store {} model {:?}", backend.store_id(), backend.model_id());
/// ```
#[derive(Clone)]
pub struct GrpcBackend {
    client: OpenFgaServiceClient,
    store_id: String,
    model_id: Option<String>,
    api_token: Option<String>,
}

impl GrpcBackend {
    /// Build a channel, then resolve the store and validate the model.
    ///
    /// Fails with [`AclError::NoActiveStore`], [`AclError::StoreNotFound`],
    /// [`AclError::StoreDeleted`] or [`AclError::ModelNotFound`] when the
    /// target partition cannot be used.
    pub async fn connect(config: &FgaConfig) -> Result<Self, AclError> {
        let mut backend = Self::new(
            build_channel(config)?,
            String::new(),
            config.model_id().map(str::to_string),
            config.api_token.as_deref(),
        );

        backend.store_id = backend.resolve_store(config.store_id()).await?;
        tracing::info!(store_id = %backend.store_id, "using OpenFGA store");

        backend.validate_model().await?;
        tracing::info!(
            store_id = %backend.store_id,
            model_id = backend.model_id.as_deref().unwrap_or("latest"),
            "using OpenFGA authorization model"
        );

        Ok(backend)
    }

    fn new(
        channel: Channel,
        store_id: String,
        model_id: Option<String>,
        api_token: Option<&str>,
    ) -> Self {
        Self {
            client: OpenFgaServiceClient::new(channel)
                .max_decoding_message_size(MAX_DECODING_MESSAGE_SIZE),
            store_id,
            model_id,
            api_token: api_token.map(str::to_string).filter(|t| !t.trim().is_empty()),
        }
    }

    /// Returns a reference to the raw gRPC client.
    ///
    /// Clone it before calling methods (tonic clients are cheap to clone).
    pub fn client(&self) -> &OpenFgaServiceClient {
        &self.client
    }

    fn make_request<T>(&self, msg: T) -> Result<tonic::Request<T>, AclError> {
        authorized(msg, self.api_token.as_deref())
    }

    fn model_field(&self) -> String {
        self.model_id.clone().unwrap_or_default()
    }

    async fn resolve_store(&self, configured: Option<&str>) -> Result<String, AclError> {
        let Some(store_id) = configured else {
            tracing::debug!("no store configured, looking up the latest active store");
            return latest_active_store(self.list_stores().await?);
        };

        let request = self.make_request(proto::GetStoreRequest {
            store_id: store_id.to_string(),
        })?;
        let store = self
            .client
            .clone()
            .get_store(request)
            .await
            .map_err(|status| lookup_error(status, AclError::StoreNotFound(store_id.to_string())))?
            .into_inner();
        active_store(store)
    }

    async fn list_stores(&self) -> Result<Vec<proto::Store>, AclError> {
        let mut stores = Vec::new();
        let mut continuation_token = String::new();
        loop {
            let request = self.make_request(proto::ListStoresRequest {
                page_size: Some(STORE_PAGE_SIZE),
                continuation_token: continuation_token.clone(),
            })?;
            let page = self.client.clone().list_stores(request).await?.into_inner();
            stores.extend(page.stores);
            if page.continuation_token.is_empty() {
                return Ok(stores);
            }
            continuation_token = page.continuation_token;
        }
    }

    /// A configured model must exist; otherwise the store must have at least one.
    async fn validate_model(&self) -> Result<(), AclError> {
        if let Some(model_id) = &self.model_id {
            let request = self.make_request(proto::ReadAuthorizationModelRequest {
                store_id: self.store_id.clone(),
                id: model_id.clone(),
            })?;
            self.client
                .clone()
                .read_authorization_model(request)
                .await
                .map_err(|status| lookup_error(status, AclError::ModelNotFound(model_id.clone())))?;
            return Ok(());
        }

        let request = self.make_request(proto::ReadAuthorizationModelsRequest {
            store_id: self.store_id.clone(),
            page_size: Some(1),
            continuation_token: String::new(),
        })?;
        let models = self
            .client
            .clone()
            .read_authorization_models(request)
            .await?
            .into_inner()
            .authorization_models;
        require_model(&models, &self.store_id)
    }

    fn check_message(&self, request: CheckRequest) -> proto::CheckRequest {
        proto::CheckRequest {
            store_id: self.store_id.clone(),
            authorization_model_id: self.model_field(),
            tuple_key: Some(proto::CheckRequestTupleKey {
                user: request.user,
                relation: request.relation,
                object: request.object,
            }),
            consistency: consistency(request.consistency),
        }
    }

    fn list_objects_message(&self, request: ListObjectsRequest) -> proto::StreamedListObjectsRequest {
        proto::StreamedListObjectsRequest {
            store_id: self.store_id.clone(),
            authorization_model_id: self.model_field(),
            r#type: request.object_type,
            relation: request.relation,
            user: request.user,
            consistency: consistency(request.consistency),
        }
    }

    fn list_users_message(&self, request: ListUsersRequest) -> proto::ListUsersRequest {
        proto::ListUsersRequest {
            store_id: self.store_id.clone(),
            authorization_model_id: self.model_field(),
            object: Some(proto::Object {
                r#type: request.object_type,
                id: request.object_id,
            }),
            relation: request.relation,
            user_filters: vec![proto::UserTypeFilter {
                r#type: request.subject_type,
                relation: String::new(),
            }],
            consistency: consistency(request.consistency),
        }
    }
}

/// Ask the server's `grpc.health.v1.Health` service for its overall status.
///
/// Returns the status name, e.g. `SERVING` or `NOT_SERVING`.
pub async fn check_health(config: &FgaConfig) -> Result<String, AclError> {
    let request = authorized(
        HealthCheckRequest { service: String::new() },
        config.api_token.as_deref().filter(|t| !t.trim().is_empty()),
    )?;
    let response = HealthClient::new(build_channel(config)?)
        .check(request)
        .await?
        .into_inner();
    Ok(serving_status_name(response.status))
}

fn serving_status_name(status: i32) -> String {
    ServingStatus::try_from(status)
        .unwrap_or(ServingStatus::Unknown)
        .as_str_name()
        .to_string()
}

/// Build a `tonic::Request`, injecting the Bearer token if one is given.
fn authorized<T>(msg: T, api_token: Option<&str>) -> Result<tonic::Request<T>, AclError> {
    let mut request = tonic::Request::new(msg);
    if let Some(token) = api_token {
        request.metadata_mut().insert(
            "authorization",
            format!("Bearer {}", token)
                .parse()
                .map_err(|e: tonic::metadata::errors::InvalidMetadataValue| {
                    AclError::Configuration(format!("invalid api_token for header: {}", e))
                })?,
        );
    }
    Ok(request)
}

fn is_set(ts: Option<&prost_types::Timestamp>) -> bool {
    ts.is_some_and(|ts| ts.seconds > 0 || ts.nanos > 0)
}

fn is_deleted(store: &proto::Store) -> bool {
    is_set(store.deleted_at.as_ref())
}

fn active_store(store: proto::GetStoreResponse) -> Result<String, AclError> {
    if is_set(store.deleted_at.as_ref()) {
        return Err(AclError::StoreDeleted { id: store.id, name: store.name });
    }
    Ok(store.id)
}

/// The most recently created store that is not soft-deleted.
fn latest_active_store(stores: Vec<proto::Store>) -> Result<String, AclError> {
    // max_by_key keeps the last of equal keys, so ties go to the later store.
    stores
        .into_iter()
        .filter(|s| !is_deleted(s))
        .max_by_key(|s| s.created_at.as_ref().map(|ts| (ts.seconds, ts.nanos)))
        .map(|s| s.id)
        .ok_or(AclError::NoActiveStore)
}

fn require_model(models: &[proto::AuthorizationModel], store_id: &str) -> Result<(), AclError> {
    if models.is_empty() {
        return Err(AclError::ModelNotFound(format!("no models in store {}", store_id)));
    }
    Ok(())
}

/// Lookups answer NotFound, or InvalidArgument for malformed ids.
fn lookup_error(status: tonic::Status, missing: AclError) -> AclError {
    match status.code() {
        tonic::Code::NotFound | tonic::Code::InvalidArgument => missing,
        _ => AclError::from(status),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TrustRoots {
    CaFile(PathBuf),
    WebPki,
}

fn trust_roots(config: &FgaConfig) -> TrustRoots {
    match &config.tls.ca_cert_path {
        Some(path) => TrustRoots::CaFile(path.clone()),
        None => TrustRoots::WebPki,
    }
}

fn build_channel(config: &FgaConfig) -> Result<Channel, AclError> {
    let uri = config.endpoint_uri()?;
    let mut endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|e| AclError::Configuration(format!("invalid endpoint {:?}: {}", uri, e)))?
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .http2_keep_alive_interval(KEEP_ALIVE_INTERVAL)
        .keep_alive_timeout(KEEP_ALIVE_TIMEOUT)
        .keep_alive_while_idle(true);

    if config.tls_enabled() {
        let mut tls = match trust_roots(config) {
            TrustRoots::CaFile(path) => {
                let pem = std::fs::read(&path).map_err(|e| {
                    AclError::Configuration(format!("cannot read CA certificate {:?}: {}", path, e))
                })?;
                ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem))
            }
            TrustRoots::WebPki => ClientTlsConfig::new().with_webpki_roots(),
        };
        if let Some(domain) = &config.tls.domain_name {
            tls = tls.domain_name(domain.clone());
        }
        endpoint = endpoint
            .tls_config(tls)
            .map_err(|e| AclError::Configuration(format!("invalid TLS settings: {}", e)))?;
    }

    Ok(endpoint.connect_lazy())
}

fn consistency(value: Consistency) -> i32 {
    match value {
        Consistency::Unspecified => ConsistencyPreference::Unspecified as i32,
        Consistency::MinimizeLatency => ConsistencyPreference::MinimizeLatency as i32,
        Consistency::HigherConsistency => ConsistencyPreference::HigherConsistency as i32,
    }
}

fn subject_from(user: proto::User) -> Option<Subject> {
    use proto::user::User;

    Some(match user.user? {
        User::Object(o) => Subject::Concrete { kind: o.r#type, id: o.id },
        User::Userset(s) => Subject::Set {
            kind: s.r#type,
            id: s.id,
            relation: s.relation,
        },
        User::Wildcard(w) => Subject::Wildcard { kind: w.r#type },
    })
}

fn to_utc(seconds: i64, nanos: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, u32::try_from(nanos).unwrap_or(0))
}

fn stored_tuple(tuple: proto::Tuple) -> Option<StoredTuple> {
    let timestamp = tuple.timestamp.as_ref().and_then(|ts| to_utc(ts.seconds, ts.nanos));
    tuple.key.map(|key| StoredTuple {
        user: key.user,
        relation: key.relation,
        object: key.object,
        timestamp,
    })
}

impl FgaBackend for GrpcBackend {
    fn store_id(&self) -> &str {
        &self.store_id
    }

    fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    fn check(&self, request: CheckRequest) -> BoxFuture<'_, Result<bool, AclError>> {
        let req = self.check_message(request);

        Box::pin(async move {
            let request = self.make_request(req)?;
            let resp = self.client.clone().check(request).await?;
            Ok(resp.into_inner().allowed)
        })
    }

    fn streamed_list_objects(
        &self,
        request: ListObjectsRequest,
    ) -> BoxFuture<'_, Result<ObjectStream, AclError>> {
        let req = self.list_objects_message(request);

        Box::pin(async move {
            let request = self.make_request(req)?;
            let stream = self
                .client
                .clone()
                .streamed_list_objects(request)
                .await?
                .into_inner();
            let objects: ObjectStream = Box::pin(
                stream.map(|item| item.map(|chunk| chunk.object).map_err(AclError::from)),
            );
            Ok(objects)
        })
    }

    fn list_users(
        &self,
        request: ListUsersRequest,
    ) -> BoxFuture<'_, Result<Vec<Subject>, AclError>> {
        let req = self.list_users_message(request);

        Box::pin(async move {
            let request = self.make_request(req)?;
            let users = self.client.clone().list_users(request).await?.into_inner().users;
            Ok(users.into_iter().filter_map(subject_from).collect())
        })
    }

    fn read(&self, request: ReadRequest) -> BoxFuture<'_, Result<ReadPage, AclError>> {
        let req = proto::ReadRequest {
            store_id: self.store_id.clone(),
            tuple_key: request.filter.map(|f| proto::ReadRequestTupleKey {
                user: f.user,
                relation: f.relation,
                object: f.object,
            }),
            page_size: request.page_size,
            continuation_token: request.continuation_token,
            consistency: consistency(request.consistency),
        };

        Box::pin(async move {
            let request = self.make_request(req)?;
            let resp = self.client.clone().read(request).await?.into_inner();
            Ok(ReadPage {
                tuples: resp.tuples.into_iter().filter_map(stored_tuple).collect(),
                continuation_token: resp.continuation_token,
            })
        })
    }

    fn close(&self) {
        // The channel worker shuts down once the last clone of the client drops.
        tracing::debug!(store_id = %self.store_id, "closing OpenFGA connection");
    }
}

/// [`Connector`] that builds a [`GrpcBackend`] per connection name.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcConnector;

impl Connector for GrpcConnector {
    fn connect<'a>(
        &'a self,
        name: &'a str,
        config: &'a FgaConfig,
    ) -> BoxFuture<'a, Result<Arc<dyn FgaBackend>, AclError>> {
        Box::pin(async move {
            tracing::debug!(connection = name, "connecting to OpenFGA");
            let backend = GrpcBackend::connect(config).await?;
            Ok(Arc::new(backend) as Arc<dyn FgaBackend>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::Timestamp;

    fn ts(seconds: i64) -> Option<Timestamp> {
        Some(Timestamp { seconds, nanos: 0 })
    }

    fn store(id: &str, created: i64, deleted: Option<i64>) -> proto::Store {
        proto::Store {
            id: id.into(),
            name: format!("{}-name", id),
            created_at: ts(created),
            updated_at: ts(created),
            deleted_at: deleted.and_then(ts),
        }
    }

    fn backend(model_id: Option<&str>) -> GrpcBackend {
        let channel = build_channel(&FgaConfig::new("http://localhost:8081")).unwrap();
        GrpcBackend::new(channel, "01HSTORE".into(), model_id.map(str::to_string), Some("  "))
    }

    #[test]
    fn test_to_utc() {
        let at = to_utc(1_700_000_000, 500).unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_nanos(), 500);
        assert_eq!(to_utc(0, -1).unwrap().timestamp(), 0);
    }

    #[test]
    fn test_build_channel_rejects_missing_endpoint() {
        assert!(matches!(
            build_channel(&FgaConfig::default()),
            Err(AclError::Configuration(_))
        ));
    }

    #[test]
    fn test_latest_active_store_skips_deleted() {
        let stores = vec![
            store("old", 100, None),
            store("newest-deleted", 300, Some(400)),
            store("new", 200, None),
        ];
        assert_eq!(latest_active_store(stores).unwrap(), "new");
    }

    #[test]
    fn test_latest_active_store_tie_goes_to_later() {
        let stores = vec![store("first", 100, None), store("second", 100, None)];
        assert_eq!(latest_active_store(stores).unwrap(), "second");
    }

    #[test]
    fn test_no_active_store() {
        assert_eq!(latest_active_store(Vec::new()), Err(AclError::NoActiveStore));
        assert_eq!(
            latest_active_store(vec![store("gone", 100, Some(200))]),
            Err(AclError::NoActiveStore)
        );
    }

    #[test]
    fn test_deleted_store_is_rejected() {
        let deleted = proto::GetStoreResponse {
            id: "01HSTORE".into(),
            name: "acme".into(),
            deleted_at: ts(1_700_000_000),
            ..Default::default()
        };
        assert_eq!(
            active_store(deleted),
            Err(AclError::StoreDeleted { id: "01HSTORE".into(), name: "acme".into() })
        );

        let live = proto::GetStoreResponse {
            id: "01HSTORE".into(),
            deleted_at: Some(Timestamp::default()),
            ..Default::default()
        };
        assert_eq!(active_store(live).unwrap(), "01HSTORE");
    }

    #[test]
    fn test_require_model() {
        assert_eq!(
            require_model(&[], "01HSTORE"),
            Err(AclError::ModelNotFound("no models in store 01HSTORE".into()))
        );
        let models = [proto::AuthorizationModel {
            id: "01HMODEL".into(),
            schema_version: "1.1".into(),
        }];
        assert!(require_model(&models, "01HSTORE").is_ok());
    }

    #[test]
    fn test_lookup_error_mapping() {
        let missing = || AclError::ModelNotFound("m".into());
        assert_eq!(lookup_error(tonic::Status::not_found("x"), missing()), missing());
        assert_eq!(lookup_error(tonic::Status::invalid_argument("x"), missing()), missing());
        assert_eq!(
            lookup_error(tonic::Status::unavailable("down"), missing()),
            AclError::BackendUnavailable("down".into())
        );
    }

    #[test]
    fn test_trust_roots_fall_back_to_webpki() {
        let config = FgaConfig::new("https://fga.example.com");
        assert_eq!(trust_roots(&config), TrustRoots::WebPki);

        let config = config.with_ca_cert("/etc/ssl/fga-ca.pem");
        assert_eq!(trust_roots(&config), TrustRoots::CaFile("/etc/ssl/fga-ca.pem".into()));
    }

    #[tokio::test]
    async fn test_build_channel_with_default_roots() {
        assert!(build_channel(&FgaConfig::new("https://fga.example.com")).is_ok());
    }

    #[test]
    fn test_consistency_mapping() {
        assert_eq!(consistency(Consistency::Unspecified), 0);
        assert_eq!(consistency(Consistency::MinimizeLatency), 100);
        assert_eq!(consistency(Consistency::HigherConsistency), 200);
    }

    #[test]
    fn test_subject_from_user() {
        let user = |u| proto::User { user: Some(u) };
        assert_eq!(
            subject_from(user(proto::user::User::Object(proto::Object {
                r#type: "user".into(),
                id: "alice".into(),
            }))),
            Some(Subject::Concrete { kind: "user".into(), id: "alice".into() })
        );
        assert_eq!(
            subject_from(user(proto::user::User::Userset(proto::UsersetUser {
                r#type: "group".into(),
                id: "eng".into(),
                relation: "member".into(),
            }))),
            Some(Subject::Set {
                kind: "group".into(),
                id: "eng".into(),
                relation: "member".into(),
            })
        );
        assert_eq!(
            subject_from(user(proto::user::User::Wildcard(proto::TypedWildcard {
                r#type: "user".into(),
            }))),
            Some(Subject::Wildcard { kind: "user".into() })
        );
        assert_eq!(subject_from(proto::User { user: None }), None);
    }

    #[test]
    fn test_serving_status_name() {
        assert_eq!(serving_status_name(1), "SERVING");
        assert_eq!(serving_status_name(2), "NOT_SERVING");
        assert_eq!(serving_status_name(99), "UNKNOWN");
    }

    #[tokio::test]
    async fn test_unconfigured_model_is_not_pinned() {
        let backend = backend(None);
        assert_eq!(backend.model_id(), None);
        assert!(backend.api_token.is_none());

        let request = CheckRequest {
            user: "user:alice".into(),
            relation: "viewer".into(),
            object: "doc:d1".into(),
            consistency: Consistency::HigherConsistency,
        };
        let message = backend.check_message(request);
        assert_eq!(message.authorization_model_id, "");
        assert_eq!(message.store_id, "01HSTORE");
        assert_eq!(message.consistency, 200);

        let message = backend.list_objects_message(ListObjectsRequest {
            user: "user:alice".into(),
            relation: "viewer".into(),
            object_type: "doc".into(),
            consistency: Consistency::Unspecified,
        });
        assert_eq!(message.authorization_model_id, "");
    }

    #[tokio::test]
    async fn test_configured_model_is_sent() {
        let backend = backend(Some("01HMODEL"));
        assert_eq!(backend.model_id(), Some("01HMODEL"));

        let message = backend.list_users_message(ListUsersRequest {
            object_type: "doc".into(),
            object_id: "d1".into(),
            relation: "viewer".into(),
            subject_type: "user".into(),
            consistency: Consistency::Unspecified,
        });
        assert_eq!(message.authorization_model_id, "01HMODEL");
        assert_eq!(message.user_filters[0].r#type, "user");
        assert_eq!(message.object.unwrap().id, "d1");
    }
}
