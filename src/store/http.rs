//! SPARQL 1.1 Graph Store HTTP protocol backend
//!
//! Artifacts are `POST`ed to `{host}/{database}?graph=<collection IRI>`,
//! which merges them into the graph.

use super::{
    Collection, StoreAck, StoreBackendKind, StoreConnectionInfo, TripleStoreBackend,
    collection_graph_iri,
};
use crate::error::StoreError;
use crate::serializer::RdfSyntax;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::error::Error as _;
use std::io;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    user: Option<String>,
    credential: Option<String>,
}

impl HttpBackend {
    pub fn new(info: &StoreConnectionInfo, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Configuration(format!("http client: {e}")))?;
        Ok(Self::with_client(client, info))
    }

    pub fn with_client(client: reqwest::Client, info: &StoreConnectionInfo) -> Self {
        Self {
            client,
            endpoint: info.endpoint(),
            user: info.user.clone(),
            credential: info.credential.clone(),
        }
    }
}

#[async_trait]
impl TripleStoreBackend for HttpBackend {
    fn kind(&self) -> StoreBackendKind {
        StoreBackendKind::Http
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn open_collection(&self, name: &str) -> Result<Box<dyn Collection>, StoreError> {
        reqwest::Url::parse(&self.endpoint).map_err(|e| {
            StoreError::Configuration(format!("endpoint {}: {e}", self.endpoint))
        })?;
        Ok(Box::new(HttpCollection {
            backend: self.clone(),
            name: name.to_string(),
            graph: collection_graph_iri(name),
        }))
    }
}

struct HttpCollection {
    backend: HttpBackend,
    name: String,
    graph: String,
}

#[async_trait]
impl Collection for HttpCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, payload: Vec<u8>, syntax: RdfSyntax) -> Result<StoreAck, StoreError> {
        let endpoint = &self.backend.endpoint;
        let mut request = self
            .backend
            .client
            .post(endpoint.as_str())
            .query(&[("graph", self.graph.as_str())])
            .header(reqwest::header::CONTENT_TYPE, syntax.media_type())
            .body(payload);
        if let Some(user) = &self.backend.user {
            request = request.basic_auth(user, self.backend.credential.as_deref());
        }

        let response = request.send().await.map_err(|e| classify(endpoint, e))?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(
                endpoint = %endpoint,
                collection = %self.name,
                status = status.as_u16(),
                "artifact committed to graph store"
            );
            return Ok(StoreAck {
                backend: StoreBackendKind::Http,
                endpoint: endpoint.clone(),
                collection: self.name.clone(),
                triples_loaded: None,
                committed_at: chrono::Utc::now(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let cause = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", body.trim())
        };
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Authentication {
                endpoint: endpoint.clone(),
                cause,
            },
            StatusCode::BAD_REQUEST
            | StatusCode::UNSUPPORTED_MEDIA_TYPE
            | StatusCode::UNPROCESSABLE_ENTITY => StoreError::MalformedFile { cause },
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => StoreError::Timeout {
                endpoint: endpoint.clone(),
            },
            _ => StoreError::Backend(cause),
        })
    }
}

/// Map a transport error onto the store error taxonomy
fn classify(endpoint: &str, error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        return StoreError::Timeout {
            endpoint: endpoint.to_string(),
        };
    }
    if error.is_connect() {
        if is_connection_refused(&error) {
            return StoreError::ConnectionRefused {
                endpoint: endpoint.to_string(),
            };
        }
        return StoreError::Connection {
            endpoint: endpoint.to_string(),
            cause: root_cause(&error),
        };
    }
    StoreError::Backend(error.to_string())
}

fn is_connection_refused(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        if err.to_string().to_ascii_lowercase().contains("connection refused") {
            return true;
        }
        source = err.source();
    }
    false
}

fn root_cause(error: &reqwest::Error) -> String {
    let mut cause = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        cause = err.to_string();
        source = err.source();
    }
    cause
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_port() -> u16 {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_refused_connection_is_reported_as_such() {
        let info = StoreConnectionInfo::new(
            StoreBackendKind::Http,
            format!("127.0.0.1:{}", closed_port()),
            "store",
        );
        let backend = HttpBackend::new(&info, Duration::from_secs(5)).unwrap();
        let collection = backend.open_collection("karma").await.unwrap();
        let err = collection
            .load(b"<a:s> <a:p> <a:o> .".to_vec(), RdfSyntax::NTriples)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_configuration_error() {
        let info = StoreConnectionInfo::new(StoreBackendKind::Http, "http://", "");
        let backend = HttpBackend::new(&info, DEFAULT_TIMEOUT).unwrap();
        let err = match backend.open_collection("karma").await {
            Err(e) => e,
            Ok(_) => panic!("expected configuration error"),
        };
        assert!(matches!(err, StoreError::Configuration(_)));
    }
}
