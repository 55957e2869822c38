// Stream Video REST client
// Server-side access with an HS256 server token; every request goes through
// the shared "stream_video" circuit breaker.

use super::token::server_token;
use super::CallProvider;
use crate::config::StreamConfig;
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::models::{CallSpec, CallState, Recording};
use crate::utils::circuit_breaker::{get_circuit_breaker, CircuitBreaker};
use crate::utils::retry::{retry_with_exponential_backoff, RetryConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const SERVICE_NAME: &str = "stream_video";

#[derive(Debug, Deserialize)]
struct GetCallResponse {
    call: StreamCall,
}

#[derive(Debug, Deserialize)]
struct StreamCall {
    #[serde(default)]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    session: Option<StreamCallSession>,
}

#[derive(Debug, Deserialize)]
struct StreamCallSession {
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ListRecordingsResponse {
    #[serde(default)]
    recordings: Vec<StreamRecording>,
}

#[derive(Debug, Deserialize)]
struct StreamRecording {
    url: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct GetOrCreateCallRequest<'a> {
    data: CallRequestData<'a>,
}

#[derive(Debug, Serialize)]
struct CallRequestData<'a> {
    created_by_id: &'a str,
    starts_at: DateTime<Utc>,
    custom: CallCustomData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallCustomData<'a> {
    title: &'a str,
    description: Option<&'a str>,
    duration: i64,
    host_id: &'a str,
    host_name: &'a str,
}

impl From<StreamCall> for CallState {
    fn from(call: StreamCall) -> Self {
        CallState {
            session_started_at: call.session.as_ref().and_then(|s| s.started_at),
            ended_at: call.ended_at,
            has_session: call.session.is_some(),
        }
    }
}

impl From<StreamRecording> for Recording {
    fn from(recording: StreamRecording) -> Self {
        Recording {
            url: recording.url,
            filename: recording.filename,
            start_time: recording.start_time,
            end_time: recording.end_time,
        }
    }
}

pub struct StreamCallProvider {
    client: Client,
    config: StreamConfig,
    token: String,
    retry: RetryConfig,
    breaker: Arc<CircuitBreaker>,
}

impl StreamCallProvider {
    /// Client bound to the process-wide breaker for the Stream service.
    pub async fn new(config: StreamConfig, request_timeout: Duration) -> AppResult<Self> {
        let breaker = get_circuit_breaker(SERVICE_NAME).await;
        Self::with_breaker(config, HttpConfig::call_provider(request_timeout), breaker)
    }

    pub fn with_breaker(
        config: StreamConfig,
        http: HttpConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> AppResult<Self> {
        let token = server_token(&config.api_secret)?;
        Ok(Self {
            client: http.build_client()?,
            retry: http.to_retry_config(),
            config,
            token,
            breaker,
        })
    }

    fn call_url(&self, call_id: &str, suffix: Option<&str>) -> AppResult<Url> {
        if call_id.trim().is_empty() {
            return Err(AppError::invalid_input("Call id cannot be empty"));
        }

        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| AppError::config(format!("Invalid Stream base URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AppError::config("Stream base URL cannot be a base"))?;
            segments
                .pop_if_empty()
                .extend(["video", "call", self.config.call_type.as_str(), call_id]);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url.query_pairs_mut().append_pair("api_key", &self.config.api_key);
        Ok(url)
    }

    /// Sends one request through the breaker. A 404 is `Ok(None)` so that a
    /// call that was never provisioned does not count against the breaker.
    async fn send_json<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> AppResult<Option<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        self.breaker
            .execute(move || async move {
                let mut request = self
                    .client
                    .request(method.clone(), url.clone())
                    .header("Authorization", self.token.as_str())
                    .header("stream-auth-type", "jwt");
                if let Some(body) = body {
                    request = request.json(body);
                }

                let response = request.send().await?;
                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(AppError::provider(format!(
                        "HTTP {} from {} {}: {}",
                        status.as_u16(),
                        method,
                        url.path(),
                        text.chars().take(200).collect::<String>()
                    )));
                }

                let parsed = response
                    .json::<T>()
                    .await
                    .map_err(|e| AppError::provider(format!("Malformed response from {}: {}", url.path(), e)))?;
                Ok(Some(parsed))
            })
            .await
    }
}

#[async_trait]
impl CallProvider for StreamCallProvider {
    async fn get_call_state(&self, call_id: &str) -> AppResult<CallState> {
        let url = self.call_url(call_id, None)?;
        let response: Option<GetCallResponse> = self.send_json::<(), _>(Method::GET, url, None).await?;

        match response {
            Some(body) => Ok(body.call.into()),
            None => Err(AppError::provider(format!("Call {} not found", call_id))),
        }
    }

    async fn list_recordings(&self, call_id: &str) -> AppResult<Vec<Recording>> {
        let url = self.call_url(call_id, Some("recordings"))?;
        let response: Option<ListRecordingsResponse> =
            self.send_json::<(), _>(Method::GET, url, None).await?;

        let recordings: Vec<Recording> = response
            .map(|body| body.recordings.into_iter().map(Recording::from).collect())
            .unwrap_or_default();
        debug!("Call {} has {} recording(s)", call_id, recordings.len());
        Ok(recordings)
    }

    async fn create_call(&self, call_id: &str, spec: &CallSpec) -> AppResult<()> {
        let url = self.call_url(call_id, None)?;
        let body = GetOrCreateCallRequest {
            data: CallRequestData {
                created_by_id: &spec.created_by_id,
                starts_at: spec.starts_at,
                custom: CallCustomData {
                    title: &spec.title,
                    description: spec.description.as_deref(),
                    duration: spec.duration,
                    host_id: &spec.host_id,
                    host_name: &spec.host_name,
                },
            },
        };

        let (url, body) = (&url, &body);
        let created: Option<serde_json::Value> = retry_with_exponential_backoff(&self.retry, move || {
            self.send_json(Method::POST, url.clone(), Some(body))
        })
        .await?;

        match created {
            Some(_) => Ok(()),
            None => Err(AppError::provider(format!(
                "Call type '{}' not found while creating {}",
                self.config.call_type, call_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> (StreamCallProvider, Arc<CircuitBreaker>) {
        let config = StreamConfig::new("test-key", "test-secret").with_base_url(&server.uri());
        let http = HttpConfig {
            base_retry_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(5),
            ..HttpConfig::call_provider(Duration::from_secs(2))
        };
        let breaker = Arc::new(CircuitBreaker::new(
            "stream_video_test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 1,
                timeout: Duration::from_secs(60),
            },
        ));
        let provider = StreamCallProvider::with_breaker(config, http, breaker.clone()).unwrap();
        (provider, breaker)
    }

    #[tokio::test]
    async fn test_get_call_state_maps_session_and_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/call/default/meeting-1"))
            .and(query_param("api_key", "test-key"))
            .and(header("stream-auth-type", "jwt"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "call": {
                    "id": "meeting-1",
                    "ended_at": "2025-01-06T15:31:00Z",
                    "session": { "id": "s-1", "started_at": "2025-01-06T15:00:30Z" }
                },
                "members": []
            })))
            .mount(&server)
            .await;

        let (provider, _) = provider_for(&server);
        let state = provider.get_call_state("meeting-1").await.unwrap();

        assert!(state.has_session);
        assert_eq!(
            state.session_started_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 30).unwrap())
        );
        assert_eq!(state.ended_at, Some(Utc.with_ymd_and_hms(2025, 1, 6, 15, 31, 0).unwrap()));
        assert_eq!(state.measured_minutes(), Some(31));
    }

    #[tokio::test]
    async fn test_get_call_state_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/call/default/meeting-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "call": { "id": "meeting-2", "ended_at": null, "session": null }
            })))
            .mount(&server)
            .await;

        let (provider, _) = provider_for(&server);
        let state = provider.get_call_state("meeting-2").await.unwrap();
        assert_eq!(state, CallState::default());
    }

    #[tokio::test]
    async fn test_server_error_is_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let (provider, breaker) = provider_for(&server);
        let err = provider.get_call_state("meeting-1").await.unwrap_err();
        assert!(err.is_provider_failure());
        assert!(err.to_string().contains("HTTP 500"));

        let _ = provider.get_call_state("meeting-1").await;
        assert_eq!(breaker.get_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_missing_call_does_not_trip_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (provider, breaker) = provider_for(&server);
        for _ in 0..3 {
            assert!(provider.get_call_state("gone").await.is_err());
        }
        assert!(provider.list_recordings("gone").await.unwrap().is_empty());
        assert_eq!(breaker.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_list_recordings_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/call/default/meeting-1/recordings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recordings": [
                    { "url": "https://cdn.example.com/b.mp4", "filename": "b.mp4" },
                    {
                        "url": "https://cdn.example.com/a.mp4",
                        "filename": "a.mp4",
                        "start_time": "2025-01-06T15:00:00Z",
                        "end_time": "2025-01-06T15:30:00Z"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let (provider, _) = provider_for(&server);
        let recordings = provider.list_recordings("meeting-1").await.unwrap();
        let urls: Vec<&str> = recordings.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://cdn.example.com/b.mp4", "https://cdn.example.com/a.mp4"]);
        assert!(recordings[1].start_time.is_some());
    }

    #[tokio::test]
    async fn test_create_call_retries_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/video/call/default/meeting-9"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/video/call/default/meeting-9"))
            .and(body_partial_json(serde_json::json!({
                "data": {
                    "created_by_id": "user_abc",
                    "custom": { "title": "Standup", "duration": 30, "hostName": "ana" }
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "call": { "id": "meeting-9" },
                "created": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (provider, _) = provider_for(&server);
        let spec = CallSpec {
            created_by_id: "user_abc".to_string(),
            starts_at: Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap(),
            title: "Standup".to_string(),
            description: None,
            duration: 30,
            host_id: "host-1".to_string(),
            host_name: "ana".to_string(),
        };

        provider.create_call("meeting-9", &spec).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_call_id_rejected() {
        let server = MockServer::start().await;
        let (provider, _) = provider_for(&server);
        let err = provider.get_call_state(" ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
