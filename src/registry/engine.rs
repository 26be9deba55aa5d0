//! Docker Engine API client

use crate::image::reference::ImageReference;
use crate::registry::auth::{AuthToken, Credentials};
use crate::registry::{LoginStatus, ProgressMessage, ProgressStream, RegistryClient, RegistryError};
use crate::{APP_NAME, VERSION};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::debug;

/// Engine API version every request is pinned to
pub const API_VERSION: &str = "v1.41";

/// Endpoint used when `DOCKER_HOST` is not set
pub const DEFAULT_DOCKER_HOST: &str = "tcp://localhost:2375";

const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// Registry client that delegates to a Docker daemon
///
/// Pulled and tagged images live in the daemon's local store; pushes go out
/// through the daemon with the supplied [`AuthToken`].
#[derive(Debug, Clone)]
pub struct DockerEngine {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    serveraddress: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

impl DockerEngine {
    /// Connect to the daemon at `docker_host`, e.g. `tcp://127.0.0.1:2375`
    pub fn new(docker_host: &str) -> Result<Self, RegistryError> {
        let base_url = engine_base_url(docker_host)?;
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", APP_NAME, VERSION))
            .build()?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.base_url, API_VERSION, path)
    }

    /// Turn a non-success response into [`RegistryError::Status`]
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(RegistryError::Status {
            code: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RegistryClient for DockerEngine {
    async fn login(&self, credentials: &Credentials) -> Result<LoginStatus, RegistryError> {
        let request = LoginRequest {
            username: credentials.username(),
            password: credentials.password(),
            serveraddress: credentials.server_address(),
        };
        let response = self
            .client
            .post(self.url("/auth"))
            .json(&request)
            .send()
            .await?;
        let response = Self::check(response).await?;

        Ok(response.json().await?)
    }

    async fn pull(&self, image: &ImageReference) -> Result<ProgressStream, RegistryError> {
        debug!(image = %image, "POST /images/create");
        let response = self
            .client
            .post(self.url("/images/create"))
            .query(&[
                ("fromImage", image.repository()),
                ("tag", image.tag_or_default()),
            ])
            .send()
            .await?;
        let response = Self::check(response).await?;

        Ok(progress_stream(response))
    }

    async fn tag(
        &self,
        source: &ImageReference,
        target: &ImageReference,
    ) -> Result<(), RegistryError> {
        let source_name = format!("{}:{}", source.repository(), source.tag_or_default());
        debug!(source = %source_name, target = %target, "POST /images/{{name}}/tag");
        let response = self
            .client
            .post(self.url(&format!("/images/{}/tag", source_name)))
            .query(&[
                ("repo", target.repository()),
                ("tag", target.tag_or_default()),
            ])
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    async fn push(
        &self,
        image: &ImageReference,
        auth: &AuthToken,
    ) -> Result<ProgressStream, RegistryError> {
        debug!(image = %image, "POST /images/{{name}}/push");
        let response = self
            .client
            .post(self.url(&format!("/images/{}/push", image.repository())))
            .query(&[("tag", image.tag_or_default())])
            .header(REGISTRY_AUTH_HEADER, auth.as_str())
            .send()
            .await?;
        let response = Self::check(response).await?;

        Ok(progress_stream(response))
    }
}

/// Map a `DOCKER_HOST` value onto an HTTP base URL
fn engine_base_url(docker_host: &str) -> Result<String, RegistryError> {
    let host = docker_host.trim().trim_end_matches('/');

    if let Some(address) = host.strip_prefix("tcp://") {
        if !address.is_empty() {
            return Ok(format!("http://{}", address));
        }
    } else if host.starts_with("http://") || host.starts_with("https://") {
        return Ok(host.to_string());
    }

    Err(RegistryError::UnsupportedHost(docker_host.to_string()))
}

/// Decode a newline-delimited JSON progress body
///
/// The daemon answers 200 as soon as a pull or push starts and reports
/// failures inside the stream, so an `error` message ends the stream with
/// [`RegistryError::Daemon`].
fn progress_stream(response: reqwest::Response) -> ProgressStream {
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));
    let lines = StreamReader::new(Box::pin(body)).lines();

    stream::unfold(Some(lines), |state| async move {
        let mut lines = match state {
            Some(lines) => lines,
            None => return None,
        };
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let item = parse_progress_line(line);
                    let next = if item.is_ok() { Some(lines) } else { None };
                    return Some((item, next));
                }
                Ok(None) => return None,
                Err(e) => return Some((Err(RegistryError::Stream(e)), None)),
            }
        }
    })
    .boxed()
}

fn parse_progress_line(line: &str) -> Result<ProgressMessage, RegistryError> {
    let message: ProgressMessage = serde_json::from_str(line)?;
    match message.error_message() {
        Some(error) => Err(RegistryError::Daemon(error.to_string())),
        None => Ok(message),
    }
}
