//! Artifactory REST client.

use async_trait::async_trait;
use depot_core::buildinfo::BuildInfoDocument;
use depot_core::client::{ProxyConfig, PublishClient};
use depot_core::deploy::DeployDetail;
use depot_core::{Error, Result};
use reqwest::StatusCode;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

/// Content type of build-info documents.
pub const BUILD_INFO_CONTENT_TYPE: &str = "application/vnd.org.jfrog.artifactory+json";

const USER_AGENT: &str = concat!("depot/", env!("CARGO_PKG_VERSION"));

/// Publish client for an Artifactory-style server.
pub struct ArtifactoryClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    /// `None` once the client is closed.
    client: Option<reqwest::Client>,
}

fn build_http(proxy: Option<reqwest::Proxy>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| Error::Proxy(format!("cannot build HTTP client: {e}")))
}

/// Whether a response status is worth retrying.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn is_retryable_transport(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

impl ArtifactoryClient {
    pub fn new(base_url: &Url, username: Option<String>, password: Option<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            username,
            password,
            client: Some(build_http(None)?),
        })
    }

    fn http(&self) -> Result<&reqwest::Client> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Internal("publish client already closed".to_string()))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    /// `{base}/{repository}/{path};key=value;...`
    pub fn upload_url(&self, detail: &DeployDetail) -> String {
        let path = detail
            .artifact_path()
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let mut url = format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(detail.target_repository()),
            path
        );
        for (key, value) in detail.properties() {
            url.push(';');
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    pub fn build_info_url(&self) -> String {
        format!("{}/api/build", self.base_url)
    }
}

#[async_trait]
impl PublishClient for ArtifactoryClient {
    fn name(&self) -> &'static str {
        "artifactory"
    }

    async fn upload(&self, detail: &DeployDetail) -> Result<()> {
        let path = detail.artifact_path().to_string();
        let upload_error = |retryable: bool, message: String| Error::Upload {
            path: path.clone(),
            retryable,
            message,
        };

        let http = self.http()?;
        let unreadable = |e: std::io::Error| {
            upload_error(false, format!("cannot read {}: {e}", detail.source_file().display()))
        };
        let file = tokio::fs::File::open(detail.source_file())
            .await
            .map_err(unreadable)?;
        let length = file.metadata().await.map_err(unreadable)?.len();

        let checksums = detail.checksums();
        let mut request = http
            .put(self.upload_url(detail))
            .header("X-Checksum-Sha1", checksums.sha1().unwrap_or_default())
            .header("X-Checksum-Md5", checksums.md5().unwrap_or_default());
        if let Some(sha256) = checksums.sha256() {
            request = request.header("X-Checksum-Sha256", sha256);
        }

        let response = self
            .authorize(request)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| upload_error(is_retryable_transport(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(upload_error(
                is_retryable_status(status),
                format!("server returned {status}: {text}"),
            ));
        }

        debug!(repository = %detail.target_repository(), path = %path, "Upload accepted");
        Ok(())
    }

    async fn publish_build_info(&self, document: &BuildInfoDocument) -> Result<()> {
        let http = self.http()?;
        let body = serde_json::to_vec(document)
            .map_err(|e| Error::PublishInfo(format!("cannot serialize document: {e}")))?;

        let response = self
            .authorize(http.put(self.build_info_url()))
            .header(reqwest::header::CONTENT_TYPE, BUILD_INFO_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::PublishInfo(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::PublishInfo(format!(
                "server returned {status}: {text}"
            )));
        }

        debug!(name = %document.name, number = %document.number, "Build info accepted");
        Ok(())
    }

    fn configure_proxy(&mut self, proxy: &ProxyConfig) -> Result<()> {
        if self.client.is_none() {
            return Err(Error::Internal("publish client already closed".to_string()));
        }
        let mut http_proxy = reqwest::Proxy::all(format!("http://{}:{}", proxy.host, proxy.port))
            .map_err(|e| Error::Proxy(e.to_string()))?;
        if let Some(user) = &proxy.username {
            http_proxy = http_proxy.basic_auth(user, proxy.password.as_deref().unwrap_or_default());
        }
        self.client = Some(build_http(Some(http_proxy))?);
        debug!(host = %proxy.host, port = proxy.port, "Proxy configured");
        Ok(())
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("Publish client closed");
        }
    }
}
