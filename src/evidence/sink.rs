//! Evidence storage sinks.
//!
//! A sink persists one evidence image and returns its storage URL. Uploads
//! are rare (throttled) and failures are dropped without retry, so the
//! client here is deliberately simple.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

/// Remote evidence storage interface.
pub trait EvidenceSink: Send + Sync {
    /// Upload one JPEG image under `name`; returns the persistent URL.
    fn upload(&self, image: &[u8], name: &str) -> Result<String>;
}

/// HTTP evidence sink.
///
/// POSTs the JPEG bytes to the configured endpoint with the evidence name in
/// the query string and expects a JSON response carrying a `url` field.
pub struct HttpEvidenceSink {
    endpoint: Url,
    agent: ureq::Agent,
}

impl HttpEvidenceSink {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("parse evidence endpoint")?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported evidence endpoint scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build();
        Ok(Self { endpoint, agent })
    }
}

impl EvidenceSink for HttpEvidenceSink {
    fn upload(&self, image: &[u8], name: &str) -> Result<String> {
        let mut target = self.endpoint.clone();
        target.query_pairs_mut().append_pair("name", name);

        let response = self
            .agent
            .post(target.as_str())
            .set("Content-Type", "image/jpeg")
            .send_bytes(image)
            .with_context(|| format!("upload evidence '{}'", name))?;

        let body: serde_json::Value = serde_json::from_reader(response.into_reader())
            .context("parse evidence upload response")?;
        body.get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("evidence upload response has no 'url' field"))
    }
}

/// In-memory sink for tests, demos, and `mem://` endpoints.
#[derive(Default)]
pub struct MemoryEvidenceSink {
    uploads: Mutex<Vec<(String, usize)>>,
}

impl MemoryEvidenceSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names and byte sizes of everything uploaded so far.
    pub fn uploads(&self) -> Vec<(String, usize)> {
        let uploads = self.uploads.lock().unwrap_or_else(|e| e.into_inner());
        uploads.clone()
    }
}

impl EvidenceSink for MemoryEvidenceSink {
    fn upload(&self, image: &[u8], name: &str) -> Result<String> {
        let mut uploads = self.uploads.lock().unwrap_or_else(|e| e.into_inner());
        uploads.push((name.to_string(), image.len()));
        Ok(format!("mem://{}", name))
    }
}

/// Resolve a sink from an endpoint descriptor: `mem://` for the in-memory
/// sink, http(s) for the real one.
pub fn open_sink(endpoint: &str) -> Result<std::sync::Arc<dyn EvidenceSink>> {
    if endpoint.starts_with("mem://") {
        return Ok(std::sync::Arc::new(MemoryEvidenceSink::new()));
    }
    Ok(std::sync::Arc::new(HttpEvidenceSink::new(endpoint)?))
}
