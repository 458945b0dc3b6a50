//! Fedora 3.x repository client.
//!
//! Creates objects, attaches datastreams, and triggers GSearch reindexing.
//! The ingest lifecycle is create-once: objects are never updated or purged
//! through this client, so a failed run is re-ingested under a fresh pid
//! rather than patched in place.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use ushanka_model::{Datastream, DatastreamContent};
use ushanka_shared::{FedoraConfig, Pid, Result, UshankaError, resolve_secret};

const USER_AGENT: &str = concat!("Ushanka/", env!("CARGO_PKG_VERSION"));

/// Client for the Fedora REST API (and its GSearch sidecar).
pub struct Fedora {
    base: Url,
    username: String,
    password: String,
    client: Client,
}

impl Fedora {
    /// Build a client from configuration, resolving the password from the
    /// environment variable the config names.
    pub fn from_config(config: &FedoraConfig) -> Result<Self> {
        let password = resolve_secret(&config.password_env)?;
        Self::new(&config.url, &config.username, &password)
    }

    pub fn new(base: &str, username: &str, password: &str) -> Result<Self> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&base)
            .map_err(|e| UshankaError::config(format!("invalid Fedora URL: {e}")))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| UshankaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base,
            username: username.to_string(),
            password: password.to_string(),
            client,
        })
    }

    /// Create a new active object and return the pid Fedora minted for it.
    #[instrument(skip_all, fields(namespace = %namespace, label = %label))]
    pub async fn ingest_object(&self, namespace: &str, label: &str) -> Result<Pid> {
        let mut url = self.endpoint("fedora/objects/new")?;
        url.query_pairs_mut()
            .append_pair("namespace", namespace)
            .append_pair("label", label)
            .append_pair("state", "A");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| UshankaError::Network(format!("ingest `{label}`: {e}")))?;

        let status = response.status();
        if status.as_u16() != 201 {
            return Err(UshankaError::Deposit(format!(
                "ingest of object with label `{label}` failed with HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| UshankaError::Network(format!("ingest `{label}`: body: {e}")))?;
        let pid = Pid::new(body.trim())?;

        info!(%pid, "object created");
        Ok(pid)
    }

    /// Attach a datastream to an existing object.
    ///
    /// Control group, label, and mime type come from the datastream itself;
    /// a SHA-256 checksum is passed along when one was computed so Fedora
    /// verifies the payload on receipt.
    #[instrument(skip_all, fields(pid = %pid, dsid = %datastream.id.as_str()))]
    pub async fn add_datastream(&self, pid: &Pid, datastream: &Datastream) -> Result<()> {
        let dsid = datastream.id.as_str();
        let mut url = self.endpoint(&format!("fedora/objects/{pid}/datastreams/{dsid}"))?;
        url.query_pairs_mut()
            .append_pair("controlGroup", datastream.id.control_group().code())
            .append_pair("dsLabel", &datastream.label)
            .append_pair("mimeType", &datastream.mime_type)
            .append_pair("versionable", "true");
        if let Some(checksum) = &datastream.checksum {
            url.query_pairs_mut()
                .append_pair("checksumType", "SHA-256")
                .append_pair("checksum", checksum);
        }

        let body = match &datastream.content {
            DatastreamContent::Inline(bytes) => bytes.clone(),
            DatastreamContent::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| UshankaError::io(path.clone(), e))?,
        };
        debug!(bytes = body.len(), "uploading datastream");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", &datastream.mime_type)
            .body(body)
            .send()
            .await
            .map_err(|e| UshankaError::Network(format!("datastream {pid}/{dsid}: {e}")))?;

        let status = response.status();
        if status.as_u16() != 201 {
            return Err(UshankaError::Deposit(format!(
                "datastream {dsid} on {pid} rejected with HTTP {status}"
            )));
        }

        debug!("datastream accepted");
        Ok(())
    }

    /// Ask GSearch to (re)index one object from its pid.
    #[instrument(skip_all, fields(pid = %pid))]
    pub async fn update_index(&self, pid: &Pid) -> Result<()> {
        let mut url = self.endpoint("fedoragsearch/rest")?;
        url.query_pairs_mut()
            .append_pair("operation", "updateIndex")
            .append_pair("action", "fromPid")
            .append_pair("value", pid.as_str());

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| UshankaError::Network(format!("gsearch {pid}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UshankaError::Deposit(format!(
                "gsearch update for {pid} failed with HTTP {status}"
            )));
        }

        info!("index updated");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| UshankaError::config(format!("invalid endpoint {path}: {e}")))
    }
}
