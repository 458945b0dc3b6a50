//! Archivematica Storage Service client.
//!
//! Lists stored packages, pairs each DIP with the AIP it was generated from,
//! and downloads package payloads for ingest. The Storage Service
//! authenticates every request with `username` and `api_key` query
//! parameters, so the key never appears in a header that proxies might log
//! differently than the URL.

mod download;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use ushanka_shared::{ArchivematicaConfig, PackageType, Result, UshankaError, resolve_secret};

pub use download::{DownloadedPackage, unpack_dip};

/// User-Agent string for Storage Service requests.
const USER_AGENT: &str = concat!("Ushanka/", env!("CARGO_PKG_VERSION"));

/// Page size used when walking the package list.
const PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// Package types
// ---------------------------------------------------------------------------

/// One stored package as the Storage Service reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    pub uuid: String,
    /// `AIP`, `DIP`, `transfer`, ... — only AIP and DIP matter here.
    pub package_type: String,
    pub status: String,
    /// Path relative to the package's location.
    pub current_path: String,
    /// Absolute path on the Storage Service host.
    #[serde(default)]
    pub current_full_path: String,
    #[serde(default)]
    pub size: u64,
    /// Resource URIs of related packages (`/api/v2/file/<uuid>/`).
    #[serde(default)]
    pub related_packages: Vec<String>,
    /// Resource URI of the pipeline that produced the package.
    #[serde(default)]
    pub origin_pipeline: String,
    #[serde(default)]
    pub encrypted: bool,
}

impl Package {
    /// The package kind, if it is one the ingest pipeline handles.
    pub fn kind(&self) -> Option<PackageType> {
        match self.package_type.as_str() {
            "AIP" => Some(PackageType::Aip),
            "DIP" => Some(PackageType::Dip),
            _ => None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.status == "UPLOADED"
    }

    /// The file name the Storage Service stores this package under.
    pub fn file_name(&self) -> &str {
        self.current_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.current_path)
    }

    /// UUIDs of related packages, extracted from their resource URIs.
    pub fn related_uuids(&self) -> Vec<&str> {
        self.related_packages
            .iter()
            .filter_map(|uri| uri.trim_end_matches('/').rsplit('/').next())
            .collect()
    }
}

/// An AIP and the DIP generated from it, ready for ingest as one object.
#[derive(Debug, Clone)]
pub struct PackagePair {
    pub aip: Package,
    pub dip: Package,
}

#[derive(Debug, Deserialize)]
struct PackageList {
    meta: PageMeta,
    objects: Vec<Package>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    next: Option<String>,
    #[serde(default)]
    total_count: u64,
}

// ---------------------------------------------------------------------------
// StorageService client
// ---------------------------------------------------------------------------

/// Client for the Storage Service v2 API.
pub struct StorageService {
    base: Url,
    username: String,
    api_key: String,
    client: Client,
}

impl StorageService {
    /// Build a client from configuration, resolving the API key from the
    /// environment variable the config names.
    pub fn from_config(config: &ArchivematicaConfig) -> Result<Self> {
        let api_key = resolve_secret(&config.api_key_env)?;
        Self::new(&config.url, &config.username, &api_key)
    }

    pub fn new(base: &str, username: &str, api_key: &str) -> Result<Self> {
        // Url::join treats a base without a trailing slash as a file path.
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&base)
            .map_err(|e| UshankaError::config(format!("invalid Storage Service URL: {e}")))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| UshankaError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base,
            username: username.to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| UshankaError::config(format!("invalid endpoint {path}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("username", &self.username)
            .append_pair("api_key", &self.api_key);
        Ok(url)
    }

    /// List every stored package, walking all pages.
    ///
    /// When `kind` is given the filter is applied server-side.
    #[instrument(skip_all, fields(kind = ?kind))]
    pub async fn list_packages(&self, kind: Option<PackageType>) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        let mut offset: u32 = 0;

        loop {
            let mut url = self.endpoint("file/")?;
            url.query_pairs_mut()
                .append_pair("limit", &PAGE_SIZE.to_string())
                .append_pair("offset", &offset.to_string());
            if let Some(kind) = kind {
                url.query_pairs_mut()
                    .append_pair("package_type", kind.as_str());
            }

            let page: PackageList = self.get_json(url).await?;
            debug!(
                fetched = page.objects.len(),
                total = page.meta.total_count,
                offset,
                "package list page"
            );

            let fetched = page.objects.len() as u32;
            packages.extend(page.objects);
            if page.meta.next.is_none() || fetched == 0 {
                break;
            }
            offset += fetched;
        }

        info!(count = packages.len(), "listed packages");
        Ok(packages)
    }

    /// Fetch details for one package by UUID.
    #[instrument(skip_all, fields(uuid = %uuid))]
    pub async fn package_details(&self, uuid: &str) -> Result<Package> {
        let url = self.endpoint(&format!("file/{uuid}/"))?;
        self.get_json(url).await
    }

    /// Pair each uploaded DIP with the uploaded AIP it references.
    ///
    /// DIPs without a stored related AIP are skipped; an AIP may appear in at
    /// most one pair since Archivematica generates one DIP per AIP.
    #[instrument(skip_all)]
    pub async fn aip_dip_pairs(&self) -> Result<Vec<PackagePair>> {
        let packages = self.list_packages(None).await?;

        let aips: Vec<&Package> = packages
            .iter()
            .filter(|p| p.kind() == Some(PackageType::Aip) && p.is_uploaded())
            .collect();

        let mut pairs = Vec::new();
        for dip in &packages {
            if dip.kind() != Some(PackageType::Dip) || !dip.is_uploaded() {
                continue;
            }
            let related = dip.related_uuids();
            let Some(aip) = aips
                .iter()
                .find(|a| related.contains(&a.uuid.as_str()))
            else {
                debug!(dip = %dip.uuid, "DIP has no stored AIP, skipping");
                continue;
            };
            pairs.push(PackagePair {
                aip: (*aip).clone(),
                dip: dip.clone(),
            });
        }

        info!(pairs = pairs.len(), "paired AIPs with DIPs");
        Ok(pairs)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| UshankaError::Network(format!("{}: {e}", url.path())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UshankaError::Network(format!(
                "{}: HTTP {status}",
                url.path()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| UshankaError::parse(format!("{}: invalid JSON: {e}", url.path())))
    }
}
