//! ArchivesSpace client.
//!
//! Authenticates once per client for a session token, then reads repository
//! and accession records. Accessions supply the descriptive metadata that
//! becomes the MODS and DC datastreams of an ingested object.

pub mod models;

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use ushanka_shared::{
    ArchivesSpaceConfig, DescriptiveRecord, Result, UshankaError, resolve_secret,
};

const SESSION_HEADER: &str = "X-ArchivesSpace-Session";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: String,
}

/// A repository record, as returned by `/repositories/<id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub uri: String,
    pub repo_code: String,
    pub name: String,
}

/// One page of accession results.
#[derive(Debug, Deserialize)]
pub struct AccessionPage {
    pub first_page: u32,
    pub last_page: u32,
    pub this_page: u32,
    pub total: u64,
    pub results: Vec<Accession>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessionDate {
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub begin: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LangMaterial {
    #[serde(default)]
    pub language_and_script: Option<LanguageAndScript>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageAndScript {
    #[serde(default)]
    pub language: String,
}

/// An accession record. Only the fields the ingest mapping reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Accession {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_description: String,
    #[serde(default)]
    pub accession_date: String,
    #[serde(default)]
    pub id_0: String,
    #[serde(default)]
    pub id_1: String,
    #[serde(default)]
    pub id_2: String,
    #[serde(default)]
    pub dates: Vec<AccessionDate>,
    #[serde(default)]
    pub lang_materials: Vec<LangMaterial>,
}

impl Accession {
    /// Dotted accession identifier (`2021.003` style), skipping empty parts.
    pub fn identifier(&self) -> String {
        [&self.id_0, &self.id_1, &self.id_2]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The best available date: the first date's expression, then its begin
    /// value, then the accession date.
    pub fn best_date(&self) -> &str {
        if let Some(date) = self.dates.first() {
            if !date.expression.is_empty() {
                return &date.expression;
            }
            if !date.begin.is_empty() {
                return &date.begin;
            }
        }
        &self.accession_date
    }

    fn language(&self) -> &str {
        let code = self
            .lang_materials
            .iter()
            .filter_map(|lm| lm.language_and_script.as_ref())
            .map(|ls| ls.language.as_str())
            .find(|code| !code.is_empty())
            .unwrap_or("eng");
        // iso639-2b code to the display form MODS wants as text
        match code {
            "eng" => "English",
            "fre" => "French",
            "ger" => "German",
            "spa" => "Spanish",
            other => other,
        }
    }

    /// Flatten this accession into the record the metadata builders consume.
    pub fn descriptive_record(&self, publisher: &str) -> DescriptiveRecord {
        DescriptiveRecord {
            title: self.title.clone(),
            r#abstract: self.content_description.clone(),
            date: self.best_date().to_string(),
            publisher: publisher.to_string(),
            language: self.language().to_string(),
            rights: String::new(),
            identifier: self.identifier(),
        }
    }
}

// ---------------------------------------------------------------------------
// ArchivesSpace client
// ---------------------------------------------------------------------------

/// Session-authenticated ArchivesSpace API client.
#[derive(Debug)]
pub struct ArchivesSpace {
    base: Url,
    client: Client,
    session: String,
}

impl ArchivesSpace {
    /// Authenticate against the backend named in `config`, resolving the
    /// password from the environment variable it names.
    pub async fn from_config(config: &ArchivesSpaceConfig) -> Result<Self> {
        let password = resolve_secret(&config.password_env)?;
        Self::login(&config.url, &config.username, &password).await
    }

    /// Log in and hold the session token for the life of the client.
    #[instrument(skip_all, fields(url = %base, user = %username))]
    pub async fn login(base: &str, username: &str, password: &str) -> Result<Self> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&base)
            .map_err(|e| UshankaError::config(format!("invalid ArchivesSpace URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| UshankaError::Network(format!("failed to build HTTP client: {e}")))?;

        let mut login_url = base
            .join(&format!("users/{username}/login"))
            .map_err(|e| UshankaError::config(format!("invalid login URL: {e}")))?;
        login_url.query_pairs_mut().append_pair("password", password);

        let response = client
            .post(login_url)
            .send()
            .await
            .map_err(|e| UshankaError::Network(format!("ArchivesSpace login: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UshankaError::Network(format!(
                "ArchivesSpace login failed: HTTP {status}"
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| UshankaError::parse(format!("login response: {e}")))?;

        info!("ArchivesSpace session established");
        Ok(Self {
            base,
            client,
            session: login.session,
        })
    }

    /// Fetch one repository by id.
    #[instrument(skip_all, fields(repo_id))]
    pub async fn repository(&self, repo_id: u32) -> Result<Repository> {
        self.get_json(&format!("repositories/{repo_id}")).await
    }

    /// All accession ids in a repository.
    #[instrument(skip_all, fields(repo_id))]
    pub async fn accession_ids(&self, repo_id: u32) -> Result<Vec<u64>> {
        self.get_json(&format!("repositories/{repo_id}/accessions?all_ids=true"))
            .await
    }

    /// One page of accessions.
    #[instrument(skip_all, fields(repo_id, page))]
    pub async fn accessions_page(
        &self,
        repo_id: u32,
        page: u32,
        page_size: u32,
    ) -> Result<AccessionPage> {
        let page: AccessionPage = self
            .get_json(&format!(
                "repositories/{repo_id}/accessions?page={page}&page_size={page_size}"
            ))
            .await?;
        debug!(
            this_page = page.this_page,
            last_page = page.last_page,
            total = page.total,
            "accessions page"
        );
        Ok(page)
    }

    /// Walk every accessions page for a repository.
    #[instrument(skip_all, fields(repo_id))]
    pub async fn all_accessions(&self, repo_id: u32) -> Result<Vec<Accession>> {
        let mut accessions = Vec::new();
        let mut page = 1;
        loop {
            let results = self.accessions_page(repo_id, page, 50).await?;
            let last_page = results.last_page;
            accessions.extend(results.results);
            if page >= last_page {
                break;
            }
            page += 1;
        }
        info!(count = accessions.len(), "fetched accessions");
        Ok(accessions)
    }

    /// Fetch one accession by id.
    #[instrument(skip_all, fields(repo_id, accession_id))]
    pub async fn accession(&self, repo_id: u32, accession_id: u64) -> Result<Accession> {
        self.get_json(&format!("repositories/{repo_id}/accessions/{accession_id}"))
            .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self
            .base
            .join(path)
            .map_err(|e| UshankaError::config(format!("invalid endpoint {path}: {e}")))?;

        let response = self
            .client
            .get(url)
            .header(SESSION_HEADER, &self.session)
            .send()
            .await
            .map_err(|e| UshankaError::Network(format!("{path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UshankaError::Network(format!("{path}: HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| UshankaError::parse(format!("{path}: invalid JSON: {e}")))
    }
}
