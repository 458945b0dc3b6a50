//! End-to-end ingest pipeline: Storage Service → DIP unpack → METS →
//! metadata → Fedora deposit → registry → index.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use ushanka_archivematica::{PackagePair, StorageService, unpack_dip};
use ushanka_archivesspace::Accession;
use ushanka_fedora::Fedora;
use ushanka_mets::MetsFile;
use ushanka_model::{CompoundObject, DipPart, validate_compound};
use ushanka_shared::{AppConfig, DescriptiveRecord, Pid, Result, UshankaError};
use ushanka_storage::{DatastreamRecord, ObjectRecord, Registry};

use crate::builder::{
    CompoundSources, DipLayout, build_compound, build_parts, derive_label, match_accession,
};

/// Result of one full ingest run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Pids of compound objects created this run.
    pub ingested: Vec<Pid>,
    /// AIPs skipped because a compound already existed for them.
    pub skipped: usize,
    /// Failures as (AIP uuid, error message).
    pub errors: Vec<(String, String)>,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase for a package pair.
    fn phase(&self, aip_uuid: &str, name: &str);
    /// Called when one pair has been fully ingested.
    fn pair_done(&self, aip_uuid: &str, pid: &Pid, parts: usize);
    /// Called when a pair is skipped or fails.
    fn pair_skipped(&self, aip_uuid: &str, reason: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _aip_uuid: &str, _name: &str) {}
    fn pair_done(&self, _aip_uuid: &str, _pid: &Pid, _parts: usize) {}
    fn pair_skipped(&self, _aip_uuid: &str, _reason: &str) {}
}

/// The wired-up ingest pipeline.
pub struct Ingestor<'a> {
    pub storage_service: &'a StorageService,
    pub fedora: &'a Fedora,
    pub registry: &'a Registry,
    /// Accessions to match transfers against (may be empty when
    /// ArchivesSpace is unavailable).
    pub accessions: Vec<Accession>,
    /// Publisher used in descriptive records (the owning repository's name).
    pub publisher: String,
    pub config: AppConfig,
}

impl Ingestor<'_> {
    /// Ingest every stored AIP/DIP pair, or just the one named by `only_aip`.
    ///
    /// Pairs that already have a compound object on record are skipped, and
    /// one pair's failure does not stop the rest of the run.
    #[instrument(skip_all, fields(only_aip = ?only_aip))]
    pub async fn run(
        &self,
        only_aip: Option<&str>,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestSummary> {
        let start = Instant::now();
        let mut summary = IngestSummary::default();

        let pairs = self.storage_service.aip_dip_pairs().await?;
        let pairs: Vec<&PackagePair> = pairs
            .iter()
            .filter(|pair| only_aip.is_none_or(|uuid| pair.aip.uuid == uuid))
            .collect();

        if let Some(uuid) = only_aip {
            if pairs.is_empty() {
                return Err(UshankaError::validation(format!(
                    "no stored AIP/DIP pair for AIP {uuid}"
                )));
            }
        }

        info!(pairs = pairs.len(), "starting ingest run");

        for pair in pairs {
            let aip_uuid = pair.aip.uuid.clone();

            if self.registry.compound_for_aip(&aip_uuid).await?.is_some() {
                progress.pair_skipped(&aip_uuid, "already ingested");
                summary.skipped += 1;
                continue;
            }

            let job_id = self
                .registry
                .insert_ingest_job(&aip_uuid, &pair.dip.uuid)
                .await?;

            match self.ingest_pair(pair, progress).await {
                Ok(compound) => {
                    self.registry
                        .finish_ingest_job(&job_id, "completed", None)
                        .await?;
                    progress.pair_done(&aip_uuid, &compound.pid, compound.parts.len());
                    summary.ingested.push(compound.pid);
                }
                Err(e) => {
                    warn!(aip = %aip_uuid, error = %e, "ingest failed for pair");
                    self.registry
                        .finish_ingest_job(&job_id, "failed", Some(&e.to_string()))
                        .await?;
                    progress.pair_skipped(&aip_uuid, "failed");
                    summary.errors.push((aip_uuid, e.to_string()));
                }
            }
        }

        summary.elapsed = start.elapsed();
        info!(
            ingested = summary.ingested.len(),
            skipped = summary.skipped,
            errors = summary.errors.len(),
            elapsed_ms = summary.elapsed.as_millis(),
            "ingest run finished"
        );
        Ok(summary)
    }

    /// Ingest one AIP/DIP pair into a compound object with parts.
    #[instrument(skip_all, fields(aip = %pair.aip.uuid, dip = %pair.dip.uuid))]
    async fn ingest_pair(
        &self,
        pair: &PackagePair,
        progress: &dyn ProgressReporter,
    ) -> Result<CompoundObject> {
        let ingest = &self.config.ingest;
        let work_dir = Path::new(&ingest.work_dir).join(&pair.aip.uuid);

        // --- Phase 1: download both packages ---
        progress.phase(&pair.aip.uuid, "downloading packages");
        let aip = self
            .storage_service
            .download_package(&pair.aip, &work_dir)
            .await?;
        let dip = self
            .storage_service
            .download_package(&pair.dip, &work_dir)
            .await?;
        self.registry
            .insert_package(
                &pair.aip.uuid,
                &pair.aip.package_type,
                pair.aip.file_name(),
                aip.bytes,
                &aip.sha256,
            )
            .await?;
        self.registry
            .insert_package(
                &pair.dip.uuid,
                &pair.dip.package_type,
                pair.dip.file_name(),
                dip.bytes,
                &dip.sha256,
            )
            .await?;

        // --- Phase 2: unpack the DIP and parse its METS ---
        progress.phase(&pair.aip.uuid, "unpacking DIP");
        let dip_root = unpack_dip(&dip.path, &work_dir.join("dip"))?;
        let layout = DipLayout::scan(&dip_root)?;
        let mets_xml = std::fs::read_to_string(&layout.mets_path)
            .map_err(|e| UshankaError::io(&layout.mets_path, e))?;
        let mets = MetsFile::parse(&mets_xml)?;

        // --- Phase 3: descriptive metadata ---
        let label = derive_label(pair.aip.file_name());
        let record = match match_accession(&self.accessions, &label) {
            Some(accession) => {
                info!(accession = %accession.uri, "matched accession");
                accession.descriptive_record(&self.publisher)
            }
            None => {
                warn!(%label, "no matching accession, using transfer name only");
                DescriptiveRecord {
                    title: label.clone(),
                    publisher: self.publisher.clone(),
                    ..DescriptiveRecord::default()
                }
            }
        };
        let policy = std::fs::read(&ingest.policy_file)
            .map_err(|e| UshankaError::io(&ingest.policy_file, e))?;

        // --- Phase 4: mint pids and assemble ---
        progress.phase(&pair.aip.uuid, "creating objects");
        let namespace = &self.config.fedora.namespace;
        let compound_pid = self.fedora.ingest_object(namespace, &label).await?;

        let mut part_pids = Vec::new();
        for original in mets.original_files() {
            part_pids.push(self.fedora.ingest_object(namespace, &original.name).await?);
        }

        let sources = CompoundSources {
            aip_path: &aip.path,
            aip_checksum: &aip.sha256,
            dip_path: &dip.path,
            dip_checksum: &dip.sha256,
            mets_path: &layout.mets_path,
            policy: &policy,
        };
        let mut compound = build_compound(
            compound_pid,
            &label,
            Pid::new(&ingest.collection)?,
            Pid::new(&ingest.compound_model)?,
            &record,
            &sources,
        )?;
        compound.parts = build_parts(
            part_pids,
            &compound.pid,
            &Pid::new(&ingest.part_model)?,
            &mets,
            &layout,
            &record,
            &policy,
        )?;

        validate_compound(&compound)?;

        // --- Phase 5: deposit datastreams ---
        progress.phase(&pair.aip.uuid, "depositing datastreams");
        for ds in &compound.datastreams {
            self.fedora.add_datastream(&compound.pid, ds).await?;
        }
        for part in &compound.parts {
            for ds in &part.datastreams {
                self.fedora.add_datastream(&part.pid, ds).await?;
            }
        }

        // --- Phase 6: record and index ---
        progress.phase(&pair.aip.uuid, "recording ingest");
        self.record_compound(&compound, pair).await?;

        self.fedora.update_index(&compound.pid).await?;
        for part in &compound.parts {
            self.fedora.update_index(&part.pid).await?;
        }

        Ok(compound)
    }

    async fn record_compound(&self, compound: &CompoundObject, pair: &PackagePair) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.registry
            .insert_object(&ObjectRecord {
                pid: compound.pid.to_string(),
                label: compound.label.clone(),
                kind: "compound".into(),
                parent_pid: None,
                collection: compound.collections.first().map(Pid::to_string),
                content_model: compound.content_model.to_string(),
                aip_uuid: Some(pair.aip.uuid.clone()),
                dip_uuid: Some(pair.dip.uuid.clone()),
                created_at: now.clone(),
            })
            .await?;
        self.record_datastreams(&compound.pid, &compound.datastreams)
            .await?;

        for part in &compound.parts {
            self.record_part(part, pair, &now).await?;
        }
        Ok(())
    }

    async fn record_part(&self, part: &DipPart, pair: &PackagePair, now: &str) -> Result<()> {
        self.registry
            .insert_object(&ObjectRecord {
                pid: part.pid.to_string(),
                label: part.label.clone(),
                kind: "part".into(),
                parent_pid: Some(part.parent.to_string()),
                collection: None,
                content_model: part.content_model.to_string(),
                aip_uuid: Some(pair.aip.uuid.clone()),
                dip_uuid: Some(pair.dip.uuid.clone()),
                created_at: now.to_string(),
            })
            .await?;
        self.record_datastreams(&part.pid, &part.datastreams).await
    }

    async fn record_datastreams(
        &self,
        pid: &Pid,
        datastreams: &[ushanka_model::Datastream],
    ) -> Result<()> {
        for ds in datastreams {
            self.registry
                .insert_datastream(&DatastreamRecord {
                    pid: pid.to_string(),
                    dsid: ds.id.as_str().to_string(),
                    label: ds.label.clone(),
                    mime_type: ds.mime_type.clone(),
                    control_group: ds.id.control_group().code().to_string(),
                    checksum: ds.checksum.clone(),
                })
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const METS_FIXTURE: &str = include_str!("../../../../fixtures/xml/mets.fixture.xml");
    const AIP_UUID: &str = "2aaa349a-12a2-4338-90d1-5097bb989acc";
    const DIP_UUID: &str = "dea5c7af-2321-4102-be4b-93b3866c9c84";

    fn tmp_dir(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::now_v7()))
    }

    /// Tar up a DIP with the METS fixture's two original files.
    fn dip_tar_bytes() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let entries: [(&str, &[u8]); 5] = [
            (
                "chronicling-dip/METS.2aaa349a-12a2-4338-90d1-5097bb989acc.xml",
                METS_FIXTURE.as_bytes(),
            ),
            (
                "chronicling-dip/objects/0e65770d-c706-4067-9c55-1f9380828ca2-interview-01.tiff",
                b"tiff-bytes",
            ),
            (
                "chronicling-dip/objects/8c9ad4b8-f2f0-46a9-9493-cb9c9e6f1d0b-fieldnotes.pdf",
                b"pdf-bytes",
            ),
            (
                "chronicling-dip/objects/8c9ad4b8-f2f0-46a9-9493-cb9c9e6f1d0b-fieldnotes.txt",
                b"extracted text",
            ),
            (
                "chronicling-dip/thumbnails/0e65770d-c706-4067-9c55-1f9380828ca2.jpg",
                b"jpeg-bytes",
            ),
        ];
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    async fn mock_storage_service(server: &MockServer) {
        let aip_name = format!("Chronicling_COVID-19-20210215T185151Z-001-{AIP_UUID}.7z");
        let page = json!({
            "meta": {"limit": 100, "next": null, "offset": 0, "previous": null, "total_count": 2},
            "objects": [
                {
                    "uuid": AIP_UUID,
                    "package_type": "AIP",
                    "status": "UPLOADED",
                    "current_path": aip_name,
                    "size": 3,
                    "related_packages": [format!("/api/v2/file/{DIP_UUID}/")],
                },
                {
                    "uuid": DIP_UUID,
                    "package_type": "DIP",
                    "status": "UPLOADED",
                    "current_path": "chronicling-dip",
                    "size": 0,
                    "related_packages": [format!("/api/v2/file/{AIP_UUID}/")],
                },
            ],
        });
        Mock::given(method("GET"))
            .and(path("/api/v2/file/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/file/{AIP_UUID}/download/")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"aip".to_vec()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/file/{DIP_UUID}/download/")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(dip_tar_bytes()))
            .mount(server)
            .await;
    }

    async fn mock_fedora(server: &MockServer) {
        for pid in ["test:27", "test:28", "test:29"] {
            Mock::given(method("POST"))
                .and(path("/fedora/objects/new"))
                .respond_with(ResponseTemplate::new(201).set_body_string(pid))
                .up_to_n_times(1)
                .mount(server)
                .await;
        }
        Mock::given(method("POST"))
            .and(path_regex(r"^/fedora/objects/[^/]+/datastreams/[A-Z-]+$"))
            .respond_with(ResponseTemplate::new(201))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/fedoragsearch/rest"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<resultPage/>"))
            .mount(server)
            .await;
    }

    fn test_config(work_dir: &Path, policy_file: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.ingest.work_dir = work_dir.to_string_lossy().into_owned();
        config.ingest.policy_file = policy_file.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn full_run_creates_compound_with_parts_then_skips_rerun() {
        let server = MockServer::start().await;
        mock_storage_service(&server).await;
        mock_fedora(&server).await;

        let scratch = tmp_dir("ushanka-pipeline");
        std::fs::create_dir_all(&scratch).unwrap();
        let policy_file = scratch.join("policy.xml");
        std::fs::write(&policy_file, b"<policy/>").unwrap();

        let storage_service =
            StorageService::new(&format!("{}/api/v2/", server.uri()), "test", "k").unwrap();
        let fedora = Fedora::new(&server.uri(), "fedoraAdmin", "fedoraAdmin").unwrap();
        let registry = Registry::open(&scratch.join("registry.db")).await.unwrap();

        let accessions = vec![Accession {
            uri: "/repositories/2/accessions/1".into(),
            title: "Chronicling COVID-19".into(),
            content_description: "Community submissions.".into(),
            accession_date: "2021-02-15".into(),
            id_0: "2021".into(),
            id_1: "003".into(),
            ..Accession::default()
        }];

        let ingestor = Ingestor {
            storage_service: &storage_service,
            fedora: &fedora,
            registry: &registry,
            accessions,
            publisher: "University Libraries".into(),
            config: test_config(&scratch.join("work"), &policy_file),
        };

        let summary = ingestor.run(None, &SilentProgress).await.unwrap();
        assert_eq!(summary.skipped, 0);
        assert!(summary.errors.is_empty(), "errors: {:?}", summary.errors);
        assert_eq!(summary.ingested.len(), 1);
        assert_eq!(summary.ingested[0].as_str(), "test:27");

        let objects = registry.list_objects().await.unwrap();
        assert_eq!(objects.len(), 3);
        let compound = objects.iter().find(|o| o.kind == "compound").unwrap();
        assert_eq!(compound.pid, "test:27");
        assert_eq!(compound.label, "Chronicling_COVID-19");
        assert_eq!(compound.aip_uuid.as_deref(), Some(AIP_UUID));

        let streams = registry.datastreams_for("test:27").await.unwrap();
        assert_eq!(streams.len(), 7);

        let parts: Vec<_> = objects.iter().filter(|o| o.kind == "part").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.parent_pid.as_deref() == Some("test:27")));

        // Second run: the AIP is on record, so nothing is re-deposited.
        let summary = ingestor.run(None, &SilentProgress).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(summary.ingested.is_empty());

        let _ = std::fs::remove_dir_all(&scratch);
    }

    #[tokio::test]
    async fn unknown_aip_filter_is_an_error() {
        let server = MockServer::start().await;
        mock_storage_service(&server).await;

        let scratch = tmp_dir("ushanka-pipeline-filter");
        std::fs::create_dir_all(&scratch).unwrap();
        let policy_file = scratch.join("policy.xml");
        std::fs::write(&policy_file, b"<policy/>").unwrap();

        let storage_service =
            StorageService::new(&format!("{}/api/v2/", server.uri()), "test", "k").unwrap();
        let fedora = Fedora::new(&server.uri(), "fedoraAdmin", "fedoraAdmin").unwrap();
        let registry = Registry::open(&scratch.join("registry.db")).await.unwrap();

        let ingestor = Ingestor {
            storage_service: &storage_service,
            fedora: &fedora,
            registry: &registry,
            accessions: Vec::new(),
            publisher: String::new(),
            config: test_config(&scratch.join("work"), &policy_file),
        };

        let err = ingestor
            .run(Some("not-a-stored-aip"), &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no stored AIP/DIP pair"));

        let _ = std::fs::remove_dir_all(&scratch);
    }
}
