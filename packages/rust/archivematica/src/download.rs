//! Streaming package download and DIP unpacking.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use ushanka_shared::{PackageType, Result, UshankaError};

use crate::{Package, StorageService};

/// A package payload written to the work directory.
#[derive(Debug, Clone)]
pub struct DownloadedPackage {
    pub path: PathBuf,
    /// Hex SHA-256 of the payload as received.
    pub sha256: String,
    pub bytes: u64,
}

impl StorageService {
    /// Download a package payload into `work_dir`, hashing as it streams.
    ///
    /// AIPs keep the file name the Storage Service stores them under; DIPs
    /// are stored loose server-side and arrive as a tar, so they are saved
    /// as `<uuid>.tar`.
    #[instrument(skip_all, fields(uuid = %package.uuid, kind = %package.package_type))]
    pub async fn download_package(
        &self,
        package: &Package,
        work_dir: &Path,
    ) -> Result<DownloadedPackage> {
        let file_name = match package.kind() {
            Some(PackageType::Dip) => format!("{}.tar", package.uuid),
            _ => package.file_name().to_string(),
        };
        let dest = work_dir.join(&file_name);

        fs::create_dir_all(work_dir).await.map_err(|e| UshankaError::io(work_dir.to_path_buf(), e))?;

        let url = self.endpoint(&format!("file/{}/download/", package.uuid))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UshankaError::Network(format!("download {}: {e}", package.uuid)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UshankaError::Network(format!(
                "download {}: HTTP {status}",
                package.uuid
            )));
        }

        let mut file = fs::File::create(&dest).await.map_err(|e| UshankaError::io(dest.clone(), e))?;
        let mut hasher = Sha256::new();
        let mut bytes: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| UshankaError::Network(format!("download {}: {e}", package.uuid)))?;
            hasher.update(&chunk);
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| UshankaError::io(dest.clone(), e))?;
        }
        file.flush().await.map_err(|e| UshankaError::io(dest.clone(), e))?;

        let sha256 = format!("{:x}", hasher.finalize());
        info!(path = %dest.display(), bytes, %sha256, "package downloaded");

        Ok(DownloadedPackage {
            path: dest,
            sha256,
            bytes,
        })
    }
}

/// Unpack a downloaded DIP tar into `dest` and return the DIP root directory.
///
/// The Storage Service tars the DIP with its directory name as the single
/// top-level entry.
#[instrument(skip_all, fields(tar = %tar_path.display()))]
pub fn unpack_dip(tar_path: &Path, dest: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dest).map_err(|e| UshankaError::io(dest.to_path_buf(), e))?;

    let file = std::fs::File::open(tar_path).map_err(|e| UshankaError::io(tar_path.to_path_buf(), e))?;
    let mut archive = tar::Archive::new(file);

    let mut root: Option<PathBuf> = None;
    let entries = archive.entries().map_err(|e| UshankaError::io(tar_path.to_path_buf(), e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| UshankaError::io(tar_path.to_path_buf(), e))?;
        let entry_path = entry
            .path()
            .map_err(|e| UshankaError::io(tar_path.to_path_buf(), e))?
            .into_owned();
        if root.is_none() {
            if let Some(first) = entry_path.components().next() {
                root = Some(dest.join(first));
            }
        }
        debug!(entry = %entry_path.display(), "unpacking");
        entry.unpack_in(dest).map_err(|e| UshankaError::io(dest.join(&entry_path), e))?;
    }

    root.ok_or_else(|| UshankaError::parse(format!("empty DIP tar: {}", tar_path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tmp_dir(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{prefix}-{}", Uuid::now_v7()))
    }

    fn dip_package(uuid: &str) -> Package {
        Package {
            uuid: uuid.into(),
            package_type: "DIP".into(),
            status: "UPLOADED".into(),
            current_path: format!("chronicling-{uuid}"),
            current_full_path: String::new(),
            size: 11,
            related_packages: vec![],
            origin_pipeline: String::new(),
            encrypted: false,
        }
    }

    #[tokio::test]
    async fn download_streams_and_hashes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/file/d1/download/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
            .mount(&server)
            .await;

        let ss = crate::StorageService::new(&format!("{}/api/v2/", server.uri()), "test", "k")
            .unwrap();
        let work_dir = tmp_dir("ushanka-dl");
        let downloaded = ss
            .download_package(&dip_package("d1"), &work_dir)
            .await
            .unwrap();

        assert_eq!(downloaded.bytes, 11);
        assert_eq!(
            downloaded.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(downloaded.path.ends_with("d1.tar"));
        assert_eq!(std::fs::read(&downloaded.path).unwrap(), b"hello world");

        let _ = std::fs::remove_dir_all(&work_dir);
    }

    #[tokio::test]
    async fn download_rejects_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/file/gone/download/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ss = crate::StorageService::new(&format!("{}/api/v2/", server.uri()), "test", "k")
            .unwrap();
        let work_dir = tmp_dir("ushanka-dl-err");
        let err = ss
            .download_package(&dip_package("gone"), &work_dir)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));

        let _ = std::fs::remove_dir_all(&work_dir);
    }

    #[test]
    fn unpack_dip_returns_root_dir() {
        let work_dir = tmp_dir("ushanka-untar");
        std::fs::create_dir_all(&work_dir).unwrap();

        // Build a small DIP-shaped tar: one top-level dir with objects/.
        let tar_path = work_dir.join("dip.tar");
        {
            let file = std::fs::File::create(&tar_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let mut header = tar::Header::new_gnu();
            header.set_size(4);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(
                    &mut header,
                    "chronicling-d1/objects/uuid-interview-01.tiff",
                    &b"tiff"[..],
                )
                .unwrap();
            builder.finish().unwrap();
        }

        let dest = work_dir.join("unpacked");
        let root = unpack_dip(&tar_path, &dest).unwrap();
        assert_eq!(root, dest.join("chronicling-d1"));
        assert!(root.join("objects/uuid-interview-01.tiff").exists());

        let _ = std::fs::remove_dir_all(&work_dir);
    }
}
