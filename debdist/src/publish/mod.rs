//! Publishing releases
//!
//! Creates one release for the tag, then uploads a `.deb` and a `.tar.gz`
//! per architecture, in order. The first asset that can't be uploaded
//! (after retries) ends the run. Nothing already created or uploaded is
//! rolled back.

use axoasset::LocalAsset;
use camino::Utf8PathBuf;
use debdist_schema::{CreateRelease, PublishReport, PublishedAsset};
use tracing::info;

use crate::{
    config::PublishConfig,
    env::BuildLayout,
    errors::{DistError, DistResult},
};

pub mod client;

use client::{upload_base, ReleaseClient};

/// A file we're going to attach to the release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAsset {
    /// The name it gets on the release
    pub name: String,
    /// Where it is on disk
    pub path: Utf8PathBuf,
}

/// Every asset for the given architectures, in upload order
///
/// Each architecture contributes its `.deb` then its `.tar.gz`.
pub fn plan_assets(layout: &BuildLayout, arches: &[String]) -> Vec<UploadAsset> {
    let mut assets = Vec::with_capacity(arches.len() * 2);
    for arch in arches {
        for path in [layout.deb_path(arch), layout.tarball_path(arch)] {
            let name = path.file_name().unwrap_or(path.as_str()).to_owned();
            assets.push(UploadAsset { name, path });
        }
    }
    assets
}

/// Make sure everything we're about to upload exists
///
/// Run before the release is created, so a missing file never leaves a
/// half-populated release behind.
pub fn check_assets(assets: &[UploadAsset]) -> DistResult<()> {
    for asset in assets {
        if !asset.path.is_file() {
            return Err(DistError::MissingAsset {
                path: asset.path.clone(),
            });
        }
    }
    Ok(())
}

/// The release we ask the API to create
pub fn release_request(cfg: &PublishConfig) -> CreateRelease {
    CreateRelease {
        tag_name: cfg.tag.raw.clone(),
        name: format!("{} {}", cfg.layout.binary_name, cfg.tag.raw),
        body: String::new(),
    }
}

/// Create the release and upload every asset
pub async fn publish(cfg: &PublishConfig, client: &ReleaseClient) -> DistResult<PublishReport> {
    let assets = plan_assets(&cfg.layout, &cfg.arches);
    check_assets(&assets)?;

    let release = client.create_release(&release_request(cfg)).await?;
    let base = upload_base(&release)?;
    info!("created release {}", cfg.tag);

    let mut published = Vec::with_capacity(assets.len());
    for asset in assets {
        let contents = LocalAsset::load_bytes(&asset.path)?;
        let uploaded = client.upload_asset(&base, &asset.name, contents).await?;
        info!("uploaded {}", asset.name);
        published.push(PublishedAsset {
            name: asset.name,
            path: asset.path.to_string(),
            download_url: uploaded.browser_download_url,
        });
    }

    Ok(PublishReport {
        tag: cfg.tag.raw.clone(),
        release_url: release.html_url,
        assets: published,
    })
}
