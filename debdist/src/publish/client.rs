//! A tiny client for the release API
//!
//! Only the two calls we need: create a release, upload an asset to it.
//! Both go through [`retry_with_policy`][] so a flaky network costs a few
//! seconds instead of a release.

use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
};

use axoasset::reqwest::{
    self,
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use backon::{ConstantBuilder, Retryable};
use debdist_schema::{CreateRelease, Release, ReleaseAsset};
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use url::Url;

use crate::{
    config::{PublishConfig, RetryPolicy},
    errors::{DistError, DistResult},
    net::{create_reqwest_client, ClientSettings},
};

/// Media type the release API wants us to ask for
pub const API_ACCEPT: &str = "application/vnd.github.v3+json";
/// Media type of request bodies we send to the API
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Media type of asset uploads
pub const ASSET_CONTENT_TYPE: &str = "application/octet-stream";

/// Client for one repository's releases
///
/// This type intentionally does not implement Debug, to avoid leaking the token.
pub struct ReleaseClient {
    http: reqwest::Client,
    api_server: Url,
    owner: String,
    repo: String,
    headers: HeaderMap,
    retry: RetryPolicy,
}

impl ReleaseClient {
    /// Make a client for the repository a publish config points at
    pub fn new(cfg: &PublishConfig, settings: &ClientSettings) -> DistResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(API_ACCEPT));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", cfg.token))
            .map_err(|_| DistError::BadToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            http: create_reqwest_client(settings)?,
            api_server: api_base(&cfg.api_server)?,
            owner: cfg.owner.clone(),
            repo: cfg.repo.clone(),
            headers,
            retry: cfg.retry,
        })
    }

    /// Create a release, retrying per the policy
    pub async fn create_release(&self, request: &CreateRelease) -> DistResult<Release> {
        let url = self.api_server.join(&format!(
            "repos/{}/{}/releases",
            self.owner, self.repo
        ))?;
        let body = serde_json::to_vec(request)?;
        let operation = format!("create release {}", request.tag_name);
        retry_with_policy(&self.retry, &operation, || async {
            info!("creating release {} via {url}", request.tag_name);
            let response = self
                .http
                .post(url.clone())
                .headers(self.headers.clone())
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(body.clone())
                .send()
                .await?;
            process_response(response).await
        })
        .await
    }

    /// Upload one asset to a release, retrying per the policy
    ///
    /// `upload_base` is the release's upload endpoint as returned by
    /// [`upload_base`][].
    pub async fn upload_asset(
        &self,
        upload_base: &str,
        name: &str,
        contents: Vec<u8>,
    ) -> DistResult<ReleaseAsset> {
        let url = asset_upload_url(upload_base, name)?;
        let operation = format!("upload {name}");
        retry_with_policy(&self.retry, &operation, || async {
            info!("uploading {name} ({} bytes)", contents.len());
            let response = self
                .http
                .post(url.clone())
                .headers(self.headers.clone())
                .header(CONTENT_TYPE, ASSET_CONTENT_TYPE)
                .body(contents.clone())
                .send()
                .await?;
            process_response(response).await
        })
        .await
    }
}

// `Url::join` replaces the last path segment unless the base ends in a slash
fn api_base(server: &str) -> DistResult<Url> {
    if server.ends_with('/') {
        Ok(Url::parse(server)?)
    } else {
        Ok(Url::parse(&format!("{server}/"))?)
    }
}

/// Strip the `{?name,label}` URI template off a release's `upload_url`
///
/// `https://uploads.example.com/repos/o/r/releases/1/assets{?name,label}`
/// becomes `https://uploads.example.com/repos/o/r/releases/1/assets`.
pub fn upload_base(release: &Release) -> DistResult<String> {
    let Some(upload_url) = &release.upload_url else {
        return Err(DistError::MissingUploadUrl);
    };
    let base = upload_url
        .split("/assets")
        .next()
        .unwrap_or(upload_url.as_str());
    Ok(format!("{base}/assets"))
}

/// The url an asset named `name` gets uploaded to
pub fn asset_upload_url(upload_base: &str, name: &str) -> DistResult<Url> {
    let mut url = Url::parse(upload_base)?;
    url.query_pairs_mut().append_pair("name", name);
    Ok(url)
}

async fn process_response<T: DeserializeOwned>(response: reqwest::Response) -> DistResult<T> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(DistError::ResponseError {
            status,
            body: (!text.is_empty()).then_some(text),
        });
    }
    let parsed = serde_json::from_str(&text)?;
    Ok(parsed)
}

/// Run `request` until it succeeds or the policy runs out
///
/// Transient failures (see [`DistError::is_transient`][]) are logged and
/// retried after `policy.delay`, at most `policy.max_retries` times. When
/// the budget is spent the last failure comes back wrapped in
/// [`DistError::RetriesExhausted`][]. Anything else fails immediately.
pub async fn retry_with_policy<T, Fut, F>(
    policy: &RetryPolicy,
    operation: &str,
    mut request: F,
) -> DistResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DistResult<T>>,
{
    let attempts = AtomicUsize::new(0);
    let backoff = ConstantBuilder::default()
        .with_delay(policy.delay)
        .with_max_times(policy.max_retries);

    let result = (|| {
        attempts.fetch_add(1, Ordering::SeqCst);
        request()
    })
    .retry(&backoff)
    .when(DistError::is_transient)
    .notify(|e, delay| {
        warn!("couldn't {operation}: {e}, retrying in {}s", delay.as_secs_f32());
    })
    .await;

    result.map_err(|cause| {
        if cause.is_transient() {
            DistError::RetriesExhausted {
                operation: operation.to_owned(),
                attempts: attempts.load(Ordering::SeqCst),
                cause: Box::new(cause),
            }
        } else {
            cause
        }
    })
}
