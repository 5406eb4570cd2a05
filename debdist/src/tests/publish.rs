use std::sync::atomic::{AtomicUsize, Ordering};

use axoasset::reqwest::StatusCode;
use camino::Utf8Path;
use debdist_schema::Release;
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use super::mock::*;
use crate::config::RetryPolicy;
use crate::errors::DistError;
use crate::net::ClientSettings;
use crate::publish::{
    check_assets, client::{asset_upload_url, retry_with_policy, upload_base, ReleaseClient},
    plan_assets, publish, release_request,
};

const RELEASES_PATH: &str = "/repos/axolotl/zramd/releases";
const UPLOADS_PATH: &str = "/uploads/repos/axolotl/zramd/releases/1/assets";

fn release_body(server: &MockServer) -> serde_json::Value {
    json!({
        "id": 1,
        "html_url": "https://example.com/axolotl/zramd/releases/v1.2.3-4",
        "upload_url": format!("{}{UPLOADS_PATH}{{?name,label}}", server.uri()),
    })
}

fn asset_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "browser_download_url": format!("https://example.com/download/{name}"),
    })
}

async fn mount_release(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(RELEASES_PATH))
        .and(header("authorization", "Bearer hunter2"))
        .and(header("accept", "application/vnd.github.v3+json"))
        .and(body_json(json!({
            "tag_name": "v1.2.3-4",
            "name": "zramd v1.2.3-4",
            "body": "",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(release_body(server)))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_upload(server: &MockServer, name: &str, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path(UPLOADS_PATH))
        .and(query_param("name", name))
        .and(header("authorization", "Bearer hunter2"))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(status).set_body_json(asset_body(name)))
        .expect(times)
        .mount(server)
        .await;
}

#[test]
fn assets_in_upload_order() {
    let assets = plan_assets(
        &layout(Utf8Path::new("dist")),
        &["armhf".to_owned(), "amd64".to_owned()],
    );
    let names = assets.iter().map(|a| a.name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "zramd_armhf.deb",
            "zramd_armhf.tar.gz",
            "zramd_amd64.deb",
            "zramd_amd64.tar.gz",
        ]
    );
    assert_eq!(assets[0].path, "dist/zramd_armhf.deb");
}

#[test]
fn release_is_named_after_the_binary() {
    let (_tmp, out) = scratch();
    let cfg = publish_config("http://localhost", &out, &["amd64"]);
    let req = release_request(&cfg);
    assert_eq!(req.tag_name, "v1.2.3-4");
    assert_eq!(req.name, "zramd v1.2.3-4");
    assert_eq!(req.body, "");
}

#[test]
fn upload_url_template_is_stripped() {
    let release = Release {
        id: Some(1),
        html_url: None,
        upload_url: Some(
            "https://uploads.github.com/repos/o/r/releases/9/assets{?name,label}".to_owned(),
        ),
    };
    let base = upload_base(&release).unwrap();
    assert_eq!(base, "https://uploads.github.com/repos/o/r/releases/9/assets");
    assert_eq!(
        asset_upload_url(&base, "zramd_amd64.deb").unwrap().as_str(),
        "https://uploads.github.com/repos/o/r/releases/9/assets?name=zramd_amd64.deb"
    );

    let missing = Release {
        id: Some(1),
        html_url: None,
        upload_url: None,
    };
    assert!(matches!(
        upload_base(&missing),
        Err(DistError::MissingUploadUrl)
    ));
}

#[test]
fn missing_asset_is_caught_up_front() {
    let (_tmp, out) = scratch();
    fake_artifacts(&out, &["amd64"]);
    std::fs::remove_file(out.join("zramd_amd64.tar.gz")).unwrap();

    let assets = plan_assets(&layout(&out), &["amd64".to_owned()]);
    let err = check_assets(&assets).unwrap_err();

    assert!(matches!(
        err,
        DistError::MissingAsset { path } if path.ends_with("zramd_amd64.tar.gz")
    ));
    // the .deb on its own is fine
    assert!(check_assets(&assets[..1]).is_ok());
}

#[tokio::test]
async fn publishes_everything() {
    let server = MockServer::start().await;
    let (_tmp, out) = scratch();
    fake_artifacts(&out, &["armhf", "amd64"]);
    let cfg = publish_config(&server.uri(), &out, &["armhf", "amd64"]);

    mount_release(&server).await;
    for name in [
        "zramd_armhf.deb",
        "zramd_armhf.tar.gz",
        "zramd_amd64.deb",
        "zramd_amd64.tar.gz",
    ] {
        mount_upload(&server, name, 201, 1).await;
    }
    let client = ReleaseClient::new(&cfg, &ClientSettings::new()).unwrap();
    let report = publish(&cfg, &client).await.unwrap();

    assert_eq!(report.tag, "v1.2.3-4");
    assert_eq!(
        report.release_url.as_deref(),
        Some("https://example.com/axolotl/zramd/releases/v1.2.3-4")
    );
    let uploaded = report
        .assets
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        uploaded,
        vec![
            "zramd_armhf.deb",
            "zramd_armhf.tar.gz",
            "zramd_amd64.deb",
            "zramd_amd64.tar.gz",
        ]
    );
    assert_eq!(
        report.assets[3].download_url.as_deref(),
        Some("https://example.com/download/zramd_amd64.tar.gz")
    );
}

#[tokio::test]
async fn release_creation_gives_up_after_three_attempts() {
    let server = MockServer::start().await;
    let (_tmp, out) = scratch();
    fake_artifacts(&out, &["amd64"]);
    let cfg = publish_config(&server.uri(), &out, &["amd64"]);

    Mock::given(method("POST"))
        .and(path(RELEASES_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOADS_PATH))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = ReleaseClient::new(&cfg, &ClientSettings::new()).unwrap();
    let err = publish(&cfg, &client).await.unwrap_err();

    let DistError::RetriesExhausted { attempts, cause, .. } = &err else {
        panic!("expected retries to run out, got {err:?}");
    };
    assert_eq!(*attempts, 3);
    assert!(matches!(
        &**cause,
        DistError::ResponseError { status, .. } if *status == StatusCode::BAD_GATEWAY
    ));
    // the last failure stays reachable for error reports
    let source = std::error::Error::source(&err).unwrap();
    assert_eq!(source.to_string(), "server error 502 Bad Gateway");
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn failed_upload_aborts_the_rest() {
    let server = MockServer::start().await;
    let (_tmp, out) = scratch();
    fake_artifacts(&out, &["armhf", "amd64"]);
    let cfg = publish_config(&server.uri(), &out, &["armhf", "amd64"]);

    mount_release(&server).await;
    mount_upload(&server, "zramd_armhf.deb", 201, 1).await;
    mount_upload(&server, "zramd_armhf.tar.gz", 500, 3).await;
    mount_upload(&server, "zramd_amd64.deb", 201, 0).await;
    mount_upload(&server, "zramd_amd64.tar.gz", 201, 0).await;

    let client = ReleaseClient::new(&cfg, &ClientSettings::new()).unwrap();
    let err = publish(&cfg, &client).await.unwrap_err();

    assert!(matches!(err, DistError::RetriesExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn missing_asset_means_no_release() {
    let server = MockServer::start().await;
    let (_tmp, out) = scratch();
    fake_artifacts(&out, &["armhf"]);
    let cfg = publish_config(&server.uri(), &out, &["armhf", "amd64"]);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let client = ReleaseClient::new(&cfg, &ClientSettings::new()).unwrap();
    let err = publish(&cfg, &client).await.unwrap_err();

    assert!(matches!(err, DistError::MissingAsset { .. }));
}

#[tokio::test]
async fn retry_recovers_from_a_blip() {
    let attempts = AtomicUsize::new(0);
    let policy = RetryPolicy {
        max_retries: 2,
        delay: std::time::Duration::from_millis(1),
    };

    let result = retry_with_policy(&policy, "do the thing", || async {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Err(DistError::ResponseError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: None,
            })
        } else {
            Ok(n)
        }
    })
    .await
    .unwrap();

    assert_eq!(result, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retry_budget_is_max_retries_plus_one() {
    for max_retries in [0, 1, 2, 5] {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy {
            max_retries,
            delay: std::time::Duration::ZERO,
        };

        let err = retry_with_policy(&policy, "fail", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DistError::ResponseError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: Some("nope".to_owned()),
            })
        })
        .await
        .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), max_retries + 1);
        assert!(matches!(
            err,
            DistError::RetriesExhausted { attempts: n, .. } if n == max_retries + 1
        ));
    }
}

#[tokio::test]
async fn unreachable_server_is_retried_then_fatal() {
    let (_tmp, out) = scratch();
    fake_artifacts(&out, &["amd64"]);
    // nothing listens on the discard port
    let cfg = publish_config("http://127.0.0.1:9", &out, &["amd64"]);

    let client = ReleaseClient::new(&cfg, &ClientSettings::new()).unwrap();
    let err = publish(&cfg, &client).await.unwrap_err();

    let DistError::RetriesExhausted { attempts, cause, .. } = &err else {
        panic!("expected retries to run out, got {err:?}");
    };
    assert_eq!(*attempts, 3);
    assert!(matches!(&**cause, DistError::Reqwest(_)), "{cause:?}");
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn retries_wait_between_attempts() {
    let delay = std::time::Duration::from_millis(50);
    let policy = RetryPolicy {
        max_retries: 2,
        delay,
    };
    let attempts = AtomicUsize::new(0);

    let started = std::time::Instant::now();
    let err = retry_with_policy(&policy, "fail", || async {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(DistError::ResponseError {
            status: StatusCode::BAD_GATEWAY,
            body: None,
        })
    })
    .await
    .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, DistError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(elapsed >= delay * 2, "only waited {elapsed:?}");
}

#[tokio::test]
async fn retry_doesnt_repeat_hopeless_errors() {
    let attempts = AtomicUsize::new(0);
    let err = retry_with_policy(&RetryPolicy::default(), "fail", || async {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(DistError::MissingUploadUrl)
    })
    .await
    .unwrap_err();

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(matches!(err, DistError::MissingUploadUrl));
}
