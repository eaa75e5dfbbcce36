use chrono::{TimeZone, Utc};
use file_relay::services::oci::OciObjectStorage;
use file_relay::services::oci::credentials::OciCredentials;
use file_relay::services::storage::{ObjectStorage, StorageError, StorageTarget};
use mockito::Matcher;
use rsa::RsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use serde_json::json;
use std::io::Write;
use std::time::Duration;

const FINGERPRINT: &str = "b5:ea:8a:d9:a3:00:c2:4e:a8:d8:c6:7b:61:81:90:cc";

fn credentials(region: &str) -> OciCredentials {
    let pem = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/oci_api_key.pem"
    ))
    .unwrap();
    OciCredentials::new(
        "ocid1.tenancy.oc1..aaaa",
        "ocid1.user.oc1..bbbb",
        FINGERPRINT,
        region,
        RsaPrivateKey::from_pkcs8_pem(&pem).unwrap(),
    )
}

fn storage(server: &mockito::ServerGuard) -> OciObjectStorage {
    OciObjectStorage::new(
        &credentials("us-ashburn-1"),
        Some(&server.url()),
        "PreAuthRequest",
        Duration::from_secs(5),
    )
    .unwrap()
}

fn target() -> StorageTarget {
    StorageTarget {
        namespace: "relayns".to_string(),
        bucket: "uploads".to_string(),
        object_name: "upload-k3Jd9-hello.txt".to_string(),
    }
}

fn staged_file(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_put_object_sends_signed_upload() {
    let mut server = mockito::Server::new_async().await;
    let expires_at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

    let mock = server
        .mock("PUT", "/n/relayns/b/uploads/o/upload-k3Jd9-hello.txt")
        .match_header("opc-meta-expirationtime", "2030-01-02T03:04:05Z")
        .match_header(
            "authorization",
            Matcher::Regex(
                r#"^Signature version="1",headers="date \(request-target\) host",keyId="ocid1\.tenancy\.oc1\.\.aaaa/ocid1\.user\.oc1\.\.bbbb/b5:ea"#
                    .to_string(),
            ),
        )
        .match_header("date", Matcher::Regex(r" GMT$".to_string()))
        .match_body("hello, oci")
        .with_status(200)
        .create_async()
        .await;

    let file = staged_file(b"hello, oci");
    storage(&server)
        .put_object(&target(), file.path(), 10, expires_at)
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_put_object_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("PUT", Matcher::Any)
        .with_status(404)
        .with_body(r#"{"code":"BucketNotFound","message":"Either the bucket does not exist or you are not authorized"}"#)
        .create_async()
        .await;

    let file = staged_file(b"hello");
    let err = storage(&server)
        .put_object(&target(), file.path(), 5, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Upload(_)));
    let message = err.to_string();
    assert!(message.starts_with("Failed to upload file: 404 Not Found"));
    assert!(message.contains("BucketNotFound"));
}

#[tokio::test]
async fn test_put_object_missing_source() {
    let server = mockito::Server::new_async().await;
    let err = storage(&server)
        .put_object(
            &target(),
            std::path::Path::new("/nonexistent/upload-missing"),
            5,
            Utc::now(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Upload(_)));
}

#[tokio::test]
async fn test_create_download_url() {
    let mut server = mockito::Server::new_async().await;
    let expires_at = Utc.with_ymd_and_hms(2030, 1, 2, 3, 19, 5).unwrap();

    let mock = server
        .mock("POST", "/n/relayns/b/uploads/p/")
        .match_header("content-type", "application/json")
        .match_header("x-content-sha256", Matcher::Any)
        .match_header(
            "authorization",
            Matcher::Regex(
                r#"headers="date \(request-target\) host content-length content-type x-content-sha256""#
                    .to_string(),
            ),
        )
        .match_body(Matcher::Json(json!({
            "name": "PreAuthRequest",
            "objectName": "upload-k3Jd9-hello.txt",
            "accessType": "ObjectRead",
            "timeExpires": "2030-01-02T03:19:05.000Z"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "par-id",
                "name": "PreAuthRequest",
                "accessUri": "/p/Xy7Q/n/relayns/b/uploads/o/upload-k3Jd9-hello.txt",
                "objectName": "upload-k3Jd9-hello.txt",
                "accessType": "ObjectRead",
                "timeExpires": "2030-01-02T03:19:05.000Z"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let url = storage(&server)
        .create_download_url(&target(), expires_at)
        .await
        .unwrap();

    // Host comes from the region, not the API endpoint in use
    assert_eq!(
        url,
        "https://objectstorage.us-ashburn-1.oraclecloud.com/p/Xy7Q/n/relayns/b/uploads/o/upload-k3Jd9-hello.txt"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_create_download_url_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/n/relayns/b/uploads/p/")
        .with_status(401)
        .with_body(r#"{"code":"NotAuthenticated"}"#)
        .create_async()
        .await;

    let err = storage(&server)
        .create_download_url(&target(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::PreAuth(_)));
    assert!(err.to_string().contains("NotAuthenticated"));
}

#[tokio::test]
async fn test_create_download_url_malformed_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/n/relayns/b/uploads/p/")
        .with_status(200)
        .with_body(r#"{"id": "par-id"}"#)
        .create_async()
        .await;

    let err = storage(&server)
        .create_download_url(&target(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Parse(_)));
}

#[test]
fn test_missing_region_is_rejected() {
    let err = OciObjectStorage::new(
        &credentials("  "),
        None,
        "PreAuthRequest",
        Duration::from_secs(5),
    )
    .err()
    .unwrap();

    assert!(matches!(err, StorageError::Region(_)));
    assert!(err.to_string().starts_with("Failed to get region"));
}
