//! Blob store integration tests.

use std::time::Duration;

use mq_storage::BlobClient;

#[tokio::test]
#[ignore = "requires S3-compatible storage"]
async fn test_upload_presign_download_round_trip() {
    dotenvy::dotenv().ok();

    let client = BlobClient::from_env().expect("blob client");
    let dir = tempfile::tempdir().unwrap();

    let source = dir.path().join("payload.txt");
    tokio::fs::write(&source, b"round trip").await.unwrap();

    let key = format!("it/{}/payload.txt", uuid());
    let url = client.upload_file(&source, &key).await.expect("upload");
    assert!(url.ends_with(&key));

    let signed = client
        .presign_get(&key, Duration::from_secs(60))
        .await
        .expect("presign");

    let target = dir.path().join("downloaded.txt");
    client
        .download_to_file(&signed, &target)
        .await
        .expect("download");
    assert_eq!(tokio::fs::read(&target).await.unwrap(), b"round trip");

    client.delete_objects(&[key]).await.expect("delete");
}

#[tokio::test]
#[ignore = "requires S3-compatible storage"]
async fn test_upload_dir_lists_immediate_children() {
    dotenvy::dotenv().ok();

    let client = BlobClient::from_env().expect("blob client");
    let dir = tempfile::tempdir().unwrap();

    tokio::fs::write(dir.path().join("b.m3u8"), b"#EXTM3U").await.unwrap();
    tokio::fs::write(dir.path().join("a.ts"), b"segment").await.unwrap();
    tokio::fs::create_dir(dir.path().join("nested")).await.unwrap();
    tokio::fs::write(dir.path().join("nested").join("skip.txt"), b"no")
        .await
        .unwrap();

    let prefix = format!("it/{}/processed", uuid());
    let uploaded = client.upload_dir(dir.path(), &prefix).await.expect("upload dir");

    // Files only, name-sorted.
    let names: Vec<_> = uploaded.iter().map(|f| f.original_name.as_str()).collect();
    assert_eq!(names, vec!["a.ts", "b.m3u8"]);

    let listed = client.list_objects(&prefix).await.expect("list");
    assert_eq!(listed.len(), 2);

    let keys: Vec<String> = uploaded.into_iter().map(|f| f.s3_key).collect();
    client.delete_objects(&keys).await.expect("delete");
}

fn uuid() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    format!(
        "{}-{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}
