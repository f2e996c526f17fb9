//! Image pipeline: downscale, blurred thumbnail, original passthrough.

use std::path::Path;

use tokio::sync::watch;
use tracing::{info, warn};

use mq_media::{image, FfmpegRunner, MediaError};
use mq_models::{ImageItem, ImageResult, ItemResult, PostStatus};
use mq_storage::{BlobClient, UploadedFile};

use crate::error::WorkerResult;

/// Process one image item end to end.
pub(crate) async fn process_image_item(
    item: &ImageItem,
    input: &Path,
    out_dir: &Path,
    s3_key: &str,
    blob: &BlobClient,
    cancel: watch::Receiver<bool>,
) -> WorkerResult<ItemResult> {
    let runner = FfmpegRunner::new().with_cancel(cancel);

    info!(media_id = %item.media_id, "Processing image {}", item.filename);

    let downscale = image::downscale_command(input, out_dir, &item.filename);
    runner.run(&downscale).await?;

    let blur = image::blurred_thumbnail_command(input, out_dir, &item.filename);
    if let Err(e) = runner.run(&blur).await {
        if matches!(e, MediaError::Cancelled) {
            return Err(e.into());
        }
        warn!(media_id = %item.media_id, "Blurred thumbnail failed: {}", e);
    }

    // The untouched original ships alongside the derived files.
    tokio::fs::copy(input, out_dir.join(&item.filename)).await?;

    let dest_prefix = format!("{}processed", s3_key);
    let uploaded = blob.upload_dir(out_dir, &dest_prefix).await?;

    Ok(ItemResult::Image(ImageResult {
        media_id: item.media_id.clone(),
        original_name: item.original_name.clone(),
        filename: item.filename.clone(),
        status: PostStatus::Success,
        original_url: find_url(&uploaded, |name| name == item.filename),
        image_url: find_url(&uploaded, |name| name.contains("_processed")),
        blurred_thumbnail_url: find_url(&uploaded, |name| name.ends_with("_blurred_thumbnail.jpg")),
    }))
}

fn find_url(uploaded: &[UploadedFile], predicate: impl Fn(&str) -> bool) -> Option<String> {
    uploaded
        .iter()
        .find(|f| predicate(&f.original_name))
        .map(|f| f.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploads(names: &[&str]) -> Vec<UploadedFile> {
        names
            .iter()
            .map(|n| UploadedFile {
                original_name: n.to_string(),
                s3_key: format!("posts/p1/processed/{}", n),
                url: format!("https://cdn/posts/p1/processed/{}", n),
            })
            .collect()
    }

    #[test]
    fn test_result_urls_matched_by_name() {
        let uploaded = uploads(&["img1.jpg", "img1_blurred_thumbnail.jpg", "img1_processed.jpg"]);

        let original = find_url(&uploaded, |n| n == "img1.jpg");
        let processed = find_url(&uploaded, |n| n.contains("_processed"));
        let blurred = find_url(&uploaded, |n| n.ends_with("_blurred_thumbnail.jpg"));

        assert_eq!(original.unwrap(), "https://cdn/posts/p1/processed/img1.jpg");
        assert_eq!(
            processed.unwrap(),
            "https://cdn/posts/p1/processed/img1_processed.jpg"
        );
        assert_eq!(
            blurred.unwrap(),
            "https://cdn/posts/p1/processed/img1_blurred_thumbnail.jpg"
        );
    }

    #[test]
    fn test_missing_blur_leaves_null_url() {
        let uploaded = uploads(&["img1.jpg", "img1_processed.jpg"]);
        assert!(find_url(&uploaded, |n| n.ends_with("_blurred_thumbnail.jpg")).is_none());
    }
}
