//! Video pipeline: rendition ladder, thumbnail, master playlist, upload.

use std::path::Path;

use tokio::sync::watch;
use tracing::{info, warn};

use mq_media::{hls, write_master_playlist, FfmpegRunner, MediaError};
use mq_models::{select_renditions, ItemResult, PostStatus, VideoItem, VideoResult};
use mq_storage::BlobClient;

use crate::accounting::ProgressLedger;
use crate::error::{WorkerError, WorkerResult};
use crate::reporter::ProgressReporter;

/// Forwards live encode readings into the post's progress stream.
pub(crate) struct EncodeBridge<'a> {
    pub reporter: &'a ProgressReporter,
    pub ledger: &'a mut ProgressLedger,
    pub item_index: usize,
    pub current_media: u32,
}

impl EncodeBridge<'_> {
    async fn tick(&mut self, completed: u32, total: u32, percentage: f64, filename: &str) {
        self.ledger
            .record_encode(self.item_index, completed, total, percentage);
        self.reporter
            .update(
                self.ledger.percentage(),
                &format!("Transcoding {}", filename),
                self.current_media,
                false,
            )
            .await;
    }
}

/// Process one video item end to end.
///
/// Renditions are encoded serially; encoding is CPU-bound, so parallel
/// renditions would trade total throughput for nothing.
pub(crate) async fn process_video_item(
    item: &VideoItem,
    input: &Path,
    out_dir: &Path,
    s3_key: &str,
    blob: &BlobClient,
    cancel: watch::Receiver<bool>,
    bridge: &mut EncodeBridge<'_>,
) -> WorkerResult<ItemResult> {
    let renditions = select_renditions(item.height);
    let total = renditions.len() as u32;
    let runner = FfmpegRunner::new().with_cancel(cancel);

    info!(
        media_id = %item.media_id,
        renditions = total,
        "Transcoding video {}",
        item.filename
    );

    let thumbnail_cmd = hls::video_thumbnail_command(input, out_dir, &item.filename);
    if let Err(e) = runner.run(&thumbnail_cmd).await {
        if matches!(e, MediaError::Cancelled) {
            return Err(e.into());
        }
        warn!(media_id = %item.media_id, "Thumbnail generation failed: {}", e);
    }

    for (index, rendition) in renditions.iter().enumerate() {
        let cmd = hls::rendition_command(input, out_dir, &item.filename, rendition);

        let (tx, mut rx) = watch::channel(0.0f64);
        let encode = runner.run_with_progress(&cmd, move |p| {
            let _ = tx.send(p.percentage);
        });
        tokio::pin!(encode);

        loop {
            tokio::select! {
                result = &mut encode => {
                    result?;
                    break;
                }
                changed = rx.changed() => {
                    match changed {
                        Ok(()) => {
                            let percentage = *rx.borrow_and_update();
                            bridge
                                .tick(index as u32, total, percentage, &item.filename)
                                .await;
                        }
                        Err(_) => {
                            (&mut encode).await?;
                            break;
                        }
                    }
                }
            }
        }

        // Coarse tick so renditions without live readings still advance.
        bridge
            .tick((index + 1) as u32, total, 0.0, &item.filename)
            .await;
    }

    write_master_playlist(out_dir, &item.filename, &renditions)
        .await
        .map_err(|e| {
            warn!(media_id = %item.media_id, "Master playlist write failed: {}", e);
            WorkerError::MasterPlaylistMissing(item.media_id.clone())
        })?;

    let dest_prefix = format!("{}processed", s3_key);
    let uploaded = blob.upload_dir(out_dir, &dest_prefix).await?;

    let master_playlist_url = uploaded
        .iter()
        .find(|f| f.original_name.ends_with("_master.m3u8"))
        .map(|f| f.url.clone());
    let thumbnail_url = uploaded
        .iter()
        .find(|f| f.original_name.ends_with("_thumbnail.jpg"))
        .map(|f| f.url.clone());

    if master_playlist_url.is_none() {
        return Err(WorkerError::MasterPlaylistMissing(item.media_id.clone()));
    }

    Ok(ItemResult::Video(VideoResult {
        media_id: item.media_id.clone(),
        original_name: item.original_name.clone(),
        filename: item.filename.clone(),
        status: PostStatus::Success,
        master_playlist_url,
        thumbnail_url,
    }))
}
