//! Image intake validation and the post-completion processor.
//!
//! When a ticket reaches `done`, every attached image that is not yet in the
//! converted format is decoded, downscaled to at most 800px wide and
//! re-encoded as quality-70 JPEG. The old object is removed only after the
//! replacement has been written and the row repointed, so a failure anywhere
//! leaves the original intact. Conversion failures are logged and swallowed;
//! completing a ticket never fails because of them.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::ticket_image::{self, Entity as TicketImageEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    storage::{keys, DynObjectStore},
};

/// Images wider than this are downscaled proportionally.
const MAX_WIDTH: u32 = 800;
const JPEG_QUALITY: u8 = 70;
const CONVERTED_CONTENT_TYPE: &str = "image/jpeg";

/// Rejects payloads over the cap before any processing happens. A payload of
/// exactly the cap is accepted.
pub fn ensure_within_size_limit(len: usize, max_bytes: usize) -> Result<(), ServiceError> {
    if len > max_bytes {
        return Err(ServiceError::PayloadTooLarge(format!(
            "Image is {} bytes, the limit is {} bytes",
            len, max_bytes
        )));
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Converts ticket attachments after completion.
#[derive(Clone)]
pub struct ImagePostProcessor {
    db: Arc<DbPool>,
    store: DynObjectStore,
    event_sender: Option<EventSender>,
}

impl ImagePostProcessor {
    pub fn new(db: Arc<DbPool>, store: DynObjectStore, event_sender: Option<EventSender>) -> Self {
        Self {
            db,
            store,
            event_sender,
        }
    }

    /// Processes every image of a completed ticket. Idempotent: keys already
    /// in the converted format are skipped, so a second run is a no-op.
    #[instrument(skip(self), fields(ticket_id = %ticket_id))]
    pub async fn process_completed_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<ProcessingSummary, ServiceError> {
        let images = TicketImageEntity::find()
            .filter(ticket_image::Column::TicketId.eq(ticket_id))
            .order_by_asc(ticket_image::Column::UploadedAt)
            .all(&*self.db)
            .await?;

        let mut summary = ProcessingSummary::default();

        for record in images {
            if keys::is_converted(&record.image_key) {
                summary.skipped += 1;
                continue;
            }
            match self.convert_one(&record).await {
                Ok(()) => summary.converted += 1,
                Err(e) => {
                    // The original object and row are untouched on failure.
                    error!(
                        image_id = %record.id,
                        image_key = %record.image_key,
                        error = %e,
                        "Image conversion failed, keeping original"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            converted = summary.converted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Completed ticket image pass"
        );
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::TicketImagesProcessed {
                    ticket_id,
                    converted: summary.converted,
                    skipped: summary.skipped,
                    failed: summary.failed,
                })
                .await
            {
                warn!(error = %e, "Failed to send images processed event");
            }
        }

        Ok(summary)
    }

    async fn convert_one(&self, record: &ticket_image::Model) -> Result<(), ServiceError> {
        let old_key = record.image_key.clone();
        let original = self.store.read(&old_key).await?;

        let converted =
            tokio::task::spawn_blocking(move || convert_to_jpeg(&original))
                .await
                .map_err(|e| {
                    ServiceError::ImageProcessingError(format!("conversion task failed: {}", e))
                })??;

        let new_key = keys::converted_key(&old_key);
        self.store.write(&new_key, &converted).await?;

        // Repoint the row before removing the old object; if the update
        // fails the freshly written object is cleaned up instead.
        let mut active: ticket_image::ActiveModel = record.clone().into();
        active.image_key = Set(new_key.clone());
        active.content_type = Set(CONVERTED_CONTENT_TYPE.to_string());
        if let Err(e) = active.update(&*self.db).await {
            if let Err(cleanup) = self.store.delete(&new_key).await {
                warn!(key = %new_key, error = %cleanup, "Failed to clean up orphaned object");
            }
            return Err(ServiceError::DatabaseError(e));
        }

        if let Err(e) = self.store.delete(&old_key).await {
            warn!(key = %old_key, error = %e, "Failed to delete superseded image object");
        }

        Ok(())
    }
}

/// Decode, downscale to at most [`MAX_WIDTH`] wide, re-encode as JPEG.
pub fn convert_to_jpeg(bytes: &[u8]) -> Result<Vec<u8>, ServiceError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ServiceError::ImageProcessingError(format!("decode failed: {}", e)))?;

    let img = if img.width() > MAX_WIDTH {
        let height = ((MAX_WIDTH as f64 / img.width() as f64) * img.height() as f64)
            .round()
            .max(1.0) as u32;
        img.resize_exact(MAX_WIDTH, height, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel.
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut out = Vec::new();
    let mut cursor = Cursor::new(&mut out);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ServiceError::ImageProcessingError(format!("encode failed: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn size_limit_boundary() {
        let max = 2 * 1024 * 1024;
        assert!(ensure_within_size_limit(max, max).is_ok());
        let err = ensure_within_size_limit(max + 1, max).unwrap_err();
        assert!(matches!(err, ServiceError::PayloadTooLarge(_)));
    }

    #[test]
    fn wide_images_are_downscaled_to_800() {
        let out = convert_to_jpeg(&png_bytes(1600, 900)).unwrap();
        let reloaded = image::load_from_memory(&out).unwrap();
        assert_eq!(reloaded.width(), 800);
        assert_eq!(reloaded.height(), 450);
    }

    #[test]
    fn narrow_images_keep_their_dimensions() {
        let out = convert_to_jpeg(&png_bytes(640, 480)).unwrap();
        let reloaded = image::load_from_memory(&out).unwrap();
        assert_eq!(reloaded.width(), 640);
        assert_eq!(reloaded.height(), 480);
    }

    #[test]
    fn garbage_bytes_fail_with_processing_error() {
        let err = convert_to_jpeg(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ServiceError::ImageProcessingError(_)));
    }
}
