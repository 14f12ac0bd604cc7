//! Attachment intake limits and the post-completion conversion pass.

mod common;

use assert_matches::assert_matches;
use bytes::Bytes;
use common::{png_bytes, seed_department, seed_equipment, seed_user, setup, MAX_IMAGE_BYTES};
use upkeep_api::{
    entities::ticket::{TicketKind, TicketPriority, TicketStatus},
    entities::user::Role,
    errors::ServiceError,
    services::tickets::{CreateTicketRequest, NewTicketImage},
    storage::ObjectStore,
};

fn image(name: &str, bytes: Vec<u8>) -> NewTicketImage {
    NewTicketImage {
        filename: name.to_string(),
        content_type: "image/png".to_string(),
        caption: None,
        bytes: Bytes::from(bytes),
    }
}

fn ad_hoc_ticket(
    department_id: uuid::Uuid,
    mechanic_ids: Vec<uuid::Uuid>,
    images: Vec<NewTicketImage>,
) -> CreateTicketRequest {
    CreateTicketRequest {
        kind: TicketKind::AdHoc,
        equipment_id: None,
        department_id: Some(department_id),
        description: "water on the floor".to_string(),
        priority: TicketPriority::Medium,
        mechanic_ids,
        images,
    }
}

#[tokio::test]
async fn completion_converts_and_shrinks_every_image() {
    let ctx = setup().await;
    let requester = seed_user(&ctx, "ulla", Role::Requester).await;
    let mechanic = seed_user(&ctx, "marta", Role::Mechanic).await;
    let department_id = seed_department(&ctx, "Boiler Room").await;

    let created = ctx
        .tickets
        .create_ticket(
            &requester,
            ad_hoc_ticket(
                department_id,
                vec![mechanic.id],
                vec![
                    image("wide.PNG", png_bytes(1600, 900)),
                    image("small.png", png_bytes(640, 480)),
                ],
            ),
        )
        .await
        .unwrap();

    let before = ctx.tickets.images_of(created.id).await.unwrap();
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|img| img.image_key.ends_with(".png")));

    // Completing the ticket runs the conversion hook.
    ctx.tickets
        .transition(&mechanic, created.id, TicketStatus::Done, None)
        .await
        .unwrap();

    let after = ctx.tickets.images_of(created.id).await.unwrap();
    assert_eq!(after.len(), 2);
    for img in &after {
        assert!(img.image_key.ends_with(".jpg"), "key: {}", img.image_key);
        assert_eq!(img.content_type, "image/jpeg");
    }

    // Old objects are gone, converted ones decode at the expected sizes.
    for img in &before {
        assert!(!ctx.objects.exists(&img.image_key).await.unwrap());
    }
    let mut widths = Vec::new();
    for img in &after {
        let bytes = ctx.objects.read(&img.image_key).await.unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        widths.push(decoded.width());
    }
    widths.sort_unstable();
    assert_eq!(widths, vec![640, 800]);
}

#[tokio::test]
async fn reprocessing_a_completed_ticket_is_a_no_op() {
    let ctx = setup().await;
    let requester = seed_user(&ctx, "ulla", Role::Requester).await;
    let mechanic = seed_user(&ctx, "marta", Role::Mechanic).await;
    let department_id = seed_department(&ctx, "Boiler Room").await;

    let created = ctx
        .tickets
        .create_ticket(
            &requester,
            ad_hoc_ticket(
                department_id,
                vec![mechanic.id],
                vec![image("a.png", png_bytes(1000, 500))],
            ),
        )
        .await
        .unwrap();

    ctx.tickets
        .transition(&mechanic, created.id, TicketStatus::Done, None)
        .await
        .unwrap();

    let first_pass = ctx.tickets.images_of(created.id).await.unwrap();
    let object_count = ctx.objects.len().await;

    let summary = ctx
        .processor
        .process_completed_ticket(created.id)
        .await
        .unwrap();
    assert_eq!(summary.converted, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    let second_pass = ctx.tickets.images_of(created.id).await.unwrap();
    assert_eq!(first_pass, second_pass);
    assert_eq!(ctx.objects.len().await, object_count);
}

#[tokio::test]
async fn a_bad_image_is_kept_and_the_rest_still_convert() {
    let ctx = setup().await;
    let requester = seed_user(&ctx, "ulla", Role::Requester).await;
    let mechanic = seed_user(&ctx, "marta", Role::Mechanic).await;
    let department_id = seed_department(&ctx, "Boiler Room").await;

    let created = ctx
        .tickets
        .create_ticket(
            &requester,
            ad_hoc_ticket(
                department_id,
                vec![mechanic.id],
                vec![
                    image("broken.png", b"not an image at all".to_vec()),
                    image("fine.png", png_bytes(900, 300)),
                ],
            ),
        )
        .await
        .unwrap();

    // The transition itself succeeds; the conversion failure is contained.
    ctx.tickets
        .transition(&mechanic, created.id, TicketStatus::Done, None)
        .await
        .unwrap();

    let after = ctx.tickets.images_of(created.id).await.unwrap();
    let broken = after
        .iter()
        .find(|img| img.image_key.ends_with(".png"))
        .expect("original kept");
    assert!(ctx.objects.exists(&broken.image_key).await.unwrap());

    let converted = after
        .iter()
        .find(|img| img.image_key.ends_with(".jpg"))
        .expect("good image converted");
    assert_eq!(converted.content_type, "image/jpeg");
}

#[tokio::test]
async fn intake_rejects_oversized_payloads_before_anything_is_written() {
    let ctx = setup().await;
    let requester = seed_user(&ctx, "ulla", Role::Requester).await;
    let department_id = seed_department(&ctx, "Boiler Room").await;

    let err = ctx
        .tickets
        .create_ticket(
            &requester,
            ad_hoc_ticket(
                department_id,
                Vec::new(),
                vec![image("huge.png", vec![0u8; MAX_IMAGE_BYTES + 1])],
            ),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PayloadTooLarge(_));
    assert_eq!(ctx.objects.len().await, 0);

    // Exactly at the cap is accepted.
    let created = ctx
        .tickets
        .create_ticket(
            &requester,
            ad_hoc_ticket(
                department_id,
                Vec::new(),
                vec![image("exact.png", vec![0u8; MAX_IMAGE_BYTES])],
            ),
        )
        .await
        .unwrap();
    assert_eq!(ctx.tickets.images_of(created.id).await.unwrap().len(), 1);
    assert_eq!(ctx.objects.len().await, 1);
}

#[tokio::test]
async fn equipment_image_upload_respects_the_cap_and_derives_keys() {
    let ctx = setup().await;
    let department_id = seed_department(&ctx, "Press Shop").await;
    let equipment_id = seed_equipment(&ctx, "Press", "PRS-09", department_id).await;

    let err = ctx
        .equipment
        .upload_image(
            equipment_id,
            "photo.png",
            Bytes::from(vec![0u8; MAX_IMAGE_BYTES + 1]),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PayloadTooLarge(_));

    let updated = ctx
        .equipment
        .upload_image(equipment_id, "Photo.PNG", Bytes::from(png_bytes(100, 100)))
        .await
        .unwrap();
    let key = updated.image_key.expect("image key stored");
    assert!(key.starts_with("equipment/PRS-09_"), "key: {}", key);
    assert!(key.ends_with(".png"), "extension lowercased: {}", key);
    assert!(ctx.objects.exists(&key).await.unwrap());

    // Replacing removes the previous object.
    let replaced = ctx
        .equipment
        .upload_image(equipment_id, "newer.png", Bytes::from(png_bytes(50, 50)))
        .await
        .unwrap();
    let new_key = replaced.image_key.expect("image key stored");
    assert_ne!(new_key, key);
    assert!(!ctx.objects.exists(&key).await.unwrap());
    assert!(ctx.objects.exists(&new_key).await.unwrap());
}
