//! Stored-object key derivation. Keys carry a uuid component so that two
//! uploads of the same filename never collide.

use uuid::Uuid;

pub const EQUIPMENT_PREFIX: &str = "equipment";
pub const TICKET_PREFIX: &str = "tickets";

/// Extension of the converted format produced by the post-processor.
pub const CONVERTED_EXTENSION: &str = ".jpg";

/// Lowercased extension of `filename`, including the dot. Empty when the
/// name has no extension.
pub fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Key for an equipment catalog photo: `equipment/{code|"equip"}_{uuid}{ext}`.
pub fn equipment_image_key(code: &str, original_filename: &str) -> String {
    let prefix = if code.is_empty() { "equip" } else { code };
    format!(
        "{}/{}_{}{}",
        EQUIPMENT_PREFIX,
        prefix,
        Uuid::new_v4(),
        extension_of(original_filename)
    )
}

/// Key for a ticket attachment: `tickets/{ticket_id}/{uuid}{ext}`.
pub fn ticket_image_key(ticket_id: Uuid, original_filename: &str) -> String {
    format!(
        "{}/{}/{}{}",
        TICKET_PREFIX,
        ticket_id,
        Uuid::new_v4(),
        extension_of(original_filename)
    )
}

/// Rewrites a key's extension to the converted format, keeping the stem.
pub fn converted_key(key: &str) -> String {
    match key.rsplit_once('.') {
        Some((stem, _)) => format!("{}{}", stem, CONVERTED_EXTENSION),
        None => format!("{}{}", key, CONVERTED_EXTENSION),
    }
}

/// Whether a key already holds the converted format.
pub fn is_converted(key: &str) -> bool {
    key.to_ascii_lowercase().ends_with(CONVERTED_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("photo.PNG"), ".png");
        assert_eq!(extension_of("photo.jpeg"), ".jpeg");
        assert_eq!(extension_of("no_extension"), "");
        assert_eq!(extension_of(".hidden"), "");
    }

    #[test]
    fn equipment_key_uses_code_or_fallback() {
        let key = equipment_image_key("CMP-01", "pump.PNG");
        assert!(key.starts_with("equipment/CMP-01_"));
        assert!(key.ends_with(".png"));

        let key = equipment_image_key("", "pump.png");
        assert!(key.starts_with("equipment/equip_"));
    }

    #[test]
    fn equipment_keys_do_not_collide() {
        let a = equipment_image_key("CMP-01", "pump.png");
        let b = equipment_image_key("CMP-01", "pump.png");
        assert_ne!(a, b);
    }

    #[test]
    fn converted_key_swaps_extension() {
        assert_eq!(converted_key("tickets/x/y.png"), "tickets/x/y.jpg");
        assert_eq!(converted_key("tickets/x/y"), "tickets/x/y.jpg");
        assert!(is_converted("tickets/x/y.JPG"));
        assert!(!is_converted("tickets/x/y.png"));
    }
}
