//! Upload validation and object-storage key layout.

use uuid::Uuid;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// MIME types accepted for upload.
pub const ALLOWED_VIDEO_MIME_TYPES: [&str; 5] = [
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/webm",
];

/// Maximum upload size: 1 GiB.
pub const MAX_VIDEO_SIZE_BYTES: i64 = 1_073_741_824;

/// Maximum video duration accepted by validation.
pub const MAX_VIDEO_DURATION_SECS: f64 = 600.0;

/// Maximum accepted filename length in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Presigned PUT URLs expire after 15 minutes.
pub const UPLOAD_URL_TTL_SECS: u64 = 900;

/// Fallback filename when sanitization leaves nothing usable.
const DEFAULT_FILENAME: &str = "video";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an upload-init request.
///
/// Rules:
/// - `mime_type` must be one of [`ALLOWED_VIDEO_MIME_TYPES`].
/// - `size_bytes` must be in `(0, 1 GiB]`.
/// - `filename` must not be empty or exceed [`MAX_FILENAME_BYTES`].
pub fn validate_upload_request(
    filename: &str,
    mime_type: &str,
    size_bytes: i64,
) -> Result<(), CoreError> {
    if filename.is_empty() {
        return Err(CoreError::Validation(
            "Filename must not be empty".to_string(),
        ));
    }
    if filename.len() > MAX_FILENAME_BYTES {
        return Err(CoreError::Validation(format!(
            "Filename must not exceed {MAX_FILENAME_BYTES} bytes"
        )));
    }
    if !ALLOWED_VIDEO_MIME_TYPES.contains(&mime_type) {
        return Err(CoreError::Validation(format!(
            "Unsupported video type '{mime_type}'. Allowed types: {}",
            ALLOWED_VIDEO_MIME_TYPES.join(", ")
        )));
    }
    if size_bytes <= 0 {
        return Err(CoreError::Validation(
            "size_bytes must be positive".to_string(),
        ));
    }
    if size_bytes > MAX_VIDEO_SIZE_BYTES {
        return Err(CoreError::Validation(format!(
            "Video size exceeds maximum of {MAX_VIDEO_SIZE_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Sanitize a client-supplied filename for use in an object key.
///
/// Path separators are never accepted verbatim: only the final path
/// component survives, and any character outside `[A-Za-z0-9._-]` becomes
/// an underscore. Empty or dot-only results fall back to `"video"`.
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(DEFAULT_FILENAME);

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        let mut out = trimmed.to_string();
        out.truncate(MAX_FILENAME_BYTES);
        out
    }
}

// ---------------------------------------------------------------------------
// Key layout
// ---------------------------------------------------------------------------

/// Key of the original upload: `uploads/{user_id}/{video_id}/{filename}`.
///
/// The bucket name is not part of the key; callers pair this with the
/// `uploads` bucket.
pub fn upload_object_key(user_id: Uuid, video_id: Uuid, sanitized_filename: &str) -> String {
    format!("{user_id}/{video_id}/{sanitized_filename}")
}

/// Key of a per-scene sidecar: `sidecars/{user_id}/{video_id}/{scene_id}.json`.
pub fn sidecar_object_key(user_id: Uuid, video_id: Uuid, scene_id: Uuid) -> String {
    format!("{user_id}/{video_id}/{scene_id}.json")
}

/// Prefix for ephemeral per-video artifacts in the `tmp` bucket.
pub fn tmp_object_prefix(video_id: Uuid) -> String {
    format!("{video_id}/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_allowed_mime_types() {
        for mime in ALLOWED_VIDEO_MIME_TYPES {
            validate_upload_request("a.mp4", mime, 1024).unwrap();
        }
    }

    #[test]
    fn rejects_unknown_mime_type() {
        let err = validate_upload_request("a.gif", "image/gif", 1024).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn accepts_exactly_one_gib() {
        validate_upload_request("a.mp4", "video/mp4", MAX_VIDEO_SIZE_BYTES).unwrap();
    }

    #[test]
    fn rejects_one_byte_over_limit() {
        let err =
            validate_upload_request("a.mp4", "video/mp4", MAX_VIDEO_SIZE_BYTES + 1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn rejects_zero_and_negative_sizes() {
        assert!(validate_upload_request("a.mp4", "video/mp4", 0).is_err());
        assert!(validate_upload_request("a.mp4", "video/mp4", -1).is_err());
    }

    #[test]
    fn rejects_overlong_filename() {
        let name = "a".repeat(MAX_FILENAME_BYTES + 1);
        assert!(validate_upload_request(&name, "video/mp4", 1024).is_err());
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("dir/sub/clip.mov"), "clip.mov");
    }

    #[test]
    fn sanitize_replaces_special_characters() {
        assert_eq!(sanitize_filename("my clip (1).mp4"), "my_clip__1_.mp4");
        assert_eq!(sanitize_filename("휴가 영상.mp4"), "_____.mp4");
    }

    #[test]
    fn sanitize_falls_back_on_empty_result() {
        assert_eq!(sanitize_filename("..."), "video");
        assert_eq!(sanitize_filename("///"), "video");
    }

    #[test]
    fn upload_key_layout() {
        let user = Uuid::nil();
        let video = Uuid::nil();
        assert_eq!(
            upload_object_key(user, video, "clip.mp4"),
            format!("{user}/{video}/clip.mp4")
        );
    }

    #[test]
    fn sidecar_key_layout() {
        let user = Uuid::nil();
        let video = Uuid::nil();
        let scene = Uuid::nil();
        assert_eq!(
            sidecar_object_key(user, video, scene),
            format!("{user}/{video}/{scene}.json")
        );
    }
}
