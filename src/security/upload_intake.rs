// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{FileInfo, FileValidationResult};
use crate::config::IntakeUploadConfig;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Number of leading bytes the signature check reads.
pub const SIGNATURE_HEAD_LEN: usize = 8;

const ALLOWED_MIME_TYPES: [&str; 9] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/tiff",
    "image/webp",
    "image/bmp",
    "image/heic",
    "image/heif",
];

const UNSAFE_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Matched anywhere in the lowercased name, not suffix-only. The
/// conservative substring scan is deliberate and occasionally
/// false-positives on names like `my.exe.plan.jpg`.
const BLOCKED_EXTENSION_MARKERS: [&str; 6] = [".exe", ".bat", ".cmd", ".scr", ".pif", ".com"];

/// Declared types with no entry here fail the signature check closed.
const SIGNATURES: [(&str, &[&[u8]]); 5] = [
    ("image/jpeg", &[&[0xFF, 0xD8, 0xFF]]),
    ("image/jpg", &[&[0xFF, 0xD8, 0xFF]]),
    (
        "image/png",
        &[&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]],
    ),
    ("image/gif", &[b"GIF87a", b"GIF89a"]),
    ("image/webp", &[b"RIFF"]),
];

/// Customer-facing upload pre-check. Fast metadata checks that accumulate
/// every error and warning instead of stopping early; the authoritative
/// decision stays with the backstop validator.
pub struct IntakeValidator {
    config: IntakeUploadConfig,
}

impl IntakeValidator {
    pub fn new(config: IntakeUploadConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, info: &FileInfo) -> FileValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !ALLOWED_MIME_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&info.declared_type))
        {
            errors.push(format!(
                "File type '{}' is not allowed",
                info.declared_type
            ));
        }

        let max_bytes = self.config.max_file_size_mb * 1024 * 1024;
        let warn_bytes = self.config.warn_file_size_mb * 1024 * 1024;
        if info.size > max_bytes {
            errors.push(format!(
                "File exceeds the maximum size of {} MB",
                self.config.max_file_size_mb
            ));
        } else if info.size >= warn_bytes {
            warnings.push(format!(
                "Files over {} MB may take a long time to upload",
                self.config.warn_file_size_mb
            ));
        }
        if info.size < self.config.min_file_size_bytes {
            errors.push("File is empty or too small to be a valid image".to_string());
        }

        check_file_name(&info.name, &mut errors, &mut warnings);

        FileValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            file_info: info.clone(),
        }
    }

    /// Compares the declared type against the magic bytes actually present.
    /// A declared type without a table entry fails closed, even when it
    /// passed the MIME allow-list.
    pub fn check_signature(&self, declared_type: &str, head: &[u8]) -> bool {
        let entry = SIGNATURES
            .iter()
            .find(|(mime, _)| mime.eq_ignore_ascii_case(declared_type));
        match entry {
            Some((_, magics)) => magics.iter().any(|magic| head.starts_with(magic)),
            None => false,
        }
    }

    /// Async flavor of the signature check for callers holding a stream:
    /// reads at most the first 8 bytes and delegates.
    pub async fn check_signature_reader<R>(
        &self,
        declared_type: &str,
        reader: &mut R,
    ) -> std::io::Result<bool>
    where
        R: AsyncRead + Unpin,
    {
        let mut head = [0u8; SIGNATURE_HEAD_LEN];
        let mut filled = 0;
        while filled < head.len() {
            let read = reader.read(&mut head[filled..]).await?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        Ok(self.check_signature(declared_type, &head[..filled]))
    }
}

fn check_file_name(name: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    if name.chars().any(|c| c.is_control()) || name.contains(UNSAFE_NAME_CHARS) {
        errors.push("File name contains invalid characters".to_string());
    }

    let lowered = name.to_lowercase();
    if BLOCKED_EXTENSION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        errors.push("File name contains a blocked extension".to_string());
    }

    if name.matches('.').count() > 1 {
        warnings.push("File name contains multiple extensions".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> IntakeValidator {
        IntakeValidator::new(IntakeUploadConfig::default())
    }

    fn info(name: &str, size: u64, declared_type: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            size,
            declared_type: declared_type.to_string(),
            last_modified: None,
        }
    }

    #[test]
    fn valid_jpeg_metadata_passes() {
        let result = validator().validate(&info("living-room.jpg", 2_000_000, "image/jpeg"));
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn disallowed_type_is_an_error() {
        let result = validator().validate(&info("notes.pdf", 2_000_000, "application/pdf"));
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("application/pdf"));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let result = validator().validate(&info("huge.jpg", 101 * 1024 * 1024, "image/jpeg"));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("maximum size")));
    }

    #[test]
    fn large_file_warns_but_passes() {
        let result = validator().validate(&info("big.jpg", 60 * 1024 * 1024, "image/jpeg"));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn tiny_file_is_rejected() {
        let result = validator().validate(&info("stub.jpg", 100, "image/jpeg"));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("too small")));
    }

    #[test]
    fn unsafe_name_characters_are_rejected() {
        for name in ["a<b.jpg", "a|b.jpg", "a?b.jpg", "dir\\file.jpg", "a\u{0007}.jpg"] {
            let result = validator().validate(&info(name, 2_000_000, "image/jpeg"));
            assert!(!result.is_valid, "expected rejection for {:?}", name);
        }
    }

    #[test]
    fn blocked_extension_anywhere_in_name_is_rejected() {
        let result = validator().validate(&info("invoice.exe.jpg", 2_000_000, "image/jpeg"));
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("blocked extension")));

        // Case variations hit the same marker.
        let result = validator().validate(&info("Setup.EXE", 2_000_000, "image/jpeg"));
        assert!(!result.is_valid);
    }

    #[test]
    fn double_extension_warns_but_does_not_reject() {
        let result = validator().validate(&info("invoice.pdf.jpg", 2_000_000, "image/jpeg"));
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("multiple extensions"))
        );
    }

    #[test]
    fn signature_accepts_matching_magic() {
        let v = validator();
        assert!(v.check_signature("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]));
        assert!(v.check_signature(
            "image/png",
            &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
        ));
        assert!(v.check_signature("image/gif", b"GIF89a\x00\x00"));
        assert!(v.check_signature("image/webp", b"RIFF\x00\x00\x00\x00"));
    }

    #[test]
    fn signature_rejects_mismatched_magic() {
        // Declared PNG, JPEG bytes: the spoofing case the check exists for.
        let v = validator();
        assert!(!v.check_signature("image/png", &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]));
    }

    #[test]
    fn signature_fails_closed_for_unknown_types() {
        // Allowed by MIME list but absent from the signature table.
        let v = validator();
        assert!(!v.check_signature("image/tiff", &[0x49, 0x49, 0x2A, 0x00, 0, 0, 0, 0]));
        assert!(!v.check_signature("application/zip", b"PK\x03\x04\x00\x00\x00\x00"));
    }

    #[actix_web::test]
    async fn signature_reader_reads_head_only() {
        let v = validator();
        let mut data: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4, 5, 6, 7, 8];
        let matched = v
            .check_signature_reader("image/jpeg", &mut data)
            .await
            .expect("read");
        assert!(matched);
    }

    #[actix_web::test]
    async fn signature_reader_handles_short_input() {
        let v = validator();
        let mut data: &[u8] = &[0xFF, 0xD8];
        let matched = v
            .check_signature_reader("image/jpeg", &mut data)
            .await
            .expect("read");
        assert!(!matched);
    }
}
