// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::{FileInfo, FileValidationResult};
use crate::config::BackstopUploadConfig;
use std::path::Path;

/// Leading bytes inspected by the backstop; long enough for the ftyp box
/// of HEIC/CR3 containers.
const HEAD_LEN: usize = 16;

const UNSAFE_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const BLOCKED_EXTENSION_MARKERS: [&str; 6] = [".exe", ".bat", ".cmd", ".scr", ".pif", ".com"];

const TIFF_MAGICS: &[&[u8]] = &[&[0x49, 0x49, 0x2A, 0x00], &[0x4D, 0x4D, 0x00, 0x2A]];

/// Authoritative upload check that runs on the stored bytes. It shares only
/// the result shape with the intake validator: thresholds, tables and the
/// size it trusts (the byte count actually received, not the declared one)
/// are all its own.
pub struct BackstopValidator {
    config: BackstopUploadConfig,
}

impl BackstopValidator {
    pub fn new(config: BackstopUploadConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, info: &FileInfo, content: &[u8]) -> FileValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let actual_size = content.len() as u64;

        let extension = file_extension(&info.name);
        match &extension {
            Some(ext) => {
                if !self
                    .config
                    .allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
                {
                    errors.push(format!("File extension '.{}' is not allowed", ext));
                }
            }
            None => errors.push("File has no extension".to_string()),
        }

        let max_bytes = self.config.max_file_size_mb * 1024 * 1024;
        if actual_size > max_bytes {
            errors.push(format!(
                "File exceeds the maximum size of {} MB",
                self.config.max_file_size_mb
            ));
        }
        if actual_size < self.config.min_file_size_bytes {
            errors.push("File is empty or too small to be a valid image".to_string());
        }

        check_file_name(&info.name, &mut errors, &mut warnings);

        if let Some(ext) = &extension {
            let head = &content[..content.len().min(HEAD_LEN)];
            if !signature_matches_extension(ext, head) {
                errors.push("File content does not match its extension".to_string());
            }
        }

        FileValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            file_info: FileInfo {
                name: info.name.clone(),
                size: actual_size,
                declared_type: info.declared_type.clone(),
                last_modified: info.last_modified,
            },
        }
    }
}

fn file_extension(name: &str) -> Option<String> {
    let ext = name.rsplit_once('.')?.1;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
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

/// Extension-keyed magic table. Extensions without an entry fail closed;
/// being on the allow-list is not enough to skip the content check.
fn signature_matches_extension(extension: &str, head: &[u8]) -> bool {
    match extension {
        "jpg" | "jpeg" => head.starts_with(&[0xFF, 0xD8, 0xFF]),
        "png" => head.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
        "gif" => head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a"),
        "webp" => head.starts_with(b"RIFF"),
        "bmp" => head.starts_with(b"BM"),
        "tif" | "tiff" | "nef" | "arw" | "dng" => {
            TIFF_MAGICS.iter().any(|magic| head.starts_with(magic))
        }
        "heic" | "heif" => has_ftyp_brand(head, &[b"heic", b"heix", b"heif", b"mif1", b"msf1"]),
        "cr2" => head.starts_with(&[0x49, 0x49, 0x2A, 0x00]),
        "cr3" => has_ftyp_brand(head, &[b"crx "]),
        "raf" => head.starts_with(b"FUJIFILM"),
        "orf" => head.starts_with(&[0x49, 0x49, 0x52, 0x4F]) || head.starts_with(&[0x49, 0x49, 0x52, 0x53]),
        "rw2" => head.starts_with(&[0x49, 0x49, 0x55, 0x00]),
        _ => false,
    }
}

/// ISO-BMFF containers carry their brand in an `ftyp` box at offset 4.
fn has_ftyp_brand(head: &[u8], brands: &[&[u8]]) -> bool {
    if head.len() < 12 || &head[4..8] != b"ftyp" {
        return false;
    }
    let brand = &head[8..12];
    brands.iter().any(|candidate| brand == *candidate)
}

/// Detect MIME type using content-based detection (infer) with fallback to
/// extension-based (mime_guess). Recorded in the audit trail; never used to
/// decide acceptance.
pub fn detect_mime_type(file_name: &str, file_content: &[u8]) -> String {
    if let Some(mime_type) = infer::get(file_content) {
        return mime_type.mime_type().to_string();
    }

    let mime_guess = mime_guess::from_path(Path::new(file_name));
    if let Some(mime_type) = mime_guess.first() {
        return mime_type.to_string();
    }

    "application/octet-stream".to_string()
}
