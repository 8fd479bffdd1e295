// This file is part of the product ImmoShot.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use regex::Regex;

pub const DANGEROUS_CONTENT_ERROR: &str = "Potentially dangerous content detected";

/// Entities this module emits. Encoding leaves an `&` alone when it already
/// starts one of these, which is what keeps sanitization idempotent.
const KNOWN_ENTITIES: [&str; 8] = [
    "&amp;", "&lt;", "&gt;", "&quot;", "&#x27;", "&#x60;", "&#x3D;", "&#x2F;",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub sanitized_text: String,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SanitizeOptions {
    /// Truncate (never reject) the sanitized text to this many characters.
    pub max_length: Option<usize>,
    /// Tag names that survive `strip_tags` verbatim. Ignored otherwise.
    pub allowed_tags: Vec<String>,
    /// Remove tag-shaped substrings outright instead of entity-encoding them.
    pub strip_tags: bool,
}

/// Strips a fixed set of script-injection patterns and entity-encodes the
/// HTML-special characters. Pure: no logging, no I/O; callers decide what a
/// rejection means and emit the security event themselves.
pub struct InputSanitizer {
    dangerous: Vec<Regex>,
    tag_like: Regex,
    tag_name: Regex,
}

impl InputSanitizer {
    pub fn new() -> Self {
        let patterns = [
            r"(?is)<script\b[^>]*>.*?</script\s*>",
            r"(?i)</?script\b[^>]*>",
            r"(?is)<iframe\b[^>]*>.*?</iframe\s*>",
            r"(?i)</?iframe\b[^>]*>",
            r"(?i)javascript\s*:",
            r"(?i)vbscript\s*:",
            r"(?i)data\s*:\s*text/html",
            r"(?i)\bon\w+\s*=",
            r"(?i)</?(?:object|embed|link|meta|style)\b[^>]*>",
        ];
        let dangerous = patterns
            .iter()
            .map(|pattern| Regex::new(pattern).expect("sanitizer pattern must compile"))
            .collect();

        Self {
            dangerous,
            tag_like: Regex::new(r"<[^>]*>").expect("tag pattern must compile"),
            tag_name: Regex::new(r"^</?\s*([a-zA-Z][a-zA-Z0-9]*)")
                .expect("tag name pattern must compile"),
        }
    }

    pub fn sanitize(&self, input: &str, options: &SanitizeOptions) -> ValidationResult {
        let mut text = input.to_string();
        let mut dangerous = false;

        // Strip matches even when rejecting, so a caller that ignores
        // is_valid still never sees the dangerous substring.
        for pattern in &self.dangerous {
            if pattern.is_match(&text) {
                dangerous = true;
                text = pattern.replace_all(&text, "").into_owned();
            }
        }

        let mut sanitized = if options.strip_tags {
            self.strip_tag_spans(&text, &options.allowed_tags)
        } else {
            encode_specials(&text)
        };

        if let Some(max_length) = options.max_length
            && sanitized.chars().count() > max_length
        {
            sanitized = sanitized.chars().take(max_length).collect();
        }

        let errors = if dangerous {
            vec![DANGEROUS_CONTENT_ERROR.to_string()]
        } else {
            Vec::new()
        };

        ValidationResult {
            sanitized_text: sanitized,
            is_valid: !dangerous,
            errors,
        }
    }

    /// Removes tag-shaped spans, keeping tags whose name is allow-listed;
    /// the text between tags is still entity-encoded.
    fn strip_tag_spans(&self, text: &str, allowed_tags: &[String]) -> String {
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;

        for span in self.tag_like.find_iter(text) {
            output.push_str(&encode_specials(&text[cursor..span.start()]));
            if self.is_allowed_tag(span.as_str(), allowed_tags) {
                output.push_str(span.as_str());
            }
            cursor = span.end();
        }
        output.push_str(&encode_specials(&text[cursor..]));

        output
    }

    fn is_allowed_tag(&self, tag: &str, allowed_tags: &[String]) -> bool {
        if allowed_tags.is_empty() {
            return false;
        }
        match self.tag_name.captures(tag) {
            Some(captures) => {
                let name = &captures[1];
                allowed_tags
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(name))
            }
            None => false,
        }
    }
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_specials(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        let rest = &text[index..];
        let ch = match rest.chars().next() {
            Some(ch) => ch,
            None => break,
        };

        match ch {
            '&' => {
                if let Some(entity) = KNOWN_ENTITIES
                    .iter()
                    .find(|entity| rest.starts_with(**entity))
                {
                    output.push_str(entity);
                    index += entity.len();
                    continue;
                }
                output.push_str("&amp;");
            }
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            '`' => output.push_str("&#x60;"),
            '=' => output.push_str("&#x3D;"),
            '/' => output.push_str("&#x2F;"),
            _ => output.push(ch),
        }
        index += ch.len_utf8();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> InputSanitizer {
        InputSanitizer::new()
    }

    fn sanitize(input: &str) -> ValidationResult {
        sanitizer().sanitize(input, &SanitizeOptions::default())
    }

    #[test]
    fn plain_text_passes_through() {
        let result = sanitize("Schöne Wohnung in Mitte");
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.sanitized_text, "Schöne Wohnung in Mitte");
    }

    #[test]
    fn script_block_is_stripped_and_rejected() {
        let result = sanitize("hello <script>alert(1)</script> world");
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec![DANGEROUS_CONTENT_ERROR.to_string()]);
        assert!(!result.sanitized_text.contains("<script"));
        assert!(!result.sanitized_text.contains("alert(1)"));
    }

    #[test]
    fn unclosed_script_tag_is_stripped() {
        let result = sanitize("<SCRIPT src=x.js>");
        assert!(!result.is_valid);
        assert!(!result.sanitized_text.to_lowercase().contains("script"));
    }

    #[test]
    fn iframe_and_object_tags_are_rejected() {
        for input in [
            "<iframe src=\"https://evil.example\"></iframe>",
            "<object data=\"x\"></object>",
            "<embed src=\"x\">",
            "<link rel=\"stylesheet\" href=\"x\">",
            "<meta http-equiv=\"refresh\">",
            "<style>body{}</style>",
        ] {
            let result = sanitize(input);
            assert!(!result.is_valid, "expected rejection for {}", input);
        }
    }

    #[test]
    fn javascript_uri_is_stripped() {
        let result = sanitize("click javascript:alert(1)");
        assert!(!result.is_valid);
        assert!(!result.sanitized_text.contains("javascript:"));
    }

    #[test]
    fn vbscript_and_data_uris_are_stripped() {
        assert!(!sanitize("vbscript:msgbox(1)").is_valid);
        assert!(!sanitize("data:text/html,<b>x</b>").is_valid);
    }

    #[test]
    fn inline_handlers_are_stripped() {
        let result = sanitize("<img src=x onerror=alert(1)>");
        assert!(!result.is_valid);
        assert!(!result.sanitized_text.contains("onerror"));
    }

    #[test]
    fn handler_pattern_needs_word_boundary() {
        // "Saison=" must not trip the on\w+= pattern
        let result = sanitize("Saison 2026");
        assert!(result.is_valid);
    }

    #[test]
    fn specials_are_entity_encoded() {
        let result = sanitize("a & b < c > d \" e ' f ` g = h / i");
        assert_eq!(
            result.sanitized_text,
            "a &amp; b &lt; c &gt; d &quot; e &#x27; f &#x60; g &#x3D; h &#x2F; i"
        );
        assert!(result.is_valid);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "plain text",
            "a & b < c",
            "<script>alert(1)</script>",
            "<b>bold</b> & <i>italic</i>",
            "Tom & Jerry's \"house\" = 1/2",
            "&amp; already encoded &lt;",
        ];
        let sanitizer = sanitizer();
        for input in inputs {
            let once = sanitizer.sanitize(input, &SanitizeOptions::default());
            let twice = sanitizer.sanitize(&once.sanitized_text, &SanitizeOptions::default());
            assert_eq!(
                once.sanitized_text, twice.sanitized_text,
                "not idempotent for {:?}",
                input
            );
            assert!(twice.is_valid);
        }
    }

    #[test]
    fn max_length_truncates_after_sanitization() {
        let options = SanitizeOptions {
            max_length: Some(10),
            ..SanitizeOptions::default()
        };
        let result = sanitizer().sanitize("abcdefghijklmnop", &options);
        assert_eq!(result.sanitized_text.chars().count(), 10);
        assert!(result.is_valid);

        // Encoding happens first, so the budget applies to the encoded text.
        let result = sanitizer().sanitize("&&&&", &options);
        assert!(result.sanitized_text.chars().count() <= 10);
    }

    #[test]
    fn strip_tags_removes_tag_spans() {
        let options = SanitizeOptions {
            strip_tags: true,
            ..SanitizeOptions::default()
        };
        let result = sanitizer().sanitize("<b>bold</b> text", &options);
        assert_eq!(result.sanitized_text, "bold text");
        assert!(result.is_valid);
    }

    #[test]
    fn strip_tags_keeps_allowed_tags() {
        let options = SanitizeOptions {
            strip_tags: true,
            allowed_tags: vec!["b".to_string()],
            ..SanitizeOptions::default()
        };
        let sanitizer = sanitizer();
        let result = sanitizer.sanitize("<b>bold</b> <i>italic</i>", &options);
        assert_eq!(result.sanitized_text, "<b>bold</b> italic");

        // Preserved tags must survive a second pass unchanged.
        let twice = sanitizer.sanitize(&result.sanitized_text, &options);
        assert_eq!(twice.sanitized_text, result.sanitized_text);
    }

    #[test]
    fn empty_input_is_valid() {
        let result = sanitize("");
        assert!(result.is_valid);
        assert_eq!(result.sanitized_text, "");
    }
}
