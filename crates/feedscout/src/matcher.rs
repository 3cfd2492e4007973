use feedscout_ocr::OcrResult;
use feedscout_types::{contains_cjk, normalize_text};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    pub min_avg_conf: f32,
    pub min_token_conf: f32,
    pub min_cjk_ratio: f32,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            min_avg_conf: 55.0,
            min_token_conf: 60.0,
            min_cjk_ratio: 0.02,
        }
    }
}

/// Keywords found in `ocr`, in keyword order, returned trimmed.
///
/// One or two ASCII characters need a confident token that spells the keyword
/// exactly. Longer keywords match as substrings of the normalized text; CJK
/// ones are gated on the CJK share of the text, the rest on average
/// confidence.
pub fn match_keywords<S: AsRef<str>>(
    ocr: &OcrResult,
    keywords: &[S],
    thresholds: &MatchThresholds,
) -> Vec<String> {
    let text = normalize_text(&ocr.text);
    let mut matched = Vec::new();
    for keyword in keywords {
        let trimmed = keyword.as_ref().trim();
        let needle = normalize_text(trimmed);
        if needle.is_empty() {
            continue;
        }

        let short_ascii = needle.is_ascii() && needle.chars().count() <= 2;
        let hit = if short_ascii {
            ocr.avg_conf >= thresholds.min_avg_conf
                && ocr.tokens.iter().any(|token| {
                    token.conf >= thresholds.min_token_conf && normalize_text(&token.text) == needle
                })
                && (ocr.cjk_ratio >= thresholds.min_cjk_ratio
                    || needle.chars().all(char::is_alphabetic))
        } else if !text.contains(&needle) {
            false
        } else if contains_cjk(&needle) {
            ocr.cjk_ratio >= thresholds.min_cjk_ratio
        } else {
            ocr.avg_conf >= thresholds.min_avg_conf
        };

        if hit {
            matched.push(trimmed.to_string());
        }
    }
    matched
}
