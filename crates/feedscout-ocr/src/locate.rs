use feedscout_types::{Rect, normalize_text};

use crate::response::{OcrResult, OcrToken};

/// Centre of the best token span spelling `target`, divided by `scale`.
///
/// Spans are consecutive boxed tokens on one line whose normalized
/// concatenation contains the normalized target. The span with the highest
/// mean confidence wins; earlier spans win ties.
pub fn locate_text(result: &OcrResult, target: &str, scale: f32) -> Option<(i32, i32)> {
    let needle = normalize_text(target);
    if needle.is_empty() {
        return None;
    }
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let boxed: Vec<(&OcrToken, Rect)> = result
        .tokens
        .iter()
        .filter_map(|token| token.bbox.map(|bbox| (token, bbox)))
        .collect();

    let mut best: Option<(f32, Rect)> = None;
    for line in boxed.chunk_by(|a, b| a.0.line == b.0.line) {
        for start in 0..line.len() {
            let mut joined = String::new();
            let mut span = line[start].1;
            let mut conf_sum = 0.0f32;
            for (offset, (token, bbox)) in line[start..].iter().enumerate() {
                joined.push_str(&normalize_text(&token.text));
                span = span.union(bbox);
                conf_sum += token.conf;
                if joined.contains(&needle) {
                    let mean = conf_sum / (offset + 1) as f32;
                    if best.is_none_or(|(best_conf, _)| mean > best_conf) {
                        best = Some((mean, span));
                    }
                    break;
                }
            }
        }
    }

    best.map(|(_, span)| {
        let cx = (span.left + span.right) as f32 / 2.0 / scale;
        let cy = (span.top + span.bottom) as f32 / 2.0 / scale;
        (cx as i32, cy as i32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, conf: f32, left: i32, top: i32, width: i32, line: u32) -> OcrToken {
        OcrToken::new(text, conf).with_bbox(Rect::from_size(left, top, width, 10), line)
    }

    #[test]
    fn split_tokens_resolve_to_their_union_centre() {
        let result = OcrResult::from_tokens(vec![
            token("大", 80.0, 20, 10, 10, 1),
            token("模型", 85.0, 30, 10, 20, 1),
        ]);
        assert_eq!(locate_text(&result, "大模型", 2.0), Some((17, 7)));
    }

    #[test]
    fn higher_confidence_span_wins() {
        let result = OcrResult::from_tokens(vec![
            token("大", 30.0, 10, 10, 10, 1),
            token("模型", 30.0, 30, 10, 20, 1),
            token("大", 90.0, 110, 40, 10, 2),
            token("模型", 90.0, 130, 40, 20, 2),
        ]);
        assert_eq!(locate_text(&result, "大模型", 1.0), Some((130, 45)));
    }

    #[test]
    fn spans_never_cross_lines() {
        let result = OcrResult::from_tokens(vec![
            token("大", 90.0, 10, 10, 10, 1),
            token("模型", 90.0, 10, 30, 20, 2),
        ]);
        assert_eq!(locate_text(&result, "大模型", 1.0), None);
        assert_eq!(locate_text(&result, "  ", 1.0), None);
    }
}
