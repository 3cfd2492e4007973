use feedscout_types::{Rect, cjk_ratio};
use serde::{Deserialize, Serialize};

/// A recognized word or glyph run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrToken {
    pub text: String,
    /// Confidence in `[0, 100]`; negative when the provider reports none.
    pub conf: f32,
    /// Box in the coordinates of the image handed to the provider.
    #[serde(default)]
    pub bbox: Option<Rect>,
    #[serde(default)]
    pub line: u32,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, conf: f32) -> Self {
        Self {
            text: text.into(),
            conf,
            bbox: None,
            line: 0,
        }
    }

    pub fn with_bbox(mut self, bbox: Rect, line: u32) -> Self {
        self.bbox = Some(bbox);
        self.line = line;
        self
    }
}

/// Text of one recognized region with its confidence summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub avg_conf: f32,
    pub tokens: Vec<OcrToken>,
    pub cjk_ratio: f32,
}

impl OcrResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the summary from tokens. Tokens sharing a line are joined with
    /// spaces and lines with newlines; tokens without confidence do not
    /// count towards the average.
    pub fn from_tokens(tokens: Vec<OcrToken>) -> Self {
        let mut text = String::new();
        let mut current_line = None;
        for token in tokens.iter().filter(|t| !t.text.trim().is_empty()) {
            match current_line {
                Some(line) if line == token.line => text.push(' '),
                Some(_) => text.push('\n'),
                None => {}
            }
            text.push_str(token.text.trim());
            current_line = Some(token.line);
        }

        let confs: Vec<f32> = tokens
            .iter()
            .filter(|t| !t.text.trim().is_empty() && t.conf >= 0.0)
            .map(|t| t.conf)
            .collect();
        let avg_conf = if confs.is_empty() {
            0.0
        } else {
            confs.iter().sum::<f32>() / confs.len() as f32
        };

        Self {
            cjk_ratio: cjk_ratio(&text),
            text,
            avg_conf,
            tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
