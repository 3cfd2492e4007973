use std::fmt;

use feedscout_comparator::{image_signature, key_signature, text_signature};
use feedscout_layout::PageLayout;
use feedscout_ocr::{OcrEngine, OcrRequest, OcrResult, locate_text};
use feedscout_types::{LumaFrame, PostCard, Rect};
use serde::Deserialize;

use crate::debounce::{ConfirmState, ConfirmationDebouncer, confirm_key};
use crate::matcher::{MatchThresholds, match_keywords};
use crate::store::ProcessedSignatureStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub match_confirm_frames: u32,
    /// Analysis passes at startup during which nothing is opened.
    pub grace_iterations: u32,
    /// Grid size in pixels used to quantize fallback click positions.
    pub position_quantum: i32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            match_confirm_frames: 2,
            grace_iterations: 3,
            position_quantum: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    GracePeriod { remaining: u32 },
    Unconfirmed { count: u32, required: u32 },
    AlreadyProcessed,
    NoMatch,
    /// Cards were found but none is fully visible.
    NoCompleteCards,
    /// A keyword matched the content band but could not be placed on screen.
    Unlocated { keyword: String },
}

impl SkipReason {
    /// Whether the page has nothing left to offer and should be scrolled.
    pub fn wants_scroll(&self) -> bool {
        matches!(
            self,
            SkipReason::AlreadyProcessed
                | SkipReason::NoMatch
                | SkipReason::NoCompleteCards
                | SkipReason::Unlocated { .. }
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::GracePeriod { remaining } => {
                write!(f, "startup grace period ({remaining} passes left)")
            }
            SkipReason::Unconfirmed { count, required } => {
                write!(f, "waiting for confirmation ({count}/{required})")
            }
            SkipReason::AlreadyProcessed => f.write_str("matching items already processed"),
            SkipReason::NoMatch => f.write_str("no keyword match"),
            SkipReason::NoCompleteCards => f.write_str("no complete cards"),
            SkipReason::Unlocated { keyword } => {
                write!(f, "keyword '{keyword}' matched but was not located")
            }
        }
    }
}

/// An item confirmed for opening.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTarget {
    /// Click position in capture coordinates.
    pub point: (i32, i32),
    pub signature: String,
    pub key: String,
    pub title: String,
    pub keywords: Vec<String>,
    /// Absent in fallback mode.
    pub card: Option<PostCard>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Open(OpenTarget),
    Skip(SkipReason),
}

/// Decision state carried between analysis passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionState {
    pub confirm: ConfirmState,
    pub analysis_passes: u32,
}

impl DecisionState {
    /// Drops the pending candidate after an item was opened.
    pub fn after_open(self) -> Self {
        Self {
            confirm: ConfirmState::default(),
            ..self
        }
    }
}

/// Turns one analyzed page into an open or skip decision.
pub struct Decider {
    keywords: Vec<String>,
    thresholds: MatchThresholds,
    debouncer: ConfirmationDebouncer,
    grace_iterations: u32,
    position_quantum: i32,
}

impl Decider {
    pub fn new(keywords: Vec<String>, thresholds: MatchThresholds, config: &DecisionConfig) -> Self {
        Self {
            keywords,
            thresholds,
            debouncer: ConfirmationDebouncer::new(config.match_confirm_frames),
            grace_iterations: config.grace_iterations,
            position_quantum: config.position_quantum.max(1),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn decide(
        &self,
        frame: &LumaFrame,
        layout: &PageLayout,
        content: &Rect,
        engine: &dyn OcrEngine,
        store: &ProcessedSignatureStore,
        state: DecisionState,
    ) -> (DecisionState, Decision) {
        let passes = state.analysis_passes.saturating_add(1);
        let state = DecisionState {
            analysis_passes: passes,
            ..state
        };

        let candidate = if layout.cards.is_empty() {
            self.content_candidate(frame, content, engine, store)
        } else {
            self.card_candidate(frame, layout, engine, store)
        };
        let target = match candidate {
            Ok(target) => target,
            Err(reason) => return (state, Decision::Skip(reason)),
        };

        let (confirm, ready) = self.debouncer.update(state.confirm, &target.key);
        let state = DecisionState { confirm, ..state };

        if passes <= self.grace_iterations {
            let remaining = self.grace_iterations - passes;
            return (state, Decision::Skip(SkipReason::GracePeriod { remaining }));
        }
        if !ready {
            let reason = SkipReason::Unconfirmed {
                count: state.confirm.pending_count,
                required: self.debouncer.required_frames(),
            };
            return (state, Decision::Skip(reason));
        }
        (state, Decision::Open(target))
    }

    /// First complete card, top to bottom, whose title matches a keyword and
    /// whose signature is not yet in the store.
    fn card_candidate(
        &self,
        frame: &LumaFrame,
        layout: &PageLayout,
        engine: &dyn OcrEngine,
        store: &ProcessedSignatureStore,
    ) -> Result<OpenTarget, SkipReason> {
        let mut complete = 0usize;
        let mut already_processed = false;
        for card in layout.complete_cards() {
            complete += 1;
            let ocr = recognize(engine, frame, card.title_rect);
            let keywords = match_keywords(&ocr, &self.keywords, &self.thresholds);
            if keywords.is_empty() {
                continue;
            }

            let mut signature = text_signature(&ocr.text);
            if signature.is_empty() {
                signature = frame
                    .crop(&card.rect)
                    .map(|patch| image_signature(&patch))
                    .unwrap_or_default();
            }
            if store.seen(&signature) {
                log::debug!("card {} already processed", card.rect);
                already_processed = true;
                continue;
            }

            let key = confirm_key(&signature, &ocr.text);
            return Ok(OpenTarget {
                point: card.click_rect.center(),
                signature,
                key,
                title: ocr.text,
                keywords,
                card: Some(card.clone()),
            });
        }

        if complete == 0 {
            Err(SkipReason::NoCompleteCards)
        } else if already_processed {
            Err(SkipReason::AlreadyProcessed)
        } else {
            Err(SkipReason::NoMatch)
        }
    }

    /// Keyword search over the whole content band when segmentation found
    /// nothing. The key is built from the quantized on-screen position so
    /// small OCR jitter maps to the same candidate.
    fn content_candidate(
        &self,
        frame: &LumaFrame,
        content: &Rect,
        engine: &dyn OcrEngine,
        store: &ProcessedSignatureStore,
    ) -> Result<OpenTarget, SkipReason> {
        let ocr = recognize(engine, frame, *content);
        let keywords = match_keywords(&ocr, &self.keywords, &self.thresholds);
        let Some(keyword) = keywords.first().cloned() else {
            return Err(SkipReason::NoMatch);
        };
        let Some((x, y)) = locate_text(&ocr, &keyword, 1.0) else {
            return Err(SkipReason::Unlocated { keyword });
        };
        let point = (x + content.left, y + content.top);

        let quantum = self.position_quantum;
        let key = format!(
            "pos:{keyword}@{},{}",
            point.0.div_euclid(quantum),
            point.1.div_euclid(quantum)
        );
        let signature = key_signature(&key);
        if store.seen(&signature) {
            return Err(SkipReason::AlreadyProcessed);
        }
        Ok(OpenTarget {
            point,
            signature,
            key,
            title: keyword,
            keywords,
            card: None,
        })
    }
}

/// Recognition failures count as an empty read.
fn recognize(engine: &dyn OcrEngine, frame: &LumaFrame, region: Rect) -> OcrResult {
    match engine.recognize(&OcrRequest::new(frame, region)) {
        Ok(result) => result,
        Err(err) => {
            log::debug!("{} ocr failed on {region}: {err}", engine.name());
            OcrResult::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use feedscout_ocr::{OcrError, OcrToken};
    use feedscout_types::Column;

    use super::*;

    /// Returns a fixed result per requested region and fails elsewhere.
    struct ScriptedEngine {
        script: Vec<(Rect, OcrResult)>,
    }

    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResult, OcrError> {
            self.script
                .iter()
                .find(|(region, _)| *region == request.region())
                .map(|(_, result)| result.clone())
                .ok_or_else(|| OcrError::backend("unscripted region"))
        }
    }

    fn frame() -> LumaFrame {
        LumaFrame::from_owned(400, 800, 400, vec![255; 400 * 800]).unwrap()
    }

    fn card(top: i32) -> PostCard {
        let rect = Rect::new(10, top, 190, top + 300);
        PostCard {
            rect,
            image_rect: Some(Rect::new(10, top, 190, top + 200)),
            title_rect: Rect::new(10, top + 200, 190, top + 260),
            meta_rect: Some(Rect::new(10, top + 260, 190, top + 300)),
            click_rect: rect,
            column: Column::Left,
        }
    }

    fn layout(cards: Vec<PostCard>, complete: Vec<bool>) -> PageLayout {
        PageLayout { cards, complete }
    }

    fn title(text: &str) -> OcrResult {
        OcrResult::from_tokens(vec![OcrToken::new(text, 90.0)])
    }

    fn decider(confirm: u32, grace: u32) -> Decider {
        let config = DecisionConfig {
            match_confirm_frames: confirm,
            grace_iterations: grace,
            position_quantum: 40,
        };
        Decider::new(vec!["大模型".into()], MatchThresholds::default(), &config)
    }

    const CONTENT: Rect = Rect::new(0, 100, 400, 700);

    #[test]
    fn matching_card_opens_after_confirmation() {
        let first = card(120);
        let engine = ScriptedEngine {
            script: vec![(first.title_rect, title("美团大模型算法岗"))],
        };
        let page = layout(vec![first.clone()], vec![true]);
        let store = ProcessedSignatureStore::in_memory(10);
        let decider = decider(2, 0);
        let frame = frame();

        let (state, decision) =
            decider.decide(&frame, &page, &CONTENT, &engine, &store, DecisionState::default());
        assert_eq!(
            decision,
            Decision::Skip(SkipReason::Unconfirmed {
                count: 1,
                required: 2
            })
        );

        let (state, decision) = decider.decide(&frame, &page, &CONTENT, &engine, &store, state);
        let Decision::Open(target) = decision else {
            panic!("expected an open decision, got {decision:?}");
        };
        assert_eq!(target.point, first.click_rect.center());
        assert_eq!(target.keywords, vec!["大模型"]);
        assert_eq!(target.signature, text_signature("美团大模型算法岗"));
        assert_eq!(target.key, target.signature[..12]);
        assert_eq!(target.card, Some(first));
        assert_eq!(state.analysis_passes, 2);
        assert_eq!(state.after_open().confirm, ConfirmState::default());
    }

    #[test]
    fn grace_period_wins_while_the_debouncer_keeps_counting() {
        let first = card(120);
        let engine = ScriptedEngine {
            script: vec![(first.title_rect, title("大模型"))],
        };
        let page = layout(vec![first], vec![true]);
        let store = ProcessedSignatureStore::in_memory(10);
        let decider = decider(2, 1);
        let frame = frame();

        let (state, decision) =
            decider.decide(&frame, &page, &CONTENT, &engine, &store, DecisionState::default());
        assert_eq!(
            decision,
            Decision::Skip(SkipReason::GracePeriod { remaining: 0 })
        );
        assert_eq!(state.confirm.pending_count, 1);

        let (_, decision) = decider.decide(&frame, &page, &CONTENT, &engine, &store, state);
        assert!(matches!(decision, Decision::Open(_)));
    }

    #[test]
    fn processed_and_incomplete_cards_are_skipped() {
        let first = card(120);
        let second = card(430);
        let engine = ScriptedEngine {
            script: vec![
                (first.title_rect, title("大模型 一")),
                (second.title_rect, title("大模型 二")),
            ],
        };
        let mut store = ProcessedSignatureStore::in_memory(10);
        store.mark(&text_signature("大模型 一"));
        let decider = decider(1, 0);
        let frame = frame();

        let page = layout(vec![first.clone(), second.clone()], vec![true, true]);
        let (_, decision) =
            decider.decide(&frame, &page, &CONTENT, &engine, &store, DecisionState::default());
        let Decision::Open(target) = decision else {
            panic!("expected the second card to open");
        };
        assert_eq!(target.card.map(|c| c.rect), Some(second.rect));

        let page = layout(vec![first.clone(), second], vec![true, false]);
        let (_, decision) =
            decider.decide(&frame, &page, &CONTENT, &engine, &store, DecisionState::default());
        assert_eq!(decision, Decision::Skip(SkipReason::AlreadyProcessed));

        let page = layout(vec![first], vec![false]);
        let (_, decision) =
            decider.decide(&frame, &page, &CONTENT, &engine, &store, DecisionState::default());
        assert_eq!(decision, Decision::Skip(SkipReason::NoCompleteCards));
        assert!(SkipReason::NoCompleteCards.wants_scroll());
    }

    #[test]
    fn ocr_failure_reads_as_no_match() {
        let engine = ScriptedEngine { script: Vec::new() };
        let page = layout(vec![card(120)], vec![true]);
        let store = ProcessedSignatureStore::in_memory(10);
        let (state, decision) = decider(1, 0).decide(
            &frame(),
            &page,
            &CONTENT,
            &engine,
            &store,
            DecisionState::default(),
        );
        assert_eq!(decision, Decision::Skip(SkipReason::NoMatch));
        assert_eq!(state.confirm, ConfirmState::default());
    }

    #[test]
    fn empty_page_falls_back_to_a_position_key() {
        let band = OcrResult::from_tokens(vec![
            OcrToken::new("招聘", 90.0).with_bbox(Rect::new(20, 40, 60, 60), 1),
            OcrToken::new("大模型", 90.0).with_bbox(Rect::new(100, 200, 160, 220), 2),
        ]);
        let engine = ScriptedEngine {
            script: vec![(CONTENT, band)],
        };
        let mut store = ProcessedSignatureStore::in_memory(10);
        let decider = decider(1, 0);
        let frame = frame();
        let page = PageLayout::default();

        let (_, decision) =
            decider.decide(&frame, &page, &CONTENT, &engine, &store, DecisionState::default());
        let Decision::Open(target) = decision else {
            panic!("expected a fallback open");
        };
        assert_eq!(target.point, (130, 310));
        assert_eq!(target.key, "pos:大模型@3,7");
        assert_eq!(target.signature, key_signature("pos:大模型@3,7"));
        assert!(target.card.is_none());

        store.mark(&target.signature);
        let (_, decision) =
            decider.decide(&frame, &page, &CONTENT, &engine, &store, DecisionState::default());
        assert_eq!(decision, Decision::Skip(SkipReason::AlreadyProcessed));
    }

    #[test]
    fn position_keys_with_similar_digits_stay_distinct() {
        let content = Rect::new(0, 0, 1080, 1920);
        let at = |bbox: Rect| ScriptedEngine {
            script: vec![(
                content,
                OcrResult::from_tokens(vec![OcrToken::new("大模型", 90.0).with_bbox(bbox, 1)]),
            )],
        };
        let decider = decider(1, 0);
        let frame = frame();
        let page = PageLayout::default();
        let mut store = ProcessedSignatureStore::in_memory(10);

        let (_, decision) = decider.decide(
            &frame,
            &page,
            &content,
            &at(Rect::new(50, 930, 70, 950)),
            &store,
            DecisionState::default(),
        );
        let Decision::Open(first) = decision else {
            panic!("expected a fallback open, got {decision:?}");
        };
        assert_eq!(first.key, "pos:大模型@1,23");
        store.mark(&first.signature);

        let (_, decision) = decider.decide(
            &frame,
            &page,
            &content,
            &at(Rect::new(490, 130, 510, 150)),
            &store,
            DecisionState::default(),
        );
        let Decision::Open(second) = decision else {
            panic!("a different position must not read as processed, got {decision:?}");
        };
        assert_eq!(second.key, "pos:大模型@12,3");
        assert_ne!(second.signature, first.signature);
    }
}
