use feedscout_types::{LumaFrame, PostCard, Rect};

use crate::{
    AnatomyOutcome, CardAnatomyResolver, CompletenessValidator, LayoutConfig, LayoutError,
    SafeArea, SafeAreaCalculator, WaterfallSegmenter,
};

/// One analysis pass over a frame: every card found, and which of them are
/// safe to act on.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub cards: Vec<PostCard>,
    pub complete: Vec<bool>,
}

impl PageLayout {
    pub fn complete_cards(&self) -> impl Iterator<Item = &PostCard> {
        self.cards
            .iter()
            .zip(&self.complete)
            .filter_map(|(card, ok)| ok.then_some(card))
    }
}

/// Runs segmentation, anatomy and completeness on a captured frame.
pub struct CardExtractor {
    config: LayoutConfig,
}

impl CardExtractor {
    /// Rejects configurations the stages cannot run with, such as inverted
    /// height bounds.
    pub fn new(config: LayoutConfig) -> Result<Self, LayoutError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn safe_area(&self, frame: &LumaFrame) -> SafeArea {
        SafeAreaCalculator::from_config(&self.config).compute(frame.width(), frame.height())
    }

    pub fn extract(&self, frame: &LumaFrame) -> (SafeArea, PageLayout) {
        let area = self.safe_area(frame);
        let layout = self.extract_in(frame, &area.content);
        (area, layout)
    }

    pub fn extract_in(&self, frame: &LumaFrame, content: &Rect) -> PageLayout {
        let segmenter = WaterfallSegmenter::new(&self.config);
        let resolver = CardAnatomyResolver::new(&self.config);
        let validator = CompletenessValidator::new(&self.config);

        let mut layout = PageLayout::default();
        for segmented in segmenter.segment(frame, content) {
            let rect = segmented.rect;
            let outcome = resolver.resolve(frame, &rect);
            if let AnatomyOutcome::Degraded { reason } = &outcome {
                log::debug!("card {rect} degraded: {reason}");
            }
            let anatomy = outcome.into_anatomy(rect);
            let card = PostCard {
                rect,
                image_rect: anatomy.image_rect,
                title_rect: anatomy.title_rect,
                meta_rect: anatomy.meta_rect,
                click_rect: rect
                    .intersect(content)
                    .unwrap_or(Rect::new(rect.left, rect.top, rect.left, rect.top)),
                column: segmented.column,
            };
            let verdict = validator.check(&card, content);
            if let Err(reason) = &verdict {
                log::debug!("card {rect} ({}) incomplete: {reason}", card.column.as_str());
            }
            layout.complete.push(verdict.is_ok());
            layout.cards.push(card);
        }
        layout
    }
}
