use feedscout_layout::{CardExtractor, LayoutConfig, WaterfallSegmenter};
use feedscout_types::{Column, LumaFrame, Rect};

const WIDTH: usize = 400;
const HEIGHT: usize = 800;

struct Canvas {
    data: Vec<u8>,
}

impl Canvas {
    fn white() -> Self {
        Self {
            data: vec![255; WIDTH * HEIGHT],
        }
    }

    fn fill(&mut self, rect: Rect, value: u8) {
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                self.data[y as usize * WIDTH + x as usize] = value;
            }
        }
    }

    /// Filled block with a two pixel outline, like a card on a light page.
    fn block(&mut self, rect: Rect, outline: u8, inner: u8) {
        self.fill(rect, outline);
        self.fill(
            Rect::new(rect.left + 2, rect.top + 2, rect.right - 2, rect.bottom - 2),
            inner,
        );
    }

    fn frame(self) -> LumaFrame {
        LumaFrame::from_owned(WIDTH as u32, HEIGHT as u32, WIDTH, self.data).unwrap()
    }
}

fn content() -> Rect {
    Rect::new(0, 100, WIDTH as i32, 700)
}

#[test]
fn separated_blocks_yield_one_card_each() {
    let mut canvas = Canvas::white();
    canvas.block(Rect::new(20, 120, 180, 220), 0, 100);
    canvas.block(Rect::new(20, 320, 180, 500), 0, 100);
    canvas.block(Rect::new(220, 150, 380, 350), 0, 100);
    let frame = canvas.frame();

    let config = LayoutConfig::default();
    let boxes = WaterfallSegmenter::new(&config).segment(&frame, &content());
    assert_eq!(boxes.len(), 3, "boxes: {boxes:?}");

    let left: Vec<_> = boxes.iter().filter(|b| b.column == Column::Left).collect();
    let right: Vec<_> = boxes.iter().filter(|b| b.column == Column::Right).collect();
    assert_eq!(left.len(), 2);
    assert_eq!(right.len(), 1);
    assert!(left[0].rect.bottom < left[1].rect.top);
    assert!(left[0].rect.top <= 120 && left[0].rect.bottom >= 220);
    assert!(right[0].rect.left >= 200 && right[0].rect.right <= 400);

    let tops: Vec<i32> = boxes.iter().map(|b| b.rect.top).collect();
    let mut sorted = tops.clone();
    sorted.sort();
    assert_eq!(tops, sorted);
}

#[test]
fn merged_blocks_split_at_the_whitespace_band() {
    let mut canvas = Canvas::white();
    canvas.block(Rect::new(20, 120, 180, 360), 0, 100);
    canvas.block(Rect::new(20, 376, 180, 616), 0, 100);
    let frame = canvas.frame();

    let config = LayoutConfig::default();
    let boxes = WaterfallSegmenter::new(&config).segment(&frame, &content());
    assert_eq!(boxes.len(), 2, "boxes: {boxes:?}");
    for b in &boxes {
        assert_eq!(b.column, Column::Left);
        assert!(b.rect.height() >= config.min_card_height as i32);
        assert!(b.rect.width() as f32 >= 200.0 * config.min_card_width_ratio);
    }
    assert_eq!(boxes[0].rect.bottom, boxes[1].rect.top);
    assert!((360..376).contains(&boxes[0].rect.bottom));
}

#[test]
fn split_depth_limit_is_respected() {
    let mut canvas = Canvas::white();
    canvas.block(Rect::new(20, 120, 180, 360), 0, 100);
    canvas.block(Rect::new(20, 376, 180, 616), 0, 100);
    let frame = canvas.frame();

    let config = LayoutConfig {
        max_split_depth: 0,
        ..LayoutConfig::default()
    };
    let boxes = WaterfallSegmenter::new(&config).segment(&frame, &content());
    assert_eq!(boxes.len(), 1);
}

#[test]
fn blank_page_has_no_cards() {
    let frame = Canvas::white().frame();
    let config = LayoutConfig::default();
    assert!(WaterfallSegmenter::new(&config).segment(&frame, &content()).is_empty());
}

#[test]
fn drawn_card_resolves_into_a_complete_stack() {
    let mut canvas = Canvas::white();
    let card = Rect::new(20, 150, 180, 550);
    canvas.block(card, 120, 255);
    for y in 2..260 {
        for x in 2..158 {
            let value = ((x * 7 + y * 13) % 256) as u8;
            canvas.data[(card.top + y) as usize * WIDTH + (card.left + x) as usize] = value;
        }
    }
    for (top, bottom) in [(290, 310), (320, 340), (360, 380)] {
        for y in top..bottom {
            for x in (6..154).filter(|x| x % 4 < 2) {
                canvas.data[(card.top + y) as usize * WIDTH + (card.left + x) as usize] = 0;
            }
        }
    }
    let frame = canvas.frame();

    let extractor = CardExtractor::new(LayoutConfig::default()).unwrap();
    let layout = extractor.extract_in(&frame, &content());
    assert_eq!(layout.cards.len(), 1, "cards: {:?}", layout.cards);

    let found = &layout.cards[0];
    assert_eq!(found.column, Column::Left);
    assert_eq!(found.click_rect, found.rect);
    assert!(layout.complete[0], "card should be complete: {found:?}");

    let image = found.image_rect.unwrap();
    let meta = found.meta_rect.unwrap();
    assert!(image.bottom <= card.top + 290);
    assert!(found.title_rect.bottom >= card.top + 340);
    assert!(meta.top <= card.top + 360);
    assert_eq!(layout.complete_cards().count(), 1);
}
