use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use feedscout::backend::{CaptureError, FrameSource, InjectedAction, LoggingInjector};
use feedscout::decision::DecisionConfig;
use feedscout::matcher::MatchThresholds;
use feedscout::settings::{EffectiveSettings, LoopSettings, StabilitySettings};
use feedscout::{Pipeline, RunEnd};
use feedscout_layout::LayoutConfig;
use feedscout_ocr::{OcrEngine, OcrError, OcrRequest, OcrResult, OcrToken};
use feedscout_types::{LumaFrame, Rect};

const WIDTH: u32 = 400;
const HEIGHT: u32 = 800;

struct ScriptedSource {
    frames: VecDeque<LumaFrame>,
}

impl ScriptedSource {
    fn blank(count: usize) -> Self {
        let frame = LumaFrame::from_owned(
            WIDTH,
            HEIGHT,
            WIDTH as usize,
            vec![245; (WIDTH * HEIGHT) as usize],
        )
        .unwrap();
        Self {
            frames: std::iter::repeat_n(frame, count).collect(),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn capture(&mut self) -> Result<Option<LumaFrame>, CaptureError> {
        Ok(self.frames.pop_front())
    }
}

/// Reads a keyword off the list page and a dated body off any whole-frame
/// request.
struct FeedEngine;

impl OcrEngine for FeedEngine {
    fn name(&self) -> &'static str {
        "feed"
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResult, OcrError> {
        if request.region() == request.frame().bounds() {
            return Ok(OcrResult::from_tokens(vec![
                OcrToken::new("大模型算法工程师", 92.0).with_bbox(Rect::new(0, 0, 200, 30), 1),
                OcrToken::new("昨天 18:30", 88.0).with_bbox(Rect::new(0, 40, 120, 60), 2),
            ]));
        }
        Ok(OcrResult::from_tokens(vec![
            OcrToken::new("招聘", 90.0).with_bbox(Rect::new(20, 40, 60, 60), 1),
            OcrToken::new("大模型", 90.0).with_bbox(Rect::new(100, 200, 160, 220), 2),
        ]))
    }
}

/// Counts the list-page reads served by [`FeedEngine`].
#[derive(Default)]
struct CountingEngine {
    list_reads: AtomicUsize,
}

impl OcrEngine for CountingEngine {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResult, OcrError> {
        if request.region() != request.frame().bounds() {
            self.list_reads.fetch_add(1, Ordering::SeqCst);
        }
        FeedEngine.recognize(request)
    }
}

fn settings(dir: &Path) -> EffectiveSettings {
    EffectiveSettings {
        keywords: vec!["大模型".to_string()],
        replay_dir: dir.join("unused"),
        store_path: dir.join("processed.json"),
        output_dir: dir.join("posts"),
        processed_store_max: 100,
        layout: LayoutConfig::default(),
        matcher: MatchThresholds::default(),
        stability: StabilitySettings {
            list_min_stable_frames: 1,
            ..StabilitySettings::default()
        },
        decision: DecisionConfig {
            match_confirm_frames: 1,
            grace_iterations: 0,
            position_quantum: 40,
        },
        run: LoopSettings {
            poll_interval_ms: 1,
            open_settle_ms: 0,
            back_settle_ms: 0,
            scroll_settle_ms: 0,
            max_scroll_retries: 1,
        },
        max_iterations: None,
        config_path: None,
    }
}

#[tokio::test]
async fn opens_once_then_scrolls_to_the_end_of_the_feed() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    // list, list, detail, list, list, two unchanged frames after scrolling
    let source = ScriptedSource::blank(7);
    let mut pipeline =
        Pipeline::new(&settings, source, LoggingInjector::new(), Arc::new(FeedEngine)).unwrap();

    let summary = pipeline.run(std::future::pending::<()>()).await.unwrap();
    assert_eq!(summary.end, RunEnd::EndOfFeed);
    assert_eq!(summary.opened, 1);
    assert_eq!(summary.iterations, 4);

    let content = Rect::new(0, 120, 400, 720);
    assert_eq!(
        pipeline.injector().actions(),
        &[
            InjectedAction::Click { x: 130, y: 330 },
            InjectedAction::Back,
            InjectedAction::Scroll { region: content },
            InjectedAction::Scroll { region: content },
        ]
    );

    let records: Vec<_> = std::fs::read_dir(dir.path().join("posts"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(records.len(), 1);
    let record: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&records[0]).unwrap()).unwrap();
    assert_eq!(record["keywords_matched"][0], "大模型");
    assert!(record["content"].as_str().unwrap().contains("大模型算法工程师"));
    assert!(record["published_at"].as_str().unwrap().ends_with("18:30:00"));
    assert!(record["column"].is_null());

    let stored: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("processed.json")).unwrap())
            .unwrap();
    assert_eq!(stored["seen"].as_array().unwrap().len(), 1);
    assert_eq!(pipeline.store().len(), 1);
}

#[tokio::test]
async fn exhausted_source_ends_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let mut pipeline = Pipeline::new(
        &settings,
        ScriptedSource::blank(0),
        LoggingInjector::new(),
        Arc::new(FeedEngine),
    )
    .unwrap();
    let summary = pipeline.run(std::future::pending::<()>()).await.unwrap();
    assert_eq!(summary.end, RunEnd::TargetLost);
    assert_eq!(summary.iterations, 1);
    assert!(pipeline.injector().actions().is_empty());
}

#[tokio::test]
async fn shutdown_and_iteration_limit_stop_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    let mut pipeline = Pipeline::new(
        &settings,
        ScriptedSource::blank(5),
        LoggingInjector::new(),
        Arc::new(FeedEngine),
    )
    .unwrap();
    let summary = pipeline.run(std::future::ready(())).await.unwrap();
    assert_eq!(summary.end, RunEnd::Interrupted);
    assert_eq!(summary.iterations, 1);

    settings.max_iterations = Some(1);
    let mut pipeline = Pipeline::new(
        &settings,
        ScriptedSource::blank(5),
        LoggingInjector::new(),
        Arc::new(FeedEngine),
    )
    .unwrap();
    let summary = pipeline.run(std::future::pending::<()>()).await.unwrap();
    assert_eq!(summary.end, RunEnd::IterationLimit);
    assert_eq!(summary.iterations, 1);
}

#[tokio::test]
async fn pending_candidate_is_analyzed_again_on_the_unchanged_page() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path());
    settings.decision.match_confirm_frames = 2;
    settings.decision.grace_iterations = 1;

    // Stop right before the click would happen: one pass in grace, nothing sent.
    settings.max_iterations = Some(2);
    let engine = Arc::new(CountingEngine::default());
    let mut pipeline = Pipeline::new(
        &settings,
        ScriptedSource::blank(8),
        LoggingInjector::new(),
        engine.clone(),
    )
    .unwrap();
    let summary = pipeline.run(std::future::pending::<()>()).await.unwrap();
    assert_eq!(summary.end, RunEnd::IterationLimit);
    assert_eq!(summary.opened, 0);
    assert_eq!(engine.list_reads.load(Ordering::SeqCst), 1);
    assert!(pipeline.injector().actions().is_empty());

    // list (unsettled), list (grace), list (confirmed, open), detail, list,
    // list (processed), two unchanged frames after scrolling
    settings.max_iterations = None;
    let engine = Arc::new(CountingEngine::default());
    let mut pipeline = Pipeline::new(
        &settings,
        ScriptedSource::blank(8),
        LoggingInjector::new(),
        engine.clone(),
    )
    .unwrap();
    let summary = pipeline.run(std::future::pending::<()>()).await.unwrap();
    assert_eq!(summary.end, RunEnd::EndOfFeed);
    assert_eq!(summary.opened, 1);
    assert_eq!(summary.iterations, 5);
    // Two reads of the same page before the open, one after returning.
    assert_eq!(engine.list_reads.load(Ordering::SeqCst), 3);

    let content = Rect::new(0, 120, 400, 720);
    assert_eq!(
        pipeline.injector().actions(),
        &[
            InjectedAction::Click { x: 130, y: 330 },
            InjectedAction::Back,
            InjectedAction::Scroll { region: content },
            InjectedAction::Scroll { region: content },
        ]
    );
    assert_eq!(pipeline.store().len(), 1);
}
