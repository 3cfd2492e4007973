use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use feedscout_comparator::{StabilityMonitor, StabilityState};
use feedscout_layout::{CardExtractor, LayoutError};
use feedscout_ocr::{OcrEngine, OcrRequest, OcrResult};
use feedscout_types::{LumaFrame, Rect};
use indicatif::ProgressBar;
use thiserror::Error;

use crate::backend::{CaptureError, FrameSource, InjectError, InputInjector};
use crate::decision::{Decider, Decision, DecisionState, OpenTarget};
use crate::gate::{AnalysisGate, GateDecision, GateState};
use crate::records::{CollectedPost, RecordWriter, format_timestamp, parse_time};
use crate::settings::{EffectiveSettings, LoopSettings};
use crate::store::ProcessedSignatureStore;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Inject(#[from] InjectError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The capture source stopped delivering frames.
    TargetLost,
    /// Scrolling no longer changes the page.
    EndOfFeed,
    Interrupted,
    IterationLimit,
}

impl fmt::Display for RunEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunEnd::TargetLost => "target lost",
            RunEnd::EndOfFeed => "end of feed",
            RunEnd::Interrupted => "interrupted",
            RunEnd::IterationLimit => "iteration limit reached",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub opened: u64,
    pub end: RunEnd,
}

enum ScrollOutcome {
    Moved,
    NoEffect,
    TargetLost,
}

/// The poll-driven loop. All cross-iteration state lives in [`Pipeline::run`]
/// and is threaded through the step functions explicitly.
pub struct Pipeline<S, I> {
    source: S,
    injector: I,
    engine: Arc<dyn OcrEngine>,
    extractor: CardExtractor,
    monitor: StabilityMonitor,
    gate: AnalysisGate,
    decider: Decider,
    store: ProcessedSignatureStore,
    records: RecordWriter,
    pacing: LoopSettings,
    max_iterations: Option<u64>,
    progress: ProgressBar,
}

impl<S: FrameSource, I: InputInjector> Pipeline<S, I> {
    pub fn new(
        settings: &EffectiveSettings,
        source: S,
        injector: I,
        engine: Arc<dyn OcrEngine>,
    ) -> Result<Self, PipelineError> {
        let stability = &settings.stability;
        Ok(Self {
            source,
            injector,
            engine,
            extractor: CardExtractor::new(settings.layout.clone())?,
            monitor: StabilityMonitor::new(
                stability.thumbnail_width,
                stability.thumbnail_height,
                stability.list_page_stable_threshold,
                stability.list_min_stable_frames,
            ),
            gate: AnalysisGate::new(stability.max_wait_frames),
            decider: Decider::new(
                settings.keywords.clone(),
                settings.matcher,
                &settings.decision,
            ),
            store: ProcessedSignatureStore::load(&settings.store_path, settings.processed_store_max),
            records: RecordWriter::new(&settings.output_dir),
            pacing: settings.run,
            max_iterations: settings.max_iterations,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    pub fn store(&self) -> &ProcessedSignatureStore {
        &self.store
    }

    /// Runs until the target is lost, the feed ends, the iteration limit is
    /// hit or `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunSummary, PipelineError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let poll = Duration::from_millis(self.pacing.poll_interval_ms);

        let mut stability = StabilityState::default();
        let mut gate_state = GateState::default();
        let mut decision_state = DecisionState::default();
        let mut iterations = 0u64;
        let mut opened = 0u64;

        let end = loop {
            if self.max_iterations.is_some_and(|limit| iterations >= limit) {
                break RunEnd::IterationLimit;
            }
            iterations += 1;
            self.progress.inc(1);

            let Some(frame) = self.source.capture()? else {
                log::error!("target window lost after {iterations} iterations");
                break RunEnd::TargetLost;
            };

            let (next, report) = self.monitor.observe(stability, Some(&frame));
            stability = next;
            let (next, gate_decision) = self.gate.decide(gate_state, &report);
            gate_state = next;

            match gate_decision {
                GateDecision::SkipUnsettled => {
                    log::debug!("page unstable (diff {:?})", report.diff);
                }
                GateDecision::SkipAlreadyAnalyzed => {
                    log::debug!("page unchanged since last analysis");
                }
                GateDecision::ForceAnalyze => {
                    log::debug!("page never settled; analyzing anyway");
                }
                GateDecision::Analyze => {}
            }

            if gate_decision.should_analyze() {
                let (area, layout) = self.extractor.extract(&frame);
                log::debug!(
                    "analysis: {} cards, {} complete",
                    layout.cards.len(),
                    layout.complete_cards().count()
                );
                let (next, decision) = self.decider.decide(
                    &frame,
                    &layout,
                    &area.content,
                    self.engine.as_ref(),
                    &self.store,
                    decision_state,
                );
                decision_state = next;

                match decision {
                    Decision::Open(target) => {
                        let lost = !self.open(target).await?;
                        if lost {
                            log::error!("target window lost while reading a post");
                            break RunEnd::TargetLost;
                        }
                        opened += 1;
                        decision_state = decision_state.after_open();
                        stability = StabilityState::default();
                        gate_state = GateState::default();
                    }
                    Decision::Skip(reason) if reason.wants_scroll() => {
                        log::debug!("skip: {reason}");
                        match self.scroll(&frame, &area.content).await? {
                            ScrollOutcome::Moved => {
                                stability = StabilityState::default();
                                gate_state = GateState::default();
                            }
                            ScrollOutcome::NoEffect => {
                                log::info!("scrolling has no effect; reached the end of the feed");
                                break RunEnd::EndOfFeed;
                            }
                            ScrollOutcome::TargetLost => {
                                log::error!("target window lost while scrolling");
                                break RunEnd::TargetLost;
                            }
                        }
                    }
                    Decision::Skip(reason) => {
                        log::debug!("skip: {reason}");
                        // The candidate needs another look at the same page.
                        gate_state = gate_state.rearm();
                    }
                }
            }
            self.progress.set_message(format!("opened {opened}"));

            tokio::select! {
                biased;
                _ = &mut shutdown => break RunEnd::Interrupted,
                _ = tokio::time::sleep(poll) => {}
            }
        };

        self.store.save();
        log::info!("run finished: {end} after {iterations} iterations, {opened} opened");
        Ok(RunSummary {
            iterations,
            opened,
            end,
        })
    }

    /// Opens the item, records the detail page and navigates back. Returns
    /// `false` when the detail page could not be captured.
    async fn open(&mut self, target: OpenTarget) -> Result<bool, PipelineError> {
        let (x, y) = self.to_injection(target.point);
        log::info!(
            "opening '{}' at ({x}, {y}) for [{}]",
            target.title.replace('\n', " "),
            target.keywords.join(", ")
        );
        self.injector.click(x, y)?;
        self.settle(self.pacing.open_settle_ms).await;

        let Some(detail) = self.source.capture()? else {
            return Ok(false);
        };
        let content = recognize_whole(self.engine.as_ref(), &detail);
        let now = Local::now().naive_local();
        let published_at = content.text.lines().find_map(|line| parse_time(line, now));

        let post = CollectedPost {
            title: target.title,
            content: content.text,
            keywords_matched: target.keywords,
            signature: target.signature.clone(),
            column: target.card.as_ref().map(|card| card.column),
            rect: target.card.as_ref().map(|card| card.rect),
            published_at,
            scraped_at: format_timestamp(now),
        };
        if let Err(err) = self.records.write(&post).await {
            log::warn!("post not recorded: {err}");
        }

        self.store.mark(&target.signature);
        self.store.save();

        self.injector.back()?;
        self.settle(self.pacing.back_settle_ms).await;
        Ok(true)
    }

    /// Scrolls the content band and checks that the page moved, retrying up
    /// to `max_scroll_retries` times.
    async fn scroll(
        &mut self,
        before: &LumaFrame,
        content: &Rect,
    ) -> Result<ScrollOutcome, PipelineError> {
        let reference = self.monitor.thumbnail(before);
        let region = self.to_injection_rect(content);
        for attempt in 0..=self.pacing.max_scroll_retries {
            if attempt > 0 {
                log::info!("scroll had no visible effect; retry {attempt}");
            } else {
                log::info!("scrolling");
            }
            self.injector.scroll(&region)?;
            self.settle(self.pacing.scroll_settle_ms).await;

            let Some(after) = self.source.capture()? else {
                return Ok(ScrollOutcome::TargetLost);
            };
            if self.monitor.changed(&reference, &after) {
                return Ok(ScrollOutcome::Moved);
            }
        }
        Ok(ScrollOutcome::NoEffect)
    }

    async fn settle(&self, millis: u64) {
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn to_injection(&self, (x, y): (i32, i32)) -> (i32, i32) {
        let scale = self.source.scale();
        if scale > 0.0 && scale != 1.0 {
            ((x as f32 / scale).round() as i32, (y as f32 / scale).round() as i32)
        } else {
            (x, y)
        }
    }

    fn to_injection_rect(&self, rect: &Rect) -> Rect {
        let (left, top) = self.to_injection((rect.left, rect.top));
        let (right, bottom) = self.to_injection((rect.right, rect.bottom));
        Rect::new(left, top, right, bottom)
    }
}

fn recognize_whole(engine: &dyn OcrEngine, frame: &LumaFrame) -> OcrResult {
    match engine.recognize(&OcrRequest::whole(frame)) {
        Ok(result) => result,
        Err(err) => {
            log::warn!("{} ocr failed on the detail page: {err}", engine.name());
            OcrResult::empty()
        }
    }
}
