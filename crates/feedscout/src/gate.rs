use feedscout_comparator::StabilityReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateState {
    /// The current page was analyzed and has not changed since.
    pub analyzed: bool,
    /// Frames observed without settling since the last analysis.
    pub waited: u32,
}

impl GateState {
    /// Allows the unchanged page to be analyzed once more.
    pub fn rearm(self) -> Self {
        Self {
            analyzed: false,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Analyze,
    /// The page never settled within the wait budget.
    ForceAnalyze,
    SkipUnsettled,
    SkipAlreadyAnalyzed,
}

impl GateDecision {
    pub fn should_analyze(self) -> bool {
        matches!(self, GateDecision::Analyze | GateDecision::ForceAnalyze)
    }
}

/// Decides when a captured frame is worth segmenting: once per settled page,
/// or after `max_wait_frames` frames when the page keeps moving.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisGate {
    max_wait_frames: u32,
}

impl AnalysisGate {
    pub fn new(max_wait_frames: u32) -> Self {
        Self { max_wait_frames }
    }

    pub fn decide(&self, state: GateState, report: &StabilityReport) -> (GateState, GateDecision) {
        if report.settled {
            if state.analyzed {
                return (state, GateDecision::SkipAlreadyAnalyzed);
            }
            let next = GateState {
                analyzed: true,
                waited: 0,
            };
            return (next, GateDecision::Analyze);
        }

        // Anything short of a stable frame means the page changed.
        let analyzed = state.analyzed && report.stable;
        let waited = state.waited.saturating_add(1);
        if !analyzed && self.max_wait_frames > 0 && waited >= self.max_wait_frames {
            let next = GateState {
                analyzed: true,
                waited: 0,
            };
            return (next, GateDecision::ForceAnalyze);
        }
        (GateState { analyzed, waited }, GateDecision::SkipUnsettled)
    }
}
