/// Per-step result classification for the lifecycle flows. The fatal versus
/// best-effort split from the error taxonomy is carried as data so the
/// orchestrator can thread a single report through every step instead of
/// scattering catch points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Warning(String),
    Fatal(String),
}

impl StepOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StepOutcome::Fatal(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One recorded step of a flow run.
pub struct StepRecord {
    pub step: &'static str,
    pub outcome: StepOutcome,
}

/// Accumulated result of one flow invocation. Only a fatal step fails the
/// invocation; warnings are reported but leave the terminal state intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowReport {
    pub steps: Vec<StepRecord>,
    pub url: Option<String>,
}

impl FlowReport {
    pub fn record(&mut self, step: &'static str, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn warnings(&self) -> Vec<&StepRecord> {
        self.steps
            .iter()
            .filter(|record| matches!(record.outcome, StepOutcome::Warning(_)))
            .collect()
    }

    pub fn fatal(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.outcome.is_fatal())
    }

    pub fn succeeded(&self) -> bool {
        self.fatal().is_none()
    }
}

/// Per-record outcome of a deletion fan-out. One failing deletion never
/// hides the outcome of the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped_production: Vec<String>,
}

impl DeletionReport {
    pub fn summary(&self) -> String {
        format!(
            "deleted {} deployment(s), {} failed, {} production record(s) kept",
            self.deleted.len(),
            self.failed.len(),
            self.skipped_production.len()
        )
    }
}
