use crate::admission::{AdmissionFilter, Decision};
use crate::config::{AdmissionConfig, Limits, TimeoutConfig};
use crate::error::Stage;
use crate::model::{self, FinalReport, GapReport, SuggestedTask, SynthesisEntry, SynthesisMap};
use crate::prompts;
use crate::storage::{self, RunBundle, RunStore};
use crate::task::{AddOutcome, TaskStore};
use crate::{Error, Result};
use agent::{ContentGenerator, Evidence, Retriever, with_timeout};
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Generator = Arc<dyn ContentGenerator + Send + Sync>;
type EvidenceSource = Arc<dyn Retriever + Send + Sync>;

/// Why the iteration loop stopped. None of these are errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    NoSuggestions,
    GapDetectionFailed,
    Converged,
    TaskLimit,
    IterationLimit,
}

/// Mutable state of a single run. Never shared between runs.
struct RunState {
    tasks: TaskStore,
    synthesis: SynthesisMap,
    iteration: usize,
    gaps: Option<GapReport>,
}

impl RunState {
    fn new(max_total_tasks: usize) -> Self {
        Self {
            tasks: TaskStore::new(max_total_tasks),
            synthesis: SynthesisMap::new(),
            iteration: 0,
            gaps: None,
        }
    }

    fn pending(&self) -> Vec<String> {
        self.tasks
            .descriptions()
            .filter(|d| !self.synthesis.contains_key(*d))
            .map(String::from)
            .collect()
    }
}

struct Findings {
    evidence: Vec<Evidence>,
    entry: SynthesisEntry,
}

/// Result of researching one task within a round.
struct TaskOutcome {
    description: String,
    result: Result<Findings>,
}

pub struct Controller {
    generator: Generator,
    retriever: EvidenceSource,
    limits: Limits,
    filter: AdmissionFilter,
    timeouts: TimeoutConfig,
    output_dir: PathBuf,
}

impl Controller {
    pub async fn run(&self, topic: &str) -> Result<FinalReport> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::InvalidInput("topic must not be empty".to_string()));
        }

        let slug = storage::slug(topic);
        if slug.is_empty() {
            return Err(Error::InvalidInput(format!(
                "topic '{topic}' does not yield a usable folder name"
            )));
        }

        let store = RunStore::open(&self.output_dir, &slug)?;
        info!(topic, dir = %store.dir().display(), "research run started");

        let mut state = RunState::new(self.limits.max_total_tasks);

        self.seed(topic, &mut state).await?;
        store.write_tasks(state.tasks.tasks())?;

        let reason = self.iterate(&mut state, &store).await?;
        info!(
            ?reason,
            iterations = state.iteration,
            tasks = state.tasks.len(),
            synthesized = state.synthesis.len(),
            "research loop finished"
        );

        let report = self.report(topic, &state).await?;
        store.write_report(&report)?;
        info!(dir = %store.dir().display(), "research run complete");

        Ok(report)
    }

    /// Reads back the persisted outputs of the latest run for `topic`.
    pub fn load_bundle(&self, topic: &str) -> Result<Option<RunBundle>> {
        RunStore::locate(&self.output_dir, &storage::slug(topic.trim())).load_bundle()
    }

    async fn seed(&self, topic: &str, state: &mut RunState) -> Result<()> {
        let request = prompts::seed(topic)?;
        let value = with_timeout(self.timeouts.generation(), self.generator.generate(&request))
            .await
            .map_err(|err| Error::upstream(Stage::Seeding, err))?;

        let drafts = model::seed_tasks(value).map_err(|err| Error::upstream(Stage::Seeding, err))?;

        for task in drafts {
            if state.tasks.add(task) == AddOutcome::Full {
                warn!("task limit reached while seeding");
                break;
            }
        }

        if state.tasks.is_empty() {
            return Err(Error::upstream(Stage::Seeding, "no tasks were generated"));
        }

        info!(tasks = state.tasks.len(), "seeded task list");
        Ok(())
    }

    async fn iterate(&self, state: &mut RunState, store: &RunStore) -> Result<StopReason> {
        while state.iteration < self.limits.max_iterations {
            state.iteration += 1;
            let iteration = state.iteration;
            info!(iteration, "iteration started");

            let batch = self.research_pending(state).await;
            let retrieval = absorb(state, batch);

            store.write_retrieval(&retrieval)?;
            store.write_synthesis(&state.synthesis)?;
            store.write_tasks(state.tasks.tasks())?;

            if state.synthesis.is_empty() {
                return Err(Error::NoEvidence);
            }

            let value = match self.detect_gaps(&state.synthesis).await {
                Ok(value) => value,
                Err(err) => {
                    store.write_gaps(&failure_record(&err))?;
                    let err = Error::upstream(Stage::GapDetection, err);
                    warn!(iteration, error = %err, "ending iterations early");
                    return Ok(StopReason::GapDetectionFailed);
                }
            };
            store.write_gaps(&value)?;

            let Some(gaps) = GapReport::from_value(value) else {
                warn!(iteration, "gap report has an unexpected shape, ending iterations");
                return Ok(StopReason::GapDetectionFailed);
            };

            if gaps.suggested_tasks.is_empty() {
                info!(iteration, "no new tasks suggested");
                state.gaps = Some(gaps);
                return Ok(StopReason::NoSuggestions);
            }

            let admitted = self.admit(state, &gaps.suggested_tasks);
            state.gaps = Some(gaps);

            if admitted == 0 {
                return Ok(if state.tasks.is_full() {
                    StopReason::TaskLimit
                } else {
                    StopReason::Converged
                });
            }

            store.write_tasks(state.tasks.tasks())?;
            info!(iteration, admitted, total = state.tasks.len(), "task list expanded");
        }

        Ok(StopReason::IterationLimit)
    }

    /// Retrieval and synthesis for every task without a synthesis entry.
    /// Failures are collected, not propagated.
    async fn research_pending(&self, state: &RunState) -> Vec<TaskOutcome> {
        let mut batch = Vec::new();
        for description in state.pending() {
            let result = self.research_task(&description).await;
            batch.push(TaskOutcome {
                description,
                result,
            });
        }
        batch
    }

    async fn research_task(&self, description: &str) -> Result<Findings> {
        let evidence = with_timeout(
            self.timeouts.retrieval(),
            self.retriever.retrieve(description),
        )
        .await
        .map_err(|source| Error::Retrieval {
            task: description.to_string(),
            source,
        })?;
        debug!(task = description, hits = evidence.len(), "evidence retrieved");

        let synthesis_failed = |reason: String| Error::Synthesis {
            task: description.to_string(),
            reason,
        };

        let request = prompts::synthesis(description, &evidence)
            .map_err(|err| synthesis_failed(err.to_string()))?;
        let value = with_timeout(self.timeouts.generation(), self.generator.generate(&request))
            .await
            .map_err(|err| synthesis_failed(err.to_string()))?;

        let entry = serde_json::from_value(value).map_err(|err| synthesis_failed(err.to_string()))?;

        Ok(Findings { evidence, entry })
    }

    async fn detect_gaps(&self, synthesis: &SynthesisMap) -> agent::Result<Value> {
        let request = prompts::gaps(synthesis)?;
        with_timeout(self.timeouts.generation(), self.generator.generate(&request)).await
    }

    /// Offers suggestions to the admission filter in order, re-deriving the
    /// existing descriptions after each admission. Returns the number admitted.
    fn admit(&self, state: &mut RunState, suggestions: &[SuggestedTask]) -> usize {
        let mut admitted = 0;

        for candidate in suggestions {
            if admitted >= self.limits.max_new_tasks_per_iter {
                break;
            }
            if state.tasks.is_full() {
                info!("task limit reached");
                break;
            }

            let existing: Vec<&str> = state.tasks.descriptions().collect();
            match self.filter.evaluate(candidate, &existing) {
                Decision::Admit(task) => {
                    let description = task.description.clone();
                    if state.tasks.add(task) == AddOutcome::Added {
                        admitted += 1;
                        info!(task = %description, "new task admitted");
                    }
                }
                Decision::Reject(reason) => {
                    info!(task = %candidate.description, ?reason, "suggested task rejected");
                }
            }
        }

        admitted
    }

    async fn report(&self, topic: &str, state: &RunState) -> Result<FinalReport> {
        let request = prompts::report(topic, &state.synthesis, state.gaps.as_ref())?;
        let value = with_timeout(self.timeouts.generation(), self.generator.generate(&request))
            .await
            .map_err(|err| Error::upstream(Stage::Report, err))?;

        FinalReport::from_value(value).map_err(|err| Error::upstream(Stage::Report, err))
    }
}

/// Folds a round's outcomes into the run state. Entries are write-once per
/// description. Returns the evidence gathered for newly synthesized tasks.
fn absorb(state: &mut RunState, batch: Vec<TaskOutcome>) -> IndexMap<String, Vec<Evidence>> {
    let mut retrieval = IndexMap::new();

    for TaskOutcome {
        description,
        result,
    } in batch
    {
        if !state.tasks.contains(&description) {
            warn!(task = %description, "outcome for a task that was never admitted, dropped");
            continue;
        }

        match result {
            Ok(Findings { evidence, entry }) => match state.synthesis.entry(description.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                    state.tasks.mark_synthesized(&description);
                    retrieval.insert(description, evidence);
                }
                Entry::Occupied(_) => {
                    debug!(task = %description, "synthesis already recorded, keeping first");
                }
            },
            Err(err) => {
                warn!(iteration = state.iteration, error = %err, "task skipped this round");
            }
        }
    }

    retrieval
}

fn failure_record(err: &agent::Error) -> Value {
    match err {
        agent::Error::ParseError(parse) => parse.to_value(),
        other => json!({
            "error": "generation_failed",
            "detail": other.to_string(),
        }),
    }
}

pub struct ControllerBuilder {
    generator: Option<Generator>,
    retriever: Option<EvidenceSource>,
    output_dir: Option<PathBuf>,
    limits: Limits,
    admission: AdmissionConfig,
    timeouts: TimeoutConfig,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            generator: None,
            retriever: None,
            output_dir: None,
            limits: Limits::default(),
            admission: AdmissionConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    pub fn generator(mut self, generator: Generator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn retriever(mut self, retriever: EvidenceSource) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn admission(mut self, admission: AdmissionConfig) -> Self {
        self.admission = admission;
        self
    }

    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn build(self) -> Result<Controller> {
        if self.limits.max_iterations == 0 || self.limits.max_total_tasks == 0 {
            return Err(Error::InvalidInput(
                "max_iterations and max_total_tasks must be at least 1".to_string(),
            ));
        }

        Ok(Controller {
            generator: self.generator.ok_or(Error::MissingArg(
                "generator is required for controller".to_string(),
            ))?,
            retriever: self.retriever.ok_or(Error::MissingArg(
                "retriever is required for controller".to_string(),
            ))?,
            output_dir: self.output_dir.ok_or(Error::MissingArg(
                "output_dir is required for controller".to_string(),
            ))?,
            filter: AdmissionFilter::new(&self.admission, self.limits.max_total_tasks),
            limits: self.limits,
            timeouts: self.timeouts,
        })
    }
}
