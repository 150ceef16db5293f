//! Bounded generate → analyze → evaluate → perturb loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::generator::generate_initial;
use super::perturb::{propose, Perturbation};
use crate::analyzer::Analyzer;
use crate::config::PipelineConfig;
use crate::domain::{
    AnalysisResult, ArchitectureSnapshot, DesignError, QualityReport, Requirements, Result,
};
use crate::evaluator::QualityEvaluator;
use crate::obs;

/// Phase trace of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Generated,
    Analyzed,
    Evaluated,
    Improving,
    Converged,
    Terminated,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    IterationCap,
    LocalOptimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    Converged,
    Terminated { reason: TerminationReason },
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::Terminated {
                reason: TerminationReason::IterationCap,
            } => "terminated(iteration_cap)",
            Self::Terminated {
                reason: TerminationReason::LocalOptimum,
            } => "terminated(local_optimum)",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluated candidate. Iteration 0 is the generated design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub snapshot: ArchitectureSnapshot,
    pub analysis: AnalysisResult,
    pub quality: QualityReport,
    /// Move that produced this candidate from the previous one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perturbation: Option<Perturbation>,
}

/// Complete, auditable record of one optimization session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSession {
    pub session_id: Uuid,
    pub requirements: Requirements,
    pub outcome: SessionOutcome,
    /// Index into `history` of the best candidate seen.
    pub best_index: usize,
    pub history: Vec<IterationRecord>,
    pub phases: Vec<SessionPhase>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OptimizationSession {
    pub fn best(&self) -> &IterationRecord {
        &self.history[self.best_index]
    }

    pub fn initial(&self) -> &IterationRecord {
        &self.history[0]
    }

    /// Perturbation iterations run after the initial evaluation.
    pub fn iterations(&self) -> u32 {
        self.history.len().saturating_sub(1) as u32
    }

    /// Compact description stored alongside lifecycle entries.
    pub fn summary(&self) -> serde_json::Value {
        let best = self.best();
        serde_json::json!({
            "session_id": self.session_id.to_string(),
            "outcome": self.outcome.as_str(),
            "iterations": self.iterations(),
            "best_iteration": best.iteration,
            "best_revision": best.snapshot.revision(),
            "best_snapshot_id": best.snapshot.id().to_string(),
            "best_overall": best.analysis.overall,
            "initial_overall": self.initial().analysis.overall,
            "verdict": best.quality.verdict,
        })
    }
}

/// Generator plus optimization loop, with the analyzer and evaluator as
/// oracles.
pub struct Designer {
    config: PipelineConfig,
    analyzer: Analyzer,
    evaluator: QualityEvaluator,
}

impl Designer {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: Analyzer::from_config(&config),
            evaluator: QualityEvaluator::new(config.quality.clone()),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn evaluator(&self) -> &QualityEvaluator {
        &self.evaluator
    }

    pub fn generate_initial(&self, requirements: &Requirements, seed: u64) -> Result<ArchitectureSnapshot> {
        generate_initial(requirements, &self.config.generator, seed)
    }

    /// Generate an initial design from `seed` and optimize it.
    ///
    /// Fails with `SessionCancelled` if `cancel` fires before the initial
    /// design exists; later cancellation yields a `Cancelled` outcome that
    /// still carries the best candidate.
    pub fn optimize(
        &self,
        requirements: &Requirements,
        seed: u64,
        cancel: &CancellationToken,
    ) -> Result<OptimizationSession> {
        let session_id = Uuid::new_v4();
        if cancel.is_cancelled() {
            obs::emit_session_cancelled(&session_id.to_string(), 0);
            return Err(DesignError::SessionCancelled {
                session_id: session_id.to_string(),
            });
        }
        let initial = self.generate_initial(requirements, seed)?;
        Ok(self.run_session(session_id, requirements, initial, cancel))
    }

    /// Optimize a caller-supplied starting design.
    ///
    /// The initial design already exists, so cancellation never fails the
    /// call: the design is still evaluated and returned as the best-so-far.
    pub fn optimize_from(
        &self,
        requirements: &Requirements,
        initial: ArchitectureSnapshot,
        cancel: &CancellationToken,
    ) -> Result<OptimizationSession> {
        requirements.validate()?;
        Ok(self.run_session(Uuid::new_v4(), requirements, initial, cancel))
    }

    fn evaluate(
        &self,
        iteration: u32,
        snapshot: ArchitectureSnapshot,
        requirements: &Requirements,
        perturbation: Option<Perturbation>,
        phases: &mut Vec<SessionPhase>,
    ) -> IterationRecord {
        let analysis = self.analyzer.analyze(&snapshot, requirements);
        phases.push(SessionPhase::Analyzed);
        let quality = self.evaluator.evaluate(&analysis, &snapshot);
        phases.push(SessionPhase::Evaluated);
        IterationRecord {
            iteration,
            snapshot,
            analysis,
            quality,
            perturbation,
        }
    }

    fn run_session(
        &self,
        session_id: Uuid,
        requirements: &Requirements,
        initial: ArchitectureSnapshot,
        cancel: &CancellationToken,
    ) -> OptimizationSession {
        let sid = session_id.to_string();
        let _span = obs::SessionSpan::enter(&sid);
        let opts = &self.config.optimizer;
        let started_at = Utc::now();

        obs::emit_session_started(&sid, initial.id().as_str(), opts.max_iterations);

        let mut phases = vec![SessionPhase::Generated];
        let first = self.evaluate(0, initial, requirements, None, &mut phases);
        obs::emit_iteration_evaluated(
            &sid,
            0,
            first.snapshot.revision(),
            first.analysis.overall,
            first.quality.passed(),
        );
        let mut history = vec![first];
        let mut best_index = 0usize;
        let mut stalls = 0u32;

        let outcome = loop {
            let current = &history[history.len() - 1];
            if current.quality.passed() {
                phases.push(SessionPhase::Converged);
                break SessionOutcome::Converged;
            }
            let iteration = current.iteration;
            if iteration >= opts.max_iterations {
                phases.push(SessionPhase::Terminated);
                break SessionOutcome::Terminated {
                    reason: TerminationReason::IterationCap,
                };
            }
            if stalls >= opts.stall_limit {
                phases.push(SessionPhase::Terminated);
                break SessionOutcome::Terminated {
                    reason: TerminationReason::LocalOptimum,
                };
            }

            phases.push(SessionPhase::Improving);
            if cancel.is_cancelled() {
                obs::emit_session_cancelled(&sid, iteration);
                phases.push(SessionPhase::Cancelled);
                break SessionOutcome::Cancelled;
            }

            let Some((next, perturbation)) =
                propose(&current.snapshot, &current.analysis, requirements, opts)
            else {
                tracing::debug!(session_id = %sid, iteration, "no applicable perturbation");
                phases.push(SessionPhase::Terminated);
                break SessionOutcome::Terminated {
                    reason: TerminationReason::LocalOptimum,
                };
            };
            tracing::debug!(
                session_id = %sid,
                iteration = iteration + 1,
                action = ?perturbation.action,
                rationale = %perturbation.rationale,
                "perturbation applied"
            );

            phases.push(SessionPhase::Generated);
            let record = self.evaluate(iteration + 1, next, requirements, Some(perturbation), &mut phases);
            obs::emit_iteration_evaluated(
                &sid,
                record.iteration,
                record.snapshot.revision(),
                record.analysis.overall,
                record.quality.passed(),
            );

            if is_stall(current.analysis.overall, record.analysis.overall, opts.epsilon) {
                stalls += 1;
            } else {
                stalls = 0;
            }
            if is_better(&record, &history[best_index]) {
                best_index = history.len();
            }
            history.push(record);
        };

        let session = OptimizationSession {
            session_id,
            requirements: requirements.clone(),
            outcome,
            best_index,
            history,
            phases,
            started_at,
            finished_at: Utc::now(),
        };
        obs::emit_session_finished(
            &sid,
            session.outcome.as_str(),
            session.iterations(),
            session.best().analysis.overall,
        );
        session
    }
}

/// An iteration stalls when it gains less than `epsilon` over the one
/// before it. A recovery after a dip counts as progress even if it does not
/// beat the best so far.
fn is_stall(previous_overall: f64, overall: f64, epsilon: f64) -> bool {
    overall - previous_overall < epsilon
}

/// Higher overall score wins, so the best never regresses below the
/// initial design. On an exact tie a passing candidate replaces a failing
/// one.
fn is_better(candidate: &IterationRecord, best: &IterationRecord) -> bool {
    let (c, b) = (candidate.analysis.overall, best.analysis.overall);
    c > b || (c == b && candidate.quality.passed() && !best.quality.passed())
}
