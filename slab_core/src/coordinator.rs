//! # Master Coordinator
//!
//! Drives one design run through a fixed state machine:
//!
//! ```text
//! Initialized -> Validating -> Executing -> Assembling -> Completed
//!                    |             |
//!                    +-------------+----> Aborted
//! ```
//!
//! Validation checks that every category has a parameter set and that the
//! shared geometry (`effectiveSpan`, `width`, `numberOfSpans`, `skewAngle`)
//! agrees with the project context everywhere it appears. Execution runs the
//! four analysis modules exactly once each in [`Category::ALL`] order, either
//! on the calling thread or on scoped threads joined before assembly. The
//! first module error in that order aborts the run; no partial record is
//! produced.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use slab_core::context::ProjectContext;
//! use slab_core::coordinator::{ExecutionMode, MasterCoordinator};
//!
//! let mut coordinator = MasterCoordinator::new(ExecutionMode::Sequential);
//! let sets = BTreeMap::new(); // one ParameterSet per category
//! match coordinator.run(ProjectContext::default(), sets) {
//!     Ok(record) => println!("{:?}", record.overall_status),
//!     Err(e) => eprintln!("{} ({})", e, e.error_code()),
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::category::Category;
use crate::cell::RawCell;
use crate::collaborators::{check_formats, DesignValidator, ReportFormat, ReportRenderer, ValidationOutcome};
use crate::context::{ProjectContext, SharedField};
use crate::errors::{DesignError, DesignResult};
use crate::file_io::write_atomic;
use crate::output::{OutputPathAllocator, OutputSlot};
use crate::parameters::ParameterSet;

/// Tolerance when comparing shared geometry across parameter sets.
const SHARED_FIELD_TOLERANCE: f64 = 1e-9;

/// Provided steel above this multiple of required steel is flagged.
const STEEL_OVERDESIGN_RATIO: f64 = 1.2;

/// Overturning factors of safety above this suggest a smaller base.
const GENEROUS_OVERTURNING_FS: f64 = 3.0;

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorState {
    Initialized,
    Validating,
    Executing,
    Assembling,
    Completed,
    Aborted,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinatorState::Initialized => "Initialized",
            CoordinatorState::Validating => "Validating",
            CoordinatorState::Executing => "Executing",
            CoordinatorState::Assembling => "Assembling",
            CoordinatorState::Completed => "Completed",
            CoordinatorState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// How the four modules are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Summary verdict of a design run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Pass,
    PassWithWarnings,
    Fail,
}

impl OverallStatus {
    /// `Fail` if any fatal check failed, else `PassWithWarnings` if anything
    /// warned, else `Pass`.
    pub fn assess<'a>(results: impl IntoIterator<Item = &'a AnalysisResult>) -> Self {
        let mut status = OverallStatus::Pass;
        for result in results {
            if result.has_fatal_failure() {
                return OverallStatus::Fail;
            }
            if !result.warnings.is_empty() {
                status = OverallStatus::PassWithWarnings;
            }
        }
        status
    }
}

/// Design advice drawn from module results, in execution order: material
/// and dimensional savings, then failed checks. A design with nothing to
/// flag gets a single go-ahead line.
pub fn recommendations<'a>(results: impl IntoIterator<Item = &'a AnalysisResult>) -> Vec<String> {
    let mut advice = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        let category = result.category;
        if let (Some(required), Some(provided)) = (result.get("steel_required"), result.get("steel_provided")) {
            if required > 0.0 && provided > required * STEEL_OVERDESIGN_RATIO {
                advice.push(format!(
                    "{category}: reduce steel reinforcement ({:.1}% above required)",
                    (provided - required) / required * 100.0
                ));
            }
        }
        if let Some(fs) = result.get("fs_overturning").filter(|fs| *fs > GENEROUS_OVERTURNING_FS) {
            advice.push(format!(
                "{category}: reduce base dimensions (overturning factor of safety {fs:.2} exceeds {GENEROUS_OVERTURNING_FS:.1})"
            ));
        }
        for check in result.checks.iter().filter(|c| !c.passed) {
            let severity = if check.fatal { "revise" } else { "review" };
            failures.push(format!(
                "{category}: {severity} design for {} ({:.3} against limit {:.3})",
                check.name, check.actual, check.limit
            ));
        }
    }
    advice.extend(failures);
    if advice.is_empty() {
        advice.push("Design is satisfactory; proceed with detailed design".to_string());
    }
    advice
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Pass => write!(f, "PASS"),
            OverallStatus::PassWithWarnings => write!(f, "PASS WITH WARNINGS"),
            OverallStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CoordinatorState,
    pub to: CoordinatorState,
    pub at: DateTime<Utc>,
}

/// The immutable outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRecord {
    pub id: Uuid,
    pub context: ProjectContext,
    pub results: BTreeMap<Category, AnalysisResult>,
    pub overall_status: OverallStatus,
    pub generated_at: DateTime<Utc>,
    /// Source cell of every workbook-derived input, per category
    pub provenance: BTreeMap<Category, BTreeMap<String, RawCell>>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl DesignRecord {
    /// Results in execution order.
    pub fn ordered_results(&self) -> impl Iterator<Item = &AnalysisResult> {
        Category::ALL.iter().filter_map(|c| self.results.get(c))
    }
}

/// Runs the analysis modules for one project and assembles the record.
#[derive(Debug)]
pub struct MasterCoordinator {
    mode: ExecutionMode,
    state: CoordinatorState,
    transitions: Vec<StateTransition>,
    record: Option<DesignRecord>,
}

impl Default for MasterCoordinator {
    fn default() -> Self {
        MasterCoordinator::new(ExecutionMode::default())
    }
}

impl MasterCoordinator {
    pub fn new(mode: ExecutionMode) -> Self {
        MasterCoordinator {
            mode,
            state: CoordinatorState::Initialized,
            transitions: Vec::new(),
            record: None,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// The record of a completed run.
    pub fn record(&self) -> Option<&DesignRecord> {
        self.record.as_ref()
    }

    /// Execute a full design run. May be called once per coordinator.
    pub fn run(
        &mut self,
        context: ProjectContext,
        parameter_sets: BTreeMap<Category, ParameterSet>,
    ) -> DesignResult<DesignRecord> {
        if self.state != CoordinatorState::Initialized {
            return Err(DesignError::InvalidState {
                expected: CoordinatorState::Initialized.to_string(),
                actual: self.state.to_string(),
            });
        }

        self.transition(CoordinatorState::Validating);
        if let Err(e) = validate_inputs(&context, &parameter_sets) {
            return Err(self.abort(e));
        }

        self.transition(CoordinatorState::Executing);
        let results = match execute(self.mode, &context, &parameter_sets) {
            Ok(results) => results,
            Err(e) => return Err(self.abort(e)),
        };

        self.transition(CoordinatorState::Assembling);
        let overall_status = OverallStatus::assess(results.values());
        let recommendations = recommendations(Category::ALL.iter().filter_map(|c| results.get(c)));
        let provenance = parameter_sets
            .into_iter()
            .map(|(category, set)| (category, set.source_cells))
            .collect();
        let record = DesignRecord {
            id: Uuid::new_v4(),
            context,
            results,
            overall_status,
            generated_at: Utc::now(),
            provenance,
            recommendations,
        };

        self.record = Some(record.clone());
        self.transition(CoordinatorState::Completed);
        tracing::info!(id = %record.id, status = %record.overall_status, "Design run completed");
        Ok(record)
    }

    fn transition(&mut self, to: CoordinatorState) {
        let from = self.state;
        tracing::info!(%from, %to, "Coordinator state change");
        self.transitions.push(StateTransition {
            from,
            to,
            at: Utc::now(),
        });
        self.state = to;
    }

    fn abort(&mut self, error: DesignError) -> DesignError {
        tracing::warn!(code = error.error_code(), error = %error, "Design run aborted");
        self.transition(CoordinatorState::Aborted);
        error
    }
}

fn validate_inputs(context: &ProjectContext, sets: &BTreeMap<Category, ParameterSet>) -> DesignResult<()> {
    for category in Category::ALL {
        let set = sets
            .get(&category)
            .ok_or(DesignError::MissingParameterSet { category })?;
        if set.category != category {
            return Err(DesignError::InconsistentContext {
                field: "category".to_string(),
                expected: category.label().to_string(),
                per_module: BTreeMap::from([(category.label().to_string(), set.category.label().to_string())]),
            });
        }
    }

    for shared in SharedField::ALL {
        let expected = shared.value(context);
        if !expected.is_finite() {
            return Err(not_finite("Project", shared, expected));
        }
        let mut per_module = BTreeMap::new();
        let mut conflict = false;
        for category in Category::ALL {
            let Some(value) = sets.get(&category).and_then(|s| s.get(shared.param_name())) else {
                continue;
            };
            if let Some(n) = value.as_number().filter(|n| !n.is_finite()) {
                return Err(not_finite(category.label(), shared, n));
            }
            let agrees = value
                .as_number()
                .is_some_and(|n| (n - expected).abs() <= SHARED_FIELD_TOLERANCE);
            conflict |= !agrees;
            per_module.insert(category.label().to_string(), value.to_string());
        }
        if conflict {
            return Err(DesignError::InconsistentContext {
                field: shared.display_name().to_string(),
                expected: expected.to_string(),
                per_module,
            });
        }
    }
    Ok(())
}

fn not_finite(module: &str, field: SharedField, value: f64) -> DesignError {
    DesignError::domain_value(module, field.display_name(), value.to_string(), "Must be a finite number")
}

fn execute(
    mode: ExecutionMode,
    context: &ProjectContext,
    sets: &BTreeMap<Category, ParameterSet>,
) -> DesignResult<BTreeMap<Category, AnalysisResult>> {
    let outcomes: Vec<(Category, DesignResult<AnalysisResult>)> = match mode {
        ExecutionMode::Sequential => Category::ALL
            .iter()
            .map(|&category| (category, run_module(category, sets, context)))
            .collect(),
        ExecutionMode::Parallel => thread::scope(|scope| {
            let handles: Vec<_> = Category::ALL
                .iter()
                .map(|&category| (category, scope.spawn(move || run_module(category, sets, context))))
                .collect();
            handles
                .into_iter()
                .map(|(category, handle)| {
                    let outcome = handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                    (category, outcome)
                })
                .collect()
        }),
    };

    let mut results = BTreeMap::new();
    for (category, outcome) in outcomes {
        results.insert(category, outcome?);
    }
    Ok(results)
}

fn run_module(
    category: Category,
    sets: &BTreeMap<Category, ParameterSet>,
    context: &ProjectContext,
) -> DesignResult<AnalysisResult> {
    let params = sets
        .get(&category)
        .ok_or(DesignError::MissingParameterSet { category })?;
    let result = category.compute(params, context)?;
    tracing::info!(%category, passed = result.passed, warnings = result.warnings.len(), "Module finished");
    Ok(result)
}

/// Allocate an output slot for `record`, render it and write it atomically.
pub fn write_artifact(
    record: &DesignRecord,
    renderer: &dyn ReportRenderer,
    format: ReportFormat,
    allocator: &OutputPathAllocator,
) -> DesignResult<OutputSlot> {
    let bytes = renderer.render(record, format)?;
    let slot = allocator.allocate(&record.context.bridge_type, renderer.extension(format))?;
    write_atomic(&slot.path, &bytes)?;
    tracing::info!(path = %slot.path.display(), bytes = bytes.len(), %format, "Artifact written");
    Ok(slot)
}

/// Write one artifact per format. Every format is checked against the
/// renderer before the first slot is allocated.
pub fn write_artifacts(
    record: &DesignRecord,
    renderer: &dyn ReportRenderer,
    formats: &[ReportFormat],
    allocator: &OutputPathAllocator,
) -> DesignResult<Vec<OutputSlot>> {
    check_formats(renderer, formats)?;
    formats
        .iter()
        .map(|format| write_artifact(record, renderer, *format, allocator))
        .collect()
}

/// Ask a validator about every result. The record itself is not touched.
pub fn review(record: &DesignRecord, validator: &dyn DesignValidator) -> BTreeMap<Category, ValidationOutcome> {
    record
        .results
        .iter()
        .map(|(category, result)| (*category, validator.validate(result, &record.context)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing_sets() -> BTreeMap<Category, ParameterSet> {
        BTreeMap::from([
            (
                Category::Stability,
                ParameterSet::new(Category::Stability)
                    .with_number("structure_height", 6.5)
                    .with_number("structure_width", 7.0)
                    .with_number("bearing_capacity", 450.0),
            ),
            (
                Category::Hydraulic,
                ParameterSet::new(Category::Hydraulic)
                    .with_number("discharge", 1000.0)
                    .with_number("hfl", 101.0)
                    .with_number("silt_factor", 1.5)
                    .with_number("bridge_opening", 150.0),
            ),
            (
                Category::CrossSection,
                ParameterSet::new(Category::CrossSection)
                    .with_number("slab_thickness", 0.75)
                    .with_number("carriageway_width", 7.5)
                    .with_number("footpath_width", 1.0),
            ),
            (
                Category::Abutment,
                ParameterSet::new(Category::Abutment)
                    .with_number("height", 6.5)
                    .with_number("bearing_capacity", 450.0),
            ),
        ])
    }

    fn states(coordinator: &MasterCoordinator) -> Vec<CoordinatorState> {
        coordinator.transitions().iter().map(|t| t.to).collect()
    }

    #[test]
    fn test_pass_scenario() {
        let mut coordinator = MasterCoordinator::default();
        let record = coordinator.run(ProjectContext::default(), passing_sets()).unwrap();

        assert_eq!(record.overall_status, OverallStatus::Pass);
        assert_eq!(record.results.len(), 4);
        assert!(record.results.values().all(|r| r.passed));
        assert_eq!(coordinator.state(), CoordinatorState::Completed);
        assert_eq!(
            states(&coordinator),
            vec![
                CoordinatorState::Validating,
                CoordinatorState::Executing,
                CoordinatorState::Assembling,
                CoordinatorState::Completed,
            ]
        );
        assert_eq!(coordinator.record(), Some(&record));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let ctx = ProjectContext::default();
        let seq = MasterCoordinator::new(ExecutionMode::Sequential)
            .run(ctx.clone(), passing_sets())
            .unwrap();
        let par = MasterCoordinator::new(ExecutionMode::Parallel)
            .run(ctx, passing_sets())
            .unwrap();
        assert_eq!(seq.results, par.results);
        assert_eq!(seq.overall_status, par.overall_status);
        assert_ne!(seq.id, par.id);
    }

    #[test]
    fn test_second_run_rejected() {
        let mut coordinator = MasterCoordinator::default();
        coordinator.run(ProjectContext::default(), passing_sets()).unwrap();
        let err = coordinator.run(ProjectContext::default(), passing_sets()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert_eq!(coordinator.state(), CoordinatorState::Completed);
    }

    #[test]
    fn test_skew_out_of_range_aborts() {
        let ctx = ProjectContext {
            skew_angle: 95.0,
            ..Default::default()
        };
        for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
            let mut coordinator = MasterCoordinator::new(mode);
            let err = coordinator.run(ctx.clone(), passing_sets()).unwrap_err();
            match &err {
                DesignError::DomainValueError { module, field, .. } => {
                    assert_eq!(module, "Stability");
                    assert_eq!(field, "skewAngle");
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(coordinator.state(), CoordinatorState::Aborted);
            assert!(coordinator.record().is_none());
        }
    }

    #[test]
    fn test_conflicting_span_aborts() {
        let mut sets = passing_sets();
        sets.get_mut(&Category::Stability)
            .unwrap()
            .insert("effective_span", crate::parameters::ParamValue::Number(12.0), None);
        sets.get_mut(&Category::Hydraulic)
            .unwrap()
            .insert("effective_span", crate::parameters::ParamValue::Number(15.0), None);

        let mut coordinator = MasterCoordinator::default();
        let err = coordinator.run(ProjectContext::default(), sets).unwrap_err();
        match err {
            DesignError::InconsistentContext { field, per_module, .. } => {
                assert_eq!(field, "effectiveSpan");
                assert_eq!(per_module.get("Hydraulic").map(String::as_str), Some("15"));
                assert_eq!(per_module.get("Stability").map(String::as_str), Some("12"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            states(&coordinator),
            vec![CoordinatorState::Validating, CoordinatorState::Aborted]
        );
    }

    #[test]
    fn test_non_finite_shared_value_is_domain_error() {
        for bad in [f64::NAN, f64::INFINITY] {
            let mut sets = passing_sets();
            sets.get_mut(&Category::Hydraulic)
                .unwrap()
                .insert("effective_span", crate::parameters::ParamValue::Number(bad), None);

            let mut coordinator = MasterCoordinator::default();
            match coordinator.run(ProjectContext::default(), sets).unwrap_err() {
                DesignError::DomainValueError { module, field, value, .. } => {
                    assert_eq!(module, "Hydraulic");
                    assert_eq!(field, "effectiveSpan");
                    assert_eq!(value, bad.to_string());
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(coordinator.state(), CoordinatorState::Aborted);
        }

        let ctx = ProjectContext {
            width: f64::NAN,
            ..Default::default()
        };
        let err = MasterCoordinator::default().run(ctx, passing_sets()).unwrap_err();
        assert_eq!(err.error_code(), "DOMAIN_VALUE_ERROR");
        assert!(err.to_string().contains("width"), "{err}");
    }

    #[test]
    fn test_missing_parameter_set() {
        let mut sets = passing_sets();
        sets.remove(&Category::Abutment);
        let err = MasterCoordinator::default()
            .run(ProjectContext::default(), sets)
            .unwrap_err();
        assert_eq!(err, DesignError::MissingParameterSet { category: Category::Abutment });
    }

    #[test]
    fn test_mislabelled_set_rejected() {
        let mut sets = passing_sets();
        let hydraulic = sets.remove(&Category::Hydraulic).unwrap();
        sets.insert(Category::Abutment, hydraulic);
        let err = MasterCoordinator::default()
            .run(ProjectContext::default(), sets)
            .unwrap_err();
        assert_eq!(err.error_code(), "INCONSISTENT_CONTEXT");
    }

    #[test]
    fn test_status_assembly() {
        let mut sets = passing_sets();
        sets.get_mut(&Category::Hydraulic)
            .unwrap()
            .insert("bridge_opening", crate::parameters::ParamValue::Number(115.0), None);
        let record = MasterCoordinator::default()
            .run(ProjectContext::default(), sets)
            .unwrap();
        assert_eq!(record.overall_status, OverallStatus::PassWithWarnings);

        let mut sets = passing_sets();
        sets.get_mut(&Category::Abutment)
            .unwrap()
            .insert("bearing_capacity", crate::parameters::ParamValue::Number(150.0), None);
        let record = MasterCoordinator::default()
            .run(ProjectContext::default(), sets)
            .unwrap();
        assert_eq!(record.overall_status, OverallStatus::Fail);
        assert_eq!(record.results.len(), 4);
    }

    struct Reviewer;

    impl DesignValidator for Reviewer {
        fn validate(&self, result: &AnalysisResult, _context: &ProjectContext) -> ValidationOutcome {
            if result.category == Category::Hydraulic {
                ValidationOutcome::TimedOut
            } else {
                ValidationOutcome::Feedback(format!("{} reviewed", result.category))
            }
        }
    }

    #[test]
    fn test_review_leaves_record_unchanged() {
        let record = MasterCoordinator::default()
            .run(ProjectContext::default(), passing_sets())
            .unwrap();
        let before = record.clone();
        let outcomes = review(&record, &Reviewer);
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[&Category::Hydraulic], ValidationOutcome::TimedOut);
        assert_eq!(
            outcomes[&Category::Abutment],
            ValidationOutcome::Feedback("Abutment reviewed".to_string())
        );
        assert_eq!(record, before);
    }

    #[test]
    fn test_record_json_shape() {
        let record = MasterCoordinator::default()
            .run(ProjectContext::default(), passing_sets())
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["overallStatus"], "Pass");
        assert!(json["results"]["cross_section"]["passed"].as_bool().unwrap());
        assert_eq!(json["context"]["bridgeType"], "High Level Bridge");
    }

    #[test]
    fn test_generous_design_gets_recommendations() {
        let record = MasterCoordinator::default()
            .run(ProjectContext::default(), passing_sets())
            .unwrap();
        let stability_fs = record.results[&Category::Stability].get("fs_overturning").unwrap();
        assert!(stability_fs > 3.0);
        assert!(
            record
                .recommendations
                .iter()
                .any(|r| r.starts_with("Stability: reduce base dimensions")),
            "{:?}",
            record.recommendations
        );
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["recommendations"].as_array().is_some_and(|a| !a.is_empty()));
    }

    #[test]
    fn test_recommendation_thresholds() {
        use crate::analysis::ThresholdCheck;
        use crate::units::Unit;

        let mut deck = AnalysisResult::new(Category::CrossSection);
        deck.value("steel_required", 1000.0, Unit::SquareMillimetre);
        deck.value("steel_provided", 1300.0, Unit::SquareMillimetre);
        assert_eq!(
            recommendations([&deck]),
            vec!["Cross-Section: reduce steel reinforcement (30.0% above required)".to_string()]
        );

        deck.value("steel_provided", 1150.0, Unit::SquareMillimetre);
        let mut wall = AnalysisResult::new(Category::Abutment);
        wall.value("fs_overturning", 2.5, Unit::Ratio);
        assert_eq!(
            recommendations([&deck, &wall]),
            vec!["Design is satisfactory; proceed with detailed design".to_string()]
        );

        wall.check(ThresholdCheck::minimum("Sliding", 1.2, 1.5, true));
        let advice = recommendations([&deck, &wall]);
        assert_eq!(advice.len(), 1);
        assert!(advice[0].starts_with("Abutment: revise design for Sliding"), "{advice:?}");
    }
}
