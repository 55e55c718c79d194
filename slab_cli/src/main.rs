//! # slab_cli
//!
//! Runs one bridge slab design from the command line:
//!
//! ```text
//! slab_cli --stability stab.xlsx --hydraulic hyd.xlsx --cross-section deck.xlsx \
//!          --live-load ll.xlsx --abutment abut.xlsx --context project.toml
//! ```
//!
//! Every workbook is extracted and resolved first; all resolution problems
//! are printed together before anything runs. A completed record is written
//! through the output allocator in each configured format. Formats the
//! renderer cannot produce are rejected before any work starts.
//!
//! `slab_cli --list` prints the artifacts already under the output root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use slab_core::analysis::AnalysisResult;
use slab_core::collaborators::check_formats;
use slab_core::coordinator::write_artifacts;
use slab_core::file_io::load_context;
use slab_core::formula::WorkbookAudit;
use slab_core::resolver::resolve_workbook;
use slab_core::{
    Category, DesignConfig, DesignError, DesignRecord, ExecutionMode, FieldSpec, FormulaExtractor, JsonRenderer,
    MasterCoordinator, OutputPathAllocator, OutputSlot, OverallStatus, ParameterSet, ProjectContext,
};

#[derive(Parser, Debug)]
#[command(name = "slab_cli", version, about = "Bridge slab design from calculation workbooks")]
struct Args {
    /// Stability workbook
    #[arg(long, required_unless_present = "list")]
    stability: Option<PathBuf>,

    /// Hydraulic workbook
    #[arg(long, required_unless_present = "list")]
    hydraulic: Option<PathBuf>,

    /// Cross-section (deck) workbook
    #[arg(long, required_unless_present = "list")]
    cross_section: Option<PathBuf>,

    /// Live-load workbook, merged into the cross-section inputs
    #[arg(long)]
    live_load: Option<PathBuf>,

    /// Abutment workbook
    #[arg(long, required_unless_present = "list")]
    abutment: Option<PathBuf>,

    /// Project context (TOML or JSON); defaults apply when omitted
    #[arg(long)]
    context: Option<PathBuf>,

    /// Run configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run the analysis modules in parallel
    #[arg(long)]
    parallel: bool,

    /// Print the formula audit of every workbook
    #[arg(long)]
    audit: bool,

    /// Print the design record as JSON
    #[arg(long)]
    json: bool,

    /// List artifacts already written under the output root and exit
    #[arg(long)]
    list: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.list {
        return match list_outputs(&args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                print_error(&e);
                ExitCode::FAILURE
            }
        };
    }

    match run(&args) {
        Ok(record) => {
            if record.overall_status == OverallStatus::Fail {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(errors) => {
            for e in &errors {
                print_error(e);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<DesignConfig, DesignError> {
    match &args.config {
        Some(path) => DesignConfig::from_file(path),
        None => Ok(DesignConfig::default()),
    }
}

fn run(args: &Args) -> Result<DesignRecord, Vec<DesignError>> {
    let config = load_config(args).map_err(|e| vec![e])?;
    check_formats(&JsonRenderer, &config.formats).map_err(|e| vec![e])?;
    let context = match &args.context {
        Some(path) => load_context(path).map_err(|e| vec![e])?,
        None => ProjectContext::default(),
    };
    let mode = if args.parallel {
        ExecutionMode::Parallel
    } else {
        config.execution
    };

    let sets = resolve_inputs(args, &config)?;

    let mut coordinator = MasterCoordinator::new(mode);
    let record = coordinator.run(context, sets).map_err(|e| vec![e])?;
    print_record(&record);

    let allocator = OutputPathAllocator::new(&config.output_root);
    for slot in write_artifacts(&record, &JsonRenderer, &config.formats, &allocator).map_err(|e| vec![e])? {
        println!("Wrote {} (serial {:03}, {})", slot.path.display(), slot.serial, slot.timestamp_display());
    }

    if args.json {
        println!();
        println!("JSON Output:");
        if let Ok(json) = serde_json::to_string_pretty(&record) {
            println!("{}", json);
        }
    }
    Ok(record)
}

/// Extract and resolve every workbook, collecting every category's errors.
fn resolve_inputs(args: &Args, config: &DesignConfig) -> Result<BTreeMap<Category, ParameterSet>, Vec<DesignError>> {
    let extractor = FormulaExtractor::new();
    let inputs = [
        (Category::Stability, &args.stability),
        (Category::Hydraulic, &args.hydraulic),
        (Category::CrossSection, &args.cross_section),
        (Category::Abutment, &args.abutment),
    ];

    let mut sets = BTreeMap::new();
    let mut errors = Vec::new();
    for (category, path) in inputs {
        let Some(path) = path else {
            errors.push(DesignError::MissingParameterSet { category });
            continue;
        };
        match config
            .field_spec(category)
            .and_then(|spec| load_and_resolve(&extractor, category, path, &spec, args.audit))
        {
            Ok(set) => {
                sets.insert(category, set);
            }
            Err(e) => errors.push(e),
        }
    }

    if let Some(path) = &args.live_load {
        let live = config
            .live_load_spec()
            .and_then(|spec| load_and_resolve(&extractor, Category::CrossSection, path, &spec, args.audit));
        match (live, sets.get_mut(&Category::CrossSection)) {
            (Ok(live), Some(cross_section)) => {
                if let Err(e) = cross_section.merge(live) {
                    errors.push(e);
                }
            }
            (Ok(_), None) => {}
            (Err(e), _) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(sets)
    } else {
        Err(errors)
    }
}

fn load_and_resolve(
    extractor: &FormulaExtractor,
    category: Category,
    path: &Path,
    spec: &FieldSpec,
    audit: bool,
) -> Result<ParameterSet, DesignError> {
    let bytes = fs::read(path).map_err(|e| DesignError::file_error("read", path.display().to_string(), e.to_string()))?;
    let workbook = extractor.extract(&bytes)?;
    if audit {
        print_audit(path, &WorkbookAudit::of(&workbook));
    }
    resolve_workbook(category, &workbook, spec)
}

fn list_outputs(args: &Args) -> Result<(), DesignError> {
    let config = load_config(args)?;
    let allocator = OutputPathAllocator::new(&config.output_root);
    let slots = allocator.list()?;

    if args.json {
        let json = serde_json::to_string_pretty(&slots).map_err(|e| DesignError::serialization(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }
    if slots.is_empty() {
        println!("No outputs under {}", allocator.root().display());
        return Ok(());
    }
    print_slots(&slots);
    Ok(())
}

fn print_slots(slots: &[OutputSlot]) {
    let mut group = None;
    for slot in slots {
        let key = (slot.date, slot.folder.as_str());
        if group != Some(key) {
            println!("{}/{}", slot.date, slot.folder);
            group = Some(key);
        }
        println!(
            "  {:03}  {}  {:<5} {}",
            slot.serial,
            slot.timestamp_display(),
            slot.extension,
            slot.path.display()
        );
    }
}

fn print_audit(path: &Path, audit: &WorkbookAudit) {
    println!("Audit: {} ({} formulas) {}", path.display(), audit.total_formulas, status_icon(audit.is_clean()));
    for (sheet, deps) in &audit.sheet_dependencies {
        println!("  {} reads from {}", sheet, deps.join(", "));
    }
    for dangling in &audit.dangling_references {
        println!(
            "  {}!{} {} -> unpopulated {}",
            dangling.sheet,
            dangling.cell,
            dangling.formula,
            dangling.missing.join(", ")
        );
    }
    for cycle in &audit.circular_references {
        println!("  circular: {}", cycle.join(" -> "));
    }
}

fn print_record(record: &DesignRecord) {
    let ctx = &record.context;
    println!("═══════════════════════════════════════");
    println!("  BRIDGE SLAB DESIGN");
    println!("═══════════════════════════════════════");
    println!();
    println!("Project:");
    println!("  Bridge:   {} ({})", display_or_dash(&ctx.bridge_name), ctx.bridge_type);
    println!("  Location: {}", display_or_dash(&ctx.location));
    println!(
        "  Geometry: {} x {:.2} m spans, width {:.2} m, skew {:.1} deg",
        ctx.number_of_spans, ctx.effective_span, ctx.width, ctx.skew_angle
    );
    println!("  Code:     {} / {} / {}", ctx.design_code, ctx.concrete_grade, ctx.steel_grade);

    for result in record.ordered_results() {
        print_result(result);
    }

    if !record.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for recommendation in &record.recommendations {
            println!("  - {}", recommendation);
        }
    }

    println!();
    println!("═══════════════════════════════════════");
    println!("  RESULT: {}", record.overall_status);
    println!("═══════════════════════════════════════");
}

fn print_result(result: &AnalysisResult) {
    println!();
    println!("{}: {}", result.category, status_icon(result.passed));
    for check in &result.checks {
        println!(
            "  {:<24} {:>10.3} vs {:>10.3} {}",
            check.name,
            check.actual,
            check.limit,
            status_icon(check.passed)
        );
    }
    for warning in &result.warnings {
        println!("  ! {}", warning);
    }
}

fn print_error(e: &DesignError) {
    eprintln!("Error [{}]: {}", e.error_code(), e);
    if let Ok(json) = serde_json::to_string_pretty(e) {
        eprintln!();
        eprintln!("Error JSON:");
        eprintln!("{}", json);
    }
}

fn display_or_dash(text: &str) -> &str {
    if text.trim().is_empty() {
        "-"
    } else {
        text
    }
}

fn status_icon(pass: bool) -> &'static str {
    if pass { "[OK]" } else { "[FAIL]" }
}
