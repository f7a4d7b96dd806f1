//! glufire - Entry point
//!
//! Command-line diagnostics for the glutamate therapy model.
//!
//! CLI Usage:
//!   cargo run -- gate --o2 1 --temp 42       # Gate outputs and ON/OFF safety
//!   cargo run -- metabolism --strain wildtype
//!   cargo run -- therapy --export            # Therapy vs control, CSV + JSON
//!   cargo run -- therapy --dynamic           # Same, gate with reconstitution lag
//!   cargo run -- neurotox --tumor-init-mM 30 --peak 5
//!   cargo run -- fit data.csv --x O2 --y GFP --mode rep

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use glufire::{
    circuit::{
        fit_promoter, load_dose_response_csv, DynamicGate, DynamicGateParameters,
        EnvironmentSchedule, FitMode, FitOptions, ReconstitutionGate,
    },
    config::{CalibrationStore, ModelConfig},
    export::{export_report_json, export_trajectory_csv},
    metabolism::{
        analyze_performance, compare_activity_levels, EngineeredStrain, GluMetabolism,
        StrainKind, StrainParameters,
    },
    numerics::{Interpolation, Signal},
    pk::{default_pk_solver, MultiCompartmentParameters, MultiCompartmentPk, MULTI_STATE_NAMES},
    therapy::{compare_default_conditions, TherapyModel},
};

/// Parsed command line
#[derive(Debug, Default)]
struct Cli {
    command: String,
    positional: Vec<String>,
    config: Option<PathBuf>,
    calibration: Option<PathBuf>,
    export: bool,
    dynamic: bool,
    o2_percent: Option<f64>,
    temp_C: Option<f64>,
    strain: Option<String>,
    tumor_init_mM: Option<f64>,
    peak_umol_per_h: Option<f64>,
    x_col: Option<String>,
    y_col: Option<String>,
    mode: Option<String>,
    save_as: Option<String>,
}

fn print_help() {
    println!("glufire - environment-gated glutamate therapy model");
    println!();
    println!("Usage: glufire <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  gate [--o2 X --temp Y]              Promoter outputs, gate activity, safety scan");
    println!("  metabolism [--strain engineered|wildtype]");
    println!("                                      Heat-shock run and performance summary");
    println!("  therapy [--dynamic]                 Therapy vs control comparison");
    println!("  neurotox [--tumor-init-mM X --peak Y]");
    println!("                                      Plasma exposure and risk report");
    println!("  fit <csv> --x <col> --y <col> [--mode act|rep|auto] [--save <name>]");
    println!("                                      Fit a Hill promoter to dose-response data");
    println!();
    println!("Options:");
    println!("  --config <json>        Model configuration overrides");
    println!("  --calibration <json>   Calibration store (promoter and gate parameters)");
    println!("  --export               Write CSV and JSON results into exports/");
    println!("  --dynamic              Drive the therapy model through reconstitution kinetics");
    println!("  --help, -h             Show this help");
}

fn parse_number(flag: &str, value: Option<&String>) -> Result<f64> {
    let value = value.with_context(|| format!("{} needs a value", flag))?;
    value
        .parse()
        .with_context(|| format!("{} expects a number, got '{}'", flag, value))
}

fn parse_string(flag: &str, value: Option<&String>) -> Result<String> {
    value
        .cloned()
        .with_context(|| format!("{} needs a value", flag))
}

/// Parse CLI arguments
fn parse_args() -> Result<Option<Cli>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = Cli::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--config" => cli.config = Some(parse_string(arg, iter.next())?.into()),
            "--calibration" => cli.calibration = Some(parse_string(arg, iter.next())?.into()),
            "--export" => cli.export = true,
            "--dynamic" => cli.dynamic = true,
            "--o2" => cli.o2_percent = Some(parse_number(arg, iter.next())?),
            "--temp" => cli.temp_C = Some(parse_number(arg, iter.next())?),
            "--strain" => cli.strain = Some(parse_string(arg, iter.next())?),
            "--tumor-init-mM" => cli.tumor_init_mM = Some(parse_number(arg, iter.next())?),
            "--peak" => cli.peak_umol_per_h = Some(parse_number(arg, iter.next())?),
            "--x" => cli.x_col = Some(parse_string(arg, iter.next())?),
            "--y" => cli.y_col = Some(parse_string(arg, iter.next())?),
            "--mode" => cli.mode = Some(parse_string(arg, iter.next())?),
            "--save" => cli.save_as = Some(parse_string(arg, iter.next())?),
            other if other.starts_with("--") => bail!("unknown option '{}'", other),
            other => {
                if cli.command.is_empty() {
                    cli.command = other.to_string();
                } else {
                    cli.positional.push(other.to_string());
                }
            }
        }
    }

    if cli.command.is_empty() {
        print_help();
        return Ok(None);
    }
    Ok(Some(cli))
}

/// Model configuration with the calibration store applied, if one was given
fn load_config(cli: &Cli) -> Result<ModelConfig> {
    let config = match &cli.config {
        Some(path) => ModelConfig::load_with_overrides(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ModelConfig::default(),
    };
    Ok(match &cli.calibration {
        Some(path) => config.with_calibration(&CalibrationStore::load_or_default(path)),
        None => config,
    })
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_gate(cli: &Cli, config: &ModelConfig) -> Result<()> {
    let gate = &config.and_gate;
    let o2 = cli.o2_percent.unwrap_or(1.0);
    let temp = cli.temp_C.unwrap_or(42.0);

    println!("=== AND Gate at {}% O2, {}°C ===", o2, temp);
    let (a, b) = gate.arm_outputs(o2, temp);
    println!("  Oxygen arm (pPept): {:>9.1} AU", a);
    println!("  Heat arm (pL/pR):   {:>9.1} AU", b);
    println!("  T7 activity:        {:>9.1} AU", gate.activity(o2, temp));

    println!("\n=== Condition Scan ===");
    println!("  {:>6} {:>6} {:>9} {:>9} {:>9}", "O2 %", "T °C", "A", "B", "T7");
    for p in gate.condition_scan() {
        println!(
            "  {:>6.1} {:>6.1} {:>9.1} {:>9.1} {:>9.1}",
            p.o2_percent, p.temp_C, p.arm_a, p.arm_b, p.t7_activity
        );
    }
    println!();

    let safety = gate.safety_metrics();
    safety.print_summary();

    let schedule = EnvironmentSchedule::heat_shock(o2, 37.0, temp, 8.0, 4.0);
    let product = schedule.product_signal(gate, Interpolation::Previous)?;
    let dynamic = DynamicGate::from_product(product, DynamicGateParameters::default());
    let trajectory = dynamic.simulate(&config.solver)?;
    println!("\n=== Reconstitution Kinetics (heat shock 8-12 h) ===");
    println!(
        "  Peak complex: {:.2} AU at {:.1} h",
        trajectory.max_of("T7_active")?,
        trajectory.time_of_max("T7_active")?
    );

    if cli.export {
        export_report_json(&safety, "gate_safety")?;
        export_trajectory_csv(&trajectory, "gate_dynamics", None)?;
    }
    Ok(())
}

fn run_metabolism(cli: &Cli, config: &ModelConfig) -> Result<()> {
    let kind = StrainKind::from_label(cli.strain.as_deref().unwrap_or("engineered"))?;
    let params = match kind {
        StrainKind::Engineered => config.engineered_strain.clone(),
        StrainKind::Wildtype => StrainParameters {
            schedule: config.engineered_strain.schedule.clone(),
            ..StrainParameters::wildtype()
        },
    };
    let strain = EngineeredStrain::new(kind, params);

    println!("=== {} Strain, Heat-Shock Protocol ===\n", kind.label());
    let trajectory = strain.simulate_heat_shock()?;
    let summary = analyze_performance(kind, &strain.params.schedule, &trajectory)?;
    summary.print_summary();

    println!("\n=== Minimal Model: High vs Low T7 ===");
    let minimal = GluMetabolism::new(config.glu_metabolism.clone());
    let comparison = compare_activity_levels(&minimal, 2000.0, 50.0, 24.0, &config.solver)?;
    comparison.print_summary();

    if cli.export {
        export_trajectory_csv(&trajectory, &format!("strain_{}", kind.label()), None)?;
        export_report_json(&summary, &format!("performance_{}", kind.label()))?;
        export_report_json(&comparison, "activity_comparison")?;
    }
    Ok(())
}

fn run_therapy(cli: &Cli, config: &ModelConfig) -> Result<()> {
    let model = if cli.dynamic {
        // Complex turns over in about an hour
        let kinetics = DynamicGateParameters::matched_to(&config.and_gate.gate, 1.0);
        let gate = ReconstitutionGate {
            solver: config.solver.clone(),
            ..ReconstitutionGate::new(config.and_gate.clone(), kinetics)
        };
        TherapyModel::new(config.therapy.clone(), gate)
    } else {
        TherapyModel::new(config.therapy.clone(), config.and_gate.clone())
    };
    let comparison = compare_default_conditions(&model, &config.solver);
    comparison.print_summary();

    if cli.export {
        for outcome in [&comparison.therapy, &comparison.control].into_iter().flatten() {
            let prefix = format!("therapy_{}", outcome.label.to_ascii_lowercase());
            export_trajectory_csv(&outcome.trajectory, &prefix, None)?;
            export_report_json(outcome, &prefix)?;
        }
    }
    if !comparison.both_succeeded() {
        bail!("at least one therapy scenario failed");
    }
    Ok(())
}

fn run_neurotox(cli: &Cli, config: &ModelConfig) -> Result<()> {
    let mut scenario = config.neurotox_scenario();
    if let Some(tumor) = cli.tumor_init_mM {
        scenario.tumor_init_mM = tumor;
    }
    if let Some(peak) = cli.peak_umol_per_h {
        scenario.secretion.peak_umol_per_h = peak;
    }
    let solver = default_pk_solver();

    for (label, run) in [("Worst case", scenario.clone()), ("Control", scenario.control())] {
        println!(
            "=== {}: tumour {:.2} mM, peak secretion {:.1} µmol/h ===",
            label, run.tumor_init_mM, run.secretion.peak_umol_per_h
        );
        match run.run(&config.toxicity, &solver) {
            Ok(result) => {
                result.report.print_summary();
                if cli.export {
                    let prefix = format!("neurotox_{}", label.replace(' ', "_").to_ascii_lowercase());
                    export_trajectory_csv(&result.trajectory, &prefix, None)?;
                    export_report_json(&result.report, &prefix)?;
                }
            }
            Err(e) => println!("⚠️  {} run failed: {}", label, e),
        }
        println!();
    }

    // Same secretion window as a square infusion into the whole-body model
    let secretion = &scenario.secretion;
    let infusion = Signal::step_pulse(
        0.0,
        secretion.peak_umol_per_h,
        secretion.t_on_h,
        secretion.t_off_h - secretion.t_on_h,
    )?;
    let body = MultiCompartmentPk::new(MultiCompartmentParameters::default(), infusion);
    let whole_body = body.simulate(scenario.hours, scenario.dt_h, &config.solver)?;
    println!("=== Whole-Body Distribution ===");
    for name in MULTI_STATE_NAMES {
        println!("  {:<8} peak {:.4} µM", name, whole_body.max_of(name)?);
    }
    Ok(())
}

fn run_fit(cli: &Cli) -> Result<()> {
    let path = cli
        .positional
        .first()
        .context("fit needs a CSV file")?;
    let x_col = cli.x_col.as_deref().context("fit needs --x <column>")?;
    let y_col = cli.y_col.as_deref().context("fit needs --y <column>")?;
    let mode = FitMode::from_label(cli.mode.as_deref().unwrap_or("auto"));

    let data = load_dose_response_csv(path, x_col, y_col)?;
    println!("=== Promoter Fit: {} ({} levels) ===", path, data.len());

    let Some(fit) = fit_promoter(&data, mode, &FitOptions::default())? else {
        println!("⚠️  Fit did not converge; built-in parameters remain in effect");
        return Ok(());
    };
    fit.print_summary(y_col);

    if let Some(name) = &cli.save_as {
        let store_path = cli
            .calibration
            .clone()
            .unwrap_or_else(|| PathBuf::from("calibration.json"));
        let mut store = CalibrationStore::load_or_default(&store_path);
        store.insert_fit(name, &fit);
        store.save(&store_path)?;
        println!("✓ Saved '{}' to {}", name, store_path.display());
    }
    if cli.export {
        export_report_json(&fit, "promoter_fit")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let Some(cli) = parse_args()? else {
        return Ok(());
    };
    log::info!("glufire {} starting: {}", env!("CARGO_PKG_VERSION"), cli.command);

    match cli.command.as_str() {
        "gate" => run_gate(&cli, &load_config(&cli)?),
        "metabolism" => run_metabolism(&cli, &load_config(&cli)?),
        "therapy" => run_therapy(&cli, &load_config(&cli)?),
        "neurotox" => run_neurotox(&cli, &load_config(&cli)?),
        "fit" => run_fit(&cli),
        other => bail!("unknown command '{}' (try --help)", other),
    }
}
