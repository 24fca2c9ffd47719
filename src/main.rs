//! Cash-flow Engine CLI
//!
//! Runs a savings-account projection over a CSV of model points and writes
//! one output CSV per record set.

use anyhow::{Context as _, Result};
use cashflow_engine::data::{load_record_set, load_runplan};
use cashflow_engine::{Constant, Model, ModelVariable, Runplan, Settings};
use clap::Parser;
use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "cashflow", version, about = "Savings-account cash-flow projection")]
struct Args {
    /// Model points CSV (identifier column plus `premium`)
    #[arg(long)]
    records: PathBuf,

    /// Settings JSON, merged over the defaults
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Run plan CSV with a `version` column and an `interest` parameter
    #[arg(long)]
    runplan: Option<PathBuf>,

    /// Run-plan version to use
    #[arg(long, default_value = "1")]
    version: String,

    /// Annual interest rate when no run plan is given
    #[arg(long, default_value_t = 0.03)]
    interest: f64,

    /// Directory for the output CSV files
    #[arg(long, default_value = "output")]
    output: PathBuf,
}

fn savings_components() -> (Vec<ModelVariable>, Vec<Constant>) {
    let fund = ModelVariable::new("fund").assign(|ctx, t| {
        if t == 0 {
            return ctx.constant("premium");
        }
        let previous = ctx.var("fund", t - 1)?;
        Ok(previous * (1.0 + ctx.constant("monthly_rate")?) - ctx.var("charge", t)?)
    });

    // flat monthly fee of 0.1% of the premium
    let charge = ModelVariable::new("charge").assign(|ctx, t| {
        if t == 0 {
            return Ok(0.0);
        }
        Ok(ctx.constant("premium")? * 0.001)
    });

    let discounted_fund = ModelVariable::new("discounted_fund").assign(|ctx, t| {
        if t == ctx.t_max() {
            return ctx.var("fund", t);
        }
        Ok(ctx.var("discounted_fund", t + 1)? / (1.0 + ctx.constant("monthly_rate")?))
    });

    let premium = Constant::new("premium").assign(|ctx| ctx.field_f64("premium"));
    let monthly_rate =
        Constant::new("monthly_rate").assign(|ctx| Ok((1.0 + ctx.param("interest")?).powf(1.0 / 12.0) - 1.0));

    (vec![fund, charge, discounted_fund], vec![premium, monthly_rate])
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("Cash-flow Engine v{}", env!("CARGO_PKG_VERSION"));
    println!("========================\n");

    let settings = match &args.settings {
        Some(path) => Settings::from_path(path)?,
        None => Settings::default(),
    };

    let mut runplan = match &args.runplan {
        Some(path) => load_runplan(path)?,
        None => Runplan::from_columns(vec![
            ("version", vec![args.version.as_str().into()]),
            ("interest", vec![args.interest.into()]),
        ])?,
    };
    runplan.set_version(args.version.clone())?;

    let start = Instant::now();
    let records = load_record_set("policies", &args.records)
        .with_context(|| format!("loading {}", args.records.display()))?;
    println!("Loaded {} records in {:?}", records.len(), start.elapsed());

    let (variables, constants) = savings_components();
    let mut model = Model::new(runplan, variables, constants, vec![records], settings);

    let run_start = Instant::now();
    let output = model.run()?;
    println!("Projection completed in {:?}", run_start.elapsed());

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    for (name, table) in output {
        let path = args.output.join(format!("{}.csv", name));
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        table.write_csv(file)?;
        println!("  {} rows written to {}", table.len(), path.display());
    }

    if let Some(report) = model.runtime() {
        println!("\nRuntime:\n{}", report);
    }
    Ok(())
}
