//! Analysis of a two-train system with a common-cause group on its pumps.
//!
//! Each train fails when its valve or its pump fails; the system fails when
//! both trains fail.
//!
//! Run with: `cargo run --example two-train -- --approximation mcub --trials 5000`

use clap::{Parser, ValueEnum};
use color_eyre::eyre::eyre;

use fta_rs::analysis::Analysis;
use fta_rs::ccf::{CcfGroup, CcfModel};
use fta_rs::error::AnalysisError;
use fta_rs::expression::{Deviate, Expression};
use fta_rs::model::{Formula, Model, ModelBuilder};
use fta_rs::probability::Approximation;
use fta_rs::settings::Settings;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Method {
    Exact,
    RareEvent,
    Mcub,
}

impl From<Method> for Approximation {
    fn from(method: Method) -> Self {
        match method {
            Method::Exact => Approximation::Exact,
            Method::RareEvent => Approximation::RareEvent,
            Method::Mcub => Approximation::Mcub,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "two-train")]
#[command(about = "Quantify a two-train fault tree")]
struct Args {
    /// Probability approximation
    #[arg(short, long, value_enum, default_value_t = Method::Exact)]
    approximation: Method,

    /// Beta factor of the pump common-cause group (0 disables the group)
    #[arg(short, long, default_value_t = 0.1)]
    beta: f64,

    /// Number of Monte Carlo trials
    #[arg(short, long, default_value_t = 1000)]
    trials: usize,

    /// Random seed
    #[arg(long, default_value_t = 372)]
    seed: u64,

    /// Mission time in hours
    #[arg(long, default_value_t = 8760.0)]
    mission_time: f64,
}

fn build_model(beta: f64) -> color_eyre::Result<Model> {
    let mut b = ModelBuilder::new("two-train");
    let ft = b.add_fault_tree("TwoTrain")?;

    let mut trains = Vec::new();
    let mut pumps = Vec::new();
    for train in ["One", "Two"] {
        let valve = b.add_basic_event(format!("Valve{}", train), Expression::Constant(0.02))?;
        b.set_uncertainty(valve, Deviate::Uniform { min: 0.01, max: 0.03 })?;
        let pump = b.add_basic_event(format!("Pump{}", train), Expression::Exponential { rate: 5e-6 })?;
        b.set_uncertainty(
            pump,
            Deviate::LogNormal {
                mean: 5e-6,
                error_factor: 3.0,
            },
        )?;
        pumps.push(pump);
        trains.push(b.add_gate(ft, format!("Train{}", train), Formula::or([valve.into(), pump.into()]))?);
    }
    b.add_gate(ft, "TopEvent", Formula::and([trains[0].into(), trains[1].into()]))?;

    if beta > 0.0 {
        b.add_ccf_group(CcfGroup::new(
            "Pumps",
            CcfModel::BetaFactor,
            pumps,
            Expression::Exponential { rate: 5e-6 },
            [beta],
        ))?;
    }
    Ok(b.build())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Args::parse();
    let time_total = std::time::Instant::now();

    let model = build_model(args.beta)?;
    let settings = Settings::default()
        .with_approximation(args.approximation.into())?
        .with_importance_analysis(true)
        .with_uncertainty_analysis(true)
        .with_num_trials(args.trials)?
        .with_seed(args.seed)
        .with_mission_time(args.mission_time)?;

    let report = Analysis::new(settings).run(&model);
    for (name, result) in &report.results {
        let result = match result {
            Ok(result) => result,
            Err(AnalysisError::LimitExceeded { limit, partial }) => {
                println!("{}: {} exceeded, {} products so far", name, limit, partial.products.len());
                continue;
            }
            Err(e) => return Err(eyre!("fault tree `{}`: {}", name, e)),
        };

        println!("─── {} (top gate {}) ───\n", name, result.top_gate);
        for product in &result.products {
            println!(
                "  {:<32} p = {:.4e}  contribution = {:.2}%",
                product.to_string(),
                product.probability.unwrap_or(0.0),
                100.0 * product.contribution.unwrap_or(0.0)
            );
        }
        println!();
        if let Some(q) = result.probability {
            println!("Top event probability: {:.6e}", q);
        }
        for warning in &result.warnings {
            println!("Warning: {}", warning);
        }

        if let Some(importance) = &result.importance {
            println!();
            println!("  {:<16} {:>10} {:>10} {:>10} {:>10} {:>10}", "event", "MIF", "CIF", "DIF", "RAW", "RRW");
            for (event, r) in importance {
                println!(
                    "  {:<16} {:>10.3e} {:>10.3e} {:>10.3e} {:>10.3} {:>10.3}",
                    event, r.mif, r.cif, r.dif, r.raw, r.rrw
                );
            }
        }

        if let Some(u) = &result.uncertainty {
            println!();
            println!("Uncertainty over {} trials:", u.num_trials);
            println!("  mean  = {:.6e}", u.mean);
            println!("  sigma = {:.6e}", u.sigma);
            println!("  95% CI = [{:.6e}, {:.6e}]", u.confidence_interval.0, u.confidence_interval.1);
        }
        println!();
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
