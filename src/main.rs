use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use poisson_forecast::config::{Config, ModelKind};
use poisson_forecast::data::load_series;
use poisson_forecast::pipeline::{ForecastReport, run};

#[derive(Parser)]
#[command(name = "poisson-forecast")]
#[command(about = "Fit a Poisson model to a count series and forecast it", long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV, overrides the configured path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Column holding the counts (defaults to the last column)
    #[arg(long)]
    column: Option<String>,

    /// Model type (linear, mlp)
    #[arg(short, long)]
    model: Option<String>,

    /// Number of steps to forecast
    #[arg(long)]
    horizon: Option<usize>,

    /// Hold out this many trailing points and score the forecast on them
    #[arg(long)]
    holdout: Option<usize>,

    /// Write the forecast table to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => Config::from_path(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => Config::default(),
    };

    if let Some(input) = cli.input {
        config.data.path = Some(input);
    }
    if let Some(column) = cli.column {
        config.data.column = Some(column);
    }
    if let Some(horizon) = cli.horizon {
        config.forecast.horizon = horizon;
    }
    if let Some(holdout) = cli.holdout {
        config.forecast.holdout = holdout;
    }
    if let Some(model) = cli.model.as_deref() {
        config.model.kind = match model {
            "linear" => ModelKind::Linear,
            "mlp" => ModelKind::Mlp,
            other => return Err(format!("unknown model '{other}' (expected linear or mlp)")),
        };
    }

    let path = config
        .data
        .path
        .clone()
        .ok_or("no input series: pass --input or set data.path")?;
    let series = load_series(&path, config.data.column.as_deref()).map_err(|e| e.to_string())?;

    let report = run(&config, &series).map_err(|e| e.to_string())?;

    if cli.json {
        let text = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{text}");
    } else {
        print_table(&report);
    }

    if let Some(out) = cli.output {
        let file = File::create(&out).map_err(|e| format!("{}: {e}", out.display()))?;
        report.write_csv(file).map_err(|e| e.to_string())?;
        log::info!("wrote forecast to {}", out.display());
    }
    Ok(())
}

fn print_table(report: &ForecastReport) {
    println!(
        "Model: {} | train length {} | loss {:.6} | residual se {:.4}",
        report.model, report.train_length, report.train_loss, report.residual_standard_error
    );
    if let Some(score) = &report.evaluation {
        println!(
            "Holdout: rmse {:.4} | mae {:.4} | mean nll {:.4} | coverage {:.2}",
            score.rmse, score.mae, score.mean_nll, score.coverage
        );
    }
    println!(
        "{:>6} {:>12} {:>12} {:>12} {:>12} {:>10}",
        "step", "forecast", "rate", "lower", "upper", "observed"
    );
    for row in report.rows() {
        let rate = cell(row.rate);
        let observed = cell(row.observed);
        println!(
            "{:>6} {:>12.4} {:>12} {:>12.4} {:>12.4} {:>10}",
            row.step, row.forecast, rate, row.lower, row.upper, observed
        );
    }
}

fn cell(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "-".to_string())
}
