//! Forecaster's Edge: ranks nearby courses by the weather at your tee time.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};

use edge_core::{AppError, Config, ConfigError};
use edge_weather::geo::KM_TO_MILES;
use edge_weather::{
    default_start_hour, format_condition_age, parse_courses, ConditionSource, Coordinate,
    ForecastSource, HttpConditionSource, NoConditions, OpenMeteoSource, ProximityCache, Ranker,
    Ranking, ScoreGrade, StaticForecastSource,
};

#[derive(Parser)]
#[command(name = "forecasters-edge", about = "Rank nearby courses by weather", version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank the courses nearest a location
    Rank(RankArgs),
    /// Write the effective configuration to the config file
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct RankArgs {
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    #[arg(long, allow_negative_numbers = true)]
    lon: f64,

    /// Round start, 0-23 in the course's local time
    #[arg(long)]
    start_hour: Option<u32>,

    /// Number of nearest courses to score
    #[arg(long)]
    limit: Option<usize>,

    /// Course list (`id,name,numHoles,lat,lon` per line)
    #[arg(long)]
    courses: Option<PathBuf>,

    /// Use the bundled sample forecast instead of the network
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            eprintln!("  ({})", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let (config, validation) = Config::load_validated(cli.config.as_deref())
        .map_err(|e| ConfigError::Invalid(format!("{:#}", e)))?;

    edge_core::init(&config.logging.level)?;
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    match cli.command {
        Command::Rank(args) => rank(&config, args).await,
        Command::InitConfig(args) => init_config(&config, cli.config, args),
    }
}

fn init_config(config: &Config, path: Option<PathBuf>, args: InitConfigArgs) -> Result<(), AppError> {
    let path = match path {
        Some(path) => path,
        None => Config::config_path()?,
    };
    config.init_file(&path, args.force)?;
    tracing::info!("Wrote configuration to {}", path.display());
    println!("Wrote {}", path.display());
    Ok(())
}

async fn rank(config: &Config, args: RankArgs) -> Result<(), AppError> {
    let user = Coordinate::new(args.lat, args.lon)?;
    let start_hour = args
        .start_hour
        .unwrap_or_else(|| default_start_hour(Local::now().naive_local()));
    let limit = args.limit.unwrap_or(config.ranking.limit);

    let courses_path = args
        .courses
        .unwrap_or_else(|| config.data.courses_path.clone());
    let venues = parse_courses(&std::fs::read_to_string(&courses_path)?);
    tracing::info!("Loaded {} courses from {}", venues.len(), courses_path.display());

    let bundled = StaticForecastSource::bundled()?;
    let timeout = Duration::from_secs(config.forecast.timeout_secs);

    let forecasts: Arc<dyn ForecastSource> = if args.mock || config.forecast.mock {
        tracing::info!("Mock mode: using the bundled sample forecast");
        Arc::new(bundled.clone())
    } else {
        Arc::new(OpenMeteoSource::new(&config.forecast.api_url, timeout)?)
    };

    let conditions: Arc<dyn ConditionSource> = match &config.conditions.backend_url {
        Some(url) => Arc::new(HttpConditionSource::new(url, timeout)?),
        None => Arc::new(NoConditions),
    };

    let cache = Arc::new(ProximityCache::from_config(&config.cache, bundled.series().clone()));
    let ranker = Ranker::new(cache, forecasts, conditions).with_min_holes(config.ranking.min_holes);

    let ranking = ranker.rank(&venues, user, start_hour, limit).await?;
    print_ranking(&ranking, user);
    Ok(())
}

fn print_ranking(ranking: &Ranking, user: Coordinate) {
    println!(
        "Courses near {} for a {:02}:00 start ({} ranked)",
        user,
        ranking.start_hour,
        ranking.entries.len()
    );
    println!();

    let now = Utc::now();
    for (rank, entry) in ranking.entries.iter().enumerate() {
        let score = &entry.score;
        let breakdown = &score.breakdown;
        println!(
            "{:>2}. {:<36} {:>2} holes {:>6.1} mi  {:>4.1} {}",
            rank + 1,
            entry.course.name,
            entry.course.holes,
            entry.distance_km * KM_TO_MILES,
            score.overall,
            ScoreGrade::from_score(score.overall).label()
        );
        println!(
            "    rain {:.1} mm / {:.0}%  temp {:.0}°F  wind {:.1} mph",
            breakdown.precipitation.raw.mm,
            breakdown.precipitation.raw.probability,
            breakdown.temperature.raw.fahrenheit,
            breakdown.wind.raw.mph
        );

        if !entry.ratings.is_empty() {
            let ratings: Vec<String> = entry
                .ratings
                .iter()
                .map(|(dimension, value)| format!("{} {:.1}", dimension, value))
                .collect();
            println!("    ratings {}", ratings.join(", "));
        }

        if let Some(report) = &entry.condition {
            let age = report
                .observed_at
                .map(|at| format!(" ({})", format_condition_age(at, now)))
                .unwrap_or_default();
            println!(
                "    conditions {}/5{}{}",
                report.rating,
                report
                    .description
                    .as_deref()
                    .map(|d| format!(": {}", d))
                    .unwrap_or_default(),
                age
            );
        }
    }
}
