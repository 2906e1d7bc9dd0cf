use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use uuid::Uuid;
use wellcall_core::constants::{DEFAULT_WINDOW_END, DEFAULT_WINDOW_START, DEFAULT_WINDOW_TZ};
use wellcall_core::model::{Assessment, ClovaScores, CssrsResult, QuarterlyScores};
use wellcall_core::scoring::score;
use wellcall_core::store::seed::load_seed;
use wellcall_core::CallWindow;

#[derive(Parser)]
#[command(name = "wellcall")]
#[command(about = "Wellness-call operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an assessment file and print the flag and escalations
    Score {
        /// JSON file with the screening scores
        file: PathBuf,
    },
    /// Report whether the call window is open
    Window {
        /// Instant to check (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
        #[arg(long, default_value = DEFAULT_WINDOW_START)]
        start: String,
        #[arg(long, default_value = DEFAULT_WINDOW_END)]
        end: String,
        /// IANA time zone
        #[arg(long, default_value = DEFAULT_WINDOW_TZ)]
        tz: String,
    },
    /// Print the webhook signature for a URL and form parameters
    Sign {
        /// Full public URL the provider posts to, including any query string
        #[arg(long)]
        url: String,
        /// Account auth token
        #[arg(long)]
        secret: String,
        /// Form parameters as key=value
        params: Vec<String>,
    },
    /// Validate a seed file
    CheckSeed {
        /// YAML roster of persons and reviewers
        file: PathBuf,
    },
}

/// Screening scores as written by hand or exported from a call.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScoresFile {
    #[serde(default)]
    clova: ClovaScores,
    phq2_score: Option<u8>,
    #[serde(default)]
    phq2_triggered_deeper: bool,
    cssrs_result: Option<CssrsResult>,
    ottawa_score: Option<u8>,
    #[serde(default)]
    quarterly: QuarterlyScores,
}

impl ScoresFile {
    fn into_assessment(self) -> Assessment {
        Assessment {
            clova: self.clova,
            phq2_score: self.phq2_score,
            phq2_triggered_deeper: self.phq2_triggered_deeper,
            cssrs_result: self.cssrs_result,
            ottawa_score: self.ottawa_score,
            quarterly: self.quarterly,
            ..Assessment::empty(Uuid::nil(), Uuid::nil(), Utc::now())
        }
    }
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Score { file } => {
            let text = std::fs::read_to_string(&file)?;
            let mut deserializer = serde_json::Deserializer::from_str(&text);
            let scores: ScoresFile = serde_path_to_error::deserialize(&mut deserializer)
                .map_err(|e| format!("{}: at {}: {}", file.display(), e.path(), e.inner()))?;
            let result = score(&scores.into_assessment());
            println!("Flag: {}", result.flag.as_str());
            if result.escalations.is_empty() {
                println!("No escalations.");
            }
            for escalation in result.escalations {
                println!(
                    "[{}] {}{}",
                    escalation.tier.as_str(),
                    escalation.reason,
                    escalation
                        .details
                        .map(|d| format!(" ({d})"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Window { at, start, end, tz } => {
            let window = CallWindow::parse(&start, &end, &tz)?;
            let now = match at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc),
                None => Utc::now(),
            };
            if window.is_open(now) {
                println!("Open ({start}-{end} {tz})");
            } else {
                println!(
                    "Closed ({start}-{end} {tz}); next opening {}",
                    window.next_start_after(now)
                );
            }
        }
        Commands::Sign {
            url,
            secret,
            params,
        } => {
            let pairs = params
                .iter()
                .map(|p| parse_pair(p))
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", api_shared::sign_webhook(&secret, &url, &pairs)?);
        }
        Commands::CheckSeed { file } => {
            let seed = load_seed(&file)?;
            println!(
                "{}: {} persons, {} reviewers",
                file.display(),
                seed.persons.len(),
                seed.reviewers.len()
            );
        }
    }

    Ok(())
}
