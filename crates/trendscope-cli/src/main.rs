use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use trendscope_core::{
    ChatModel, OrderBy, PollPolicy, PromptConfig, Run, RunEvent, ScrapeClient,
    ScrapeRequest, Stage, Target, VideoRecord, config::DEFAULT_CONFIG_PATH, format_report_readable,
    transcripts::DEFAULT_TRANSCRIPT_DIR,
};

fn format_duration(d: Duration) -> String {
    // Round before splitting so 119.6s reads "2m 0s", not "1m 60s"
    let tenths = (d.as_secs_f64() * 10.0).round() as u64;
    if tenths < 600 {
        format!("{}.{}s", tenths / 10, tenths % 10)
    } else {
        let total = d.as_secs_f64().round() as u64;
        format!("{}m {}s", total / 60, total % 60)
    }
}

#[derive(Clone, Default, ValueEnum)]
enum CliOrderBy {
    #[default]
    Latest,
    Popular,
    Oldest,
}

impl From<CliOrderBy> for OrderBy {
    fn from(cli: CliOrderBy) -> Self {
        match cli {
            CliOrderBy::Latest => OrderBy::Latest,
            CliOrderBy::Popular => OrderBy::Popular,
            CliOrderBy::Oldest => OrderBy::Oldest,
        }
    }
}

#[derive(Parser)]
#[command(name = "trendscope")]
#[command(
    about = "Scrape YouTube channels, save video transcripts, and generate an AI trend report"
)]
struct Cli {
    /// Channel URLs (e.g. https://www.youtube.com/@channel)
    #[arg(required_unless_present = "keyword")]
    channels: Vec<String>,

    /// Discover videos by search keyword instead of channel URLs
    #[arg(short, long, conflicts_with = "channels")]
    keyword: Option<String>,

    /// Only videos posted on or after this date (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Only videos posted on or before this date (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Maximum videos to scrape per channel (or in total for a keyword search)
    #[arg(short = 'n', long, default_value_t = 10)]
    posts: u32,

    /// Video ordering on the channel page
    #[arg(long, default_value = "latest")]
    order_by: CliOrderBy,

    /// Country filter passed to the scraper
    #[arg(long, default_value = "")]
    country: String,

    /// Prompt configuration for the analysis and synthesis stages
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for transcript files
    #[arg(short, long, default_value = DEFAULT_TRANSCRIPT_DIR)]
    output_dir: PathBuf,

    /// Chat model for report generation
    #[arg(short, long)]
    model: Option<String>,

    /// OpenAI-compatible chat completions endpoint
    #[arg(long)]
    api_url: Option<String>,

    /// Seconds between job status checks
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Give up after this many status checks (0 or absent: wait until the job finishes)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Scraper dataset id
    #[arg(long)]
    dataset_id: Option<String>,

    /// Show info-level logs
    #[arg(short, long)]
    verbose: bool,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn done_line(msg: impl std::fmt::Display, elapsed: Duration) -> String {
    format!(
        "{} {} {}",
        style("✓").green().bold(),
        msg,
        style(format!("[{}]", format_duration(elapsed))).dim()
    )
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose {
        "trendscope=info,trendscope_core=info"
    } else {
        "trendscope=warn,trendscope_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_videos(videos: &[VideoRecord]) {
    if videos.is_empty() {
        println!("  {}", style("No videos returned for this range").dim());
        return;
    }
    for (i, video) in videos.iter().enumerate() {
        let title = video.title.as_deref().unwrap_or(&video.shortcode);
        println!("  {:>2}. {}", i + 1, style(title).bold());
        println!("      {}", style(&video.url).cyan());
        if let Some(preview) = &video.preview_image {
            println!("      {}", style(preview).dim());
        }
        println!(
            "      {} segments{}",
            video.segments.len(),
            video
                .date_posted
                .as_deref()
                .map(|d| format!(", posted {}", d))
                .unwrap_or_default()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    // Validate API keys early
    let (client, model) = match (ScrapeClient::from_env(), ChatModel::from_env()) {
        (Ok(client), Ok(model)) => (client, model),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };
    let client = match cli.dataset_id {
        Some(id) => client.with_dataset_id(id),
        None => client,
    };
    let model = match cli.model {
        Some(m) => model.with_model(m),
        None => model,
    };
    let model = match cli.api_url {
        Some(url) => model.with_api_url(url),
        None => model,
    };

    let prompts = PromptConfig::load(&cli.config)
        .await
        .with_context(|| format!("Failed to load prompts from {}", cli.config.display()))?;

    let request = match cli.keyword {
        Some(keyword) => ScrapeRequest::keyword(keyword),
        None => ScrapeRequest::new(cli.channels),
    };
    let request = request
        .post_count(cli.posts)
        .date_range(cli.start_date, cli.end_date)
        .order_by(cli.order_by.into())
        .country(cli.country);

    let policy = PollPolicy {
        interval: Duration::from_secs(cli.poll_interval),
        ..PollPolicy::default()
    }
    .with_max_attempts(cli.max_attempts);

    println!(
        "\n{}  {}\n",
        style("trendscope").cyan().bold(),
        style("YouTube Trend Analysis").dim()
    );
    let source = match &request.target {
        Target::Channels(urls) => format!(
            "{} channel(s), up to {} videos each",
            urls.len(),
            request.post_count
        ),
        Target::Keyword(keyword) => {
            format!("keyword \"{}\", up to {} videos", keyword, request.post_count)
        }
    };
    println!("{} {}, report by {}", style("•").dim(), source, model.model());
    println!("{}", style("─".repeat(60)).dim());

    let run = Run::new(&client, &model, &prompts)
        .with_policy(policy)
        .with_output_dir(cli.output_dir);
    tracing::info!(run_id = %run.id(), inputs = request.input_count(), "Starting run");

    let total_start = Instant::now();
    let mut step_start = Instant::now();
    let mut spinner = create_spinner("Extracting data from YouTube...");

    let result = run
        .execute(&request, |event| match event {
            RunEvent::Triggered { handle } => {
                spinner.set_message(format!("Scraping job {} started, waiting...", handle));
            }
            RunEvent::Polled { attempt, status } => {
                spinner.set_message(format!(
                    "Scraping... status: {} {}",
                    style(&status.status).yellow(),
                    style(format!("(check {})", attempt)).dim()
                ));
            }
            RunEvent::Fetched { videos } => {
                spinner.finish_with_message(done_line(
                    format!("Scraping completed: {} videos", videos),
                    step_start.elapsed(),
                ));
                step_start = Instant::now();
                spinner = create_spinner("Writing transcripts...");
            }
            RunEvent::TranscriptWritten { path } => {
                spinner.set_message(format!("Wrote {}", style(path.display()).dim()));
            }
            RunEvent::StageStarted(stage) => {
                if stage == Stage::Analysis {
                    spinner.finish_with_message(done_line("Transcripts saved", step_start.elapsed()));
                }
                step_start = Instant::now();
                spinner = create_spinner(match stage {
                    Stage::Analysis => "Analyzing transcripts...",
                    Stage::Synthesis => "Writing report...",
                });
            }
            RunEvent::StageFinished(stage) => {
                let msg = match stage {
                    Stage::Analysis => "Analysis complete",
                    Stage::Synthesis => "Report ready",
                };
                spinner.finish_with_message(done_line(msg, step_start.elapsed()));
            }
        })
        .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.abandon_with_message(format!("{} {}", style("✗").red().bold(), e));
            eprintln!("\n{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    println!("\n{}\n", style("Videos").bold().underlined());
    print_videos(&outcome.videos);

    println!(
        "\n{} {}",
        style("Transcripts:").dim(),
        style(run.output_dir().display()).cyan()
    );
    println!(
        "{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    println!("{}", style("─".repeat(60)).dim());

    println!("{}", format_report_readable(&outcome.report));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "trendscope",
            "https://www.youtube.com/@a",
            "https://www.youtube.com/@b",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-02-01",
            "-n",
            "5",
            "--order-by",
            "popular",
            "--model",
            "gpt-4o-mini",
            "--poll-interval",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.channels.len(), 2);
        assert_eq!(cli.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(cli.posts, 5);
        assert_eq!(OrderBy::from(cli.order_by), OrderBy::Popular);
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cli.poll_interval, 3);
        assert_eq!(cli.max_attempts, None);
        assert_eq!(cli.output_dir, PathBuf::from("transcripts"));
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn requires_a_channel() {
        assert!(Cli::try_parse_from(["trendscope"]).is_err());
    }

    #[test]
    fn keyword_replaces_channels() {
        let cli = Cli::try_parse_from(["trendscope", "--keyword", "rust async", "-n", "20"]).unwrap();
        assert_eq!(cli.keyword.as_deref(), Some("rust async"));
        assert!(cli.channels.is_empty());
        assert_eq!(cli.posts, 20);
    }

    #[test]
    fn keyword_conflicts_with_channels() {
        assert!(
            Cli::try_parse_from(["trendscope", "https://www.youtube.com/@a", "-k", "rust"]).is_err()
        );
    }

    #[test]
    fn max_attempts_is_optional() {
        let cli = Cli::try_parse_from(["trendscope", "u", "--max-attempts", "0"]).unwrap();
        let policy = PollPolicy::default().with_max_attempts(cli.max_attempts);
        assert_eq!(policy.max_attempts, None);

        let cli = Cli::try_parse_from(["trendscope", "u", "--max-attempts", "12"]).unwrap();
        let policy = PollPolicy::default().with_max_attempts(cli.max_attempts);
        assert_eq!(policy.max_attempts, Some(12));
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(
            Cli::try_parse_from(["trendscope", "u", "--start-date", "01/02/2024"]).is_err()
        );
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn durations_never_show_sixty_seconds() {
        assert_eq!(format_duration(Duration::from_millis(119_600)), "2m 0s");
        assert_eq!(format_duration(Duration::from_millis(59_960)), "1m 0s");
        assert_eq!(format_duration(Duration::from_millis(179_499)), "2m 59s");
    }
}
