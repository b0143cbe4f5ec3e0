use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pezzottify_fetcher::cli_style::{
    get_prompt, get_styles, print_banner, print_empty_list, print_error, print_info,
    print_job_details, print_job_line, print_success, print_track_table, print_warning,
};
use pezzottify_fetcher::{
    metrics, AppConfig, CliConfig, DownloadRequest, DownloadSetting, FetchError, FetchService,
    FileConfig, SearchType,
};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

const JOB_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory where downloaded files are saved.
    #[clap(long, value_parser = parse_path)]
    pub download_dir: Option<PathBuf>,

    /// Base URL of the automation sidecar.
    #[clap(long)]
    pub automation_url: Option<String>,

    /// Base URL of the public catalog lookup used for fast track searches.
    #[clap(long)]
    pub fast_lookup_url: Option<String>,

    /// Lifetime in seconds of cached track search results.
    #[clap(long)]
    pub cache_ttl_secs: Option<u64>,

    /// Overall timeout in seconds of one download pipeline.
    #[clap(long)]
    pub pipeline_timeout_secs: Option<u64>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            download_dir: self.download_dir.clone(),
            automation_url: self.automation_url.clone(),
            fast_lookup_url: self.fast_lookup_url.clone(),
            cache_ttl_secs: self.cache_ttl_secs,
            pipeline_timeout_secs: self.pipeline_timeout_secs,
        }
    }
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Searches the catalog and makes the results the active result set.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// tracks, artists, albums or playlists.
        #[arg(short, long = "type", default_value = "tracks")]
        search_type: String,
    },

    /// Shows the active result set again.
    Results,

    /// Downloads the result at the given index of the active result set.
    Download {
        index: usize,

        /// Hi-Res, CD Lossless, 320kbps AAC or 96kbps AAC.
        #[arg(short, long)]
        setting: Option<String>,

        /// Follows the job with a progress bar until it finishes.
        #[arg(short, long)]
        wait: bool,
    },

    /// Lists download jobs, newest first.
    Jobs {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Shows one download job.
    Job { id: String },

    /// Runs a finished job again.
    Retry { id: String },

    /// Removes a job. Automation work already running is not interrupted.
    Cancel { id: String },

    /// Prints the Prometheus metrics.
    Metrics,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

fn describe(err: &FetchError) -> String {
    format!("{} [{}]", err, err.status_code())
}

async fn follow_job(service: &FetchService, job_id: &str) {
    let pb = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg:<12} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}%")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    loop {
        match service.get_job(job_id) {
            Ok(job) => {
                pb.set_position(u64::from(job.progress));
                pb.set_message(job.phase.clone());
                if job.status.is_terminal() {
                    pb.finish_and_clear();
                    print_job_details(&job);
                    return;
                }
            }
            Err(FetchError::NotFound(_)) => {
                pb.abandon();
                print_warning(&format!("Job {} is gone", job_id));
                return;
            }
            Err(e) => {
                pb.abandon();
                print_error(&describe(&e));
                return;
            }
        }
        tokio::time::sleep(JOB_POLL_INTERVAL).await;
    }
}

async fn execute_command(line: String, service: &FetchService) -> CommandExecutionResult {
    if line.trim().is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => match cli.command {
            InnerCommand::Search { query, search_type } => {
                let query = query.join(" ");
                let search_type = SearchType::parse(&search_type);
                match service.search(&query, search_type).await {
                    Ok(tracks) => {
                        print_info(&format!("{} {} for '{}'", tracks.len(), search_type, query));
                        print_track_table(&tracks);
                    }
                    Err(e) => return CommandExecutionResult::Error(describe(&e)),
                }
            }
            InnerCommand::Results => print_track_table(&service.last_results()),
            InnerCommand::Download {
                index,
                setting,
                wait,
            } => {
                let download_setting = match setting {
                    Some(raw) => match DownloadSetting::from_str(&raw) {
                        Some(setting) => setting,
                        None => {
                            return CommandExecutionResult::Error(format!(
                                "Unknown download setting '{}'",
                                raw
                            ))
                        }
                    },
                    None => DownloadSetting::default(),
                };
                let request = DownloadRequest::for_index(index, download_setting);
                match service.enqueue_download(request) {
                    Ok(job) => {
                        print_success(&format!("Queued job {} for '{}'", job.id, job.title));
                        if wait {
                            follow_job(service, &job.id).await;
                        }
                    }
                    Err(e) => return CommandExecutionResult::Error(describe(&e)),
                }
            }
            InnerCommand::Jobs { limit } => {
                let jobs = service.list_jobs(limit);
                if jobs.is_empty() {
                    print_empty_list("No download jobs");
                }
                for job in &jobs {
                    print_job_line(job);
                }
            }
            InnerCommand::Job { id } => match service.get_job(&id) {
                Ok(job) => print_job_details(&job),
                Err(e) => return CommandExecutionResult::Error(describe(&e)),
            },
            InnerCommand::Retry { id } => match service.retry_job(&id) {
                Ok(job) => print_success(&format!("Job {} queued again", job.id)),
                Err(e) => return CommandExecutionResult::Error(describe(&e)),
            },
            InnerCommand::Cancel { id } => match service.cancel_job(&id) {
                Ok(job) => print_success(&format!(
                    "Removed job {} ({})",
                    job.id,
                    job.status.as_str()
                )),
                Err(e) => return CommandExecutionResult::Error(describe(&e)),
            },
            InnerCommand::Metrics => print!("{}", metrics::render_metrics()),
            InnerCommand::Exit => return CommandExecutionResult::Exit,
        },

        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
        }
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct FetcherHelper {
    commands_names: Vec<String>,
}

impl FetcherHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        FetcherHelper { commands_names }
    }
}

impl Completer for FetcherHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for FetcherHelper {}
impl Validator for FetcherHelper {}
impl Helper for FetcherHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    metrics::init_metrics();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start Tokio runtime")?;
    let service = {
        let _guard = runtime.enter();
        FetchService::from_config(&config)?
    };

    print_banner(
        &config.download_dir.display().to_string(),
        &config.automation_url,
    );

    let rl_config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<FetcherHelper, FileHistory>::with_config(rl_config)?;
    rl.set_helper(Some(FetcherHelper::new()));

    let prompt = get_prompt();
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match runtime.block_on(execute_command(line, &service)) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => break,
                    CommandExecutionResult::Error(err) => print_error(&err),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }

    runtime.block_on(service.shutdown());
    Ok(())
}
