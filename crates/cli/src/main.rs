// misp-review - threat report review against a MISP instance

mod exit_codes;
mod logging;
mod render;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};

use misp_review_client::{
    default_profile_path, expand_path, load_profile, MispClient, MispError, ProfileError,
    DEFAULT_PROFILE,
};
use misp_review_engine::model::Timestamp;
use misp_review_engine::{
    load_report, workflow, Report, ReportFilter, ReportPipeline, ReviewConfig, ReviewError,
    ReviewIds, Status, TeamSummary,
};

use exit_codes::{
    review_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_PROFILE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "misp-review")]
#[command(about = "Review threat reports shared through MISP")]
#[command(version)]
struct Cli {
    /// Review configuration file (tag, template and organisation ids)
    #[arg(long, global = true, env = "MISP_REVIEW_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// MISP credentials file [default: ~/.config/misp]
    #[arg(long, global = true, env = "MISP_CONFIGFILE", value_name = "PATH")]
    misp_configfile: Option<String>,

    /// Profile to use from the credentials file
    #[arg(long, global = true, env = "MISP_PROFILE", default_value = DEFAULT_PROFILE)]
    misp_profile: String,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the organisations known to the MISP instance
    Orgs {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List threat reports awaiting review
    #[command(after_help = "\
Approved reports are hidden unless --status approved is given.

Examples:
  misp-review reports
  misp-review reports --org 20 --since 2024-01-01
  misp-review reports --status approved --status updated --scored
  misp-review reports --unscored --live --interval 10")]
    Reports {
        /// Only these organisations (repeatable; defaults to the configured list)
        #[arg(long, value_name = "ID")]
        org: Vec<String>,

        /// Skip reports last updated before this time (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = util::parse_time)]
        since: Option<Timestamp>,

        /// Skip reports published after this time (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = util::parse_time)]
        until: Option<Timestamp>,

        /// Only these statuses (repeatable): new, info_requested, updated, approved
        #[arg(long)]
        status: Vec<Status>,

        /// Only reports with at least one score
        #[arg(long)]
        scored: bool,

        /// Only reports without scores
        #[arg(long)]
        unscored: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,

        /// Redraw on a timer until interrupted
        #[arg(long)]
        live: bool,

        /// Seconds between redraws in --live mode [default: refresh_secs from config]
        #[arg(long, value_name = "SECS", requires = "live")]
        interval: Option<u64>,
    },

    /// Show one report in detail
    Show {
        /// Event id of the report
        id: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarise one organisation's reports
    Summary {
        /// Organisation id
        #[arg(long, value_name = "ID")]
        org: String,

        /// Skip reports last updated before this time
        #[arg(long, value_parser = util::parse_time)]
        since: Option<Timestamp>,

        /// Skip reports published after this time
        #[arg(long, value_parser = util::parse_time)]
        until: Option<Timestamp>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Approve a report
    Approve {
        /// Event id of the report
        id: String,
    },

    /// Ask the submitting organisation for more information
    Feedback {
        /// Event id of the report
        id: String,

        /// Question or remark sent to the submitter
        #[arg(long, short = 'm')]
        message: String,
    },

    /// Score a report on behalf of the reviewing team
    Score {
        /// Event id of the report
        id: String,

        /// Numeric score
        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Optional remark stored with the score
        #[arg(long)]
        comment: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = run(&cli);

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Orgs { json } => cmd_orgs(cli, json),
        Commands::Reports {
            ref org,
            since,
            until,
            ref status,
            scored,
            unscored,
            json,
            live,
            interval,
        } => {
            // Conflicting selectors abort before anything is loaded or fetched.
            let require_score =
                ReportFilter::score_presence(scored, unscored).map_err(CliError::review)?;
            let filter = ReportFilter {
                since,
                until,
                require_score,
                ..ReportFilter::default()
            }
            .with_statuses(status.iter().copied());
            cmd_reports(cli, org, filter, json, live, interval)
        }
        Commands::Show { ref id, json } => cmd_show(cli, id, json),
        Commands::Summary {
            ref org,
            since,
            until,
            json,
        } => cmd_summary(cli, org, since, until, json),
        Commands::Approve { ref id } => cmd_approve(cli, id),
        Commands::Feedback { ref id, ref message } => cmd_feedback(cli, id, message),
        Commands::Score {
            ref id,
            value,
            ref comment,
        } => cmd_score(cli, id, value, comment.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from an engine error with the matching exit code.
    pub fn review(err: ReviewError) -> Self {
        let code = review_exit_code(&err);
        let hint = match &err {
            ReviewError::MissingConfiguration(_) => {
                Some("add the missing id under [tags], [templates] or [visibility] in the review configuration".to_string())
            }
            ReviewError::ConfigParse(_) => Some("check the TOML syntax of the review configuration".to_string()),
            ReviewError::Unauthorized(_) => {
                Some("check api_key in the selected MISP profile".to_string())
            }
            ReviewError::PreconditionFailed(_) => {
                Some("run `misp-review show <ID>` to inspect the current state".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn misp(err: MispError) -> Self {
        Self::review(err.into())
    }

    pub fn profile(err: ProfileError) -> Self {
        Self {
            code: EXIT_PROFILE,
            message: err.to_string(),
            hint: Some("use --misp-configfile / --misp-profile or MISP_CONFIGFILE / MISP_PROFILE".to_string()),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("misp-review/config.toml"))
}

fn load_config(cli: &Cli) -> Result<(ReviewConfig, ReviewIds), CliError> {
    let path = match cli.config {
        Some(ref path) => path.clone(),
        None => default_config_path()
            .ok_or_else(|| CliError::config("could not determine the config directory"))?,
    };
    let contents = std::fs::read_to_string(&path).map_err(|e| {
        CliError::config(format!("cannot read {}: {}", path.display(), e))
            .with_hint("create it or point --config / MISP_REVIEW_CONFIG at one")
    })?;
    let config = ReviewConfig::from_toml(&contents).map_err(CliError::review)?;
    let ids = config.validate().map_err(CliError::review)?;
    log::debug!("loaded review configuration from {}", path.display());
    Ok((config, ids))
}

fn connect(cli: &Cli) -> Result<MispClient, CliError> {
    let path = match cli.misp_configfile {
        Some(ref raw) => expand_path(raw),
        None => default_profile_path().ok_or_else(|| {
            CliError::profile(ProfileError::Io(
                PathBuf::from("~/.config/misp"),
                "no home directory".into(),
            ))
        })?,
    };
    let creds = load_profile(&path, &cli.misp_profile).map_err(CliError::profile)?;
    log::info!("using MISP at {} (profile {})", creds.endpoint, cli.misp_profile);
    Ok(MispClient::new(creds))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = render::to_json(value).map_err(CliError::other)?;
    println!("{text}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_orgs(cli: &Cli, json: bool) -> Result<(), CliError> {
    let client = connect(cli)?;
    let orgs = client.organisations().map_err(CliError::misp)?;
    if json {
        print_json(&orgs)
    } else {
        print!("{}", render::org_table(&orgs));
        Ok(())
    }
}

fn cmd_reports(
    cli: &Cli,
    orgs: &[String],
    filter: ReportFilter,
    json: bool,
    live: bool,
    interval: Option<u64>,
) -> Result<(), CliError> {
    let (config, ids) = load_config(cli)?;
    let client = connect(cli)?;
    let orgs = if orgs.is_empty() { config.orgs.clone() } else { orgs.to_vec() };
    let pipeline = ReportPipeline::new(&client, &ids, orgs, filter);

    if !live {
        let reports = collect_reports(&pipeline)?;
        return render_reports(&reports, json);
    }

    let period = Duration::from_secs(interval.unwrap_or(config.refresh_secs).max(1));
    loop {
        match collect_reports(&pipeline) {
            Ok(reports) => print!("{}", live_frame(&reports, json, period)?),
            Err(e) if e.code == exit_codes::EXIT_STORE => {
                log::warn!("refresh failed: {}", e.message);
            }
            Err(e) => return Err(e),
        }
        thread::sleep(period);
    }
}

fn collect_reports(pipeline: &ReportPipeline<'_, MispClient>) -> Result<Vec<Report>, CliError> {
    pipeline
        .run()
        .map_err(CliError::review)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(CliError::review)
}

fn reports_text(reports: &[Report], json: bool) -> Result<String, CliError> {
    if json {
        let text = render::to_json(reports).map_err(CliError::other)?;
        Ok(text + "\n")
    } else {
        Ok(render::report_table(reports))
    }
}

fn render_reports(reports: &[Report], json: bool) -> Result<(), CliError> {
    print!("{}", reports_text(reports, json)?);
    Ok(())
}

/// One redraw of `reports --live`. JSON frames carry the document only.
fn live_frame(reports: &[Report], json: bool, period: Duration) -> Result<String, CliError> {
    let body = reports_text(reports, json)?;
    if json {
        return Ok(body);
    }
    // Clear screen, cursor home.
    Ok(format!(
        "\x1b[2J\x1b[H{body}\nrefreshing every {}s, Ctrl-C to stop\n",
        period.as_secs()
    ))
}

fn cmd_show(cli: &Cli, id: &str, json: bool) -> Result<(), CliError> {
    let (_, ids) = load_config(cli)?;
    let client = connect(cli)?;
    let report = load_report(&client, &ids, id).map_err(CliError::review)?;
    if json {
        print_json(&report)
    } else {
        print!("{}", render::report_detail(&report));
        Ok(())
    }
}

fn cmd_summary(
    cli: &Cli,
    org: &str,
    since: Option<Timestamp>,
    until: Option<Timestamp>,
    json: bool,
) -> Result<(), CliError> {
    let (_, ids) = load_config(cli)?;
    let client = connect(cli)?;

    let filter = ReportFilter {
        since,
        until,
        ..ReportFilter::everything()
    };
    let pipeline = ReportPipeline::new(&client, &ids, vec![org.to_string()], filter);
    let reports = collect_reports(&pipeline)?;

    let org_name = reports
        .first()
        .map(|r| r.org_name.clone())
        .unwrap_or_else(|| org.to_string());
    let monitors: Vec<_> = reports.iter().flat_map(|r| r.monitors.iter().cloned()).collect();
    let summary = TeamSummary::fold(org, &org_name, &reports, monitors);
    let view = render::SummaryView::new(&summary);

    if json {
        print_json(&view)
    } else {
        print!("{}", render::summary_text(&view));
        Ok(())
    }
}

fn cmd_approve(cli: &Cli, id: &str) -> Result<(), CliError> {
    let (_, ids) = load_config(cli)?;
    let client = connect(cli)?;
    workflow::approve(&client, &ids, id).map_err(CliError::review)?;
    println!("approved report {id}");
    Ok(())
}

fn cmd_feedback(cli: &Cli, id: &str, message: &str) -> Result<(), CliError> {
    if message.trim().is_empty() {
        return Err(CliError::args("--message must not be empty"));
    }
    let (_, ids) = load_config(cli)?;
    let client = connect(cli)?;
    let reply = workflow::request_info(&client, &ids, id, message).map_err(CliError::review)?;
    println!("requested information on report {id} (event {reply})");
    Ok(())
}

fn cmd_score(cli: &Cli, id: &str, value: f64, comment: Option<&str>) -> Result<(), CliError> {
    let (_, ids) = load_config(cli)?;
    let client = connect(cli)?;
    let outcome = workflow::score(&client, &ids, id, value, comment).map_err(CliError::review)?;
    if outcome.created {
        println!("scored report {id}: {value} (new score event {})", outcome.container_id);
    } else {
        println!("scored report {id}: {value} (score event {})", outcome.container_id);
    }
    Ok(())
}
