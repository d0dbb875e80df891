use crate::commands::{self, Session};
use crate::events::Sentiment;
use crate::insights::AnalyticsWindow;
use crate::query::{EventQuery, SortDirection, SortField, TimeWindow};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_ANALYTICS_WINDOW: &str = "30d";

#[derive(Parser, Debug)]
#[command(name = "tidings", version)]
#[command(
    about = "Event intelligence engine for customer interactions",
    long_about = "tidings stores customer interaction events, classifies them on ingestion, and answers filter, search, pattern and analytics queries over the collection."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  tidings ingest draft.json
  tidings import-legacy old-events.json
  tidings query --window 7d --sort risk_score
  tidings search \"renouvellement contrat\"
  tidings analytics --last 30d
  tidings completion zsh > ~/.zsh/completions/_tidings
  tidings man > tidings.1")]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        default_value = ".",
        help = "Directory holding .tidings/config.toml"
    )]
    root: PathBuf,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Path to event DB (default: $XDG_STATE_HOME/tidings/events.db)"
    )]
    state_db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for SortDirection {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Asc => SortDirection::Asc,
            Direction::Desc => SortDirection::Desc,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Classify and store one or more event drafts",
        long_about = "Read a JSON draft (or an array of drafts), run content analysis, derive scores and recommendations, and store the resulting events."
    )]
    #[command(arg_required_else_help = true)]
    Ingest {
        #[arg(value_name = "DRAFT_FILE", help = "JSON file with a draft or an array of drafts")]
        file: PathBuf,
    },
    #[command(about = "Convert and store flat legacy event records")]
    #[command(arg_required_else_help = true)]
    ImportLegacy {
        #[arg(value_name = "FILE", help = "JSON file with a legacy record or an array of them")]
        file: PathBuf,
    },
    #[command(about = "Print one event")]
    #[command(arg_required_else_help = true)]
    Get {
        #[arg(value_name = "ID")]
        id: String,
    },
    #[command(about = "Delete one event")]
    #[command(arg_required_else_help = true)]
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
    #[command(about = "Count a view of an event")]
    #[command(arg_required_else_help = true)]
    View {
        #[arg(value_name = "ID")]
        id: String,
    },
    #[command(about = "Record a recipient response to an event")]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Example:
  tidings respond <EVENT_ID> --participant r1 --text \"merci, c'est parfait\"")]
    Respond {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(long, value_name = "PARTICIPANT_ID", help = "Responding recipient")]
        participant: String,
        #[arg(long = "type", value_name = "TYPE", default_value = "reply")]
        response_type: String,
        #[arg(long, value_name = "TEXT", default_value = "")]
        text: String,
        #[arg(long, value_enum, value_name = "SENTIMENT")]
        sentiment: Option<SentimentArg>,
    },
    #[command(
        about = "Filter and sort events",
        long_about = "Filter and sort events with a JSON query file, shorthand flags, or both. Flags override the matching parts of the file."
    )]
    #[command(after_long_help = "Examples:
  tidings query query.json
  tidings query --window 7d --sort engagement_score
  tidings query --replay tidings.ndjson")]
    Query {
        #[arg(value_name = "QUERY_FILE", help = "JSON query file")]
        file: Option<PathBuf>,
        #[arg(long, value_name = "WINDOW", help = "Relative window such as 24h, 7d, 2w, 3m, 1y")]
        window: Option<TimeWindow>,
        #[arg(long, value_name = "FIELD", help = "Sort field (e.g. created_at, risk_score)")]
        sort: Option<SortField>,
        #[arg(long, value_enum, default_value = "desc", help = "Sort direction")]
        direction: Direction,
        #[arg(
            long,
            value_name = "LOG",
            conflicts_with_all = ["file", "window", "sort"],
            help = "Re-run every query logged in an NDJSON file"
        )]
        replay: Option<PathBuf>,
    },
    #[command(about = "Search events by text")]
    #[command(arg_required_else_help = true)]
    Search {
        #[arg(value_name = "TEXT")]
        text: String,
        #[arg(long, help = "Literal substring matching instead of relevance ranking")]
        classic: bool,
    },
    #[command(about = "Aggregate statistics over a time window")]
    #[command(after_long_help = "Examples:
  tidings analytics --last 30d
  tidings analytics --start 2026-03-01T00:00:00Z --end 2026-03-31T23:59:59Z")]
    Analytics {
        #[arg(long, value_name = "RFC3339", conflicts_with = "last")]
        start: Option<DateTime<Utc>>,
        #[arg(long, value_name = "RFC3339", help = "Window end (default: now)")]
        end: Option<DateTime<Utc>>,
        #[arg(long, value_name = "WINDOW", help = "Relative window ending at --end (default: 30d)")]
        last: Option<TimeWindow>,
    },
    #[command(about = "Detect activity patterns and project next week's volume")]
    Patterns {
        #[arg(long, value_name = "WINDOW", help = "Only analyse events in this relative window")]
        window: Option<TimeWindow>,
    },
    #[command(
        about = "Generate shell completion script",
        long_about = "Generate shell completion script for your shell. Redirect output to your shell completion directory."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  tidings completion bash > ~/.local/share/bash-completion/completions/tidings
  tidings completion zsh > ~/.zsh/completions/_tidings
  tidings completion fish > ~/.config/fish/completions/tidings.fish")]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Target shell")]
        shell: Shell,
    },
    #[command(
        about = "Generate a man page",
        long_about = "Generate a roff man page for tidings."
    )]
    Man {
        #[arg(
            long,
            value_name = "PATH",
            help = "Write man page to file (stdout when omitted)"
        )]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SentimentArg {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl From<SentimentArg> for Sentiment {
    fn from(value: SentimentArg) -> Self {
        match value {
            SentimentArg::VeryNegative => Sentiment::VeryNegative,
            SentimentArg::Negative => Sentiment::Negative,
            SentimentArg::Neutral => Sentiment::Neutral,
            SentimentArg::Positive => Sentiment::Positive,
            SentimentArg::VeryPositive => Sentiment::VeryPositive,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn run() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let now = Utc::now();
    match cli.command {
        Commands::Ingest { file } => {
            let mut session = Session::open(&cli.root, cli.state_db)?;
            print_json(&commands::ingest(&mut session, &read_input(&file)?, now)?)
        }
        Commands::ImportLegacy { file } => {
            let mut session = Session::open(&cli.root, cli.state_db)?;
            print_json(&commands::import_legacy(
                &mut session,
                &read_input(&file)?,
                now,
            )?)
        }
        Commands::Get { id } => {
            let session = Session::open(&cli.root, cli.state_db)?;
            print_json(session.store.get_by_id(&id)?)
        }
        Commands::Delete { id } => {
            let mut session = Session::open(&cli.root, cli.state_db)?;
            print_json(&session.store.delete(&id)?)
        }
        Commands::View { id } => {
            let mut session = Session::open(&cli.root, cli.state_db)?;
            print_json(&commands::record_view(&mut session, &id, now)?)
        }
        Commands::Respond {
            id,
            participant,
            response_type,
            text,
            sentiment,
        } => {
            let mut session = Session::open(&cli.root, cli.state_db)?;
            print_json(&commands::record_response(
                &mut session,
                &id,
                &participant,
                &response_type,
                &text,
                sentiment.map(Sentiment::from),
                now,
            )?)
        }
        Commands::Query {
            file,
            window,
            sort,
            direction,
            replay,
        } => {
            let session = Session::open(&cli.root, cli.state_db)?;
            if let Some(log) = replay {
                return print_json(&commands::replay(&session, &log, now)?);
            }
            let mut query = match file {
                Some(path) => EventQuery::from_json(&read_input(&path)?)
                    .with_context(|| format!("load query {}", path.display()))?,
                None => EventQuery::default(),
            };
            if window.is_some() {
                query.time = window;
            }
            if let Some(field) = sort {
                query = query.sorted_by(field, direction.into());
            }
            print_json(&commands::run_query(&session, &query, now)?)
        }
        Commands::Search { text, classic } => {
            let session = Session::open(&cli.root, cli.state_db)?;
            print_json(&commands::search(&session, &text, classic))
        }
        Commands::Analytics { start, end, last } => {
            let end = end.unwrap_or(now);
            let start = match (start, last) {
                (Some(start), _) => start,
                (None, last) => {
                    let last = match last {
                        Some(window) => window,
                        None => DEFAULT_ANALYTICS_WINDOW.parse()?,
                    };
                    match last.bounds(end)? {
                        (Some(start), _) => start,
                        (None, _) => bail!("--last must be a relative window"),
                    }
                }
            };
            let window = AnalyticsWindow::new(start, end)?;
            let session = Session::open(&cli.root, cli.state_db)?;
            print_json(&commands::analytics_report(&session, window)?)
        }
        Commands::Patterns { window } => {
            let session = Session::open(&cli.root, cli.state_db)?;
            print_json(&commands::patterns(&session, window, now)?)
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Man { output } => {
            let man = clap_mangen::Man::new(Cli::command());
            match output {
                Some(path) => {
                    let mut bytes = Vec::new();
                    man.render(&mut bytes)?;
                    fs::write(path, bytes)?;
                }
                None => {
                    man.render(&mut io::stdout())?;
                }
            }
            Ok(())
        }
    }
}
