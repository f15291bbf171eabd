use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use intake::access::{AccessError, AccessPolicy, Identity, Session};
use intake::attachments::{ContentStore, Upload};
use intake::config::Config;
use intake::model::{AutomationFit, Direction, Idea, IdeaDraft, ImpactType, ProcessFrequency, Status};
use intake::serve::{self, AppState};
use intake::{logging, Board, Database, Subscription, Summary};
use std::path::{Path, PathBuf};
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "intake")]
#[command(author, version, about = "Idea intake - submit, vote on and triage process-improvement ideas")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Act as this user (email); must be in an allowed domain
    #[arg(long = "as", global = true, env = "INTAKE_USER_EMAIL")]
    user: Option<String>,

    /// Display name for the acting user
    #[arg(long, global = true, env = "INTAKE_USER_NAME")]
    name: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create .intake/ with a default config and an empty database
    Init,

    /// Submit a new idea
    Submit {
        #[arg(short, long)]
        title: String,

        /// What is the problem today?
        #[arg(short, long)]
        problem: String,

        /// What should happen instead?
        #[arg(short, long)]
        outcome: String,

        #[arg(short, long)]
        category: String,

        #[arg(short, long)]
        department: String,

        #[arg(long)]
        impact: Option<ImpactType>,

        #[arg(long)]
        fit: Option<AutomationFit>,

        #[arg(long)]
        frequency: Option<ProcessFrequency>,

        /// Hours per week spent on the process today
        #[arg(long)]
        hours: Option<f64>,

        #[arg(long)]
        benefit: Option<String>,

        /// File to attach (repeatable)
        #[arg(short, long = "attach")]
        attach: Vec<PathBuf>,
    },

    /// List ideas, newest first
    List {
        #[arg(short, long)]
        status: Option<Status>,

        /// Order by score instead of submission time
        #[arg(long)]
        by_score: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show one idea
    Show {
        id: i32,

        #[arg(long)]
        json: bool,
    },

    /// Vote an idea up or down; repeating a vote withdraws it
    Vote { id: i32, direction: Direction },

    /// Move an idea to a new status (admin)
    Status {
        id: i32,
        status: Status,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show the kanban board
    Board {
        #[arg(long)]
        json: bool,
    },

    /// Show dashboard statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Verify every score against its votes
    Check,

    /// Delete stored blobs that no idea references
    ///
    /// Blobs younger than fifteen minutes are always kept, since a submission
    /// stages its files before the record that references them is written.
    Sweep {
        /// Only remove blobs older than this (defaults to config)
        #[arg(long)]
        max_age_hours: Option<u64>,
    },

    /// Follow the feed and print each change
    Watch {
        /// Poll interval when no file events arrive
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Print the current feed and exit
        #[arg(long)]
        once: bool,
    },

    /// Start the JSON API server
    Serve {
        /// Port to listen on (defaults to config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Handles built from the resolved config and database path
struct Context {
    config: Config,
    db: Database,
    store: ContentStore,
    policy: AccessPolicy,
}

impl Context {
    fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load();
        let db_path = Database::db_path();
        let db = Database::open_with(&db_path, &config.voting)?;
        let store = ContentStore::from_config(&config.storage, &base_dir(&db_path));
        let policy = AccessPolicy::from_config(&config.access);
        Ok(Self {
            config,
            db,
            store,
            policy,
        })
    }

    fn sign_in(&self, cli: &CliIdentity) -> Result<Session, AccessError> {
        let email = cli.user.clone().ok_or(AccessError::MissingIdentity)?;
        let mut identity = Identity::from_email(&email);
        identity.display_name = cli.name.clone();
        self.policy.sign_in(identity)
    }
}

struct CliIdentity {
    user: Option<String>,
    name: Option<String>,
}

fn base_dir(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    let who = CliIdentity {
        user: cli.user,
        name: cli.name,
    };

    match cli.command {
        Command::Init => init(),
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "intake", &mut std::io::stdout());
            Ok(())
        }
        Command::Submit {
            title,
            problem,
            outcome,
            category,
            department,
            impact,
            fit,
            frequency,
            hours,
            benefit,
            attach,
        } => {
            let ctx = Context::open()?;
            let session = ctx.sign_in(&who)?;
            let uploads = attach
                .iter()
                .map(|path| {
                    Upload::from_path(path).map_err(|e| format!("{}: {}", path.display(), e))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let draft = IdeaDraft {
                title,
                problem,
                desired_outcome: outcome,
                category,
                department,
                impact_type: impact,
                automation_fit: fit,
                estimated_benefit: benefit,
                process_frequency: frequency,
                time_spent_hours_per_week: hours,
            };
            let idea = ctx.db.submit_idea(&draft, &session.author(), &ctx.store, &uploads)?;
            println!(
                "{} idea {} \"{}\" ({} attachment(s))",
                "Submitted".green(),
                idea.id,
                idea.title,
                idea.attachments.len()
            );
            Ok(())
        }
        Command::List {
            status,
            by_score,
            json,
        } => {
            let ctx = Context::open()?;
            ctx.sign_in(&who)?;
            let feed = ctx.db.feed()?;
            let mut ideas: Vec<Idea> = feed
                .ideas
                .into_iter()
                .filter(|i| status.map_or(true, |s| i.status == s))
                .collect();
            if by_score {
                ideas.sort_by(|a, b| b.score.cmp(&a.score));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&ideas)?);
                return Ok(());
            }
            if ideas.is_empty() {
                println!("No ideas yet.");
            }
            for idea in &ideas {
                print_row(idea);
            }
            if !feed.rejected.is_empty() {
                eprintln!(
                    "{} {} malformed record(s) skipped",
                    "Warning:".yellow(),
                    feed.rejected.len()
                );
            }
            Ok(())
        }
        Command::Show { id, json } => {
            let ctx = Context::open()?;
            let session = ctx.sign_in(&who)?;
            let idea = ctx.db.get_idea(id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&idea)?);
                return Ok(());
            }
            let own = ctx.db.get_vote(id, &session.identity.uid)?;
            print_idea(&idea);
            if let Some(vote) = own {
                println!("{:>14} {}", "Your vote:", vote.direction);
            }
            Ok(())
        }
        Command::Vote { id, direction } => {
            let ctx = Context::open()?;
            let session = ctx.sign_in(&who)?;
            let receipt = ctx.db.cast_vote(id, &session.identity.uid, direction)?;
            let action = match receipt.current {
                Some(d) => format!("Voted {}", d).green(),
                None => "Withdrew vote".yellow(),
            };
            println!("{} on idea {} (score {:+})", action, id, receipt.score);
            Ok(())
        }
        Command::Status { id, status, notes } => {
            let ctx = Context::open()?;
            let session = ctx.sign_in(&who)?;
            session.require_admin()?;
            let idea = ctx.db.update_status(id, status, notes.as_deref())?;
            println!("{} idea {} to {}", "Moved".green(), idea.id, idea.status.to_string().bold());
            Ok(())
        }
        Command::Board { json } => {
            let ctx = Context::open()?;
            ctx.sign_in(&who)?;
            let board = Board::from_ideas(ctx.db.feed()?.ideas);
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
                return Ok(());
            }
            for column in &board.columns {
                println!("{} ({})", column.status.to_string().bold(), column.ideas.len());
                for idea in &column.ideas {
                    println!("  {:>4}  {:>+4}  {}", idea.id, idea.score, idea.title);
                }
            }
            Ok(())
        }
        Command::Stats { json } => {
            let ctx = Context::open()?;
            ctx.sign_in(&who)?;
            let summary = Summary::compute(&ctx.db.feed()?.ideas);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            println!("{:>14} {}", "Total:", summary.total);
            println!("{:>14} {}", "Completed:", summary.completed);
            println!("{:>14} {}", "In progress:", summary.in_progress);
            println!("{:>14} {:.1}", "Avg score:", summary.average_score);
            for (label, buckets) in [
                ("By status", &summary.by_status),
                ("By category", &summary.by_category),
                ("By department", &summary.by_department),
            ] {
                println!("{}", label.bold());
                for bucket in buckets {
                    println!("  {:>4}  {}", bucket.count, bucket.name);
                }
            }
            Ok(())
        }
        Command::Check => {
            let ctx = Context::open()?;
            let checks = ctx.db.check_scores()?;
            let broken: Vec<_> = checks.iter().filter(|c| !c.is_consistent()).collect();
            for check in &broken {
                println!(
                    "{} idea {}: stored {} but votes sum to {}",
                    "MISMATCH".red(),
                    check.idea_id,
                    check.stored,
                    check.recomputed
                );
            }
            if broken.is_empty() {
                println!("{} {} score(s) match their votes", "OK".green(), checks.len());
                Ok(())
            } else {
                Err(format!("{} score(s) out of sync", broken.len()).into())
            }
        }
        Command::Sweep { max_age_hours } => {
            let ctx = Context::open()?;
            let hours = max_age_hours.unwrap_or(ctx.config.storage.orphan_max_age_hours);
            let referenced = ctx.db.attachment_keys()?;
            let report = ctx
                .store
                .sweep_orphans(&referenced, Duration::from_secs(hours.saturating_mul(3600)))?;
            println!(
                "{} {} blob(s), kept {}, removed {}",
                "Scanned".green(),
                report.scanned,
                report.kept,
                report.removed.len()
            );
            for key in &report.removed {
                println!("  removed {}", key);
            }
            Ok(())
        }
        Command::Watch { interval_ms, once } => {
            let ctx = Context::open()?;
            ctx.sign_in(&who)?;
            let mut subscription = Subscription::open(&ctx.db, Duration::from_millis(interval_ms));
            loop {
                let snapshot = subscription.next_snapshot()?;
                println!(
                    "{} {} idea(s), {} vote(s)",
                    "Feed".cyan(),
                    snapshot.ideas.len(),
                    snapshot.fingerprint.votes
                );
                for idea in snapshot.ideas.iter().take(10) {
                    print_row(idea);
                }
                if once {
                    return Ok(());
                }
            }
        }
        Command::Serve { port } => {
            let ctx = Context::open()?;
            let mut server_config = ctx.config.server.clone();
            if let Some(port) = port {
                server_config.port = port;
            }
            eprintln!("\n{}", "Intake".green().bold());
            eprintln!("   API: http://localhost:{}/api/ideas", server_config.port);
            eprintln!("   Press Ctrl+C to stop\n");
            let state = AppState {
                db: ctx.db,
                store: ctx.store,
                policy: ctx.policy,
            };
            serve::start_server(state, &server_config)?;
            Ok(())
        }
    }
}

fn init() -> CliResult {
    let intake_dir = PathBuf::from(".intake");
    let config_path = match std::env::var("INTAKE_CONFIG_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => intake_dir.join("config.toml"),
    };
    let db_path = match std::env::var("INTAKE_DB_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => intake_dir.join("intake.db"),
    };

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    if config_path.exists() {
        println!("   {} {}", "Exists".yellow(), config_path.display());
    } else {
        std::fs::write(&config_path, Config::default().to_toml_string())?;
        println!("   {} {}", "Creating".green(), config_path.display());
    }

    let config = Config::load_from(&config_path)?;
    Database::open_with(&db_path, &config.voting)?;
    println!("   {} {}", "Database".green(), db_path.display());
    println!("\n{}", "Intake initialized.".bold());
    Ok(())
}

fn status_label(status: Status) -> colored::ColoredString {
    match status {
        Status::Submitted => status.as_str().normal(),
        Status::InProgress => status.as_str().cyan(),
        Status::Approved => status.as_str().green(),
        Status::Rejected => status.as_str().red(),
        Status::Done => status.as_str().blue(),
    }
}

fn print_row(idea: &Idea) {
    println!(
        "{:>4}  {:>+4}  {:<12} {}",
        idea.id,
        idea.score,
        status_label(idea.status),
        idea.title
    );
}

fn print_idea(idea: &Idea) {
    println!("{} {}", format!("#{}", idea.id).bold(), idea.title.bold());
    println!("{:>14} {}", "Status:", status_label(idea.status));
    println!("{:>14} {:+}", "Score:", idea.score);
    println!("{:>14} {}", "Author:", idea.author.name);
    println!("{:>14} {}", "Category:", idea.category);
    println!("{:>14} {}", "Department:", idea.department);
    if let Some(impact) = idea.impact_type {
        println!("{:>14} {}", "Impact:", impact);
    }
    if let Some(fit) = idea.automation_fit {
        println!("{:>14} {}", "Fit:", fit);
    }
    if let Some(frequency) = idea.process_frequency {
        println!("{:>14} {}", "Frequency:", frequency);
    }
    if let Some(hours) = idea.time_spent_hours_per_week {
        println!("{:>14} {}", "Hours/week:", hours);
    }
    if let Some(benefit) = &idea.estimated_benefit {
        println!("{:>14} {}", "Benefit:", benefit);
    }
    println!("{:>14} {}", "Submitted:", idea.created_at.format("%Y-%m-%d %H:%M"));
    println!("\n{}\n{}", "Problem".bold(), idea.problem);
    println!("\n{}\n{}", "Desired outcome".bold(), idea.desired_outcome);
    if let Some(notes) = &idea.review_notes {
        println!("\n{}\n{}", "Review notes".bold(), notes);
    }
    for attachment in &idea.attachments {
        println!("{:>14} {} ({} bytes) {}", "Attachment:", attachment.name, attachment.size, attachment.url);
    }
}
