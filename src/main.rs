use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::{fmt, prelude::*};

use zooquest::access::{category_overview, is_category_accessible, unlocked_letters};
use zooquest::catalog::{category_letter, Catalog, Difficulty};
use zooquest::clock::{Clock, SystemClock};
use zooquest::config;
use zooquest::notifications::{
    format_time_ago, NewNotification, Notification, NotificationCenter, NotificationConfig,
    NotificationType,
};
use zooquest::output::{print_json, progress_bar, truncate, JsonOutput};
use zooquest::progress::{ProgressTracker, RateQuery, UnlockListener};
use zooquest::storage::{KeyValueStore, SqliteStore};
use zooquest::{Error, Result};

#[derive(Parser)]
#[command(name = "zooquest")]
#[command(about = "Progress and notifications for the zoo database SQL course")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// JSON exercise catalog to use instead of the built-in course
    #[arg(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Show every category with progress and lock state
    Categories,

    /// Show the tasks of one category
    Category {
        /// Category letter (A-Z)
        letter: String,
    },

    /// Mark a task done, or undo it
    Toggle {
        /// Task ID, e.g. a1
        task_id: String,
    },

    /// Browse and manage the notification log
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Post a notification
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Turn pop-up notifications on or off
    Push {
        /// on/off
        state: String,
    },

    /// Forget all completed tasks and categories
    Reset {
        /// Also drop notifications and settings
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum NotificationCommands {
    /// List notifications, newest first
    List {
        /// Only unread notifications
        #[arg(long, short)]
        unread: bool,
    },

    /// Mark one notification as read
    Read {
        /// Notification ID
        id: String,
    },

    /// Mark every notification as read
    ReadAll,

    /// Delete the whole log
    Clear,
}

#[derive(Subcommand)]
enum NotifyCommands {
    /// Announce that a new version is available
    Update {
        /// Version string, e.g. 1.4.0
        version: String,
    },

    /// Report that installing an update failed
    UpdateFailed,

    /// Post a custom notification
    Send {
        /// success/info/warning/unlock/update
        #[arg(long, short)]
        kind: String,

        #[arg(long, short)]
        title: String,

        #[arg(long, short)]
        message: String,
    },
}

struct App {
    db_path: PathBuf,
    store: Rc<SqliteStore>,
    clock: Rc<dyn Clock>,
    catalog: Rc<Catalog>,
    progress: ProgressTracker,
    center: NotificationCenter,
}

/// Forwards unlocks to the notification center and remembers the last one
/// for the command's own output.
struct Announcer<'a> {
    center: &'a mut NotificationCenter,
    unlocked: Option<char>,
}

impl UnlockListener for Announcer<'_> {
    fn category_unlocked(&mut self, completed: char, unlocked: char) {
        self.unlocked = Some(unlocked);
        self.center.category_unlocked(completed, unlocked);
    }
}

#[derive(Serialize)]
struct TaskView<'a> {
    id: &'a str,
    title: &'a str,
    difficulty: Difficulty,
    completed: bool,
}

#[derive(Serialize)]
struct ToggleView<'a> {
    task_id: &'a str,
    completed: bool,
    category: char,
    completion_rate: f64,
    unlocked: Option<char>,
    toasts: Vec<&'a Notification>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let json = cli.json;
    if let Err(e) = run(cli) {
        if json {
            print_json(&JsonOutput::<()>::err(e.to_string())).ok();
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(e.exit_code());
    }
}

fn init_tracing() {
    let filter = config::log_filter(std::env::var("RUST_LOG").ok().as_deref());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let db_path = config::db_path();
    let store = Rc::new(SqliteStore::open(&db_path)?);
    store.init()?;

    let catalog_path = config::catalog_path(cli.catalog.clone());
    let catalog = Rc::new(config::load_catalog(catalog_path.as_deref())?);
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);

    let progress = ProgressTracker::load(store.clone(), catalog.clone());
    let center = NotificationCenter::load(store.clone(), clock.clone(), NotificationConfig::default());

    let mut app = App {
        db_path,
        store,
        clock,
        catalog,
        progress,
        center,
    };
    let result = dispatch(&mut app, cli.command, cli.json);
    app.center.shutdown();
    result
}

fn dispatch(app: &mut App, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Init => {
            let keys = app.store.keys()?;
            if json {
                print_json(&JsonOutput::ok(serde_json::json!({
                    "path": app.db_path.display().to_string(),
                    "keys": keys,
                })))?;
            } else {
                println!("Database initialized at: {}", app.db_path.display());
                if !keys.is_empty() {
                    println!("Stored: {}", keys.join(", "));
                }
            }
        }

        Commands::Categories => {
            let overview = category_overview(&app.catalog, &app.progress);
            if json {
                print_json(&JsonOutput::ok(&overview))?;
            } else {
                println!("{:<4} {:<32} {:<16} STATUS", "CAT", "TITLE", "PROGRESS");
                println!("{}", "-".repeat(64));
                for status in overview {
                    let state = match (status.accessible, status.bonus) {
                        (false, _) => "locked",
                        (true, true) => "bonus",
                        (true, false) => "open",
                    };
                    println!(
                        "{:<4} {:<32} {} {:>2}/{:<2}  {}",
                        status.letter,
                        truncate(&status.title, 30),
                        progress_bar(status.completion_rate, 8),
                        status.completed,
                        status.task_count,
                        state
                    );
                }
            }
        }

        Commands::Category { letter } => {
            let letter = parse_letter(&letter)?;
            let category = app
                .catalog
                .get(letter)
                .ok_or(Error::UnknownCategory(letter))?;
            let accessible = is_category_accessible(letter, &app.catalog, &app.progress);
            let rate = app.progress.completion_rate(RateQuery::Tasks(&category.tasks));
            let tasks: Vec<TaskView> = category
                .tasks
                .iter()
                .map(|t| TaskView {
                    id: &t.id,
                    title: &t.title,
                    difficulty: t.difficulty,
                    completed: app.progress.is_task_completed(&t.id),
                })
                .collect();

            if json {
                print_json(&JsonOutput::ok(serde_json::json!({
                    "letter": category.letter,
                    "title": category.title,
                    "accessible": accessible,
                    "bonus": category.is_bonus(),
                    "completion_rate": rate,
                    "tasks": tasks,
                })))?;
            } else {
                println!("Category {}: {}", category.letter, category.title);
                if category.is_bonus() {
                    println!("Bonus category");
                }
                println!("Progress: {} {:.0}%", progress_bar(rate, 20), rate);
                if !accessible {
                    println!("Locked: finish every task in the previous category first.");
                }
                println!();
                for task in tasks {
                    println!(
                        "[{}] {:<5} {:<44} {}",
                        if task.completed { "x" } else { " " },
                        task.id,
                        truncate(task.title, 42),
                        task.difficulty.label()
                    );
                }
            }
        }

        Commands::Toggle { task_id } => {
            let (task_id, letter) = resolve_task(&app.catalog, &task_id)?;
            if !is_category_accessible(letter, &app.catalog, &app.progress) {
                return Err(Error::InvalidArgument(format!(
                    "category {} is still locked",
                    letter
                )));
            }

            let mut announcer = Announcer {
                center: &mut app.center,
                unlocked: None,
            };
            let completed = app.progress.toggle_task(&task_id, &mut announcer);
            let unlocked = announcer.unlocked;
            app.center.tick();

            let rate = app.progress.completion_rate(RateQuery::Count {
                total: app.catalog.task_count(letter),
                letter,
            });
            let toasts: Vec<&Notification> =
                app.center.toasts().iter().map(|t| &t.notification).collect();

            if json {
                print_json(&JsonOutput::ok(ToggleView {
                    task_id: &task_id,
                    completed,
                    category: letter,
                    completion_rate: rate,
                    unlocked,
                    toasts,
                }))?;
            } else {
                let verb = if completed { "Completed" } else { "Reopened" };
                println!("{} {} (category {} at {:.0}%)", verb, task_id, letter, rate);
                for toast in toasts {
                    println!("  * {}: {}", toast.title, toast.message);
                }
            }
        }

        Commands::Notifications(cmd) => notifications_command(app, cmd, json)?,

        Commands::Notify(cmd) => {
            let input = match cmd {
                NotifyCommands::Update { version } => NewNotification::update(&version),
                NotifyCommands::UpdateFailed => NewNotification::update_failed(),
                NotifyCommands::Send {
                    kind,
                    title,
                    message,
                } => {
                    let kind = NotificationType::from_str(&kind).ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "Invalid kind '{}'. Use: success, info, warning, unlock or update",
                            kind
                        ))
                    })?;
                    NewNotification::new(kind, title, message)
                }
            };

            let id = app.center.add_notification(input);
            if json {
                print_json(&JsonOutput::ok(serde_json::json!({
                    "id": id,
                    "duplicate": id.is_none(),
                    "toasts": app.center.toasts().len(),
                })))?;
            } else {
                match id {
                    Some(id) => println!("Notification {} added.", id),
                    None => println!("Same notification was posted moments ago; skipped."),
                }
            }
        }

        Commands::Push { state } => {
            let enabled = match state.to_lowercase().as_str() {
                "on" | "true" | "yes" => true,
                "off" | "false" | "no" => false,
                _ => {
                    return Err(Error::InvalidArgument(format!(
                        "Invalid state '{}'. Use: on or off",
                        state
                    )))
                }
            };
            app.center.set_push_enabled(enabled);
            if json {
                print_json(&JsonOutput::ok(serde_json::json!({ "push_enabled": enabled })))?;
            } else {
                println!(
                    "Pop-up notifications {}.",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
        }

        Commands::Reset { all } => {
            app.progress.reset();
            if all {
                app.center.clear_notifications();
                app.store.clear()?;
            }
            if json {
                print_json(&JsonOutput::ok(serde_json::json!({
                    "unlocked": unlocked_letters(&app.catalog, &app.progress),
                })))?;
            } else if all {
                println!("Progress, notifications and settings cleared.");
            } else {
                println!("Progress cleared.");
            }
        }
    }

    Ok(())
}

fn notifications_command(app: &mut App, cmd: NotificationCommands, json: bool) -> Result<()> {
    match cmd {
        NotificationCommands::List { unread } => {
            let now = app.clock.now();
            let list: Vec<&Notification> = app
                .center
                .notifications()
                .iter()
                .filter(|n| !unread || !n.is_read)
                .collect();

            if json {
                print_json(&JsonOutput::ok(&list))?;
            } else if list.is_empty() {
                println!("No notifications.");
            } else {
                println!("{} unread", app.center.unread_count());
                println!();
                for n in list {
                    println!(
                        "{} [{}] {} ({})",
                        if n.is_read { " " } else { "*" },
                        n.kind.as_str(),
                        n.title,
                        format_time_ago(&n.time, now)
                    );
                    println!("    {}", truncate(&n.message, 72));
                    println!("    id: {}", n.id);
                }
            }
        }

        NotificationCommands::Read { id } => {
            if !app.center.notifications().iter().any(|n| n.id == id) {
                return Err(Error::InvalidArgument(format!("No notification with id '{}'", id)));
            }
            app.center.mark_as_read(&id);
            if json {
                print_json(&JsonOutput::<()>::ok(()))?;
            } else {
                println!("Marked {} as read.", id);
            }
        }

        NotificationCommands::ReadAll => {
            app.center.mark_all_as_read();
            if json {
                print_json(&JsonOutput::<()>::ok(()))?;
            } else {
                println!("All notifications marked as read.");
            }
        }

        NotificationCommands::Clear => {
            app.center.clear_notifications();
            if json {
                print_json(&JsonOutput::<()>::ok(()))?;
            } else {
                println!("Notifications cleared.");
            }
        }
    }

    Ok(())
}

// Accepts "A1" for "a1"; the tracker only ever sees catalog ids.
fn resolve_task(catalog: &Catalog, raw: &str) -> Result<(String, char)> {
    let task = catalog
        .find_task(raw.trim())
        .ok_or_else(|| Error::UnknownTask(raw.to_string()))?;
    let letter = category_letter(&task.id).ok_or_else(|| Error::UnknownTask(raw.to_string()))?;
    Ok((task.id.clone(), letter))
}

fn parse_letter(raw: &str) -> Result<char> {
    let mut chars = raw.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(_), None) => category_letter(raw.trim())
            .ok_or_else(|| Error::InvalidArgument(format!("'{}' is not a category letter", raw))),
        _ => Err(Error::InvalidArgument(format!(
            "'{}' is not a category letter",
            raw
        ))),
    }
}
