//! Roster CLI
//!
//! Command-line interface for browsing and editing the student roster.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roster_core::{RosterConfig, Session, View};
use roster_remote::{Draft, JsonFileRemote, Record, RecordId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Roster - Student records grouped by course")]
#[command(version)]
struct Cli {
    /// Record file (default: from config)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    /// Log at the configured level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List students grouped by course
    List {
        /// Only show students matching this term
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show one student's details
    Show { id: String },

    /// Add a student
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        course: String,
    },

    /// Edit a student; unspecified fields keep their values
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        course: Option<String>,
    },

    /// Delete a student
    Delete { id: String },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = RosterConfig::load();
    if let Some(path) = cli.data_file {
        config.data_file = path;
    }

    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    if let Commands::Config = cli.command {
        return cmd_config(&config);
    }

    let remote = open_remote(&config)?;
    let session = Session::new(remote, &config);
    session
        .start()
        .await
        .with_context(|| format!("Error loading students from {}", config.data_file.display()))?;
    tracing::debug!(file = %config.data_file.display(), "Session ready");

    let outcome = match cli.command {
        Commands::List { search } => cmd_list(&session, search),
        Commands::Show { id } => cmd_show(&session, &id),
        Commands::Add {
            name,
            email,
            phone,
            course,
        } => cmd_add(&session, Draft::new(name, email, phone, course)).await,
        Commands::Edit {
            id,
            name,
            email,
            phone,
            course,
        } => {
            let edits = FieldEdits {
                name,
                email,
                phone,
                course,
            };
            cmd_edit(&session, &id, edits).await
        }
        Commands::Delete { id } => cmd_delete(&session, &id).await,
        Commands::Config => Ok(()),
    };

    session.teardown();
    outcome
}

/// File-backed service for the configured record file, creating its
/// directories on first use.
fn open_remote(config: &RosterConfig) -> Result<Arc<JsonFileRemote>> {
    config
        .ensure_dirs()
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    Ok(Arc::new(JsonFileRemote::new(&config.data_file)))
}

fn cmd_list(session: &Session, search: Option<String>) -> Result<()> {
    if let Some(term) = search {
        session.search(term);
        session.flush_search();
    }

    print!("{}", render_view(&session.view()));
    Ok(())
}

fn cmd_show(session: &Session, id: &str) -> Result<()> {
    let record = session.open_details(&RecordId::parse(id))?;
    print!("{}", render_details(&record));
    session.close();
    Ok(())
}

async fn cmd_add(session: &Session, draft: Draft) -> Result<()> {
    session.open_add();
    match session.submit(&draft).await {
        Ok(record) => {
            println!("✓ Student added successfully! (ID: {})", record.id);
            Ok(())
        }
        Err(e) => anyhow::bail!("✗ {}", e),
    }
}

/// Field overrides for `edit`.
struct FieldEdits {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    course: Option<String>,
}

impl FieldEdits {
    fn apply(self, draft: &mut Draft) {
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(email) = self.email {
            draft.email = email;
        }
        if let Some(phone) = self.phone {
            draft.phone = phone;
        }
        if let Some(course) = self.course {
            draft.course = course;
        }
    }
}

async fn cmd_edit(session: &Session, id: &str, edits: FieldEdits) -> Result<()> {
    let mut draft = session.open_edit(&RecordId::parse(id))?;
    edits.apply(&mut draft);

    match session.submit(&draft).await {
        Ok(record) => {
            println!("✓ Student updated successfully! (ID: {})", record.id);
            Ok(())
        }
        Err(e) => anyhow::bail!("✗ {}", e),
    }
}

async fn cmd_delete(session: &Session, id: &str) -> Result<()> {
    match session.delete(&RecordId::parse(id)).await {
        Ok(()) => {
            println!("✓ Student deleted successfully!");
            Ok(())
        }
        Err(e) => anyhow::bail!("✗ {}", e),
    }
}

fn cmd_config(config: &RosterConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render config")?;
    print!("{}", yaml);
    Ok(())
}

fn render_view(view: &View) -> String {
    let mut out = format!("Total Students: {}\n", view.total());

    if view.is_filtered() {
        if view.is_empty() {
            out.push_str(&format!("No students found matching \"{}\"\n", view.term()));
            return out;
        }
        out.push_str(&format!(
            "Showing {} matching students\n",
            view.matched_count()
        ));
    } else if view.is_empty() {
        out.push_str("\nNo students yet. Add one with: roster add\n");
        return out;
    }

    for group in view.groups() {
        out.push_str(&format!("\n{} ({})\n", group.key, group.len()));
        for record in &group.records {
            out.push_str(&format!(
                "  #{:<4} {:<24} {:<28} {}\n",
                record.id.to_string(),
                record.name,
                record.email,
                record.phone().unwrap_or("-")
            ));
        }
    }

    out
}

fn render_details(record: &Record) -> String {
    format!(
        "Student #{}\n\n  Name:     {}\n  Email:    {}\n  Phone:    {}\n  Course:   {}\n  Added:    {}\n",
        record.id,
        record.name,
        record.email,
        record.phone().unwrap_or("-"),
        record.course().unwrap_or("-"),
        record.display_date()
    )
}
