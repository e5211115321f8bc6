use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use inspection_session::discount::{self, MaterialType};
use inspection_session::logging;
use inspection_session::processing::ProcessingStage;
use inspection_session::templates::TemplateId;
use inspection_session::uploads::FileDescriptor;
use inspection_session::{Config, SessionDeps, SessionStore, WorkflowSession};

#[derive(Parser)]
#[command(name = "inspection")]
#[command(about = "Workflow session manager for inspection reports")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current project
    Status,

    /// Start tracking a project
    Init {
        /// Project id assigned by the backend
        project_id: String,
    },

    /// Move to a workflow step (auto-saves a snapshot past step 1)
    Step { step: u32 },

    /// Select a report template, paying any price difference
    Template {
        /// basic, ortho, 3d or full
        id: TemplateId,
    },

    /// Credit balance and history
    Credits {
        #[command(subcommand)]
        action: CreditsCommand,
    },

    /// Upload supplementary files and wait for them to finish
    Upload {
        /// pos, sfm, ortho or model3d
        #[arg(short, long)]
        material: MaterialType,

        files: Vec<PathBuf>,
    },

    /// Manage supplementary files
    Files {
        #[command(subcommand)]
        action: FilesCommand,
    },

    /// Advanced processing stages
    Stage {
        #[command(subcommand)]
        action: StageCommand,
    },

    /// Undo history
    Snapshot {
        #[command(subcommand)]
        action: SnapshotCommand,
    },

    /// Start over; credits are kept
    Reset,
}

#[derive(Subcommand)]
enum CreditsCommand {
    Balance,
    History {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    Add {
        amount: u64,
        #[arg(short, long, default_value = "top-up")]
        reason: String,
    },
    Spend {
        amount: u64,
        #[arg(short, long)]
        reason: String,
    },
    Level,
}

#[derive(Subcommand)]
enum FilesCommand {
    List,
    Retry { id: String },
    Cancel { id: String },
    Clear,
}

#[derive(Subcommand)]
enum StageCommand {
    Set { stage: String },
    Progress { stage: String, value: f64 },
    Reset,
}

#[derive(Subcommand)]
enum SnapshotCommand {
    Create,
    List,
    Restore { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let _logging = logging::init_logging(&config, cli.debug)?;

    let store = SessionStore::from_config(&config);
    let mut session = open_session(&config, &store)?;

    match cli.command {
        Commands::Status => cmd_status(&session),
        Commands::Init { project_id } => {
            session.set_project_id(Some(project_id.clone()));
            println!("Tracking project {}", project_id);
        }
        Commands::Step { step } => cmd_step(&mut session, step)?,
        Commands::Template { id } => {
            let charged = session.switch_template(id)?;
            println!(
                "Template set to {} (charged {}, balance {})",
                id,
                charged,
                session.credits().balance()
            );
        }
        Commands::Credits { action } => cmd_credits(&mut session, action)?,
        Commands::Upload { material, files } => cmd_upload(&session, material, files).await?,
        Commands::Files { action } => cmd_files(&session, action).await,
        Commands::Stage { action } => cmd_stage(&mut session, action)?,
        Commands::Snapshot { action } => cmd_snapshot(&mut session, action)?,
        Commands::Reset => {
            session.reset_project();
            println!("Project reset (balance {})", session.credits().balance());
        }
    }

    store.save(&session.to_persisted())?;
    Ok(())
}

fn open_session(config: &Config, store: &SessionStore) -> Result<WorkflowSession> {
    let deps = SessionDeps::from_config(config);
    let session = match store.load()? {
        Some(persisted) => WorkflowSession::restore(config, deps, persisted),
        None => WorkflowSession::new(config, deps),
    };
    session.recover_interrupted_uploads();
    Ok(session)
}

fn cmd_status(session: &WorkflowSession) {
    println!(
        "Project: {}",
        session.project_id().unwrap_or("(none)")
    );
    println!(
        "Step {}: {}",
        session.current_step(),
        WorkflowSession::step_name(session.current_step())
    );
    println!(
        "Template: {}",
        session
            .selected_template()
            .map(|t| t.name.as_str())
            .unwrap_or("(none)")
    );

    let low = if session.has_low_balance() { " (low)" } else { "" };
    println!("Credits: {}{}", session.credits().balance(), low);

    let stats = session.statistics();
    println!(
        "Detections: {} images, {} with issues, {} issues, avg confidence {:.2}",
        stats.total_images, stats.images_with_issues, stats.issue_count, stats.avg_confidence
    );

    if session.has_supplementary_data() {
        let skipped: Vec<&str> = session.skipped_stages().iter().map(|s| s.as_str()).collect();
        println!(
            "Supplementary discount: {}% (skips: {})",
            session.discount_percent(),
            skipped.join(", ")
        );
        if let Some(template) = session.selected_template() {
            println!(
                "Processing price: {} credits",
                discount::discounted_price(template.id.credits(), session.discount_percent())
            );
        }
    }

    if session.needs_advanced_report() {
        let processing = session.processing();
        println!(
            "Processing: {} ({:.0}%)",
            processing.active_stage().display_name(),
            processing.current_stage_progress()
        );
        let plan: Vec<&str> = session.processing_plan().iter().map(|s| s.as_str()).collect();
        println!("Plan: {}", plan.join(" -> "));
        if let Some(hours) = session.estimated_hours() {
            println!("Estimated: {}-{} hours", hours.min, hours.max);
        }
    }
}

fn cmd_step(session: &mut WorkflowSession, step: u32) -> Result<()> {
    if step == 0 {
        bail!("Steps are numbered from 1");
    }
    if let Some(snapshot) = session.auto_save_snapshot() {
        println!("Saved snapshot {} ({})", snapshot.id, snapshot.step_name);
    }
    session.set_step(step);
    println!("Step {}: {}", step, WorkflowSession::step_name(step));
    Ok(())
}

fn cmd_credits(session: &mut WorkflowSession, action: CreditsCommand) -> Result<()> {
    match action {
        CreditsCommand::Balance => println!("{}", session.credits().balance()),
        CreditsCommand::History { limit } => {
            let history = session.credits().history();
            if history.is_empty() {
                println!("No credit history");
                return Ok(());
            }
            println!("Credit History ({} entries)", history.len());
            println!("{}", "─".repeat(60));
            for entry in history.iter().take(limit) {
                println!(
                    "{} {:>+6} {:>7}  {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.signed_amount,
                    entry.balance_after,
                    entry.reason
                );
            }
        }
        CreditsCommand::Add { amount, reason } => {
            session.credits_mut().credit(amount, &reason);
            println!("Balance: {}", session.credits().balance());
        }
        CreditsCommand::Spend { amount, reason } => {
            if !session.credits_mut().debit(amount, &reason) {
                bail!(
                    "Insufficient credits: {} required, {} available",
                    amount,
                    session.credits().balance()
                );
            }
            println!("Balance: {}", session.credits().balance());
        }
        CreditsCommand::Level => {
            println!("Level: {}", session.user_level().display_name());
            match session.next_level() {
                Some(next) => println!(
                    "Next: {} ({} credits needed, {:.0}%)",
                    next.level.display_name(),
                    next.credits_needed,
                    next.progress
                ),
                None => println!("Top level reached"),
            }
        }
    }
    Ok(())
}

async fn cmd_upload(
    session: &WorkflowSession,
    material: MaterialType,
    files: Vec<PathBuf>,
) -> Result<()> {
    if files.is_empty() {
        bail!("No files given");
    }

    let mut descriptors = Vec::with_capacity(files.len());
    for path in &files {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;
        descriptors.push(FileDescriptor::new(name, metadata.len()));
    }

    let uploads = session.uploads();
    uploads.enqueue(descriptors, material);
    let started = uploads.start_all();
    println!("Uploading {} file(s)...", started);
    uploads.wait_idle().await;

    print_files(session);
    println!("Discount: {}%", uploads.discount_percent());
    Ok(())
}

fn print_files(session: &WorkflowSession) {
    let files = session.uploads().files();
    if files.is_empty() {
        println!("No supplementary files");
        return;
    }
    for file in files {
        println!(
            "{} [{}] {} {} ({:.0}%)",
            file.id,
            file.material_type,
            file.name,
            file.transfer_state.as_str(),
            file.progress
        );
    }
}

async fn cmd_files(session: &WorkflowSession, action: FilesCommand) {
    let uploads = session.uploads();
    match action {
        FilesCommand::List => print_files(session),
        FilesCommand::Retry { id } => {
            if uploads.retry(&id) {
                uploads.wait_idle().await;
                print_files(session);
            } else {
                println!("Nothing to retry for {}", id);
            }
        }
        FilesCommand::Cancel { id } => {
            if uploads.cancel(&id) {
                println!("Removed {}", id);
            } else {
                println!("No file {}", id);
            }
        }
        FilesCommand::Clear => {
            if uploads.clear_completed() {
                println!("Supplementary files cleared");
            } else {
                println!("Uploads in progress; not cleared");
            }
        }
    }
}

fn parse_stage(s: &str) -> Result<ProcessingStage> {
    ProcessingStage::parse(s).ok_or_else(|| anyhow!("Unknown processing stage '{}'", s))
}

fn cmd_stage(session: &mut WorkflowSession, action: StageCommand) -> Result<()> {
    match action {
        StageCommand::Set { stage } => {
            let stage = parse_stage(&stage)?;
            if session.skipped_stages().contains(&stage) {
                println!("Note: {} is covered by supplementary data", stage.display_name());
            }
            session.processing_mut().set_stage(stage);
            if stage == ProcessingStage::Completed {
                session.set_advanced_processed(true);
            }
            println!("Active stage: {}", stage.display_name());
        }
        StageCommand::Progress { stage, value } => {
            let stage = parse_stage(&stage)?;
            session.processing_mut().set_progress(stage, value);
            println!(
                "{}: {:.0}%",
                stage.display_name(),
                session.processing().progress(stage)
            );
        }
        StageCommand::Reset => {
            session.processing_mut().reset_progress();
            println!("Processing progress reset");
        }
    }
    Ok(())
}

fn cmd_snapshot(session: &mut WorkflowSession, action: SnapshotCommand) -> Result<()> {
    match action {
        SnapshotCommand::Create => {
            let snapshot = session.create_snapshot();
            println!("Created snapshot {} ({})", snapshot.id, snapshot.step_name);
        }
        SnapshotCommand::List => {
            let snapshots = session.snapshots();
            if snapshots.is_empty() {
                println!("No snapshots");
                return Ok(());
            }
            for snapshot in snapshots {
                println!(
                    "{} {} step {} ({}) template: {}, {} images",
                    snapshot.id,
                    snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    snapshot.step,
                    snapshot.step_name,
                    snapshot.template_name,
                    snapshot.image_count
                );
            }
        }
        SnapshotCommand::Restore { id } => {
            if !session.restore_snapshot(id) {
                bail!("Snapshot {} not found", id);
            }
            println!(
                "Restored step {}: {}; re-upload images to continue",
                session.current_step(),
                WorkflowSession::step_name(session.current_step())
            );
        }
    }
    Ok(())
}
