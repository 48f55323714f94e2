mod cli;

use slidecast::{config, orchestrator::Orchestrator, processor::JobProcessor, stages::StageSet};
use slidecast_common::{paths::detect_input_kind, AvatarOption, InputKind, JobId, StylePreset};
use slidecast_db::pool::{get_conn, init_pool, DbPool};
use slidecast_db::queries::jobs;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "slidecast=trace,slidecast_av=trace,slidecast_db=debug,slidecast_common=debug"
                .to_string()
        } else {
            "slidecast=debug,slidecast_av=debug,slidecast_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Worker => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_worker(config_path))
        }
        Commands::Submit {
            file,
            style,
            avatar,
            kind,
            now,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(submit_job(config_path, &file, &style, &avatar, kind.as_deref(), now))
        }
        Commands::Run { job_id } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_job(config_path, &job_id))
        }
        Commands::Retry { job_id } => retry_job(config_path, &job_id),
        Commands::Status { job_id, json } => show_status(config_path, &job_id, json),
        Commands::Jobs { limit } => list_jobs(config_path, limit),
        Commands::CheckTools => check_tools(),
        Commands::Version => {
            println!("slidecast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_pool(config: &config::Config) -> Result<DbPool> {
    let db_path = config.storage.db_path.to_string_lossy();
    Ok(init_pool(&db_path)?)
}

fn build_orchestrator(config: Arc<config::Config>, pool: DbPool) -> Result<Arc<Orchestrator>> {
    let stages = StageSet::from_config(&config)?;
    Ok(Arc::new(Orchestrator::new(pool, config, stages)))
}

async fn run_worker(config_path: Option<&Path>) -> Result<()> {
    let config = Arc::new(config::load_config_or_default(config_path)?);
    config::ensure_storage_dirs(&config)?;

    tracing::info!("Starting slidecast worker");
    let pool = open_pool(&config)?;
    let orchestrator = build_orchestrator(Arc::clone(&config), pool.clone())?;

    let processor = JobProcessor::new(pool, orchestrator, &config.worker);
    let shutdown = processor.shutdown_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
    });

    processor.run().await;
    Ok(())
}

async fn submit_job(
    config_path: Option<&Path>,
    file: &Path,
    style: &str,
    avatar: &str,
    kind: Option<&str>,
    now: bool,
) -> Result<()> {
    let config = Arc::new(config::load_config_or_default(config_path)?);
    config::ensure_storage_dirs(&config)?;

    if !file.exists() {
        anyhow::bail!("Input file does not exist: {:?}", file);
    }

    let style: StylePreset = style.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let avatar: AvatarOption = avatar.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let kind: InputKind = match kind {
        Some(kind) => kind.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => detect_input_kind(file).with_context(|| {
            format!(
                "Unsupported file type: {:?}. Expected PDF, DOCX, PPTX, TXT, MD, TEX, or ZIP",
                file
            )
        })?,
    };

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("Input path has no file name")?;

    // Copy the upload into managed storage before the job exists
    let upload_dir = config
        .storage
        .upload_dir
        .join(uuid::Uuid::new_v4().to_string());
    std::fs::create_dir_all(&upload_dir)?;
    let stored = upload_dir.join(file_name);
    std::fs::copy(file, &stored)
        .with_context(|| format!("Failed to store upload at {:?}", stored))?;

    let pool = open_pool(&config)?;
    let job = {
        let conn = get_conn(&pool)?;
        jobs::create_job(
            &conn,
            file_name,
            &stored.to_string_lossy(),
            kind,
            style,
            avatar,
        )?
    };

    println!("Created job {}", job.id);

    if now {
        let orchestrator = build_orchestrator(config, pool)?;
        let outcome = orchestrator.run(job.id).await?;
        println!("Video: {}", outcome.video_path.display());
        println!("Duration: {:.1}s, {} slides", outcome.duration_secs, outcome.slide_count);
    } else {
        println!("Queued. Start a worker with `slidecast worker` to process it.");
    }

    Ok(())
}

async fn run_job(config_path: Option<&Path>, job_id: &str) -> Result<()> {
    let config = Arc::new(config::load_config_or_default(config_path)?);
    config::ensure_storage_dirs(&config)?;
    let job_id: JobId = job_id.parse().context("Invalid job ID")?;

    let pool = open_pool(&config)?;
    let orchestrator = build_orchestrator(config, pool)?;

    let outcome = orchestrator.run(job_id).await?;
    println!("Video: {}", outcome.video_path.display());
    println!("Duration: {:.1}s, {} slides", outcome.duration_secs, outcome.slide_count);
    Ok(())
}

fn retry_job(config_path: Option<&Path>, job_id: &str) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let job_id: JobId = job_id.parse().context("Invalid job ID")?;

    let pool = open_pool(&config)?;
    let conn = get_conn(&pool)?;
    jobs::reset_for_retry(&conn, job_id)?;

    println!("Job {} queued for retry", job_id);
    Ok(())
}

fn show_status(config_path: Option<&Path>, job_id: &str, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let job_id: JobId = job_id.parse().context("Invalid job ID")?;

    let pool = open_pool(&config)?;
    let conn = get_conn(&pool)?;
    let job = jobs::get_job(&conn, job_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    println!("Job: {}", job.id);
    println!("File: {} ({})", job.original_filename, job.input_kind);
    println!("Stage: {} ({}%)", job.stage, job.progress);
    if let Some(ref message) = job.status_message {
        println!("Status: {}", message);
    }
    if let Some(ref error) = job.error_message {
        println!("Error: {}", error);
    }
    if let Some(ref video) = job.video_path {
        println!("Video: {}", video);
        if let Some(duration) = job.video_duration_secs {
            println!("Duration: {}s", duration);
        }
    }
    Ok(())
}

fn list_jobs(config_path: Option<&Path>, limit: usize) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = open_pool(&config)?;
    let conn = get_conn(&pool)?;

    let jobs = jobs::list_jobs(&conn, limit)?;
    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }

    for job in jobs {
        println!(
            "{}  {:18} {:>3}%  {}",
            job.id, job.stage, job.progress, job.original_filename
        );
    }
    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let mut all_ok = true;
    for info in slidecast_av::check_tools() {
        if info.available {
            let version = info.version.as_deref().unwrap_or("unknown version");
            println!("  ok       {:10} {}", info.name, version);
        } else {
            // edge-tts is optional; narration falls back to silent slides
            let required = info.name != "edge-tts";
            if required {
                all_ok = false;
            }
            println!(
                "  missing  {:10} {}",
                info.name,
                if required { "(required)" } else { "(optional, narration disabled)" }
            );
        }
    }

    if !all_ok {
        anyhow::bail!("Required tools are missing");
    }
    Ok(())
}
