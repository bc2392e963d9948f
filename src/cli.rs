//! Command-line front end over `AppState`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    db::{DesignCategory, Entry, Product},
    scoring::EvaluationPhase,
    AppState,
};

#[derive(Debug, Parser)]
#[command(name = "nailnote-score", version, about = "AI nail-score evaluation for NailNote journals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

impl Cli {
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("nailnote"))
            .context("no platform data directory; pass --data-dir")
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a journal entry.
    AddEntry(AddEntryArgs),
    /// Store a photo and attach it to an entry.
    AttachPhoto(AttachPhotoArgs),
    /// Score an entry's photo.
    Evaluate(EvaluateArgs),
    /// Print an entry with its score record.
    Show(ShowArgs),
    /// Print this month's AI score usage.
    Quota,
    /// Update scoring settings.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct AddEntryArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub note: Option<String>,
    /// Design tag, e.g. oneColor, french, magnet
    #[arg(long)]
    pub design: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long, default_value_t = 0.0)]
    pub rating: f64,
    /// Product names in the order they were used (repeatable)
    #[arg(long = "product")]
    pub products: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AttachPhotoArgs {
    pub entry_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    pub entry_id: String,
    /// What the user is aiming for, passed to the model
    #[arg(long)]
    pub goal: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub entry_id: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub monthly_limit: Option<u32>,
    /// API key for the scoring endpoint; an empty value clears it
    #[arg(long)]
    pub api_key: Option<String>,
}

pub async fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.resolve_data_dir()?;
    let app = AppState::open(&data_dir)?;

    match cli.command {
        Commands::AddEntry(args) => add_entry(&app, args).await,
        Commands::AttachPhoto(args) => attach_photo(&app, args).await,
        Commands::Evaluate(args) => evaluate(&app, args).await,
        Commands::Show(args) => show(&app, args).await,
        Commands::Quota => {
            let status = app.evaluations.quota_status().await?;
            print_json(&json!({
                "monthKey": &status.month_key,
                "used": status.used,
                "limit": status.limit,
                "remaining": status.remaining(),
            }))
        }
        Commands::Config(args) => configure(&app, args),
    }
}

async fn add_entry(app: &AppState, args: AddEntryArgs) -> Result<()> {
    if let Some(design) = args.design.as_deref() {
        if DesignCategory::from_raw(design).is_none() {
            let known: Vec<&str> = DesignCategory::ALL.iter().map(|c| c.as_str()).collect();
            bail!("unknown design tag {design:?}; expected one of {}", known.join(", "));
        }
    }

    let mut entry = Entry::new(args.title);
    entry.note = args.note;
    entry.design_category = args.design;
    entry.color_category = args.color;
    entry.rating = args.rating;
    app.db.insert_entry(&entry).await?;

    let mut product_ids = Vec::with_capacity(args.products.len());
    for name in args.products {
        let product = match app.db.find_product_by_name(&name).await? {
            Some(product) => product,
            None => {
                let product = Product::new(name, None);
                app.db.insert_product(&product).await?;
                product
            }
        };
        product_ids.push(product.id);
    }
    if !product_ids.is_empty() {
        app.db.link_products(&entry.id, product_ids).await?;
    }

    println!("{}", entry.id);
    Ok(())
}

async fn attach_photo(app: &AppState, args: AttachPhotoArgs) -> Result<()> {
    let entry = app
        .db
        .get_entry(&args.entry_id)
        .await?
        .with_context(|| format!("entry {} not found", args.entry_id))?;

    let bytes = std::fs::read(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let photo_id = app.photos.save_bytes(&bytes)?;
    app.db
        .set_entry_photo(&entry.id, Some(photo_id), Utc::now())
        .await?;

    if let Some(previous) = entry.photo_id {
        app.photos.delete(&previous);
    }

    println!("{photo_id}");
    Ok(())
}

async fn evaluate(app: &AppState, args: EvaluateArgs) -> Result<()> {
    let Some(_ticket) = app.in_flight.try_begin(&args.entry_id) else {
        bail!("entry {} is already being evaluated", args.entry_id);
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let (progress, mut phases) = watch::channel(EvaluationPhase::Idle);
    let reporter = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            eprintln!("... {}", phase.as_str());
        }
    });

    let outcome = app
        .evaluations
        .evaluate_with(&args.entry_id, args.goal.as_deref(), Some(&progress), Some(&cancel))
        .await;
    drop(progress);
    let _ = reporter.await;

    match outcome {
        Ok(record) => print_json(&record),
        Err(error) if error.is_retryable() => bail!("{error} (you can try again)"),
        Err(error) => Err(error.into()),
    }
}

async fn show(app: &AppState, args: ShowArgs) -> Result<()> {
    let entry = app
        .db
        .get_entry(&args.entry_id)
        .await?
        .with_context(|| format!("entry {} not found", args.entry_id))?;
    let score = app.db.get_score_record(&entry.id).await?;
    let can_evaluate = app.evaluations.can_evaluate(&entry.id).await?;

    print_json(&json!({
        "entry": entry,
        "score": score,
        "canEvaluate": can_evaluate,
    }))
}

fn configure(app: &AppState, args: ConfigArgs) -> Result<()> {
    if let Some(limit) = args.monthly_limit {
        app.settings.update_monthly_limit(limit)?;
    }
    if let Some(api_key) = args.api_key {
        let api_key = Some(api_key.trim().to_owned()).filter(|key| !key.is_empty());
        app.settings.update_api_key(api_key)?;
    }

    let current = app.settings.scoring();
    print_json(&json!({
        "endpoint": &current.endpoint,
        "model": &current.model,
        "monthlyLimit": current.monthly_limit,
        "apiKeyConfigured": current.resolve_api_key().is_some(),
    }))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
