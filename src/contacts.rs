//! CLI entry points for the contact commands.
//!
//! Each `run_*` function opens the configured store (migrating it if
//! needed), performs one operation, and prints a human-readable result to
//! stdout. The HTTP API in [`crate::server`] calls the same store and
//! pipeline operations directly.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::ValueEnum;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use cardkeep_core::filter::filter_contacts;
use cardkeep_core::models::{ContactEdit, ContactRecord};
use cardkeep_core::store::ContactStore;

use crate::config::Config;
use crate::extractor::create_extractor;
use crate::pipeline::{
    CaptureOutcome, CapturePipeline, DuplicateDecision, Photo, ResumeOutcome, SavedContact,
};
use crate::sqlite_store::SqliteStore;

/// What `cards scan` does when the extracted name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnDuplicate {
    /// Ask on stdin.
    Ask,
    /// Save a second record with the same name.
    Save,
    /// Discard the scan.
    Cancel,
}

/// Connect to the configured database and bring its schema up to date.
pub async fn open_store(config: &Config) -> Result<SqliteStore> {
    let store = SqliteStore::connect(config).await?;
    store.initialize().await?;
    Ok(store)
}

async fn load(store: &SqliteStore, id: i64) -> Result<ContactRecord> {
    match store.get(id).await? {
        Some(record) => Ok(record),
        None => bail!("contact not found: {}", id),
    }
}

pub async fn run_list(config: &Config, search: Option<&str>) -> Result<()> {
    let store = open_store(config).await?;
    let records = store.list_all().await?;
    store.close().await;

    let shown = filter_contacts(&records, search.unwrap_or(""));
    if shown.is_empty() {
        println!("No contacts.");
        return Ok(());
    }

    println!("{:<6} {:<24} {:<28} {}", "ID", "NAME", "COMPANY", "CREATED");
    for r in shown {
        println!(
            "{:<6} {:<24} {:<28} {}",
            r.id,
            r.name,
            r.company,
            r.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, id: i64) -> Result<()> {
    let store = open_store(config).await?;
    let record = load(&store, id).await;
    store.close().await;
    print_record(&record?);
    Ok(())
}

fn print_record(r: &ContactRecord) {
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };

    println!("--- Contact ---");
    println!("id:           {}", r.id);
    println!("name:         {}", r.name);
    println!("title:        {}", or_dash(&r.title));
    println!("company:      {}", or_dash(&r.company));
    println!("phone:        {}", or_dash(&r.phone));
    println!("mobile:       {}", or_dash(&r.mobile_phone));
    println!("email:        {}", or_dash(&r.email));
    println!("address:      {}", or_dash(&r.address));
    println!("website:      {}", or_dash(&r.website));
    println!("rotation:     {}", r.suggested_rotation);
    println!("created_at:   {}", r.created_at.format("%Y-%m-%dT%H:%M:%SZ"));
    match &r.image_data {
        Some(data) => println!("image:        {} bytes (base64)", data.len()),
        None => println!("image:        none"),
    }
}

pub async fn run_scan(config: &Config, photo_path: &Path, on_duplicate: OnDuplicate) -> Result<()> {
    let photo = Photo::from_path(photo_path)?;
    let extractor = create_extractor(&config.extractor)?;
    let store = open_store(config).await?;
    let pipeline = CapturePipeline::new(
        Arc::new(store),
        Arc::from(extractor),
        config.capture.clone(),
    );

    let outcome = pipeline.run_capture(photo).await?;

    let saved = match outcome {
        CaptureOutcome::Saved(saved) => Some(saved),
        CaptureOutcome::DuplicateFound(pending) => {
            let decision = match on_duplicate {
                OnDuplicate::Save => DuplicateDecision::SaveAnyway,
                OnDuplicate::Cancel => DuplicateDecision::Cancel,
                OnDuplicate::Ask => ask_duplicate(pending.name()).await?,
            };
            match pipeline.resume(pending, decision).await? {
                ResumeOutcome::Saved(saved) => Some(saved),
                ResumeOutcome::Cancelled => None,
            }
        }
    };

    match saved {
        Some(SavedContact { id, name }) => println!("Contact \"{}\" saved (id {}).", name, id),
        None => println!("Scan discarded; nothing saved."),
    }
    Ok(())
}

async fn ask_duplicate(name: &str) -> Result<DuplicateDecision> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("Contact \"{name}\" already exists. Save anyway? [y/N] ").as_bytes())
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read answer from stdin")?;

    Ok(match line.trim().to_lowercase().as_str() {
        "y" | "yes" => DuplicateDecision::SaveAnyway,
        _ => DuplicateDecision::Cancel,
    })
}

pub async fn run_edit(config: &Config, id: i64, edit: ContactEdit) -> Result<()> {
    if edit.is_empty() {
        bail!("nothing to change: pass at least one field flag");
    }

    let store = open_store(config).await?;
    let result = edit_contact(&store, id, edit).await;
    store.close().await;

    print_record(&result?);
    Ok(())
}

/// Apply `edit` to the stored record and save it. Shared by CLI and HTTP.
pub async fn edit_contact(
    store: &dyn ContactStore,
    id: i64,
    edit: ContactEdit,
) -> Result<ContactRecord> {
    let mut record = match store.get(id).await? {
        Some(record) => record,
        None => bail!("contact not found: {}", id),
    };
    edit.apply(&mut record);

    if !store.update(&record).await? {
        bail!("contact not found: {}", id);
    }
    Ok(record)
}

/// Turn the stored rotation 90° clockwise and save it.
pub async fn rotate_contact(store: &dyn ContactStore, id: i64) -> Result<ContactRecord> {
    let rotation = match store.get(id).await? {
        Some(record) => record.suggested_rotation.rotate_clockwise(),
        None => bail!("contact not found: {}", id),
    };
    edit_contact(
        store,
        id,
        ContactEdit {
            suggested_rotation: Some(rotation),
            ..Default::default()
        },
    )
    .await
}

pub async fn run_rotate(config: &Config, id: i64) -> Result<()> {
    let store = open_store(config).await?;
    let result = rotate_contact(&store, id).await;
    store.close().await;

    let record = result?;
    println!(
        "Contact {} rotation set to {}.",
        record.id, record.suggested_rotation
    );
    Ok(())
}

/// Decode the stored base64 card image.
pub fn decode_image(record: &ContactRecord) -> Result<Option<Vec<u8>>> {
    record
        .image_data
        .as_deref()
        .map(|data| {
            base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .with_context(|| format!("contact {} has a corrupt image", record.id))
        })
        .transpose()
}

pub async fn run_image(config: &Config, id: i64, out: &Path) -> Result<()> {
    let store = open_store(config).await?;
    let record = load(&store, id).await;
    store.close().await;

    let Some(bytes) = decode_image(&record?)? else {
        bail!("contact {} has no image", id);
    };
    std::fs::write(out, &bytes)
        .with_context(|| format!("Failed to write image: {}", out.display()))?;
    println!("Wrote {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

pub async fn run_delete(config: &Config, id: i64) -> Result<()> {
    let store = open_store(config).await?;
    let removed = store.delete(id).await;
    store.close().await;

    if removed? {
        println!("Contact {} deleted.", id);
    } else {
        println!("No contact with id {}; nothing deleted.", id);
    }
    Ok(())
}
