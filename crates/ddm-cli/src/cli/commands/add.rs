//! `ddm add <url>` – add a new download job.

use anyhow::Result;
use ddm_core::resume_db::{JobSettings, ResumeDb};
use std::path::Path;

pub async fn run_add(
    db: &ResumeDb,
    url: &str,
    download_dir: Option<&Path>,
    mirrors: &[String],
) -> Result<()> {
    let settings = JobSettings {
        download_dir: download_dir.map(|d| d.to_string_lossy().to_string()),
        mirror_urls: if mirrors.is_empty() {
            None
        } else {
            Some(mirrors.to_vec())
        },
        ..JobSettings::default()
    };
    let id = db.add_job(url, &settings).await?;
    println!("Added job {id} for URL: {url}");
    Ok(())
}
