//! `ddm remove <id>` – remove a job, optionally deleting its files on disk.

use anyhow::Result;
use ddm_core::resume_db::ResumeDb;
use ddm_core::storage;
use std::path::Path;

pub async fn run_remove(
    db: &ResumeDb,
    id: i64,
    delete_files: bool,
    download_dir: Option<&Path>,
) -> Result<()> {
    if delete_files {
        if let Some(job) = db.get_job(id).await? {
            let dir = job
                .settings
                .download_dir
                .as_deref()
                .map(Path::new)
                .or(download_dir);
            if let Some(dir) = dir {
                if let Some(final_name) = job.final_filename.as_deref() {
                    let final_path = dir.join(final_name);
                    let temp_path = job
                        .temp_filename
                        .as_deref()
                        .map(|t| dir.join(t))
                        .unwrap_or_else(|| storage::temp_path(&final_path));
                    let _ = std::fs::remove_file(&final_path);
                    let _ = std::fs::remove_file(&temp_path);
                }
            }
        }
    }
    db.remove_job(id).await?;
    println!("Removed job {id}");
    Ok(())
}
