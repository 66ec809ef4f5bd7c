//! Checksum command: compute (and optionally verify) a file's digest.

use anyhow::Result;
use ddm_core::checksum::{self, ChecksumAlgo};
use std::path::Path;

/// Computes and prints the digest of `path` under `algo`. If `expected` is
/// given, compares instead and exits non-zero on mismatch.
pub async fn run_checksum(path: &Path, algo: &str, expected: Option<&str>) -> Result<()> {
    let algo = ChecksumAlgo::parse(algo).map_err(|e| anyhow::anyhow!("{}", e))?;
    match expected {
        None => {
            let digest = checksum::compute(path, algo)?;
            println!("{}  {}", digest, path.display());
        }
        Some(expected) => {
            let ok = checksum::validate(path, expected, algo)?;
            if ok {
                println!("OK  {}", path.display());
            } else {
                anyhow::bail!("checksum mismatch for {}", path.display());
            }
        }
    }
    Ok(())
}
