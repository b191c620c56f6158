//! Pseudo-random test-file generation for transfer exercises.

use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::AsyncWriteExt;

const CHUNK: usize = 64 * 1024;

/// Write `size` pseudo-random bytes to `path`. A fixed `seed` makes the
/// content reproducible across runs.
pub async fn write_test_file(path: &Path, size: u64, seed: Option<u64>) -> anyhow::Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut buf = vec![0u8; CHUNK];
    let mut remaining = size;
    while remaining > 0 {
        let n = CHUNK.min(remaining as usize);
        rng.fill(&mut buf[..n]);
        file.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }
    file.flush().await?;
    Ok(())
}
