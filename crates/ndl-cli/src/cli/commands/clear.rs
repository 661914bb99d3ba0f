//! `ndl clear <title>` – forget an interrupted job.

use anyhow::Result;
use ndl_core::archive::StagedArchive;
use ndl_core::checkpoint::CheckpointStore;

pub async fn run_clear(store: &CheckpointStore, title: &str) -> Result<()> {
    let existed = store.load(title).await.is_some();
    if !store.clear(title).await {
        anyhow::bail!("could not clear checkpoint for {:?}", title);
    }
    StagedArchive::discard_for(&StagedArchive::default_root()?, title)?;
    if existed {
        println!("Cleared checkpoint for {title}");
    } else {
        println!("No checkpoint for {title}");
    }
    Ok(())
}
