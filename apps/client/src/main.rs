use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quiz_client::remote::http::HttpRemote;
use quiz_client::{ClientConfig, LocalCache, ProgressStore, QuestionCatalog};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sync local quiz progress with the record service and print a summary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Clear local and remote progress before syncing
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = ClientConfig::from_env()?;
    if let Some(parent) = config.cache_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let cache = LocalCache::open(&config.cache_path, config.namespace.as_str())
        .with_context(|| format!("opening cache {}", config.cache_path.display()))?;
    let remote = HttpRemote::new(&config.backend_url, config.admin_password.clone());
    let store = ProgressStore::open(cache, Arc::new(remote.clone()))?;

    tracing::info!(
        device_id = %store.device_id(),
        backend = remote.backend_url(),
        "quiz-sync starting"
    );

    match remote.check_connectivity().await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("record service health check failed"),
        Err(e) => tracing::warn!(error = %e, "record service unreachable"),
    }

    if args.reset {
        match store.reset_all().await {
            Ok(()) => println!("progress reset"),
            Err(e) => println!("local progress reset; remote reset failed: {e}"),
        }
    }

    if let Err(e) = store.sync().await {
        println!("sync failed, showing cached progress: {e}");
    }

    let mut catalog = QuestionCatalog::bundled();
    let origin = catalog.load_all(&remote).await;

    let snapshot = store.snapshot();
    println!("device:        {}", store.device_id());
    println!(
        "catalog:       {origin:?} ({} chapters, {} questions)",
        catalog.chapters().len(),
        catalog.questions().len()
    );
    println!("practiced:     {}", store.practiced_total(catalog.chapter_ids()));
    println!("wrong:         {}", snapshot.wrong.len());
    println!("favorites:     {}", snapshot.favorites.len());
    println!("mastered:      {}", snapshot.mastered.len());
    println!("exam history:  {}", snapshot.exam_history.len());
    if let Some(latest) = snapshot.exam_history.first() {
        println!(
            "latest exam:   {}/100 ({}/{} correct) at {}",
            latest.score, latest.correct, latest.total, latest.created_at
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn reset_flag() {
        assert!(Args::try_parse_from(["quiz-sync", "--reset"]).unwrap().reset);
        assert!(!Args::try_parse_from(["quiz-sync"]).unwrap().reset);
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        assert!(Args::try_parse_from(["quiz-sync", "--rest"]).is_err());
        assert!(Args::try_parse_from(["quiz-sync", "reset"]).is_err());
    }
}
