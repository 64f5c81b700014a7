use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use camino::Utf8PathBuf;
use caravel_core::{RemoteEntry, SyncPlan};
use caravel_infra::ftp::{FtpCredentials, FtpEndpoint, FtpStore};
use caravel_infra::transfer::TransferEvent;
use caravel_pipeline::sync::remote::{ListingInventoryProvider, RemoteInventoryProvider};
use caravel_pipeline::sync::{default_engine, SyncOptions, SyncRequest, SyncResult};
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};

use crate::LoginArgs;

fn build_store(host: &str, login: &LoginArgs) -> Result<Arc<FtpStore>> {
    let endpoint = FtpEndpoint::parse(host).map_err(|e| anyhow!("invalid host {host}: {e}"))?;
    let credentials = FtpCredentials {
        user: login.user.clone(),
        password: login.password.clone(),
    };
    Ok(Arc::new(FtpStore::new(endpoint, credentials)))
}

pub async fn cmd_list(host: String, login: &LoginArgs, json: bool) -> Result<()> {
    let store = build_store(&host, login)?;
    let provider = ListingInventoryProvider::new(store);
    let inventory = provider.fetch().await?;

    let sorted: BTreeMap<String, RemoteEntry> = inventory.into_iter().collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&sorted)?);
        return Ok(());
    }

    println!("{:<48} {:>12}", "NAME", "SIZE");
    println!("{:-<48} {:->12}", "", "");
    for (name, entry) in &sorted {
        let size = if entry.size_valid {
            format_size(entry.size, DECIMAL)
        } else {
            "?".to_string()
        };
        println!("{:<48} {:>12}", name, size);
    }
    println!("\n{} entries", sorted.len());

    Ok(())
}

pub async fn cmd_check(host: String, path: Utf8PathBuf, login: &LoginArgs) -> Result<SyncPlan> {
    println!(":: Analyzing state...");
    println!("   Host:  {}", host);
    println!("   Local: {}", path);

    let store = build_store(&host, login)?;
    let engine = default_engine(store);
    let req = SyncRequest {
        local_root: path,
        options: SyncOptions::default(),
    };

    let plan = engine.plan(&req).await?;

    println!("\n:: Analysis Result");
    println!("   Missing:          {}", plan.missing.len());
    println!("   Size mismatches:  {}", plan.mismatched.len());
    println!("   Purge candidates: {}", plan.purges.len());
    if plan.download_count() == 0 {
        println!("   Status:           Up to date");
    } else {
        println!("   Status:           Updates available (run `sync`)");
    }

    Ok(plan)
}

pub async fn cmd_sync(
    host: String,
    path: Utf8PathBuf,
    login: &LoginArgs,
    purge: bool,
    verify: bool,
    concurrency: usize,
    limit_mb: Option<u64>,
) -> Result<SyncResult> {
    println!(":: Synchronizing...");
    println!("   Host:   {}", host);
    println!("   Target: {}", path);

    let store = build_store(&host, login)?;
    let engine = default_engine(store);

    let options = SyncOptions {
        concurrency: caravel_config::clamp_concurrency(concurrency),
        rate_limit_bytes: limit_mb.map(|mb| mb * 1024 * 1024),
        purge_remote: purge,
        verify_after: verify,
    };
    let req = SyncRequest {
        local_root: path,
        options,
    };

    let (tx, mut rx) = tokio::sync::mpsc::channel(100);
    let engine_handle = tokio::spawn(async move { engine.sync(&req, Some(tx)).await });

    let sty = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} {bytes_per_sec} ETA {eta} {msg}",
    )
    .unwrap()
    .progress_chars("=>-");
    let pb = ProgressBar::new(0);
    pb.set_style(sty);
    pb.set_message("Planning...");

    let mut total_bytes = 0u64;
    let mut downloaded_bytes = 0u64;
    let mut files_done = 0u64;
    let mut files_total = 0u64;

    while let Some(ev) = rx.recv().await {
        match ev {
            TransferEvent::Started { expected_size, .. } => {
                total_bytes = total_bytes.saturating_add(expected_size);
                files_total = files_total.saturating_add(1);
                pb.set_length(total_bytes);
                pb.set_message(format!("Downloading {} files", files_total));
            }
            TransferEvent::Progress { bytes_delta, .. } => {
                downloaded_bytes = downloaded_bytes.saturating_add(bytes_delta);
                pb.set_position(downloaded_bytes);
            }
            TransferEvent::Completed { .. } => {
                files_done = files_done.saturating_add(1);
                pb.set_message(format!("Downloading {}/{} files", files_done, files_total));
            }
        }
    }

    let result = engine_handle.await??;
    pb.finish_with_message("Sync Complete");

    let stats = &result.stats;
    println!("\n:: Sync Result");
    println!(
        "   Downloaded: {} files ({})",
        stats.files_downloaded,
        format_size(stats.bytes_downloaded, DECIMAL)
    );
    if stats.files_purged > 0 || stats.purge_failures > 0 {
        println!(
            "   Purged:     {} files ({} failures)",
            stats.files_purged, stats.purge_failures
        );
    }
    match stats.residual_after_verify {
        Some(0) => println!("   Verify:     clean"),
        Some(residual) => println!("   Verify:     {residual} files still differ (rerun sync)"),
        None => {}
    }

    Ok(result)
}

pub async fn cmd_purge(host: String, path: Utf8PathBuf, login: &LoginArgs) -> Result<()> {
    println!(":: Purging replicated remote files...");
    println!("   Host:  {}", host);
    println!("   Local: {}", path);

    let store = build_store(&host, login)?;
    let engine = default_engine(store);
    let req = SyncRequest {
        local_root: path,
        options: SyncOptions::default(),
    };

    let stats = engine.purge(&req).await?;

    println!("\n:: Purge Result");
    println!("   Deleted:  {}", stats.files_purged);
    println!("   Failures: {}", stats.purge_failures);

    Ok(())
}
