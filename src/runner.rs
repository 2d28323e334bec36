use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::cli::{Cli, Commands, ScanOpts};
use waf_prober::batch::{BatchScheduler, InMemoryJobStore};
use waf_prober::config::ScanConfig;
use waf_prober::engine::{ScanEngine, ScanEvent};
use waf_prober::payload::ManipulationOptions;

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Keep external crates (reqwest/hyper) at INFO to avoid flooding the CLI
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug { "debug" } else if cli.verbose { "info" } else { "warn" };
    let filter_str = format!("waf_prober={crate},reqwest=info,hyper=info,h2=info", crate = crate_level);
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut base = match &cli.config {
        Some(path) => ScanConfig::from_file(Path::new(path)).with_context(|| format!("loading config {}", path))?,
        None => ScanConfig::default(),
    };
    if let Some(timeout) = cli.timeout {
        base.request_timeout_secs = timeout;
    }
    let engine = Arc::new(ScanEngine::with_reqwest(base.request_timeout_secs)?);

    match cli.command {
        Commands::Detect { url } => {
            waf_prober::utils::parse_target_url(&url)?;
            let result = engine.detect(&url).await;
            print_json(&result)
        }
        Commands::Scan { url, page, limit, opts } => {
            let config = engine.pin_vendor(&url, &apply_opts(base, &opts)).await;
            if let Some(vendor) = &config.waf_type {
                tracing::info!("variations for {} use vendor {}", url, vendor);
            }
            let outcomes = engine.scan_page_with_limit(&url, page, limit, &config).await?;
            print_json(&outcomes)
        }
        Commands::Stream { url, quiet, opts } => {
            let config = apply_opts(base, &opts);
            handle_stream(engine, url, config, quiet).await
        }
        Commands::Batch { targets, concurrency, poll_ms, opts } => {
            let mut config = apply_opts(base, &opts);
            if let Some(c) = concurrency {
                config.max_concurrent = c;
            }
            let urls = expand_targets(&targets)?;
            handle_batch(engine, urls, config, Duration::from_millis(poll_ms.max(50))).await
        }
        Commands::Manipulate {
            url,
            method,
            payload,
            waf_type,
            parameter_pollution,
            verb_tampering,
            content_type_confusion,
            header_injection,
        } => {
            let mut options = ManipulationOptions { parameter_pollution, verb_tampering, content_type_confusion, header_injection };
            if options == ManipulationOptions::default() {
                options = ManipulationOptions::all();
            }
            let outcomes = engine.run_manipulated(&url, &method, &payload, &options, waf_type.as_deref()).await?;
            print_json(&outcomes)
        }
    }
}

fn apply_opts(mut config: ScanConfig, opts: &ScanOpts) -> ScanConfig {
    if !opts.methods.is_empty() {
        config.methods = opts.methods.clone();
    }
    if !opts.categories.is_empty() {
        config.categories = Some(opts.categories.clone());
    }
    if opts.waf_type.is_some() {
        config.waf_type = opts.waf_type.clone();
    }
    if opts.seed.is_some() {
        config.case_seed = opts.seed;
    }
    config.auto_detect_waf |= opts.auto_detect;
    config.false_positive_test |= opts.false_positive;
    config.case_sensitive_test |= opts.case_sensitive;
    config.enhanced_payloads |= opts.enhanced;
    config.use_advanced_payloads |= opts.advanced;
    config.use_encoding_variations |= opts.encoding_variations;
    config.http_manipulation |= opts.http_manipulation;
    config.follow_redirect |= opts.follow_redirect;
    config
}

/// A single existing file is read as newline-delimited URLs
fn expand_targets(targets: &[String]) -> anyhow::Result<Vec<String>> {
    if let [single] = targets {
        let path = Path::new(single);
        if path.is_file() {
            let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", single))?;
            return Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect());
        }
    }
    Ok(targets.to_vec())
}

async fn handle_stream(engine: Arc<ScanEngine>, url: String, config: ScanConfig, quiet: bool) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<ScanEvent>(64);
    let producer = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.scan_stream(&url, &config, tx).await })
    };

    let bar = if quiet { ProgressBar::hidden() } else { ProgressBar::new(0) };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let mut failure = None;
    while let Some(event) = rx.recv().await {
        match &event {
            ScanEvent::Total { total } => bar.set_length(*total as u64),
            ScanEvent::Result { outcome, .. } => {
                bar.inc(1);
                if outcome.waf_detected {
                    bar.set_message(format!("blocked: {} {}", outcome.method, outcome.category));
                }
            }
            ScanEvent::Complete { .. } => bar.finish_with_message("done"),
            ScanEvent::Error { message } => {
                bar.abandon_with_message("failed");
                failure = Some(message.clone());
            }
        }
        bar.suspend(|| println!("{}", serde_json::to_string(&event).unwrap_or_default()));
    }
    producer.await.context("stream task failed")?;

    match failure {
        Some(message) => anyhow::bail!("stream failed: {}", message),
        None => Ok(()),
    }
}

async fn handle_batch(engine: Arc<ScanEngine>, urls: Vec<String>, config: ScanConfig, poll: Duration) -> anyhow::Result<()> {
    let scheduler = BatchScheduler::new(engine, Arc::new(InMemoryJobStore::new()));
    let id = scheduler.start(urls, config)?;
    eprintln!("batch job {}", id);

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.cyan} [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let job = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                scheduler.stop(&id)?;
            }
            _ = tokio::time::sleep(poll) => {}
        }
        let job = scheduler.status(&id)?;
        bar.set_position(job.progress as u64);
        bar.set_message(format!("{}/{} {}", job.completed_urls, job.total_urls, job.current_url.as_deref().unwrap_or("")));
        if job.status.is_terminal() {
            break job;
        }
    };
    bar.finish_and_clear();
    print_json(&job)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
