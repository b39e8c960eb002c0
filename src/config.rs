use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use crate::classify::ClassifyOptions;
use crate::cli::Cli;
use crate::extract::{ExtractOptions, ReturnTypePolicy};

pub const MANIFEST_ENV: &str = "API_SCANNER_MANIFEST";
pub const THREADS_ENV: &str = "API_SCANNER_THREADS";
pub const DEFAULT_MANIFEST_FILE: &str = "api-scanner.json";

pub fn resolve_manifest_path(cli: &Cli) -> Result<PathBuf> {
    let cwd = env::current_dir().context("Failed to resolve current directory")?;
    Ok(manifest_path_from(
        cli.manifest.clone(),
        env::var(MANIFEST_ENV).ok(),
        &cwd,
    ))
}

fn manifest_path_from(flag: Option<PathBuf>, from_env: Option<String>, cwd: &Path) -> PathBuf {
    if let Some(p) = flag {
        return p;
    }
    if let Some(p) = from_env.filter(|s| !s.trim().is_empty()) {
        return PathBuf::from(p);
    }
    cwd.join(DEFAULT_MANIFEST_FILE)
}

pub fn resolve_threads(cli: &Cli) -> Result<Option<usize>> {
    threads_from(cli.threads, env::var(THREADS_ENV).ok())
}

fn threads_from(flag: Option<usize>, from_env: Option<String>) -> Result<Option<usize>> {
    if flag.is_some() {
        return Ok(flag);
    }
    match from_env.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let n = raw
                .parse::<usize>()
                .with_context(|| format!("{THREADS_ENV} must be a positive integer, got {raw:?}"))?;
            Ok(Some(n))
        }
        None => Ok(None),
    }
}

/// Sizes rayon's global pool; `None` keeps rayon's default of one worker per CPU.
pub fn configure_thread_pool(threads: Option<usize>) -> Result<()> {
    let Some(n) = threads.filter(|n| *n > 0) else {
        return Ok(());
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global()
        .context("Failed to configure worker thread pool")
}

pub fn extract_options(ignore_return_types: bool) -> ExtractOptions {
    ExtractOptions {
        return_types: if ignore_return_types {
            ReturnTypePolicy::Ignore
        } else {
            ReturnTypePolicy::Track
        },
    }
}

pub fn classify_options(platform_prefixes: &[String]) -> ClassifyOptions {
    if platform_prefixes.is_empty() {
        return ClassifyOptions::default();
    }
    ClassifyOptions {
        platform_prefixes: platform_prefixes.to_vec(),
    }
}
