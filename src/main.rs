use anyhow::{Context, Result};
use api_scanner::analyze::{AnalyzeOptions, analyze};
use api_scanner::cli::{Cli, Commands, OutputFormat};
use api_scanner::config::{
    classify_options, configure_thread_pool, extract_options, resolve_manifest_path,
    resolve_threads,
};
use api_scanner::manifest::DependencyGraph;
use api_scanner::scan::scan_with;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    configure_thread_pool(resolve_threads(&cli)?)?;

    match cli.command.clone() {
        Commands::Classify {
            format,
            output,
            ignore_return_types,
            platform_prefixes,
        } => {
            let manifest = resolve_manifest_path(&cli)?;
            let graph = DependencyGraph::load(&manifest)?;
            let options = AnalyzeOptions {
                extract: extract_options(ignore_return_types),
                classify: classify_options(&platform_prefixes),
            };
            let report = analyze(&graph, &options)?;
            let content = match format {
                OutputFormat::Text => report.render_text(),
                OutputFormat::Json => report.render_json()?,
            };
            write_output(&content, output.as_deref())?;
        }
        Commands::Inspect {
            paths,
            name,
            ignore_return_types,
        } => {
            let scanned = scan_with(&name, &paths, &extract_options(ignore_return_types));
            println!("{}", serde_json::to_string_pretty(&scanned)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    } else {
        print!("{content}");
    }

    Ok(())
}
