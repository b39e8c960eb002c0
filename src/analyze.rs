use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

use crate::classify::{ClassifyOptions, classify_with};
use crate::extract::ExtractOptions;
use crate::manifest::DependencyGraph;
use crate::report::Report;
use crate::scan::{scan_dependencies, scan_with};

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub extract: ExtractOptions,
    pub classify: ClassifyOptions,
}

/// Scans the local artifact and every reachable dependency, then classifies
/// the first-level dependencies.
pub fn analyze(graph: &DependencyGraph, options: &AnalyzeOptions) -> Result<Report> {
    let dependencies = graph.closure()?;
    debug!(
        first_level = graph.first_level.len(),
        reachable = dependencies.len(),
        "resolved dependency closure"
    );

    let (local, dependency_scans) = rayon::join(
        || scan_with(&graph.local.name, &graph.local.paths, &options.extract),
        || scan_dependencies(&dependencies, &options.extract),
    );

    let mut diagnostics = local.diagnostics;
    let mut all_scanned = BTreeMap::new();
    for (identifier, scanned) in dependency_scans {
        diagnostics.extend(scanned.diagnostics);
        all_scanned.insert(identifier, scanned.result);
    }

    let classification = classify_with(
        &local.result,
        &graph.first_level,
        &all_scanned,
        &options.classify,
    );
    debug!(
        requirements = classification.requirements.len(),
        unresolved = classification.unresolved_requirements.len(),
        "classified dependencies"
    );

    Ok(Report::new(&graph.local.name, &classification, diagnostics))
}
