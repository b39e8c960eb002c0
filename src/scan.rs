use anyhow::{Context, Result};
use ignore::WalkBuilder;
use memmap2::Mmap;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::classfile::parse_unit;
use crate::extract::{ExtractOptions, TypeSets};
use crate::model::{ArtifactScanResult, Dependency};

pub const CLASS_SUFFIX: &str = ".class";
const ARCHIVE_EXTENSIONS: [&str; 2] = ["jar", "zip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedUnit,
    UnreadableUnit,
    UnreadableArchive,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Diagnostic {
    pub location: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedArtifact {
    #[serde(flatten)]
    pub result: ArtifactScanResult,
    pub diagnostics: Vec<Diagnostic>,
}

struct RawUnit {
    location: String,
    bytes: Vec<u8>,
}

pub fn scan(artifact_name: &str, locations: &[PathBuf]) -> ScannedArtifact {
    scan_with(artifact_name, locations, &ExtractOptions::default())
}

/// Folds every compiled unit found under `locations` into one result.
///
/// Missing locations and files that are neither directories, archives nor
/// class files contribute nothing. Units that cannot be read or decoded are
/// reported as diagnostics and skipped, as are archives that fail to open;
/// everything else is still scanned.
pub fn scan_with(
    artifact_name: &str,
    locations: &[PathBuf],
    options: &ExtractOptions,
) -> ScannedArtifact {
    let mut sets = TypeSets::default();
    let mut diagnostics = Vec::new();

    for location in locations {
        if !location.exists() {
            debug!(artifact = artifact_name, location = %location.display(), "skipping missing location");
            continue;
        }

        let (batch_sets, batch_diagnostics) = if location.is_dir() {
            let files = find_class_files(location);
            fold_units(
                files
                    .into_par_iter()
                    .map(|found| found.and_then(|p| read_unit_file(&p))),
                options,
            )
        } else if has_extension(location, "class") {
            fold_units(rayon::iter::once(read_unit_file(location)), options)
        } else if ARCHIVE_EXTENSIONS.iter().any(|ext| has_extension(location, ext)) {
            let mut units = Vec::new();
            if let Err(err) = read_archive_units(location, &mut units) {
                diagnostics.push(Diagnostic {
                    location: location.display().to_string(),
                    kind: DiagnosticKind::UnreadableArchive,
                    message: format!("{err:#}"),
                });
            }
            fold_units(units.into_par_iter(), options)
        } else {
            debug!(artifact = artifact_name, location = %location.display(), "skipping unsupported location");
            continue;
        };

        sets = sets.merge(batch_sets);
        diagnostics.extend(batch_diagnostics);
    }

    diagnostics.sort();
    for d in &diagnostics {
        warn!(artifact = artifact_name, location = %d.location, kind = ?d.kind, "{}", d.message);
    }

    ScannedArtifact {
        result: sets.into_result(artifact_name),
        diagnostics,
    }
}

/// Scans each dependency once, in parallel, keyed by identifier.
pub fn scan_dependencies(
    dependencies: &[Dependency],
    options: &ExtractOptions,
) -> BTreeMap<String, ScannedArtifact> {
    dependencies
        .par_iter()
        .map(|d| {
            let scanned = scan_with(&d.identifier, &d.artifacts, options);
            (d.identifier.clone(), scanned)
        })
        .collect()
}

fn fold_units<I>(units: I, options: &ExtractOptions) -> (TypeSets, Vec<Diagnostic>)
where
    I: ParallelIterator<Item = std::result::Result<RawUnit, Diagnostic>>,
{
    units
        .fold(
            || (TypeSets::default(), Vec::new()),
            |(mut sets, mut diagnostics), unit| {
                match unit {
                    Ok(unit) => match parse_unit(&unit.bytes) {
                        Ok(class) => sets.handle_unit(&class, options),
                        Err(err) => diagnostics.push(Diagnostic {
                            location: unit.location,
                            kind: DiagnosticKind::MalformedUnit,
                            message: err.to_string(),
                        }),
                    },
                    Err(diagnostic) => diagnostics.push(diagnostic),
                }
                (sets, diagnostics)
            },
        )
        .reduce(
            || (TypeSets::default(), Vec::new()),
            |(left, mut left_diagnostics), (right, right_diagnostics)| {
                left_diagnostics.extend(right_diagnostics);
                (left.merge(right), left_diagnostics)
            },
        )
}

fn read_unit_file(path: &Path) -> std::result::Result<RawUnit, Diagnostic> {
    let location = path.display().to_string();
    match std::fs::read(path) {
        Ok(bytes) => Ok(RawUnit { location, bytes }),
        Err(err) => Err(Diagnostic {
            location,
            kind: DiagnosticKind::UnreadableUnit,
            message: err.to_string(),
        }),
    }
}

/// Reads every non-directory `*.class` entry. An entry that cannot be read
/// becomes a diagnostic and the remaining entries are still read; only a
/// failure to open the archive itself is returned as an error.
fn read_archive_units(
    archive_path: &Path,
    units: &mut Vec<std::result::Result<RawUnit, Diagnostic>>,
) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    // SAFETY: The file is opened read-only and remains valid for the lifetime of the mmap.
    // The mmap is dropped before the file, ensuring memory safety.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to mmap archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("Failed to read zip structure: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(err) => {
                units.push(Err(Diagnostic {
                    location: format!("{}!/#{i}", archive_path.display()),
                    kind: DiagnosticKind::UnreadableUnit,
                    message: err.to_string(),
                }));
                continue;
            }
        };
        if entry.is_dir() || !entry.name().ends_with(CLASS_SUFFIX) {
            continue;
        }

        let location = format!("{}!/{}", archive_path.display(), entry.name());
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        units.push(match entry.read_to_end(&mut bytes) {
            Ok(_) => Ok(RawUnit { location, bytes }),
            Err(err) => Err(Diagnostic {
                location,
                kind: DiagnosticKind::UnreadableUnit,
                message: err.to_string(),
            }),
        });
    }

    Ok(())
}

/// Every `*.class` file below `base_path`. Entries the walker cannot read
/// come back as diagnostics instead of being dropped.
pub fn find_class_files(base_path: &Path) -> Vec<std::result::Result<PathBuf, Diagnostic>> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_some_and(|t| t.is_file());
                    if is_file && has_extension(entry.path(), "class") {
                        let _ = tx.send(Ok(entry.path().to_path_buf()));
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(walk_diagnostic(base_path, &err)));
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    rx.iter().collect()
}

fn walk_diagnostic(base_path: &Path, err: &ignore::Error) -> Diagnostic {
    Diagnostic {
        location: walk_error_path(err)
            .unwrap_or(base_path)
            .display()
            .to_string(),
        kind: DiagnosticKind::UnreadableUnit,
        message: err.to_string(),
    }
}

fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        _ => None,
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|e| e == extension)
}
