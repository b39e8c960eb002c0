//! Dependency graph handed over by the build tool.
//!
//! The graph is already resolved: every module lists the files of its
//! artifacts and the identifiers of its children. Nothing here downloads or
//! resolves versions.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::model::Dependency;

pub const DEFAULT_LOCAL_NAME: &str = "Local classes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalArtifact {
    #[serde(default = "default_local_name")]
    pub name: String,
    pub paths: Vec<PathBuf>,
}

fn default_local_name() -> String {
    DEFAULT_LOCAL_NAME.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub local: LocalArtifact,
    #[serde(default)]
    pub first_level: BTreeSet<String>,
    #[serde(default)]
    pub modules: BTreeMap<String, Module>,
}

impl DependencyGraph {
    /// Loads a manifest, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let mut graph: DependencyGraph = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;

        if let Some(base) = path.parent() {
            graph.rebase(base);
        }
        Ok(graph)
    }

    fn rebase(&mut self, base: &Path) {
        let rebase_all = |paths: &mut Vec<PathBuf>| {
            for p in paths.iter_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        };
        rebase_all(&mut self.local.paths);
        for module in self.modules.values_mut() {
            rebase_all(&mut module.artifacts);
        }
    }

    /// Every module reachable from `first_level`, each exactly once, ordered
    /// by identifier. Cycles and shared children are fine.
    pub fn closure(&self) -> Result<Vec<Dependency>> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<(&str, Option<&str>)> =
            self.first_level.iter().map(|id| (id.as_str(), None)).collect();

        while let Some((id, parent)) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let module = self.modules.get(id).with_context(|| match parent {
                Some(parent) => format!("Unknown dependency {id} (child of {parent})"),
                None => format!("Unknown first-level dependency {id}"),
            })?;
            queue.extend(module.children.iter().map(|c| (c.as_str(), Some(id))));
        }

        Ok(visited
            .into_iter()
            .map(|id| Dependency {
                identifier: id.to_string(),
                artifacts: self.modules[id].artifacts.clone(),
            })
            .collect())
    }
}
