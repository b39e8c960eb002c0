//! Splits first-level dependencies into API and implementation candidates by
//! matching the local artifact's requirements against what each dependency
//! declares.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{ArtifactScanResult, TypeName};

pub const DEFAULT_PLATFORM_PREFIX: &str = "java";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Unresolved types whose name starts with any of these are assumed to be
    /// supplied by the platform and are not reported.
    pub platform_prefixes: Vec<String>,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            platform_prefixes: vec![DEFAULT_PLATFORM_PREFIX.to_string()],
        }
    }
}

impl ClassifyOptions {
    fn is_platform_type(&self, ty: &TypeName) -> bool {
        self.platform_prefixes.iter().any(|p| ty.starts_with(p))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Consumed types the local artifact does not declare itself.
    pub requirements: BTreeSet<TypeName>,
    pub unresolved_requirements: BTreeSet<TypeName>,
    /// Dependency identifier -> requirements it declares.
    pub resolved_requirements: BTreeMap<String, BTreeSet<TypeName>>,
    /// First-level dependencies that satisfy at least one requirement.
    pub api_dependencies: BTreeSet<String>,
    /// Transitive dependencies that satisfy a requirement but cannot be
    /// declared directly by the consumer.
    pub transitive_api_dependencies: BTreeSet<String>,
    /// First-level dependencies that satisfy no requirement.
    pub implementation_dependencies: BTreeSet<String>,
}

pub fn classify(
    local: &ArtifactScanResult,
    first_level: &BTreeSet<String>,
    all_scanned: &BTreeMap<String, ArtifactScanResult>,
) -> Classification {
    classify_with(local, first_level, all_scanned, &ClassifyOptions::default())
}

pub fn classify_with(
    local: &ArtifactScanResult,
    first_level: &BTreeSet<String>,
    all_scanned: &BTreeMap<String, ArtifactScanResult>,
    options: &ClassifyOptions,
) -> Classification {
    let requirements = local.requirements();

    let mut resolved_requirements: BTreeMap<String, BTreeSet<TypeName>> = BTreeMap::new();
    for (identifier, scanned) in all_scanned {
        let satisfied: BTreeSet<TypeName> = requirements
            .iter()
            .filter(|t| scanned.declared.contains(*t))
            .cloned()
            .collect();
        if !satisfied.is_empty() {
            resolved_requirements.insert(identifier.clone(), satisfied);
        }
    }

    let resolved: BTreeSet<&TypeName> = resolved_requirements.values().flatten().collect();
    let unresolved_requirements = requirements
        .iter()
        .filter(|t| !resolved.contains(t))
        .filter(|t| !options.is_platform_type(t))
        .cloned()
        .collect();

    let (api_dependencies, transitive_api_dependencies): (BTreeSet<String>, BTreeSet<String>) =
        resolved_requirements
            .keys()
            .cloned()
            .partition(|id| first_level.contains(id));

    let implementation_dependencies = first_level
        .iter()
        .filter(|id| !resolved_requirements.contains_key(*id))
        .cloned()
        .collect();

    Classification {
        requirements,
        unresolved_requirements,
        resolved_requirements,
        api_dependencies,
        transitive_api_dependencies,
        implementation_dependencies,
    }
}
