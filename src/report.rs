use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::classify::Classification;
use crate::model::TypeName;
use crate::scan::Diagnostic;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub artifact: String,
    pub unresolved_requirements: BTreeSet<TypeName>,
    pub api_dependencies: BTreeMap<String, BTreeSet<TypeName>>,
    pub transitive_api_dependencies: BTreeMap<String, BTreeSet<TypeName>>,
    pub implementation_dependencies: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new(
        artifact: impl Into<String>,
        classification: &Classification,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let pick = |ids: &BTreeSet<String>| -> BTreeMap<String, BTreeSet<TypeName>> {
            classification
                .resolved_requirements
                .iter()
                .filter(|(id, _)| ids.contains(*id))
                .map(|(id, types)| (id.clone(), types.clone()))
                .collect()
        };

        Self {
            artifact: artifact.into(),
            unresolved_requirements: classification.unresolved_requirements.clone(),
            api_dependencies: pick(&classification.api_dependencies),
            transitive_api_dependencies: pick(&classification.transitive_api_dependencies),
            implementation_dependencies: classification.implementation_dependencies.clone(),
            diagnostics,
        }
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if !self.unresolved_requirements.is_empty() {
            out.push_str("Unresolved requirements:\n");
            for t in &self.unresolved_requirements {
                let _ = writeln!(out, " *  {t}");
            }
            out.push('\n');
        }

        if !self.api_dependencies.is_empty() {
            out.push_str(
                "These dependencies should be declared using the API configuration as they are part of the ABI:\n",
            );
            push_requirement_map(&mut out, &self.api_dependencies);
            out.push('\n');
        }

        if !self.transitive_api_dependencies.is_empty() {
            out.push_str(
                "These transitive dependencies provide ABI types but are not declared directly; \
                 declare them using the API configuration to expose them:\n",
            );
            push_requirement_map(&mut out, &self.transitive_api_dependencies);
            out.push('\n');
        }

        if !self.implementation_dependencies.is_empty() {
            out.push_str(
                "These dependencies can be declared using the Implementation configuration (not part of the ABI):\n",
            );
            for id in &self.implementation_dependencies {
                let _ = writeln!(out, " * {id}");
            }
            out.push('\n');
        }

        if !self.diagnostics.is_empty() {
            out.push_str("Scan warnings:\n");
            for d in &self.diagnostics {
                let _ = writeln!(out, " * {}: {}", d.location, d.message);
            }
            out.push('\n');
        }

        out
    }
}

fn push_requirement_map(out: &mut String, map: &BTreeMap<String, BTreeSet<TypeName>>) {
    for (id, types) in map {
        let _ = writeln!(out, " * {id}");
        for t in types {
            let _ = writeln!(out, " ** {t}");
        }
    }
}
