//! Declared/consumed type extraction from one decoded unit.
//!
//! Only the unit's own structure is walked (annotation values recursively),
//! never the type graph it points into, so self references and cycles between
//! types are harmless.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{Annotation, ArtifactScanResult, ClassUnit, ElementValue, Member, TypeName};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnTypePolicy {
    /// Return types of visible methods are part of the consumed surface.
    #[default]
    Track,
    /// Return types are never recorded, matching the legacy Gradle plugin output.
    Ignore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub return_types: ReturnTypePolicy,
}

/// Running `declared`/`consumed` accumulator for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSets {
    pub declared: BTreeSet<TypeName>,
    pub consumed: BTreeSet<TypeName>,
}

impl TypeSets {
    pub fn handle_unit(&mut self, unit: &ClassUnit, options: &ExtractOptions) {
        self.declared.insert(unit.name.clone());

        if let Some(super_name) = &unit.super_name {
            self.consumed.insert(super_name.clone());
        }
        self.consumed.extend(unit.interfaces.iter().cloned());
        self.consume_annotations(unit.annotations.iter().chain(&unit.type_annotations));

        for field in unit.fields.iter().filter(|f| f.is_externally_visible()) {
            self.handle_field(field);
        }
        for method in unit.methods.iter().filter(|m| m.is_externally_visible()) {
            self.handle_method(method, options);
        }
    }

    fn handle_field(&mut self, field: &Member) {
        if let Some(ty) = field.value_type.as_ref().and_then(|t| t.object_type()) {
            self.consumed.insert(ty);
        }
        self.consume_annotations(field.annotations.iter().chain(&field.type_annotations));
    }

    fn handle_method(&mut self, method: &Member, options: &ExtractOptions) {
        self.consumed.extend(method.exceptions.iter().cloned());

        if options.return_types == ReturnTypePolicy::Track
            && let Some(ty) = method.value_type.as_ref().and_then(|t| t.object_type())
        {
            self.consumed.insert(ty);
        }
        self.consumed
            .extend(method.parameters.iter().filter_map(|p| p.object_type()));

        self.consume_annotations(
            method
                .annotations
                .iter()
                .chain(&method.type_annotations)
                .chain(method.parameter_annotations.iter().flatten()),
        );
    }

    fn consume_annotations<'a>(&mut self, annotations: impl IntoIterator<Item = &'a Annotation>) {
        for annotation in annotations {
            consume_annotation(&mut self.consumed, annotation);
        }
    }

    pub fn merge(mut self, mut other: TypeSets) -> TypeSets {
        if self.declared.len() < other.declared.len() {
            std::mem::swap(&mut self.declared, &mut other.declared);
        }
        if self.consumed.len() < other.consumed.len() {
            std::mem::swap(&mut self.consumed, &mut other.consumed);
        }
        self.declared.append(&mut other.declared);
        self.consumed.append(&mut other.consumed);
        self
    }

    pub fn into_result(self, artifact_name: impl Into<String>) -> ArtifactScanResult {
        ArtifactScanResult {
            artifact_name: artifact_name.into(),
            declared: self.declared,
            consumed: self.consumed,
        }
    }
}

fn consume_annotation(consumed: &mut BTreeSet<TypeName>, annotation: &Annotation) {
    consumed.insert(annotation.type_name.clone());
    for (_, value) in &annotation.values {
        consume_element_value(consumed, value);
    }
}

fn consume_element_value(consumed: &mut BTreeSet<TypeName>, value: &ElementValue) {
    match value {
        ElementValue::Primitive | ElementValue::String(_) => {}
        ElementValue::Enum { type_name, .. } => {
            consumed.insert(type_name.clone());
        }
        ElementValue::Class(ty) => {
            if let Some(ty) = ty.as_ref().and_then(|t| t.object_type()) {
                consumed.insert(ty);
            }
        }
        ElementValue::Annotation(nested) => consume_annotation(consumed, nested),
        ElementValue::Array(items) => {
            for item in items {
                consume_element_value(consumed, item);
            }
        }
    }
}
