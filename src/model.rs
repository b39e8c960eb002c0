use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::descriptor::FieldType;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;

/// Canonical dot-separated type name, e.g. `com.acme.Widget`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `com/acme/Widget` -> `com.acme.Widget`
    pub fn from_internal(internal: &str) -> Self {
        Self(internal.replace('/', "."))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_name: TypeName,
    pub values: Vec<(String, ElementValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Constant of a base type (`B C D F I J S Z`); never names a type.
    Primitive,
    String(String),
    Enum {
        type_name: TypeName,
        constant: String,
    },
    /// Class literal; `None` for `void.class`.
    Class(Option<FieldType>),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

/// A field or method as it appears in the binary unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Member {
    pub access: u16,
    /// Field type, or method return type (`None` for `void`).
    pub value_type: Option<FieldType>,
    /// Always empty for fields.
    pub parameters: Vec<FieldType>,
    /// Declared thrown types; always empty for fields.
    pub exceptions: Vec<TypeName>,
    pub annotations: Vec<Annotation>,
    pub type_annotations: Vec<Annotation>,
    /// One entry per annotated parameter slot; empty for fields.
    pub parameter_annotations: Vec<Vec<Annotation>>,
}

impl Member {
    pub fn is_externally_visible(&self) -> bool {
        self.access & (ACC_PUBLIC | ACC_PROTECTED) != 0
    }
}

/// Structural view of one compiled class, without code or debug metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassUnit {
    pub name: TypeName,
    pub super_name: Option<TypeName>,
    pub interfaces: Vec<TypeName>,
    pub annotations: Vec<Annotation>,
    pub type_annotations: Vec<Annotation>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactScanResult {
    pub artifact_name: String,
    pub declared: BTreeSet<TypeName>,
    pub consumed: BTreeSet<TypeName>,
}

impl ArtifactScanResult {
    pub fn new(artifact_name: impl Into<String>) -> Self {
        Self {
            artifact_name: artifact_name.into(),
            ..Self::default()
        }
    }

    /// Types the visible surface uses but the artifact does not define itself.
    pub fn requirements(&self) -> BTreeSet<TypeName> {
        self.consumed.difference(&self.declared).cloned().collect()
    }
}

/// A resolved dependency as handed over by the build tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub identifier: String,
    pub artifacts: Vec<PathBuf>,
}
