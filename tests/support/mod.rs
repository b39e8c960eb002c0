#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;

pub fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "api_scanner_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

pub fn write_file(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    write_jar_with(path, entries, zip::CompressionMethod::Deflated)
}

/// Uncompressed entries keep their bytes verbatim in the archive, so tests can
/// corrupt one entry in place.
pub fn write_stored_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    write_jar_with(path, entries, zip::CompressionMethod::Stored)
}

fn write_jar_with(
    path: &Path,
    entries: &[(&str, &[u8])],
    method: zip::CompressionMethod,
) -> anyhow::Result<()> {
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(method);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Ann {
    pub descriptor: String,
    pub values: Vec<(String, Val)>,
}

pub fn ann(descriptor: &str) -> Ann {
    Ann {
        descriptor: descriptor.to_string(),
        values: Vec::new(),
    }
}

impl Ann {
    pub fn with(mut self, name: &str, value: Val) -> Self {
        self.values.push((name.to_string(), value));
        self
    }
}

#[derive(Debug, Clone)]
pub enum Val {
    Int(i32),
    Long(i64),
    Str(String),
    Enum(String, String),
    Class(String),
    Ann(Ann),
    Array(Vec<Val>),
}

#[derive(Debug, Clone)]
pub struct TypeAnn {
    /// Raw `target_type` + `target_info` bytes.
    pub target: Vec<u8>,
    pub path: Vec<(u8, u8)>,
    pub ann: Ann,
}

#[derive(Debug, Clone, Default)]
pub struct MemberSpec {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
    pub visible: Vec<Ann>,
    pub invisible: Vec<Ann>,
    pub type_annotations: Vec<TypeAnn>,
    pub visible_parameters: Vec<Vec<Ann>>,
    pub invisible_parameters: Vec<Vec<Ann>>,
    pub with_code: bool,
}

pub fn member(access: u16, name: &str, descriptor: &str) -> MemberSpec {
    MemberSpec {
        access,
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        ..MemberSpec::default()
    }
}

/// Minimal class file writer producing what `javac` would for the structure
/// under test.
pub struct ClassBuilder {
    major: u16,
    access: u16,
    pool: Vec<Vec<u8>>,
    slots: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassBuilder {
    pub fn new(internal_name: &str) -> Self {
        let mut b = Self {
            major: 52,
            access: ACC_PUBLIC | ACC_SUPER,
            pool: Vec::new(),
            slots: 0,
            utf8: HashMap::new(),
            classes: HashMap::new(),
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        b.this_class = b.class(internal_name);
        b.super_class = b.class("java/lang/Object");
        b
    }

    pub fn major(mut self, major: u16) -> Self {
        self.major = major;
        self
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn super_class(mut self, internal_name: Option<&str>) -> Self {
        self.super_class = match internal_name {
            Some(name) => self.class(name),
            None => 0,
        };
        self
    }

    pub fn interface(mut self, internal_name: &str) -> Self {
        let idx = self.class(internal_name);
        self.interfaces.push(idx);
        self
    }

    pub fn source_file(mut self, file: &str) -> Self {
        let idx = self.utf8(file);
        let attr = self.attribute("SourceFile", &idx.to_be_bytes());
        self.attributes.push(attr);
        self
    }

    pub fn visible_annotation(mut self, a: Ann) -> Self {
        let attr = self.annotations_attribute("RuntimeVisibleAnnotations", &[a]);
        self.attributes.push(attr);
        self
    }

    pub fn invisible_annotation(mut self, a: Ann) -> Self {
        let attr = self.annotations_attribute("RuntimeInvisibleAnnotations", &[a]);
        self.attributes.push(attr);
        self
    }

    pub fn type_annotation(mut self, t: TypeAnn) -> Self {
        let attr = self.type_annotations_attribute("RuntimeVisibleTypeAnnotations", &[t]);
        self.attributes.push(attr);
        self
    }

    /// Adds a Long constant so the pool contains a two-slot entry.
    pub fn long_constant(mut self, value: i64) -> Self {
        self.long(value);
        self
    }

    pub fn field(mut self, spec: MemberSpec) -> Self {
        let bytes = self.encode_member(&spec);
        self.fields.push(bytes);
        self
    }

    pub fn method(mut self, spec: MemberSpec) -> Self {
        let bytes = self.encode_member(&spec);
        self.methods.push(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&(self.slots + 1).to_be_bytes());
        for entry in &self.pool {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        push_u16(&mut out, self.interfaces.len());
        for i in &self.interfaces {
            out.extend_from_slice(&i.to_be_bytes());
        }
        for table in [&self.fields, &self.methods, &self.attributes] {
            push_u16(&mut out, table.len());
            for item in table {
                out.extend_from_slice(item);
            }
        }
        out
    }

    fn push_entry(&mut self, entry: Vec<u8>, width: u16) -> u16 {
        let index = self.slots + 1;
        self.pool.push(entry);
        self.slots += width;
        index
    }

    fn utf8(&mut self, s: &str) -> u16 {
        if let Some(idx) = self.utf8.get(s) {
            return *idx;
        }
        let mut entry = vec![1];
        push_u16(&mut entry, s.len());
        entry.extend_from_slice(s.as_bytes());
        let idx = self.push_entry(entry, 1);
        self.utf8.insert(s.to_string(), idx);
        idx
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        if let Some(idx) = self.classes.get(internal_name) {
            return *idx;
        }
        let name_idx = self.utf8(internal_name);
        let mut entry = vec![7];
        entry.extend_from_slice(&name_idx.to_be_bytes());
        let idx = self.push_entry(entry, 1);
        self.classes.insert(internal_name.to_string(), idx);
        idx
    }

    fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push_entry(entry, 1)
    }

    fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push_entry(entry, 2)
    }

    fn attribute(&mut self, name: &str, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.utf8(name).to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn encode_annotation(&mut self, out: &mut Vec<u8>, a: &Ann) {
        out.extend_from_slice(&self.utf8(&a.descriptor).to_be_bytes());
        push_u16(out, a.values.len());
        for (name, value) in &a.values {
            out.extend_from_slice(&self.utf8(name).to_be_bytes());
            self.encode_value(out, value);
        }
    }

    fn encode_value(&mut self, out: &mut Vec<u8>, value: &Val) {
        match value {
            Val::Int(v) => {
                out.push(b'I');
                out.extend_from_slice(&self.integer(*v).to_be_bytes());
            }
            Val::Long(v) => {
                out.push(b'J');
                out.extend_from_slice(&self.long(*v).to_be_bytes());
            }
            Val::Str(s) => {
                out.push(b's');
                out.extend_from_slice(&self.utf8(s).to_be_bytes());
            }
            Val::Enum(descriptor, constant) => {
                out.push(b'e');
                out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
                out.extend_from_slice(&self.utf8(constant).to_be_bytes());
            }
            Val::Class(descriptor) => {
                out.push(b'c');
                out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
            }
            Val::Ann(nested) => {
                out.push(b'@');
                self.encode_annotation(out, nested);
            }
            Val::Array(items) => {
                out.push(b'[');
                push_u16(out, items.len());
                for item in items {
                    self.encode_value(out, item);
                }
            }
        }
    }

    fn annotations_attribute(&mut self, name: &str, anns: &[Ann]) -> Vec<u8> {
        let mut body = Vec::new();
        push_u16(&mut body, anns.len());
        for a in anns {
            self.encode_annotation(&mut body, a);
        }
        self.attribute(name, &body)
    }

    fn type_annotations_attribute(&mut self, name: &str, anns: &[TypeAnn]) -> Vec<u8> {
        let mut body = Vec::new();
        push_u16(&mut body, anns.len());
        for t in anns {
            body.extend_from_slice(&t.target);
            body.push(t.path.len() as u8);
            for (kind, index) in &t.path {
                body.push(*kind);
                body.push(*index);
            }
            self.encode_annotation(&mut body, &t.ann);
        }
        self.attribute(name, &body)
    }

    fn parameter_annotations_attribute(&mut self, name: &str, params: &[Vec<Ann>]) -> Vec<u8> {
        let mut body = vec![params.len() as u8];
        for anns in params {
            push_u16(&mut body, anns.len());
            for a in anns {
                self.encode_annotation(&mut body, a);
            }
        }
        self.attribute(name, &body)
    }

    fn code_attribute(&mut self) -> Vec<u8> {
        let line_numbers = self.attribute("LineNumberTable", &[0, 1, 0, 0, 0, 42]);
        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_be_bytes()); // max_stack
        body.extend_from_slice(&1u16.to_be_bytes()); // max_locals
        body.extend_from_slice(&1u32.to_be_bytes()); // code_length
        body.push(0xB1); // return
        body.extend_from_slice(&0u16.to_be_bytes()); // exception_table_length
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&line_numbers);
        self.attribute("Code", &body)
    }

    fn encode_member(&mut self, spec: &MemberSpec) -> Vec<u8> {
        let mut attributes = Vec::new();
        if spec.with_code {
            attributes.push(self.code_attribute());
        }
        if let Some(signature) = &spec.signature {
            let idx = self.utf8(signature);
            attributes.push(self.attribute("Signature", &idx.to_be_bytes()));
        }
        if !spec.exceptions.is_empty() {
            let mut body = Vec::new();
            push_u16(&mut body, spec.exceptions.len());
            for e in &spec.exceptions {
                body.extend_from_slice(&self.class(e).to_be_bytes());
            }
            attributes.push(self.attribute("Exceptions", &body));
        }
        if !spec.visible.is_empty() {
            attributes.push(self.annotations_attribute("RuntimeVisibleAnnotations", &spec.visible));
        }
        if !spec.invisible.is_empty() {
            attributes.push(
                self.annotations_attribute("RuntimeInvisibleAnnotations", &spec.invisible),
            );
        }
        if !spec.type_annotations.is_empty() {
            attributes.push(self.type_annotations_attribute(
                "RuntimeInvisibleTypeAnnotations",
                &spec.type_annotations,
            ));
        }
        if !spec.visible_parameters.is_empty() {
            attributes.push(self.parameter_annotations_attribute(
                "RuntimeVisibleParameterAnnotations",
                &spec.visible_parameters,
            ));
        }
        if !spec.invisible_parameters.is_empty() {
            attributes.push(self.parameter_annotations_attribute(
                "RuntimeInvisibleParameterAnnotations",
                &spec.invisible_parameters,
            ));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&spec.access.to_be_bytes());
        out.extend_from_slice(&self.utf8(&spec.name).to_be_bytes());
        out.extend_from_slice(&self.utf8(&spec.descriptor).to_be_bytes());
        push_u16(&mut out, attributes.len());
        for attr in attributes {
            out.extend_from_slice(&attr);
        }
        out
    }
}

fn push_u16(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u16).to_be_bytes());
}
