//! Structural decoder for compiled Java class files (JVMS chapter 4).
//!
//! Only what the visible-surface extraction needs is materialized: the class
//! header, member signatures, thrown types and every annotation flavour.
//! `Code` and all debug attributes are skipped by length without being read.

use std::borrow::Cow;
use thiserror::Error;

use crate::descriptor::{
    FieldType, parse_field_descriptor, parse_method_descriptor, parse_return_descriptor,
};
use crate::model::{Annotation, ClassUnit, ElementValue, Member, TypeName};

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MIN_MAJOR_VERSION: u16 = 45;
/// Java 26.
pub const MAX_MAJOR_VERSION: u16 = 70;

const MAX_ELEMENT_NESTING: usize = 64;

// Smallest encodings, used to bound preallocation by the bytes actually left.
const MIN_MEMBER_SIZE: usize = 8;
const MIN_ANNOTATION_SIZE: usize = 4;
const MIN_TYPE_ANNOTATION_SIZE: usize = 2 + MIN_ANNOTATION_SIZE;
const MIN_ELEMENT_VALUE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),
    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("unexpected end of data at offset {offset} ({needed} more bytes needed)")]
    Truncated { offset: usize, needed: usize },
    #[error("constant pool index {index} is not a {expected} entry")]
    InvalidConstant { index: u16, expected: &'static str },
    #[error("invalid descriptor {0:?}")]
    InvalidDescriptor(String),
    #[error("unknown {kind} tag 0x{tag:02X}")]
    UnknownTag { kind: &'static str, tag: u8 },
    #[error("invalid modified UTF-8 in constant pool entry {index}")]
    InvalidUtf8 { index: u16 },
    #[error("annotation values nested too deeply")]
    NestingTooDeep,
}

type Result<T> = std::result::Result<T, UnitError>;

/// Decodes one class file. Never panics on malformed input.
pub fn parse_unit(bytes: &[u8]) -> Result<ClassUnit> {
    let mut r = ByteReader::new(bytes);

    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(UnitError::BadMagic(magic));
    }
    let minor = r.u16()?;
    let major = r.u16()?;
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major) {
        return Err(UnitError::UnsupportedVersion { major, minor });
    }

    let pool = ConstantPool::read(&mut r)?;

    // access_flags
    r.skip(2)?;
    let name = pool.class_name(r.u16()?)?;
    let super_index = r.u16()?;
    let super_name = if super_index == 0 {
        None
    } else {
        Some(pool.class_name(super_index)?)
    };

    let interface_count = r.u16()?;
    let mut interfaces = Vec::with_capacity(r.capacity_for(interface_count, 2));
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(r.u16()?)?);
    }

    let field_count = r.u16()?;
    let mut fields = Vec::with_capacity(r.capacity_for(field_count, MIN_MEMBER_SIZE));
    for _ in 0..field_count {
        fields.push(read_member(&mut r, &pool, MemberKind::Field)?);
    }

    let method_count = r.u16()?;
    let mut methods = Vec::with_capacity(r.capacity_for(method_count, MIN_MEMBER_SIZE));
    for _ in 0..method_count {
        methods.push(read_member(&mut r, &pool, MemberKind::Method)?);
    }

    let mut annotations = Vec::new();
    let mut type_annotations = Vec::new();
    for_each_attribute(&mut r, &pool, |name, body| {
        match name {
            "RuntimeVisibleAnnotations" => {
                annotations.extend(read_annotations(body, &pool)?)
            }
            "RuntimeInvisibleAnnotations" => {
                annotations.extend(read_annotations(body, &pool)?)
            }
            "RuntimeVisibleTypeAnnotations" => {
                type_annotations.extend(read_type_annotations(body, &pool)?)
            }
            "RuntimeInvisibleTypeAnnotations" => {
                type_annotations.extend(read_type_annotations(body, &pool)?)
            }
            _ => {}
        }
        Ok(())
    })?;

    Ok(ClassUnit {
        name,
        super_name,
        interfaces,
        annotations,
        type_annotations,
        fields,
        methods,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Field,
    Method,
}

fn read_member<'a>(
    r: &mut ByteReader<'a>,
    pool: &ConstantPool<'a>,
    kind: MemberKind,
) -> Result<Member> {
    let access = r.u16()?;
    // The member name is not part of the surface; only check it resolves.
    pool.utf8(r.u16()?)?;
    let descriptor = pool.utf8(r.u16()?)?;

    let (value_type, parameters) = match kind {
        MemberKind::Field => (Some(parse_field_descriptor(&descriptor)?), Vec::new()),
        MemberKind::Method => {
            let md = parse_method_descriptor(&descriptor)?;
            (md.return_type, md.parameters)
        }
    };

    let mut member = Member {
        access,
        value_type,
        parameters,
        ..Member::default()
    };

    for_each_attribute(r, pool, |attr, body| {
        match attr {
            "Exceptions" if kind == MemberKind::Method => {
                let count = body.u16()?;
                for _ in 0..count {
                    member.exceptions.push(pool.class_name(body.u16()?)?);
                }
            }
            "RuntimeVisibleAnnotations" => member
                .annotations
                .extend(read_annotations(body, pool)?),
            "RuntimeInvisibleAnnotations" => member
                .annotations
                .extend(read_annotations(body, pool)?),
            "RuntimeVisibleTypeAnnotations" => member
                .type_annotations
                .extend(read_type_annotations(body, pool)?),
            "RuntimeInvisibleTypeAnnotations" => member
                .type_annotations
                .extend(read_type_annotations(body, pool)?),
            "RuntimeVisibleParameterAnnotations" if kind == MemberKind::Method => {
                let per_parameter = read_parameter_annotations(body, pool)?;
                merge_parameter_annotations(&mut member.parameter_annotations, per_parameter);
            }
            "RuntimeInvisibleParameterAnnotations" if kind == MemberKind::Method => {
                let per_parameter = read_parameter_annotations(body, pool)?;
                merge_parameter_annotations(&mut member.parameter_annotations, per_parameter);
            }
            _ => {}
        }
        Ok(())
    })?;

    Ok(member)
}

/// Walks an `attributes_count` + `attribute_info[]` table, handing each body
/// to `handle` through a reader bounded to that attribute.
fn for_each_attribute<'a, F>(
    r: &mut ByteReader<'a>,
    pool: &ConstantPool<'a>,
    mut handle: F,
) -> Result<()>
where
    F: FnMut(&str, &mut ByteReader<'a>) -> Result<()>,
{
    let count = r.u16()?;
    for _ in 0..count {
        let name = pool.utf8(r.u16()?)?;
        let len = r.u32()? as usize;
        let mut body = ByteReader::new(r.take(len)?);
        handle(&name, &mut body)?;
    }
    Ok(())
}

fn merge_parameter_annotations(slots: &mut Vec<Vec<Annotation>>, incoming: Vec<Vec<Annotation>>) {
    if slots.len() < incoming.len() {
        slots.resize_with(incoming.len(), Vec::new);
    }
    for (slot, annotations) in slots.iter_mut().zip(incoming) {
        slot.extend(annotations);
    }
}

fn read_annotations(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool<'_>,
) -> Result<Vec<Annotation>> {
    let count = r.u16()?;
    let mut out = Vec::with_capacity(r.capacity_for(count, MIN_ANNOTATION_SIZE));
    for _ in 0..count {
        out.push(read_annotation(r, pool, 0)?);
    }
    Ok(out)
}

fn read_parameter_annotations(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool<'_>,
) -> Result<Vec<Vec<Annotation>>> {
    let parameters = r.u8()?;
    let mut out = Vec::with_capacity(r.capacity_for(u16::from(parameters), 2));
    for _ in 0..parameters {
        out.push(read_annotations(r, pool)?);
    }
    Ok(out)
}

fn read_type_annotations(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool<'_>,
) -> Result<Vec<Annotation>> {
    let count = r.u16()?;
    let mut out = Vec::with_capacity(r.capacity_for(count, MIN_TYPE_ANNOTATION_SIZE));
    for _ in 0..count {
        skip_type_annotation_target(r)?;
        out.push(read_annotation(r, pool, 0)?);
    }
    Ok(out)
}

/// Skips `target_type`, `target_info` and `type_path` (JVMS §4.7.20).
fn skip_type_annotation_target(r: &mut ByteReader<'_>) -> Result<()> {
    let target_type = r.u8()?;
    match target_type {
        // type_parameter_target, formal_parameter_target
        0x00 | 0x01 | 0x16 => r.skip(1)?,
        // supertype_target, type_parameter_bound_target, throws_target, catch_target, offset_target
        0x10..=0x12 | 0x17 | 0x42..=0x46 => r.skip(2)?,
        // empty_target
        0x13..=0x15 => {}
        // localvar_target
        0x40 | 0x41 => {
            let entries = r.u16()? as usize;
            r.skip(entries * 6)?;
        }
        // type_argument_target
        0x47..=0x4B => r.skip(3)?,
        tag => {
            return Err(UnitError::UnknownTag {
                kind: "type annotation target",
                tag,
            });
        }
    }
    let path_length = r.u8()? as usize;
    r.skip(path_length * 2)
}

fn read_annotation(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool<'_>,
    depth: usize,
) -> Result<Annotation> {
    let type_name = pool.object_type(r.u16()?)?;
    let pairs = r.u16()?;
    let mut values = Vec::with_capacity(r.capacity_for(pairs, 2 + MIN_ELEMENT_VALUE_SIZE));
    for _ in 0..pairs {
        let name = pool.utf8(r.u16()?)?.into_owned();
        let value = read_element_value(r, pool, depth + 1)?;
        values.push((name, value));
    }
    Ok(Annotation {
        type_name,
        values,
    })
}

fn read_element_value(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool<'_>,
    depth: usize,
) -> Result<ElementValue> {
    if depth > MAX_ELEMENT_NESTING {
        return Err(UnitError::NestingTooDeep);
    }

    let tag = r.u8()?;
    let value = match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
            r.skip(2)?;
            ElementValue::Primitive
        }
        b's' => ElementValue::String(pool.utf8(r.u16()?)?.into_owned()),
        b'e' => {
            let type_name = pool.object_type(r.u16()?)?;
            let constant = pool.utf8(r.u16()?)?.into_owned();
            ElementValue::Enum {
                type_name,
                constant,
            }
        }
        b'c' => ElementValue::Class(parse_return_descriptor(&pool.utf8(r.u16()?)?)?),
        b'@' => ElementValue::Annotation(read_annotation(r, pool, depth)?),
        b'[' => {
            let count = r.u16()?;
            let mut items = Vec::with_capacity(r.capacity_for(count, MIN_ELEMENT_VALUE_SIZE));
            for _ in 0..count {
                items.push(read_element_value(r, pool, depth + 1)?);
            }
            ElementValue::Array(items)
        }
        tag => {
            return Err(UnitError::UnknownTag {
                kind: "element value",
                tag,
            });
        }
    };
    Ok(value)
}

enum Constant<'a> {
    /// Index 0 and the second slot of long/double entries.
    Unusable,
    Utf8(&'a [u8]),
    Class { name_index: u16 },
    Other,
}

struct ConstantPool<'a> {
    entries: Vec<Constant<'a>>,
}

impl<'a> ConstantPool<'a> {
    fn read(r: &mut ByteReader<'a>) -> Result<Self> {
        let count = r.u16()?;
        // Every entry takes at least three bytes.
        let mut entries = Vec::with_capacity(1 + r.capacity_for(count, 3));
        entries.push(Constant::Unusable);

        while entries.len() < usize::from(count) {
            let tag = r.u8()?;
            match tag {
                1 => {
                    let len = r.u16()? as usize;
                    entries.push(Constant::Utf8(r.take(len)?));
                }
                7 => entries.push(Constant::Class {
                    name_index: r.u16()?,
                }),
                // Integer, Float
                3 | 4 => {
                    r.skip(4)?;
                    entries.push(Constant::Other);
                }
                // Long, Double take two slots
                5 | 6 => {
                    r.skip(8)?;
                    entries.push(Constant::Other);
                    entries.push(Constant::Unusable);
                }
                // String, MethodType, Module, Package
                8 | 16 | 19 | 20 => {
                    r.skip(2)?;
                    entries.push(Constant::Other);
                }
                // Fieldref, Methodref, InterfaceMethodref, NameAndType, Dynamic, InvokeDynamic
                9..=12 | 17 | 18 => {
                    r.skip(4)?;
                    entries.push(Constant::Other);
                }
                // MethodHandle
                15 => {
                    r.skip(3)?;
                    entries.push(Constant::Other);
                }
                tag => {
                    return Err(UnitError::UnknownTag {
                        kind: "constant pool",
                        tag,
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    fn utf8(&self, index: u16) -> Result<Cow<'a, str>> {
        match self.entries.get(index as usize) {
            Some(Constant::Utf8(raw)) => {
                decode_modified_utf8(raw).ok_or(UnitError::InvalidUtf8 { index })
            }
            _ => Err(UnitError::InvalidConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    fn class_name(&self, index: u16) -> Result<TypeName> {
        match self.entries.get(index as usize) {
            Some(Constant::Class { name_index }) => {
                Ok(TypeName::from_internal(&self.utf8(*name_index)?))
            }
            _ => Err(UnitError::InvalidConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// Resolves a Utf8 entry holding an object field descriptor (`Lcom/acme/X;`).
    fn object_type(&self, index: u16) -> Result<TypeName> {
        let descriptor = self.utf8(index)?;
        match parse_field_descriptor(&descriptor)? {
            FieldType::Object(internal) => Ok(TypeName::from_internal(&internal)),
            _ => Err(UnitError::InvalidDescriptor(descriptor.into_owned())),
        }
    }
}

/// Modified UTF-8 (JVMS §4.4.7) encodes each UTF-16 unit separately and never
/// contains a raw NUL byte.
fn decode_modified_utf8(raw: &[u8]) -> Option<Cow<'_, str>> {
    if raw.iter().all(|b| *b != 0 && *b < 0x80) {
        return std::str::from_utf8(raw).ok().map(Cow::Borrowed);
    }

    let mut units = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        let continuation = |k: usize| {
            raw.get(i + k)
                .copied()
                .filter(|c| c & 0xC0 == 0x80)
                .map(|c| u16::from(c & 0x3F))
        };
        if b != 0 && b < 0x80 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((u16::from(b & 0x1F) << 6) | continuation(1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push((u16::from(b & 0x0F) << 12) | (continuation(1)? << 6) | continuation(2)?);
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok().map(Cow::Owned)
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let slice = self
            .pos
            .checked_add(n)
            .and_then(|end| self.bytes.get(self.pos..end))
            .ok_or(UnitError::Truncated {
                offset: self.pos,
                needed: n,
            })?;
        self.pos += n;
        Ok(slice)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Preallocation for `count` items of at least `min_size` bytes, never more
    /// than the rest of the input could hold.
    fn capacity_for(&self, count: u16, min_size: usize) -> usize {
        usize::from(count).min(self.remaining() / min_size)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
