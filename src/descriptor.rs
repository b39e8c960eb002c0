//! Field and method descriptor decoding (JVMS §4.3).

use crate::classfile::UnitError;
use crate::model::TypeName;

/// JVMS §4.3.2 caps array types at 255 dimensions.
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// One of `B C D F I J S Z`.
    Base(char),
    /// Internal name, e.g. `com/acme/Widget`.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// The object type this resolves to once array dimensions are stripped.
    /// Base types and arrays of base types have none.
    pub fn object_type(&self) -> Option<TypeName> {
        match self {
            FieldType::Base(_) => None,
            FieldType::Object(internal) => Some(TypeName::from_internal(internal)),
            FieldType::Array(element) => element.object_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    /// `None` for `void`.
    pub return_type: Option<FieldType>,
}

pub fn parse_field_descriptor(descriptor: &str) -> Result<FieldType, UnitError> {
    let (field_type, rest) = parse_field_type(descriptor, descriptor)?;
    if !rest.is_empty() {
        return Err(UnitError::InvalidDescriptor(descriptor.to_string()));
    }
    Ok(field_type)
}

/// Accepts a field descriptor or `V`, as found in class literal annotation values.
pub fn parse_return_descriptor(descriptor: &str) -> Result<Option<FieldType>, UnitError> {
    if descriptor == "V" {
        return Ok(None);
    }
    parse_field_descriptor(descriptor).map(Some)
}

pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, UnitError> {
    let invalid = || UnitError::InvalidDescriptor(descriptor.to_string());

    let mut rest = descriptor.strip_prefix('(').ok_or_else(invalid)?;
    let mut parameters = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(invalid());
        }
        let (parameter, after) = parse_field_type(rest, descriptor)?;
        parameters.push(parameter);
        rest = after;
    }

    let return_type = parse_return_descriptor(rest).map_err(|_| invalid())?;
    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

fn parse_field_type<'a>(input: &'a str, whole: &str) -> Result<(FieldType, &'a str), UnitError> {
    let invalid = || UnitError::InvalidDescriptor(whole.to_string());

    let element = input.trim_start_matches('[');
    let dimensions = input.len() - element.len();
    if dimensions > MAX_ARRAY_DIMENSIONS {
        return Err(invalid());
    }

    let mut chars = element.chars();
    let tag = chars.next().ok_or_else(invalid)?;
    let rest = chars.as_str();
    let (mut field_type, rest) = match tag {
        'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' => (FieldType::Base(tag), rest),
        'L' => {
            let end = rest.find(';').ok_or_else(invalid)?;
            if end == 0 {
                return Err(invalid());
            }
            (FieldType::Object(rest[..end].to_string()), &rest[end + 1..])
        }
        _ => return Err(invalid()),
    };

    for _ in 0..dimensions {
        field_type = FieldType::Array(Box::new(field_type));
    }
    Ok((field_type, rest))
}
