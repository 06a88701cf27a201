//! Request body encoding for create mutations.
//!
//! Every resource declares an encoding table mapping each accepted field to
//! one of four wire shapes. A payload is checked against that table and then
//! encoded either as a JSON object (no attachments) or as multipart form
//! parts (at least one attachment):
//!
//! - `Scalar`: one text part holding the string form of the value
//! - `JsonBlob`: one text part holding the JSON-encoded value
//! - `SingleFile`: one file part
//! - `RepeatedFile`: one file part per attachment, all sharing the field name

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A binary file attached to a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Build an attachment from a file name, guessing the image MIME type from its extension.
    pub fn image(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let mime_type = match file_name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            _ => "application/octet-stream",
        };
        Self::new(file_name, mime_type, bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    Scalar,
    JsonBlob,
    SingleFile,
    RepeatedFile,
}

impl FieldEncoding {
    fn describe(self) -> &'static str {
        match self {
            FieldEncoding::Scalar => "a scalar",
            FieldEncoding::JsonBlob => "a JSON blob",
            FieldEncoding::SingleFile => "a single file",
            FieldEncoding::RepeatedFile => "repeated files",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub encoding: FieldEncoding,
}

impl FieldSpec {
    pub const fn scalar(name: &'static str) -> Self {
        Self { name, encoding: FieldEncoding::Scalar }
    }

    pub const fn json(name: &'static str) -> Self {
        Self { name, encoding: FieldEncoding::JsonBlob }
    }

    pub const fn file(name: &'static str) -> Self {
        Self { name, encoding: FieldEncoding::SingleFile }
    }

    pub const fn files(name: &'static str) -> Self {
        Self { name, encoding: FieldEncoding::RepeatedFile }
    }
}

/// Per-resource field table.
pub type EncodingTable = &'static [FieldSpec];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Json(Value),
    File(Attachment),
    Files(Vec<Attachment>),
}

impl FieldValue {
    fn encoding(&self) -> FieldEncoding {
        match self {
            FieldValue::Scalar(_) => FieldEncoding::Scalar,
            FieldValue::Json(_) => FieldEncoding::JsonBlob,
            FieldValue::File(_) => FieldEncoding::SingleFile,
            FieldValue::Files(_) => FieldEncoding::RepeatedFile,
        }
    }

    fn has_attachment(&self) -> bool {
        match self {
            FieldValue::File(_) => true,
            FieldValue::Files(files) => !files.is_empty(),
            _ => false,
        }
    }
}

/// Ordered mutation fields. Insertion order is wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, FieldValue)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.push((name.to_string(), FieldValue::Scalar(value.into())));
        self
    }

    /// Add a field whose value is sent as a JSON document.
    pub fn json<S: Serialize>(mut self, name: &str, value: &S) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.fields.push((name.to_string(), FieldValue::Json(value)));
        Ok(self)
    }

    pub fn file(mut self, name: &str, attachment: Attachment) -> Self {
        self.fields.push((name.to_string(), FieldValue::File(attachment)));
        self
    }

    pub fn files(mut self, name: &str, attachments: Vec<Attachment>) -> Self {
        self.fields.push((name.to_string(), FieldValue::Files(attachments)));
        self
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn has_attachments(&self) -> bool {
        self.fields.iter().any(|(_, value)| value.has_attachment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    Text(String),
    File(Attachment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub content: PartContent,
}

impl Part {
    fn text(name: &str, text: String) -> Self {
        Self {
            name: name.to_string(),
            content: PartContent::Text(text),
        }
    }

    fn file(name: &str, attachment: Attachment) -> Self {
        Self {
            name: name.to_string(),
            content: PartContent::File(attachment),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            PartContent::Text(text) => Some(text),
            PartContent::File(_) => None,
        }
    }
}

/// A request body ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedBody {
    Json(Value),
    Multipart(Vec<Part>),
}

/// String form of a scalar as a browser form field would carry it.
///
/// Whole floats drop their fractional part (`150000.0` becomes `150000`).
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Check `payload` against `table` and encode it.
///
/// Null scalars are treated as absent optional fields and omitted.
pub fn encode(table: EncodingTable, payload: &Payload) -> Result<EncodedBody, ValidationError> {
    for (name, value) in payload.fields() {
        let spec = table
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| ValidationError::UnknownField(name.clone()))?;
        if spec.encoding != value.encoding() {
            return Err(ValidationError::WrongEncoding {
                field: name.clone(),
                expected: spec.encoding.describe(),
            });
        }
    }

    if payload.has_attachments() {
        Ok(EncodedBody::Multipart(encode_multipart(payload)))
    } else {
        Ok(EncodedBody::Json(encode_json(payload)))
    }
}

fn encode_multipart(payload: &Payload) -> Vec<Part> {
    let mut parts = Vec::with_capacity(payload.fields().len());
    for (name, value) in payload.fields() {
        match value {
            FieldValue::Scalar(Value::Null) => {}
            FieldValue::Scalar(v) => parts.push(Part::text(name, scalar_to_string(v))),
            FieldValue::Json(v) => parts.push(Part::text(name, v.to_string())),
            FieldValue::File(file) => parts.push(Part::file(name, file.clone())),
            FieldValue::Files(files) => {
                parts.extend(files.iter().map(|file| Part::file(name, file.clone())));
            }
        }
    }
    parts
}

fn encode_json(payload: &Payload) -> Value {
    let mut map = Map::new();
    for (name, value) in payload.fields() {
        match value {
            FieldValue::Scalar(Value::Null) => {}
            FieldValue::Scalar(v) | FieldValue::Json(v) => {
                map.insert(name.clone(), v.clone());
            }
            // only reachable with an empty file list
            FieldValue::File(_) | FieldValue::Files(_) => {}
        }
    }
    Value::Object(map)
}
