//! Purpose: Decode and encode the self-describing binary document format.
//! Exports: `Document`, `DocMap`, `Binary`, `ObjectId`, `Timestamp`, `decode`, `encode`.
//! Role: Single codec for catalog values, statistics values, and user records.
//! Invariants: Layout is BSON-compatible; `encode(decode(bytes)) == bytes` for well-formed input.
//! Invariants: Decoding never reads past the declared document length and rejects trailing bytes.
//! Invariants: Typed accessors return `Option`; only `as_i64` reads both integer widths.
use crate::core::error::{Error, ErrorKind};

const MAX_DEPTH: usize = 100;
const MIN_DOC_LEN: i32 = 5;

const TAG_DOUBLE: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_DOCUMENT: u8 = 0x03;
const TAG_ARRAY: u8 = 0x04;
const TAG_BINARY: u8 = 0x05;
const TAG_OBJECT_ID: u8 = 0x07;
const TAG_BOOLEAN: u8 = 0x08;
const TAG_DATETIME: u8 = 0x09;
const TAG_NULL: u8 = 0x0A;
const TAG_INT32: u8 = 0x10;
const TAG_TIMESTAMP: u8 = 0x11;
const TAG_INT64: u8 = 0x12;

#[derive(Clone, Debug, PartialEq)]
pub enum Document {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Binary(Binary),
    ObjectId(ObjectId),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Timestamp(Timestamp),
    Map(DocMap),
    Array(Vec<Document>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

/// Field map that keeps insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocMap {
    entries: Vec<(String, Document)>,
}

impl DocMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mainly for fixtures.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Document>) -> Self {
        self.insert(key, value);
        self
    }

    /// Replaces the value in place when the key exists, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Document>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Document::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Document::as_i64)
    }

    pub fn get_map(&self, key: &str) -> Option<&DocMap> {
        self.get(key).and_then(Document::as_map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Document>> FromIterator<(K, V)> for DocMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = DocMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl Document {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Document::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Document::Int32(value) => Some(i64::from(*value)),
            Document::Int64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Document::Binary(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&DocMap> {
        match self {
            Document::Map(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Document]> {
        match self {
            Document::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Document::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Document::Null => "null",
            Document::Boolean(_) => "bool",
            Document::Int32(_) => "int32",
            Document::Int64(_) => "int64",
            Document::Double(_) => "double",
            Document::String(_) => "string",
            Document::Binary(_) => "binary",
            Document::ObjectId(_) => "objectId",
            Document::DateTime(_) => "date",
            Document::Timestamp(_) => "timestamp",
            Document::Map(_) => "object",
            Document::Array(_) => "array",
        }
    }
}

impl From<bool> for Document {
    fn from(value: bool) -> Self {
        Document::Boolean(value)
    }
}

impl From<i32> for Document {
    fn from(value: i32) -> Self {
        Document::Int32(value)
    }
}

impl From<i64> for Document {
    fn from(value: i64) -> Self {
        Document::Int64(value)
    }
}

impl From<f64> for Document {
    fn from(value: f64) -> Self {
        Document::Double(value)
    }
}

impl From<&str> for Document {
    fn from(value: &str) -> Self {
        Document::String(value.to_string())
    }
}

impl From<String> for Document {
    fn from(value: String) -> Self {
        Document::String(value)
    }
}

impl From<DocMap> for Document {
    fn from(value: DocMap) -> Self {
        Document::Map(value)
    }
}

impl From<Vec<Document>> for Document {
    fn from(value: Vec<Document>) -> Self {
        Document::Array(value)
    }
}

impl From<Binary> for Document {
    fn from(value: Binary) -> Self {
        Document::Binary(value)
    }
}

impl From<ObjectId> for Document {
    fn from(value: ObjectId) -> Self {
        Document::ObjectId(value)
    }
}

impl From<Timestamp> for Document {
    fn from(value: Timestamp) -> Self {
        Document::Timestamp(value)
    }
}

/// Decodes one document; the whole buffer must be consumed.
pub fn decode(bytes: &[u8]) -> Result<Document, Error> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let map = reader.read_map(0)?;
    if reader.pos != bytes.len() {
        return Err(decode_error(format!(
            "{} trailing bytes after document",
            bytes.len() - reader.pos
        )));
    }
    Ok(Document::Map(map))
}

pub fn encode(doc: &Document) -> Result<Vec<u8>, Error> {
    let Document::Map(map) = doc else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("root must be an object, got {}", doc.type_name())));
    };
    let mut out = Vec::new();
    write_map(map.iter(), &mut out)?;
    Ok(out)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| decode_error("truncated document"))?;
        let buf = self.buf;
        let slice = &buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(out))
    }

    fn read_8(&mut self) -> Result<[u8; 8], Error> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(out)
    }

    fn read_cstring(&mut self) -> Result<String, Error> {
        let buf = self.buf;
        let rest = &buf[self.pos..];
        let nul = rest
            .iter()
            .position(|byte| *byte == 0)
            .ok_or_else(|| decode_error("unterminated field name"))?;
        let bytes = self.take(nul + 1)?;
        utf8(&bytes[..nul])
    }

    fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_i32()?;
        if len < 1 {
            return Err(decode_error(format!("invalid string length {len}")));
        }
        let bytes = self.take(len as usize)?;
        let (body, terminator) = bytes.split_at(bytes.len() - 1);
        if terminator[0] != 0 {
            return Err(decode_error("string is not NUL-terminated"));
        }
        utf8(body)
    }

    fn read_map(&mut self, depth: usize) -> Result<DocMap, Error> {
        if depth > MAX_DEPTH {
            return Err(decode_error("document nesting too deep"));
        }
        let start = self.pos;
        let len = self.read_i32()?;
        if len < MIN_DOC_LEN {
            return Err(decode_error(format!("invalid document length {len}")));
        }
        let end = start
            .checked_add(len as usize)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| decode_error("truncated document"))?;

        let mut inner = Reader {
            buf: &self.buf[..end],
            pos: self.pos,
        };
        let mut map = DocMap::new();
        loop {
            let tag = inner.read_u8()?;
            if tag == 0 {
                break;
            }
            let key = inner.read_cstring()?;
            let value = inner.read_value(tag, depth)?;
            map.entries.push((key, value));
        }
        if inner.pos != end {
            return Err(decode_error("document length mismatch"));
        }
        self.pos = end;
        Ok(map)
    }

    fn read_value(&mut self, tag: u8, depth: usize) -> Result<Document, Error> {
        let value = match tag {
            TAG_DOUBLE => Document::Double(f64::from_le_bytes(self.read_8()?)),
            TAG_STRING => Document::String(self.read_string()?),
            TAG_DOCUMENT => Document::Map(self.read_map(depth + 1)?),
            TAG_ARRAY => {
                let items = self.read_map(depth + 1)?;
                Document::Array(items.entries.into_iter().map(|(_, value)| value).collect())
            }
            TAG_BINARY => {
                let len = self.read_i32()?;
                if len < 0 {
                    return Err(decode_error(format!("invalid binary length {len}")));
                }
                let subtype = self.read_u8()?;
                let bytes = self.take(len as usize)?.to_vec();
                Document::Binary(Binary { subtype, bytes })
            }
            TAG_OBJECT_ID => {
                let mut oid = [0u8; 12];
                oid.copy_from_slice(self.take(12)?);
                Document::ObjectId(ObjectId(oid))
            }
            TAG_BOOLEAN => match self.read_u8()? {
                0 => Document::Boolean(false),
                1 => Document::Boolean(true),
                other => return Err(decode_error(format!("invalid boolean byte {other}"))),
            },
            TAG_DATETIME => Document::DateTime(i64::from_le_bytes(self.read_8()?)),
            TAG_NULL => Document::Null,
            TAG_INT32 => Document::Int32(self.read_i32()?),
            TAG_TIMESTAMP => {
                let raw = u64::from_le_bytes(self.read_8()?);
                Document::Timestamp(Timestamp {
                    time: (raw >> 32) as u32,
                    increment: raw as u32,
                })
            }
            TAG_INT64 => Document::Int64(i64::from_le_bytes(self.read_8()?)),
            other => return Err(decode_error(format!("unknown element type 0x{other:02x}"))),
        };
        Ok(value)
    }
}

fn write_map<'a>(
    entries: impl Iterator<Item = (&'a str, &'a Document)>,
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    let start = out.len();
    out.extend_from_slice(&[0u8; 4]);
    for (key, value) in entries {
        write_element(key, value, out)?;
    }
    out.push(0);
    let len = i32::try_from(out.len() - start)
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("document exceeds 2 GiB"))?;
    out[start..start + 4].copy_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_element(key: &str, value: &Document, out: &mut Vec<u8>) -> Result<(), Error> {
    if key.as_bytes().contains(&0) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("field name contains NUL")
            .with_key(key));
    }
    let tag = match value {
        Document::Null => TAG_NULL,
        Document::Boolean(_) => TAG_BOOLEAN,
        Document::Int32(_) => TAG_INT32,
        Document::Int64(_) => TAG_INT64,
        Document::Double(_) => TAG_DOUBLE,
        Document::String(_) => TAG_STRING,
        Document::Binary(_) => TAG_BINARY,
        Document::ObjectId(_) => TAG_OBJECT_ID,
        Document::DateTime(_) => TAG_DATETIME,
        Document::Timestamp(_) => TAG_TIMESTAMP,
        Document::Map(_) => TAG_DOCUMENT,
        Document::Array(_) => TAG_ARRAY,
    };
    out.push(tag);
    out.extend_from_slice(key.as_bytes());
    out.push(0);

    match value {
        Document::Null => {}
        Document::Boolean(flag) => out.push(u8::from(*flag)),
        Document::Int32(num) => out.extend_from_slice(&num.to_le_bytes()),
        Document::Int64(num) | Document::DateTime(num) => out.extend_from_slice(&num.to_le_bytes()),
        Document::Double(num) => out.extend_from_slice(&num.to_le_bytes()),
        Document::String(text) => {
            let len = length_prefix(text.len() + 1)?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(text.as_bytes());
            out.push(0);
        }
        Document::Binary(binary) => {
            let len = length_prefix(binary.bytes.len())?;
            out.extend_from_slice(&len.to_le_bytes());
            out.push(binary.subtype);
            out.extend_from_slice(&binary.bytes);
        }
        Document::ObjectId(oid) => out.extend_from_slice(&oid.0),
        Document::Timestamp(ts) => {
            let raw = (u64::from(ts.time) << 32) | u64::from(ts.increment);
            out.extend_from_slice(&raw.to_le_bytes());
        }
        Document::Map(map) => write_map(map.iter(), out)?,
        Document::Array(items) => {
            let keys = (0..items.len()).map(|idx| idx.to_string()).collect::<Vec<_>>();
            write_map(keys.iter().map(String::as_str).zip(items.iter()), out)?;
        }
    }
    Ok(())
}

fn length_prefix(len: usize) -> Result<i32, Error> {
    i32::try_from(len).map_err(|_| Error::new(ErrorKind::Usage).with_message("value exceeds 2 GiB"))
}

fn utf8(bytes: &[u8]) -> Result<String, Error> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| decode_error("invalid utf-8").with_source(err))
}

fn decode_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Decode).with_message(message)
}
