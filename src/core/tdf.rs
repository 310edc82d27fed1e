//! # TDF Value Model
//!
//! The tagged, self-describing value format carried in every packet body.
//!
//! ## Record Layout
//! ```text
//! [Tag(3)] [Type(1)] [Payload(N)]
//! ```
//! Payload by type:
//! - `VarInt`: one varint
//! - `String`: varint length (including NUL) + UTF-8 bytes + NUL
//! - `Blob`: varint length + bytes
//! - `Group`: optional `0x02` marker, nested records, `0x00` terminator
//! - `List`: element type + varint count + untagged elements
//! - `Map`: key type + value type + varint count + untagged pairs
//! - `Union`: discriminant byte, then one record unless it is `0x7F`
//! - `VarIntList`: varint count + varints
//! - `Pair` / `Triple`: two or three varints
//! - `Float`: 4 bytes, big-endian IEEE-754
//!
//! Lists and maps are homogeneous by construction: [`TdfList`] and
//! [`MapColumn`] hold one typed vector each, so writing a value can never
//! fail and only the reader has to validate element types.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::config::MAX_TDF_DEPTH;
use crate::core::label::Label;
use crate::core::varint::{read_varint, write_varint};

/// Union discriminant marking an absent value.
pub const UNION_UNSET: u8 = 0x7F;

/// Byte terminating a group body.
const GROUP_END: u8 = 0x00;

/// Leading byte flagging an extended group.
const GROUP_EXTENDED: u8 = 0x02;

/// Errors raised while decoding TDF content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TdfError {
    #[error("unexpected end of buffer")]
    UnexpectedEof,

    #[error("unknown type code {0}")]
    UnknownType(u8),

    #[error("{0:?} cannot be used as a collection element")]
    UnsupportedElementType(TdfType),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("varint exceeds 64 bits")]
    VarIntOverflow,

    #[error("invalid length {0}")]
    InvalidLength(i64),

    #[error("nesting deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("union discriminant 0x7f is reserved for an absent value")]
    ReservedUnionDiscriminant,

    #[error("map columns differ in length ({0} keys, {1} values)")]
    ColumnLengthMismatch(usize, usize),
}

/// Wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TdfType {
    VarInt = 0,
    String = 1,
    Blob = 2,
    Group = 3,
    List = 4,
    Map = 5,
    Union = 6,
    VarIntList = 7,
    Pair = 8,
    Triple = 9,
    Float = 10,
}

impl TdfType {
    pub fn from_byte(byte: u8) -> Result<Self, TdfError> {
        Ok(match byte {
            0 => TdfType::VarInt,
            1 => TdfType::String,
            2 => TdfType::Blob,
            3 => TdfType::Group,
            4 => TdfType::List,
            5 => TdfType::Map,
            6 => TdfType::Union,
            7 => TdfType::VarIntList,
            8 => TdfType::Pair,
            9 => TdfType::Triple,
            10 => TdfType::Float,
            other => return Err(TdfError::UnknownType(other)),
        })
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A labelled value.
#[derive(Debug, Clone, PartialEq)]
pub struct Tdf {
    pub label: Label,
    pub value: TdfValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TdfValue {
    VarInt(i64),
    String(String),
    Blob(Vec<u8>),
    Group(TdfGroup),
    List(TdfList),
    Map(TdfMap),
    /// `None` is the absent union, written as discriminant `0x7F`.
    Union(Option<TdfUnion>),
    VarIntList(Vec<i64>),
    Pair(i64, i64),
    Triple(i64, i64, i64),
    Float(f32),
}

impl TdfValue {
    pub fn tdf_type(&self) -> TdfType {
        match self {
            TdfValue::VarInt(_) => TdfType::VarInt,
            TdfValue::String(_) => TdfType::String,
            TdfValue::Blob(_) => TdfType::Blob,
            TdfValue::Group(_) => TdfType::Group,
            TdfValue::List(_) => TdfType::List,
            TdfValue::Map(_) => TdfType::Map,
            TdfValue::Union(_) => TdfType::Union,
            TdfValue::VarIntList(_) => TdfType::VarIntList,
            TdfValue::Pair(..) => TdfType::Pair,
            TdfValue::Triple(..) => TdfType::Triple,
            TdfValue::Float(_) => TdfType::Float,
        }
    }
}

/// A struct body: ordered child records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TdfGroup {
    pub extended: bool,
    pub fields: Vec<Tdf>,
}

impl TdfGroup {
    pub fn new(fields: Vec<Tdf>) -> Self {
        Self {
            extended: false,
            fields,
        }
    }

    pub fn extended(fields: Vec<Tdf>) -> Self {
        Self {
            extended: true,
            fields,
        }
    }
}

/// Homogeneous list. Element types other than these are not valid on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum TdfList {
    VarInt(Vec<i64>),
    String(Vec<String>),
    Group(Vec<TdfGroup>),
    Triple(Vec<(i64, i64, i64)>),
}

impl TdfList {
    pub fn element_type(&self) -> TdfType {
        match self {
            TdfList::VarInt(_) => TdfType::VarInt,
            TdfList::String(_) => TdfType::String,
            TdfList::Group(_) => TdfType::Group,
            TdfList::Triple(_) => TdfType::Triple,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TdfList::VarInt(v) => v.len(),
            TdfList::String(v) => v.len(),
            TdfList::Group(v) => v.len(),
            TdfList::Triple(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One side of a map: all keys, or all values.
#[derive(Debug, Clone, PartialEq)]
pub enum MapColumn {
    VarInt(Vec<i64>),
    String(Vec<String>),
    Group(Vec<TdfGroup>),
    Float(Vec<f32>),
}

impl MapColumn {
    pub fn element_type(&self) -> TdfType {
        match self {
            MapColumn::VarInt(_) => TdfType::VarInt,
            MapColumn::String(_) => TdfType::String,
            MapColumn::Group(_) => TdfType::Group,
            MapColumn::Float(_) => TdfType::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MapColumn::VarInt(v) => v.len(),
            MapColumn::String(v) => v.len(),
            MapColumn::Group(v) => v.len(),
            MapColumn::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_capacity(ty: TdfType, capacity: usize) -> Result<Self, TdfError> {
        Ok(match ty {
            TdfType::VarInt => MapColumn::VarInt(Vec::with_capacity(capacity)),
            TdfType::String => MapColumn::String(Vec::with_capacity(capacity)),
            TdfType::Group => MapColumn::Group(Vec::with_capacity(capacity)),
            TdfType::Float => MapColumn::Float(Vec::with_capacity(capacity)),
            other => return Err(TdfError::UnsupportedElementType(other)),
        })
    }
}

/// Ordered key/value pairs stored column-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct TdfMap {
    keys: MapColumn,
    values: MapColumn,
}

impl TdfMap {
    pub fn new(keys: MapColumn, values: MapColumn) -> Result<Self, TdfError> {
        if keys.len() != values.len() {
            return Err(TdfError::ColumnLengthMismatch(keys.len(), values.len()));
        }
        Ok(Self { keys, values })
    }

    /// String to string map, in the iterator's order.
    pub fn from_strings<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (keys, values): (Vec<String>, Vec<String>) = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            keys: MapColumn::String(keys),
            values: MapColumn::String(values),
        }
    }

    pub fn keys(&self) -> &MapColumn {
        &self.keys
    }

    pub fn values(&self) -> &MapColumn {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Collect a string to string map; `None` for any other column types.
    pub fn to_string_map(&self) -> Option<BTreeMap<String, String>> {
        match (&self.keys, &self.values) {
            (MapColumn::String(keys), MapColumn::String(values)) => {
                Some(keys.iter().cloned().zip(values.iter().cloned()).collect())
            }
            _ => None,
        }
    }
}

/// A present union value.
#[derive(Debug, Clone, PartialEq)]
pub struct TdfUnion {
    discriminant: u8,
    value: Box<Tdf>,
}

impl TdfUnion {
    pub fn new(discriminant: u8, value: Tdf) -> Result<Self, TdfError> {
        if discriminant == UNION_UNSET {
            return Err(TdfError::ReservedUnionDiscriminant);
        }
        Ok(Self {
            discriminant,
            value: Box::new(value),
        })
    }

    pub fn discriminant(&self) -> u8 {
        self.discriminant
    }

    pub fn value(&self) -> &Tdf {
        &self.value
    }
}

// Builders

impl Tdf {
    pub fn new(label: Label, value: TdfValue) -> Self {
        Self { label, value }
    }

    pub fn varint(label: Label, value: impl Into<i64>) -> Self {
        Self::new(label, TdfValue::VarInt(value.into()))
    }

    pub fn string(label: Label, value: impl Into<String>) -> Self {
        Self::new(label, TdfValue::String(value.into()))
    }

    pub fn blob(label: Label, value: impl Into<Vec<u8>>) -> Self {
        Self::new(label, TdfValue::Blob(value.into()))
    }

    pub fn group(label: Label, fields: Vec<Tdf>) -> Self {
        Self::new(label, TdfValue::Group(TdfGroup::new(fields)))
    }

    pub fn extended_group(label: Label, fields: Vec<Tdf>) -> Self {
        Self::new(label, TdfValue::Group(TdfGroup::extended(fields)))
    }

    pub fn list(label: Label, list: TdfList) -> Self {
        Self::new(label, TdfValue::List(list))
    }

    pub fn map(label: Label, map: TdfMap) -> Self {
        Self::new(label, TdfValue::Map(map))
    }

    pub fn string_map(label: Label, map: &BTreeMap<String, String>) -> Self {
        Self::map(
            label,
            TdfMap::from_strings(map.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        )
    }

    pub fn union(label: Label, union: TdfUnion) -> Self {
        Self::new(label, TdfValue::Union(Some(union)))
    }

    pub fn union_unset(label: Label) -> Self {
        Self::new(label, TdfValue::Union(None))
    }

    pub fn varint_list(label: Label, values: Vec<i64>) -> Self {
        Self::new(label, TdfValue::VarIntList(values))
    }

    pub fn pair(label: Label, a: i64, b: i64) -> Self {
        Self::new(label, TdfValue::Pair(a, b))
    }

    pub fn triple(label: Label, a: i64, b: i64, c: i64) -> Self {
        Self::new(label, TdfValue::Triple(a, b, c))
    }

    pub fn float(label: Label, value: f32) -> Self {
        Self::new(label, TdfValue::Float(value))
    }
}

// Accessors

impl Tdf {
    pub fn as_varint(&self) -> Option<i64> {
        match self.value {
            TdfValue::VarInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            TdfValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match &self.value {
            TdfValue::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&TdfGroup> {
        match &self.value {
            TdfValue::Group(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&TdfList> {
        match &self.value {
            TdfValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&TdfMap> {
        match &self.value {
            TdfValue::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<Option<&TdfUnion>> {
        match &self.value {
            TdfValue::Union(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(i64, i64)> {
        match self.value {
            TdfValue::Pair(a, b) => Some((a, b)),
            _ => None,
        }
    }

    pub fn as_triple(&self) -> Option<(i64, i64, i64)> {
        match self.value {
            TdfValue::Triple(a, b, c) => Some((a, b, c)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.value {
            TdfValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

/// Label lookups over a sequence of records (packet content or group body).
pub trait FieldLookup {
    fn records(&self) -> &[Tdf];

    /// First record with `label`.
    fn field(&self, label: Label) -> Option<&Tdf> {
        self.records().iter().find(|tdf| tdf.label == label)
    }

    fn varint_field(&self, label: Label) -> Option<i64> {
        self.field(label).and_then(Tdf::as_varint)
    }

    fn str_field(&self, label: Label) -> Option<&str> {
        self.field(label).and_then(Tdf::as_str)
    }

    fn group_field(&self, label: Label) -> Option<&TdfGroup> {
        self.field(label).and_then(Tdf::as_group)
    }

    fn string_map_field(&self, label: Label) -> Option<BTreeMap<String, String>> {
        self.field(label)
            .and_then(Tdf::as_map)
            .and_then(TdfMap::to_string_map)
    }
}

impl FieldLookup for [Tdf] {
    fn records(&self) -> &[Tdf] {
        self
    }
}

impl FieldLookup for TdfGroup {
    fn records(&self) -> &[Tdf] {
        &self.fields
    }
}

// Writing

impl Tdf {
    /// Append this record (tag, type, payload) to `buf`.
    pub fn write<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.label.to_tag());
        buf.put_u8(self.value.tdf_type().to_byte());
        self.value.write_payload(buf);
    }
}

impl TdfValue {
    fn write_payload<B: BufMut>(&self, buf: &mut B) {
        match self {
            TdfValue::VarInt(v) => write_varint(buf, *v),
            TdfValue::String(v) => write_string(buf, v),
            TdfValue::Blob(v) => {
                write_len(buf, v.len());
                buf.put_slice(v);
            }
            TdfValue::Group(group) => write_group_body(buf, group),
            TdfValue::List(list) => write_list(buf, list),
            TdfValue::Map(map) => write_map(buf, map),
            TdfValue::Union(None) => buf.put_u8(UNION_UNSET),
            TdfValue::Union(Some(union)) => {
                buf.put_u8(union.discriminant);
                union.value.write(buf);
            }
            TdfValue::VarIntList(values) => {
                write_len(buf, values.len());
                values.iter().for_each(|v| write_varint(buf, *v));
            }
            TdfValue::Pair(a, b) => {
                write_varint(buf, *a);
                write_varint(buf, *b);
            }
            TdfValue::Triple(a, b, c) => write_triple(buf, (*a, *b, *c)),
            TdfValue::Float(v) => buf.put_f32(*v),
        }
    }
}

#[inline]
fn write_len<B: BufMut>(buf: &mut B, len: usize) {
    write_varint(buf, len as i64);
}

fn write_string<B: BufMut>(buf: &mut B, value: &str) {
    write_len(buf, value.len() + 1);
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

fn write_triple<B: BufMut>(buf: &mut B, (a, b, c): (i64, i64, i64)) {
    write_varint(buf, a);
    write_varint(buf, b);
    write_varint(buf, c);
}

fn write_group_body<B: BufMut>(buf: &mut B, group: &TdfGroup) {
    if group.extended {
        buf.put_u8(GROUP_EXTENDED);
    }
    group.fields.iter().for_each(|field| field.write(buf));
    buf.put_u8(GROUP_END);
}

fn write_list<B: BufMut>(buf: &mut B, list: &TdfList) {
    buf.put_u8(list.element_type().to_byte());
    write_len(buf, list.len());
    match list {
        TdfList::VarInt(items) => items.iter().for_each(|v| write_varint(buf, *v)),
        TdfList::String(items) => items.iter().for_each(|v| write_string(buf, v)),
        TdfList::Group(items) => items.iter().for_each(|g| write_group_body(buf, g)),
        TdfList::Triple(items) => items.iter().for_each(|t| write_triple(buf, *t)),
    }
}

fn write_map<B: BufMut>(buf: &mut B, map: &TdfMap) {
    buf.put_u8(map.keys.element_type().to_byte());
    buf.put_u8(map.values.element_type().to_byte());
    write_len(buf, map.len());
    for index in 0..map.len() {
        write_map_element(buf, &map.keys, index);
        write_map_element(buf, &map.values, index);
    }
}

fn write_map_element<B: BufMut>(buf: &mut B, column: &MapColumn, index: usize) {
    match column {
        MapColumn::VarInt(v) => write_varint(buf, v[index]),
        MapColumn::String(v) => write_string(buf, &v[index]),
        MapColumn::Group(v) => write_group_body(buf, &v[index]),
        MapColumn::Float(v) => buf.put_f32(v[index]),
    }
}

/// Encode a sequence of top-level records.
pub fn encode_all(records: &[Tdf]) -> Bytes {
    let mut buf = BytesMut::new();
    records.iter().for_each(|tdf| tdf.write(&mut buf));
    buf.freeze()
}

// Reading

/// Cursor over encoded TDF content.
pub struct TdfReader<'a> {
    buf: &'a [u8],
    depth: usize,
}

impl<'a> TdfReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, depth: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Read records until the buffer is exhausted.
    pub fn read_all(mut self) -> Result<Vec<Tdf>, TdfError> {
        let mut records = Vec::new();
        while !self.buf.is_empty() {
            records.push(self.read_tdf()?);
        }
        Ok(records)
    }

    /// Read one tagged record.
    pub fn read_tdf(&mut self) -> Result<Tdf, TdfError> {
        self.need(4)?;
        let tag = [self.buf[0], self.buf[1], self.buf[2]];
        let ty = TdfType::from_byte(self.buf[3])?;
        self.buf.advance(4);

        let label = Label::from_tag(tag);
        let value = self.read_value(ty)?;
        Ok(Tdf { label, value })
    }

    fn read_value(&mut self, ty: TdfType) -> Result<TdfValue, TdfError> {
        Ok(match ty {
            TdfType::VarInt => TdfValue::VarInt(self.read_varint()?),
            TdfType::String => TdfValue::String(self.read_string()?),
            TdfType::Blob => {
                let len = self.read_len()?;
                self.need(len)?;
                let blob = self.buf[..len].to_vec();
                self.buf.advance(len);
                TdfValue::Blob(blob)
            }
            TdfType::Group => TdfValue::Group(self.read_group_body()?),
            TdfType::List => TdfValue::List(self.read_list()?),
            TdfType::Map => TdfValue::Map(self.read_map()?),
            TdfType::Union => {
                let discriminant = self.read_u8()?;
                if discriminant == UNION_UNSET {
                    TdfValue::Union(None)
                } else {
                    let value = self.nested(|r| r.read_tdf())?;
                    TdfValue::Union(Some(TdfUnion {
                        discriminant,
                        value: Box::new(value),
                    }))
                }
            }
            TdfType::VarIntList => {
                let count = self.read_len()?;
                let mut values = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    values.push(self.read_varint()?);
                }
                TdfValue::VarIntList(values)
            }
            TdfType::Pair => TdfValue::Pair(self.read_varint()?, self.read_varint()?),
            TdfType::Triple => {
                let (a, b, c) = self.read_triple()?;
                TdfValue::Triple(a, b, c)
            }
            TdfType::Float => TdfValue::Float(self.read_f32()?),
        })
    }

    fn read_group_body(&mut self) -> Result<TdfGroup, TdfError> {
        self.nested(|r| {
            let mut group = TdfGroup::default();
            loop {
                match r.peek_u8()? {
                    GROUP_END => {
                        r.buf.advance(1);
                        return Ok(group);
                    }
                    GROUP_EXTENDED => {
                        r.buf.advance(1);
                        group.extended = true;
                    }
                    _ => group.fields.push(r.read_tdf()?),
                }
            }
        })
    }

    fn read_list(&mut self) -> Result<TdfList, TdfError> {
        let ty = TdfType::from_byte(self.read_u8()?)?;
        let count = self.read_len()?;
        let capacity = count.min(self.remaining());

        Ok(match ty {
            TdfType::VarInt => {
                let mut items = Vec::with_capacity(capacity);
                for _ in 0..count {
                    items.push(self.read_varint()?);
                }
                TdfList::VarInt(items)
            }
            TdfType::String => {
                let mut items = Vec::with_capacity(capacity);
                for _ in 0..count {
                    items.push(self.read_string()?);
                }
                TdfList::String(items)
            }
            TdfType::Group => {
                let mut items = Vec::with_capacity(capacity);
                for _ in 0..count {
                    items.push(self.read_group_body()?);
                }
                TdfList::Group(items)
            }
            TdfType::Triple => {
                let mut items = Vec::with_capacity(capacity);
                for _ in 0..count {
                    items.push(self.read_triple()?);
                }
                TdfList::Triple(items)
            }
            other => return Err(TdfError::UnsupportedElementType(other)),
        })
    }

    fn read_map(&mut self) -> Result<TdfMap, TdfError> {
        let key_type = TdfType::from_byte(self.read_u8()?)?;
        let value_type = TdfType::from_byte(self.read_u8()?)?;
        let count = self.read_len()?;
        let capacity = count.min(self.remaining());

        let mut keys = MapColumn::with_capacity(key_type, capacity)?;
        let mut values = MapColumn::with_capacity(value_type, capacity)?;
        for _ in 0..count {
            self.read_map_element(&mut keys)?;
            self.read_map_element(&mut values)?;
        }
        Ok(TdfMap { keys, values })
    }

    fn read_map_element(&mut self, column: &mut MapColumn) -> Result<(), TdfError> {
        match column {
            MapColumn::VarInt(v) => v.push(self.read_varint()?),
            MapColumn::String(v) => v.push(self.read_string()?),
            MapColumn::Group(v) => v.push(self.read_group_body()?),
            MapColumn::Float(v) => v.push(self.read_f32()?),
        }
        Ok(())
    }

    fn read_string(&mut self) -> Result<String, TdfError> {
        let len = self.read_len()?;
        if len == 0 {
            return Ok(String::new());
        }
        self.need(len)?;
        // Last byte is the NUL terminator
        let text = std::str::from_utf8(&self.buf[..len - 1])
            .map_err(|_| TdfError::InvalidUtf8)?
            .to_owned();
        self.buf.advance(len);
        Ok(text)
    }

    fn read_triple(&mut self) -> Result<(i64, i64, i64), TdfError> {
        Ok((self.read_varint()?, self.read_varint()?, self.read_varint()?))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, TdfError>) -> Result<T, TdfError> {
        if self.depth >= MAX_TDF_DEPTH {
            return Err(TdfError::DepthExceeded(MAX_TDF_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    #[inline]
    fn need(&self, len: usize) -> Result<(), TdfError> {
        if self.buf.len() < len {
            Err(TdfError::UnexpectedEof)
        } else {
            Ok(())
        }
    }

    fn read_varint(&mut self) -> Result<i64, TdfError> {
        read_varint(&mut self.buf)
    }

    fn read_len(&mut self) -> Result<usize, TdfError> {
        let len = self.read_varint()?;
        usize::try_from(len).map_err(|_| TdfError::InvalidLength(len))
    }

    fn peek_u8(&self) -> Result<u8, TdfError> {
        self.buf.first().copied().ok_or(TdfError::UnexpectedEof)
    }

    fn read_u8(&mut self) -> Result<u8, TdfError> {
        let byte = self.peek_u8()?;
        self.buf.advance(1);
        Ok(byte)
    }

    fn read_f32(&mut self) -> Result<f32, TdfError> {
        self.need(4)?;
        Ok(self.buf.get_f32())
    }
}

/// Decode a complete content buffer into its top-level records.
pub fn decode_all(buf: &[u8]) -> Result<Vec<Tdf>, TdfError> {
    TdfReader::new(buf).read_all()
}
