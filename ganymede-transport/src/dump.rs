// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tabular field dumps.
//!
//! A [`DumpResult`] carries the values of a set of fields for a list of objects. The buffer starts
//! with one header line of `name|fieldId|fieldType|` triples followed by one line per object,
//! holding its invid and one chunk per column:
//!
//! ```text
//! name|256|3|uid|257|1|\n
//! 3:12|alice|1001|\n
//! 3:13|bob|null|\n
//! ```
//!
//! Date, numeric and float columns decode `null` and the empty chunk as an absent value. All other
//! columns keep the text as it is, so a string column holding `null` decodes to the text `null`.
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use ganymede_core::{FieldType, Invid};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunk::{ChunkError, ChunkReader, ChunkWriter};

const NULL_TOKEN: &str = "null";

/// Decoded field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Numeric(i32),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Date(millis) => write!(f, "{millis}"),
            FieldValue::Numeric(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Column of a dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpResultCol {
    name: String,
    field_id: i16,
    field_type: FieldType,
}

impl DumpResultCol {
    pub fn new(name: impl Into<String>, field_id: i16, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_id,
            field_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_id(&self) -> i16 {
        self.field_id
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

/// Values of one object, keyed by column name. Columns the row did not carry are missing.
pub type DumpRow = HashMap<String, Option<FieldValue>>;

/// Unpacked contents of a [`DumpResult`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DumpTable {
    columns: Vec<DumpResultCol>,
    invids: Vec<Invid>,
    rows: Vec<DumpRow>,
}

impl DumpTable {
    fn decode(buffer: &str) -> Result<Self, ChunkError> {
        let mut table = DumpTable::default();
        if buffer.is_empty() {
            return Ok(table);
        }

        let mut reader = ChunkReader::new(buffer);

        while !reader.at_line_end() {
            let name = reader.next_line_chunk()?;
            let field_id = parse_number::<i16>(reader.next_line_chunk()?)?;
            let code = parse_number::<i16>(reader.next_line_chunk()?)?;
            let field_type =
                FieldType::from_code(code).map_err(|_| ChunkError::InvalidFieldValue {
                    field: name.clone(),
                    value: code.to_string(),
                })?;
            table.columns.push(DumpResultCol {
                name,
                field_id,
                field_type,
            });
        }
        reader.end_line()?;

        while !reader.is_exhausted() {
            let chunk = reader.next_raw_line_chunk()?;
            let invid = Invid::parse(&chunk).map_err(|_| ChunkError::InvalidInvid(chunk))?;

            let mut row = DumpRow::new();
            let mut column = 0;
            while !reader.at_line_end() {
                let value = reader.next_line_chunk()?;
                let Some(header) = table.columns.get(column) else {
                    return Err(ChunkError::TooManyValues {
                        row: table.rows.len(),
                    });
                };
                row.insert(header.name.clone(), decode_value(header, value)?);
                column += 1;
            }
            reader.end_line()?;

            table.invids.push(invid);
            table.rows.push(row);
        }

        debug!(
            columns = table.columns.len(),
            rows = table.rows.len(),
            "unpacked dump result"
        );

        Ok(table)
    }

    pub fn columns(&self) -> &[DumpResultCol] {
        &self.columns
    }

    pub fn invids(&self) -> &[Invid] {
        &self.invids
    }

    pub fn rows(&self) -> &[DumpRow] {
        &self.rows
    }

    /// Values of one row in column order.
    pub fn field_row(&self, row: usize) -> Option<Vec<Option<&FieldValue>>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(|column| values.get(&column.name).and_then(Option::as_ref))
                .collect(),
        )
    }

    pub fn result(&self, row: usize, column: usize) -> Option<&FieldValue> {
        let name = &self.columns.get(column)?.name;
        self.rows.get(row)?.get(name)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn parse_number<T: std::str::FromStr>(chunk: String) -> Result<T, ChunkError> {
    chunk
        .trim()
        .parse()
        .map_err(|_| ChunkError::InvalidNumber(chunk))
}

fn decode_value(header: &DumpResultCol, value: String) -> Result<Option<FieldValue>, ChunkError> {
    let nullable = matches!(
        header.field_type,
        FieldType::Date | FieldType::Numeric | FieldType::Float
    );
    if nullable && (value.is_empty() || value == NULL_TOKEN) {
        return Ok(None);
    }

    let invalid = |value: String| ChunkError::InvalidFieldValue {
        field: header.name.clone(),
        value,
    };

    let decoded = match header.field_type {
        FieldType::Date => FieldValue::Date(value.parse().map_err(|_| invalid(value))?),
        FieldType::Numeric => FieldValue::Numeric(value.parse().map_err(|_| invalid(value))?),
        FieldType::Float => FieldValue::Float(value.parse().map_err(|_| invalid(value))?),
        _ => FieldValue::Text(value),
    };

    Ok(Some(decoded))
}

/// Encoded field dump, unpacked lazily on first access.
///
/// The unpacked table is cached. If the buffer is malformed the error is cached as well and every
/// accessor keeps returning it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DumpResult {
    buffer: String,
    #[serde(skip)]
    table: OnceLock<Result<DumpTable, ChunkError>>,
}

impl DumpResult {
    pub fn from_buffer(buffer: String) -> Self {
        Self {
            buffer,
            table: OnceLock::new(),
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Unpacked table, decoding the buffer on first use.
    pub fn table(&self) -> Result<&DumpTable, ChunkError> {
        self.table
            .get_or_init(|| DumpTable::decode(&self.buffer))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Column names in order.
    pub fn headers(&self) -> Result<Vec<&str>, ChunkError> {
        Ok(self
            .table()?
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect())
    }

    pub fn header_objects(&self) -> Result<&[DumpResultCol], ChunkError> {
        Ok(self.table()?.columns())
    }

    pub fn field_name(&self, column: usize) -> Result<Option<&str>, ChunkError> {
        Ok(self.table()?.columns.get(column).map(DumpResultCol::name))
    }

    pub fn field_id(&self, column: usize) -> Result<Option<i16>, ChunkError> {
        Ok(self.table()?.columns.get(column).map(DumpResultCol::field_id))
    }

    pub fn field_type(&self, column: usize) -> Result<Option<FieldType>, ChunkError> {
        Ok(self
            .table()?
            .columns
            .get(column)
            .map(DumpResultCol::field_type))
    }

    pub fn invids(&self) -> Result<&[Invid], ChunkError> {
        Ok(self.table()?.invids())
    }

    pub fn invid(&self, row: usize) -> Result<Option<&Invid>, ChunkError> {
        Ok(self.table()?.invids.get(row))
    }

    pub fn rows(&self) -> Result<&[DumpRow], ChunkError> {
        Ok(self.table()?.rows())
    }

    /// Values of one row in column order, `None` if there is no such row.
    pub fn field_row(&self, row: usize) -> Result<Option<Vec<Option<&FieldValue>>>, ChunkError> {
        Ok(self.table()?.field_row(row))
    }

    pub fn result(&self, row: usize, column: usize) -> Result<Option<&FieldValue>, ChunkError> {
        Ok(self.table()?.result(row, column))
    }

    /// Number of objects in the dump.
    pub fn result_size(&self) -> Result<usize, ChunkError> {
        Ok(self.table()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ChunkError> {
        Ok(self.table()?.is_empty())
    }

    /// Iterates over the objects and their values.
    pub fn iter(&self) -> Result<impl Iterator<Item = (&Invid, &DumpRow)>, ChunkError> {
        let table = self.table()?;
        Ok(table.invids.iter().zip(table.rows.iter()))
    }

    /// Drops the buffer and everything unpacked from it.
    pub fn dissociate(&mut self) {
        self.buffer.clear();
        self.table = OnceLock::new();
    }
}

impl PartialEq for DumpResult {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
    }
}

/// Writes a [`DumpResult`] row by row.
#[derive(Debug)]
pub struct DumpResultBuilder {
    columns: Vec<DumpResultCol>,
    writer: ChunkWriter,
}

impl DumpResultBuilder {
    /// Starts a dump and writes its header line.
    pub fn new(columns: Vec<DumpResultCol>) -> Self {
        let mut writer = ChunkWriter::new();
        for column in &columns {
            writer
                .add_line_chunk(&column.name)
                .add_raw_chunk(&column.field_id.to_string())
                .add_raw_chunk(&column.field_type.code().to_string());
        }
        writer.end_line();

        Self { columns, writer }
    }

    pub fn columns(&self) -> &[DumpResultCol] {
        &self.columns
    }

    /// Writes the values of one object in column order.
    ///
    /// A missing or `None` value is written as an empty chunk. Values past the last column are
    /// dropped.
    pub fn add_row(&mut self, invid: &Invid, values: &[Option<FieldValue>]) -> &mut Self {
        if values.len() > self.columns.len() {
            warn!(
                %invid,
                values = values.len(),
                columns = self.columns.len(),
                "dropping values without a column"
            );
        }

        self.writer.add_raw_chunk(&invid.to_string());
        for index in 0..self.columns.len() {
            match values.get(index).and_then(Option::as_ref) {
                Some(FieldValue::Text(text)) => {
                    self.writer.add_line_chunk(text);
                }
                Some(value) => {
                    self.writer.add_raw_chunk(&value.to_string());
                }
                None => {
                    self.writer.add_null();
                }
            }
        }
        self.writer.end_line();
        self
    }

    pub fn finish(self) -> DumpResult {
        DumpResult::from_buffer(self.writer.into_string())
    }
}
