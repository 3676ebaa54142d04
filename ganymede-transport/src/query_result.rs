// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object lists returned by queries.
//!
//! A [`QueryResult`] is a list of [`ObjectHandle`]s without duplicates: handles pointing at an
//! object are told apart by their invid, label-only handles by their label.
//!
//! Results built for transport encode every row into a text buffer as it is added. One row is
//! written as the set flags (`A` inactive, `B` expiration set, `C` removal set, `D` editable),
//! `|`, the invid (empty for label-only rows), `|`, the escaped label and a line end. The receiving
//! side unpacks the buffer lazily and sorts the handles by label, ignoring case.
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use ganymede_core::Invid;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::chunk::{ChunkError, ChunkReader, ChunkWriter};

const INACTIVE_FLAG: char = 'A';
const EXPIRATION_FLAG: char = 'B';
const REMOVAL_FLAG: char = 'C';
const EDITABLE_FLAG: char = 'D';

/// One row of a query result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHandle {
    label: String,
    invid: Option<Invid>,
    inactive: bool,
    expiration_set: bool,
    removal_set: bool,
    editable: bool,
}

impl ObjectHandle {
    pub fn new(
        label: impl Into<String>,
        invid: Option<Invid>,
        inactive: bool,
        expiration_set: bool,
        removal_set: bool,
        editable: bool,
    ) -> Self {
        Self {
            label: label.into(),
            invid,
            inactive,
            expiration_set,
            removal_set,
            editable,
        }
    }

    /// Handle which only carries a label.
    pub fn label_only(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn invid(&self) -> Option<&Invid> {
        self.invid.as_ref()
    }

    pub fn is_inactive(&self) -> bool {
        self.inactive
    }

    pub fn is_expiration_set(&self) -> bool {
        self.expiration_set
    }

    pub fn is_removal_set(&self) -> bool {
        self.removal_set
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    fn write(&self, writer: &mut ChunkWriter) {
        let flags = [
            (self.inactive, INACTIVE_FLAG),
            (self.expiration_set, EXPIRATION_FLAG),
            (self.removal_set, REMOVAL_FLAG),
            (self.editable, EDITABLE_FLAG),
        ];
        let flags: String = flags
            .into_iter()
            .filter_map(|(set, flag)| set.then_some(flag))
            .collect();

        let invid = self.invid.as_ref().map(Invid::to_string).unwrap_or_default();

        writer
            .push_raw(&flags)
            .add_raw_chunk("")
            .push_raw(&invid)
            .add_raw_chunk("")
            .add_line_tail(&self.label);
    }

    fn read(reader: &mut ChunkReader<'_>) -> Result<Self, ChunkError> {
        let mut handle = Self::default();

        // Unknown flags are skipped.
        for flag in reader.next_raw_line_chunk()?.chars() {
            match flag {
                INACTIVE_FLAG => handle.inactive = true,
                EXPIRATION_FLAG => handle.expiration_set = true,
                REMOVAL_FLAG => handle.removal_set = true,
                EDITABLE_FLAG => handle.editable = true,
                _ => (),
            }
        }

        let invid = reader.next_raw_line_chunk()?;
        if !invid.is_empty() {
            handle.invid =
                Some(Invid::parse(&invid).map_err(|_| ChunkError::InvalidInvid(invid))?);
        }

        handle.label = reader.rest_of_line()?;
        Ok(handle)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Error types for `QueryResult`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryResultError {
    /// Result was locked with [`QueryResult::set_non_editable`].
    #[error("query result is not editable")]
    NonEditable,

    /// Transport buffer is malformed.
    #[error(transparent)]
    Parse(#[from] ChunkError),
}

/// Invid and label lookup over a list of handles.
#[derive(Clone, Debug, Default)]
pub(crate) struct Index {
    pub(crate) invids: HashSet<Invid>,
    pub(crate) labels: HashSet<String>,
}

impl Index {
    pub(crate) fn from_handles(handles: &[ObjectHandle]) -> Self {
        let mut index = Self::default();
        for handle in handles {
            index.insert(handle);
        }
        index
    }

    pub(crate) fn contains(&self, handle: &ObjectHandle) -> bool {
        match &handle.invid {
            Some(invid) => self.invids.contains(invid),
            None => self.labels.contains(&handle.label),
        }
    }

    pub(crate) fn insert(&mut self, handle: &ObjectHandle) {
        if let Some(invid) = &handle.invid {
            self.invids.insert(invid.clone());
        }
        self.labels.insert(handle.label.clone());
    }
}

/// List of object handles without duplicates.
///
/// Only the buffer and the transport flag travel over the wire. The unpacked handles and the
/// lookup index are rebuilt on first use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResult {
    buffer: String,
    for_transport: bool,
    #[serde(skip)]
    non_editable: bool,
    #[serde(skip)]
    local: Vec<ObjectHandle>,
    #[serde(skip)]
    unpacked: OnceLock<Result<Vec<ObjectHandle>, ChunkError>>,
    #[serde(skip)]
    index: OnceLock<Index>,
}

impl Default for QueryResult {
    fn default() -> Self {
        Self::new(true)
    }
}

impl QueryResult {
    /// Empty result. Results for transport keep an encoded buffer, local results keep the handles
    /// in insertion order.
    pub fn new(for_transport: bool) -> Self {
        Self {
            buffer: String::new(),
            for_transport,
            non_editable: false,
            local: Vec::new(),
            unpacked: OnceLock::new(),
            index: OnceLock::new(),
        }
    }

    /// Result around a buffer received from elsewhere.
    pub fn from_buffer(buffer: String) -> Self {
        Self {
            buffer,
            ..Self::new(true)
        }
    }

    pub fn is_for_transport(&self) -> bool {
        self.for_transport
    }

    pub fn is_editable(&self) -> bool {
        !self.non_editable
    }

    /// Locks the result against any further change.
    pub fn set_non_editable(&mut self) {
        self.non_editable = true;
    }

    /// Encoded rows, empty for local results.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Adds a row for an object. Returns false if the result already holds it.
    pub fn add_row(
        &mut self,
        invid: Invid,
        label: impl Into<String>,
        editable: bool,
    ) -> Result<bool, QueryResultError> {
        self.add_handle(ObjectHandle::new(label, Some(invid), false, false, false, editable))
    }

    /// Adds a row which only carries a label. Returns false if the label is already present.
    pub fn add_label(&mut self, label: impl Into<String>) -> Result<bool, QueryResultError> {
        self.add_handle(ObjectHandle::label_only(label))
    }

    /// Adds a handle unless the result already holds its invid, or its label when it has none.
    pub fn add_handle(&mut self, handle: ObjectHandle) -> Result<bool, QueryResultError> {
        if self.non_editable {
            warn!(label = handle.label(), "rejected row for non-editable query result");
            return Err(QueryResultError::NonEditable);
        }

        let mut index = self.index.take().unwrap_or_else(|| self.build_index());
        let added = !index.contains(&handle);
        if added {
            index.insert(&handle);
        }
        self.index = OnceLock::from(index);
        if !added {
            return Ok(false);
        }

        if self.for_transport {
            let mut writer = ChunkWriter::from_buffer(std::mem::take(&mut self.buffer));
            handle.write(&mut writer);
            self.buffer = writer.into_string();
            self.unpacked = OnceLock::new();
        } else {
            self.local.push(handle);
        }

        Ok(true)
    }

    /// Adds every handle of `other` which this result doesn't hold yet.
    pub fn append(&mut self, other: &QueryResult) -> Result<(), QueryResultError> {
        if self.non_editable {
            warn!("rejected append to non-editable query result");
            return Err(QueryResultError::NonEditable);
        }

        for handle in other.handles()? {
            self.add_handle(handle.clone())?;
        }
        Ok(())
    }

    /// New result holding the handles of this result which `operand` holds as well, in the order
    /// of this result.
    pub fn intersection(
        &self,
        operand: Option<&QueryResult>,
    ) -> Result<QueryResult, QueryResultError> {
        if self.non_editable {
            return Err(QueryResultError::NonEditable);
        }

        let mut result = QueryResult::new(self.for_transport);
        let Some(operand) = operand else {
            return Ok(result);
        };
        if operand.size()? == 0 {
            return Ok(result);
        }

        for handle in self.handles()? {
            let shared = match handle.invid() {
                Some(invid) => operand.contains_invid(invid),
                None => operand.contains_label(handle.label()),
            };
            if shared {
                result.add_handle(handle.clone())?;
            }
        }

        Ok(result)
    }

    /// All handles. Unpacked results are sorted by label, ignoring case.
    pub fn handles(&self) -> Result<&[ObjectHandle], QueryResultError> {
        if !self.for_transport {
            return Ok(&self.local);
        }

        self.unpacked
            .get_or_init(|| unpack(&self.buffer))
            .as_deref()
            .map_err(|err| QueryResultError::Parse(err.clone()))
    }

    pub fn size(&self) -> Result<usize, QueryResultError> {
        Ok(self.handles()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueryResultError> {
        Ok(self.handles()?.is_empty())
    }

    pub fn object_handle(&self, row: usize) -> Result<Option<&ObjectHandle>, QueryResultError> {
        Ok(self.handles()?.get(row))
    }

    /// Invid of a row, `None` if there is no such row or it only carries a label.
    pub fn invid(&self, row: usize) -> Result<Option<&Invid>, QueryResultError> {
        Ok(self.object_handle(row)?.and_then(ObjectHandle::invid))
    }

    pub fn label(&self, row: usize) -> Result<Option<&str>, QueryResultError> {
        Ok(self.object_handle(row)?.map(ObjectHandle::label))
    }

    /// Invids in row order, `None` for label-only rows.
    pub fn invids(&self) -> Result<Vec<Option<&Invid>>, QueryResultError> {
        Ok(self.handles()?.iter().map(ObjectHandle::invid).collect())
    }

    pub fn labels(&self) -> Result<Vec<&str>, QueryResultError> {
        Ok(self.handles()?.iter().map(ObjectHandle::label).collect())
    }

    /// Handles filtered by their state.
    pub fn list_handles(
        &self,
        include_inactive: bool,
        include_non_editable: bool,
    ) -> Result<Vec<&ObjectHandle>, QueryResultError> {
        Ok(self
            .handles()?
            .iter()
            .filter(|handle| include_inactive || !handle.is_inactive())
            .filter(|handle| include_non_editable || handle.is_editable())
            .collect())
    }

    /// Returns true if a row points at `invid`.
    ///
    /// A received result whose buffer can't be decoded contains nothing.
    pub fn contains_invid(&self, invid: &Invid) -> bool {
        self.index().invids.contains(invid)
    }

    /// Returns true if a row carries `label`.
    pub fn contains_label(&self, label: &str) -> bool {
        self.index().labels.contains(label)
    }

    fn index(&self) -> &Index {
        self.index.get_or_init(|| self.build_index())
    }

    fn build_index(&self) -> Index {
        match self.handles() {
            Ok(handles) => Index::from_handles(handles),
            Err(_) => Index::default(),
        }
    }
}

fn unpack(buffer: &str) -> Result<Vec<ObjectHandle>, ChunkError> {
    let mut reader = ChunkReader::new(buffer);
    let mut handles = Vec::new();

    while !reader.is_exhausted() {
        handles.push(ObjectHandle::read(&mut reader)?);
    }

    // Stable, rows with equal labels keep their buffer order.
    handles.sort_by_cached_key(|handle| handle.label.to_lowercase());

    debug!(rows = handles.len(), "unpacked query result");
    Ok(handles)
}
