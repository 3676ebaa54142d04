// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory tabular query results.
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use ganymede_core::Invid;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dump::{DumpRow, FieldValue};
use crate::query_result::{Index, ObjectHandle};

/// How a [`QueryResultContainer`] stores its rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowType {
    /// Values in column order.
    #[default]
    Array,

    /// Values keyed by column name.
    Map,
}

/// Rows of a container in their current representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Rows {
    Array(Vec<Vec<Option<FieldValue>>>),
    Map(Vec<DumpRow>),
}

impl Rows {
    fn new(row_type: RowType) -> Self {
        match row_type {
            RowType::Array => Rows::Array(Vec::new()),
            RowType::Map => Rows::Map(Vec::new()),
        }
    }

    pub fn row_type(&self) -> RowType {
        match self {
            Rows::Array(_) => RowType::Array,
            Rows::Map(_) => RowType::Map,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Rows::Array(rows) => rows.len(),
            Rows::Map(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Table of field values for a list of objects, built and read in memory.
///
/// Rows are deduplicated the same way as in a [`QueryResult`](crate::QueryResult).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResultContainer {
    headers: Vec<String>,
    field_ids: Vec<i16>,
    handles: Vec<ObjectHandle>,
    rows: Rows,
    #[serde(skip)]
    index: OnceLock<Index>,
}

impl Default for QueryResultContainer {
    fn default() -> Self {
        Self::new(RowType::default())
    }
}

impl QueryResultContainer {
    pub fn new(row_type: RowType) -> Self {
        Self {
            headers: Vec::new(),
            field_ids: Vec::new(),
            handles: Vec::new(),
            rows: Rows::new(row_type),
            index: OnceLock::new(),
        }
    }

    /// Appends a column.
    pub fn add_field(&mut self, name: impl Into<String>, field_id: i16) {
        self.headers.push(name.into());
        self.field_ids.push(field_id);
    }

    /// Adds a row for an object. Returns false if the container already holds it.
    pub fn add_row(
        &mut self,
        invid: Invid,
        label: impl Into<String>,
        values: Vec<Option<FieldValue>>,
        editable: bool,
    ) -> bool {
        let handle = ObjectHandle::new(label, Some(invid), false, false, false, editable);
        self.add_handle(handle, values)
    }

    /// Adds a row unless the container already holds the invid of `handle`, or its label when it
    /// has none.
    ///
    /// Values are given in column order, values past the last column are dropped.
    pub fn add_handle(
        &mut self,
        handle: ObjectHandle,
        mut values: Vec<Option<FieldValue>>,
    ) -> bool {
        if self.index().contains(&handle) {
            return false;
        }
        if let Some(index) = self.index.get_mut() {
            index.insert(&handle);
        }

        if values.len() > self.headers.len() {
            warn!(
                label = handle.label(),
                values = values.len(),
                columns = self.headers.len(),
                "dropping values without a column"
            );
            values.truncate(self.headers.len());
        }

        match &mut self.rows {
            Rows::Array(rows) => rows.push(values),
            Rows::Map(rows) => rows.push(array_to_map(&self.headers, values)),
        }
        self.handles.push(handle);
        true
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn field_ids(&self) -> &[i16] {
        &self.field_ids
    }

    pub fn handles(&self) -> &[ObjectHandle] {
        &self.handles
    }

    pub fn object_handle(&self, row: usize) -> Option<&ObjectHandle> {
        self.handles.get(row)
    }

    /// Invid of a row, `None` if there is no such row or it only carries a label.
    pub fn invid(&self, row: usize) -> Option<&Invid> {
        self.handles.get(row)?.invid()
    }

    pub fn label(&self, row: usize) -> Option<&str> {
        self.handles.get(row).map(ObjectHandle::label)
    }

    pub fn invids(&self) -> Vec<Option<&Invid>> {
        self.handles.iter().map(ObjectHandle::invid).collect()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.handles.iter().map(ObjectHandle::label).collect()
    }

    pub fn contains_invid(&self, invid: &Invid) -> bool {
        self.index().invids.contains(invid)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.index().labels.contains(label)
    }

    pub fn rows(&self) -> &Rows {
        &self.rows
    }

    pub fn row_type(&self) -> RowType {
        self.rows.row_type()
    }

    /// Values of one row in column order.
    pub fn field_row(&self, row: usize) -> Option<Vec<Option<&FieldValue>>> {
        match &self.rows {
            Rows::Array(rows) => {
                let values = rows.get(row)?;
                Some(
                    (0..self.headers.len())
                        .map(|column| values.get(column).and_then(Option::as_ref))
                        .collect(),
                )
            }
            Rows::Map(rows) => {
                let values = rows.get(row)?;
                Some(
                    self.headers
                        .iter()
                        .map(|header| values.get(header).and_then(Option::as_ref))
                        .collect(),
                )
            }
        }
    }

    pub fn result(&self, row: usize, column: usize) -> Option<&FieldValue> {
        match &self.rows {
            Rows::Array(rows) => rows.get(row)?.get(column)?.as_ref(),
            Rows::Map(rows) => rows.get(row)?.get(self.headers.get(column)?)?.as_ref(),
        }
    }

    pub fn result_size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Converts all rows to another representation.
    pub fn change_row_type(&mut self, row_type: RowType) {
        if row_type == self.rows.row_type() {
            return;
        }

        let rows = std::mem::replace(&mut self.rows, Rows::new(row_type));
        self.rows = match rows {
            Rows::Array(rows) => Rows::Map(
                rows.into_iter()
                    .map(|values| array_to_map(&self.headers, values))
                    .collect(),
            ),
            Rows::Map(rows) => Rows::Array(
                rows.into_iter()
                    .map(|mut values| {
                        self.headers
                            .iter()
                            .map(|header| values.remove(header).flatten())
                            .collect()
                    })
                    .collect(),
            ),
        };
    }

    fn index(&self) -> &Index {
        self.index.get_or_init(|| Index::from_handles(&self.handles))
    }
}

fn array_to_map(headers: &[String], values: Vec<Option<FieldValue>>) -> DumpRow {
    headers.iter().cloned().zip(values).collect::<HashMap<_, _>>()
}

impl fmt::Display for QueryResultContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in &self.headers {
            write!(f, "{header}:\t")?;
        }
        writeln!(f)?;

        for row in 0..self.result_size() {
            for value in self.field_row(row).unwrap_or_default() {
                match value {
                    Some(value) => write!(f, "{value}\t")?,
                    None => write!(f, "\t")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ganymede_core::Invid;
    use rstest::rstest;

    use crate::dump::FieldValue;
    use crate::query_result::ObjectHandle;

    use super::{QueryResultContainer, RowType, Rows};

    fn text(value: &str) -> Option<FieldValue> {
        Some(FieldValue::Text(value.to_string()))
    }

    fn container(row_type: RowType) -> QueryResultContainer {
        let mut container = QueryResultContainer::new(row_type);
        container.add_field("name", 256);
        container.add_field("uid", 257);

        container.add_row(
            Invid::new(3, 1),
            "alice",
            vec![text("alice"), Some(FieldValue::Numeric(1001))],
            true,
        );
        container.add_row(Invid::new(3, 2), "bob", vec![text("bob"), None], false);
        container
    }

    #[rstest]
    #[case(RowType::Array)]
    #[case(RowType::Map)]
    fn lookups_do_not_depend_on_row_type(#[case] row_type: RowType) {
        let container = container(row_type);

        assert_eq!(container.row_type(), row_type);
        assert_eq!(container.result_size(), 2);
        assert_eq!(container.headers(), ["name", "uid"]);
        assert_eq!(container.field_ids(), [256, 257]);
        assert_eq!(container.result(0, 1), Some(&FieldValue::Numeric(1001)));
        assert_eq!(container.result(1, 1), None);
        assert_eq!(container.result(1, 5), None);
        assert_eq!(
            container.field_row(1),
            Some(vec![Some(&FieldValue::Text("bob".into())), None])
        );
        assert_eq!(container.field_row(2), None);
    }

    #[test]
    fn dedup_by_invid_then_label() {
        let mut container = container(RowType::Array);

        assert!(!container.add_row(Invid::new(3, 1), "alice again", vec![], true));
        assert!(container.add_handle(ObjectHandle::label_only("carol"), vec![text("carol")]));
        assert!(!container.add_handle(ObjectHandle::label_only("carol"), vec![]));

        assert_eq!(container.labels(), ["alice", "bob", "carol"]);
        assert_eq!(container.invids()[2], None);
        assert_eq!(container.invid(1), Some(&Invid::new(3, 2)));
        assert!(container.contains_invid(&Invid::new(3, 2)));
        assert!(container.contains_label("carol"));
        assert!(!container.contains_label("dave"));
        assert!(!container.object_handle(1).unwrap().is_editable());
    }

    #[test]
    fn change_row_type_keeps_values() {
        let mut container = container(RowType::Array);

        container.change_row_type(RowType::Map);
        let Rows::Map(rows) = container.rows() else {
            panic!("expected map rows");
        };
        assert_eq!(rows[0].get("uid"), Some(&Some(FieldValue::Numeric(1001))));

        container.change_row_type(RowType::Array);
        let Rows::Array(rows) = container.rows() else {
            panic!("expected array rows");
        };
        assert_eq!(rows[1], vec![text("bob"), None]);
    }

    #[test]
    fn extra_values_are_dropped() {
        let mut container = QueryResultContainer::default();
        container.add_field("only", 1);
        container.add_row(Invid::new(1, 1), "x", vec![text("a"), text("b")], true);

        assert_eq!(container.field_row(0), Some(vec![Some(&FieldValue::Text("a".into()))]));
    }

    #[test]
    fn display_as_table() {
        let container = container(RowType::Map);
        assert_eq!(
            container.to_string(),
            "name:\tuid:\t\nalice\t1001\t\nbob\t\t\n"
        );
    }

    #[test]
    fn serde_rebuilds_index() {
        let container = container(RowType::Map);
        let json = serde_json::to_string(&container).unwrap();
        let received: QueryResultContainer = serde_json::from_str(&json).unwrap();

        assert!(received.contains_invid(&Invid::new(3, 1)));
        assert_eq!(received.result(0, 0), Some(&FieldValue::Text("alice".into())));
    }
}
