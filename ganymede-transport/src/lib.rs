// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire formats the Ganymede server uses to hand schema and query results to its clients.
//!
//! Every transport type wraps a single escaped-chunk text buffer (see [`chunk`]). The server
//! writes the buffer, the client decodes it lazily into read-only views:
//!
//! - [`CategoryTransport`] and [`BaseListTransport`] carry the object bases and the category tree
//!   they are sorted into.
//! - [`DumpResult`] carries field values of many objects as a table.
//! - [`QueryResult`] carries a deduplicated list of [`ObjectHandle`]s.
//!
//! [`Query`] describes a lookup a client asks for. [`QueryResultContainer`], [`FieldInfo`] and
//! [`FieldTemplate`] complete the set of values exchanged around queries.
//!
//! ## Example
//!
//! ```
//! use ganymede_core::{FieldType, Invid};
//! use ganymede_transport::{DumpResultBuilder, DumpResultCol, FieldValue};
//!
//! let columns = vec![DumpResultCol::new("name", 256, FieldType::String)];
//! let mut builder = DumpResultBuilder::new(columns);
//! builder.add_row(&Invid::new(3, 12), &[Some(FieldValue::Text("alice".into()))]);
//! let dump = builder.finish();
//!
//! assert_eq!(dump.buffer(), "name|256|3|\n3:12|alice|\n");
//! assert_eq!(dump.result(0, 0).unwrap(), Some(&FieldValue::Text("alice".into())));
//! ```
pub mod category;
pub mod chunk;
pub mod container;
pub mod dump;
pub mod field_info;
pub mod field_template;
pub mod query;
pub mod query_result;

pub use category::{
    BaseDefinition, BaseDump, BaseListTransport, CategoryDefinition, CategoryDump, CategoryMember,
    CategoryNode, CategoryTransport, MAX_CATEGORY_DEPTH, MatrixPolicy, NoPolicy, TransportPolicy,
};
pub use chunk::{ChunkError, ChunkReader, ChunkWriter};
pub use container::{QueryResultContainer, RowType, Rows};
pub use dump::{DumpResult, DumpResultBuilder, DumpResultCol, DumpRow, DumpTable, FieldValue};
pub use field_info::{FieldData, FieldInfo, FieldInfoError, FieldSource};
pub use field_template::{FieldDefinition, FieldTemplate, FieldTemplateError};
pub use query::{
    Comparator, FieldSelector, Query, QueryDataNode, QueryDescriber, QueryNode, QueryNodeError,
    QueryTarget, QueryValue, VectorOp,
};
pub use query_result::{ObjectHandle, QueryResult, QueryResultError};
