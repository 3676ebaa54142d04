// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries sent by clients: the target base, a tree of field comparisons and the fields to return.
use std::collections::BTreeSet;
use std::fmt;

use ganymede_core::Invid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Comparator code meaning "no comparator".
pub const NO_COMPARATOR: u8 = 0;

/// Vector operator code meaning "compare the field as a scalar".
pub const NO_VECTOR_OP: u8 = 0;

const FIRST_COMPARATOR: u8 = 1;
const LAST_COMPARATOR: u8 = 11;
const LAST_VECTOR_OP: u8 = 8;

/// Field id selecting the label of an object.
pub const LABEL_FIELD: i16 = -1;

/// Field id selecting the invid of an object.
pub const INVID_FIELD: i16 = -2;

/// Scalar comparison applied to a field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Comparator {
    Equals,
    Less,
    LessEq,
    Great,
    GreatEq,
    /// Case insensitive string equality.
    NoCaseEq,
    StartsWith,
    EndsWith,
    Defined,
    Matches,
    NoCaseMatches,
}

impl Comparator {
    pub fn code(&self) -> u8 {
        match self {
            Comparator::Equals => 1,
            Comparator::Less => 2,
            Comparator::LessEq => 3,
            Comparator::Great => 4,
            Comparator::GreatEq => 5,
            Comparator::NoCaseEq => 6,
            Comparator::StartsWith => 7,
            Comparator::EndsWith => 8,
            Comparator::Defined => 9,
            Comparator::Matches => 10,
            Comparator::NoCaseMatches => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let comparator = match code {
            1 => Comparator::Equals,
            2 => Comparator::Less,
            3 => Comparator::LessEq,
            4 => Comparator::Great,
            5 => Comparator::GreatEq,
            6 => Comparator::NoCaseEq,
            7 => Comparator::StartsWith,
            8 => Comparator::EndsWith,
            9 => Comparator::Defined,
            10 => Comparator::Matches,
            11 => Comparator::NoCaseMatches,
            _ => return None,
        };
        Some(comparator)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Equals => "EQUALS",
            Comparator::Less => "LESS",
            Comparator::LessEq => "LESSEQ",
            Comparator::Great => "GREAT",
            Comparator::GreatEq => "GREATEQ",
            Comparator::NoCaseEq => "NOCASEEQ",
            Comparator::StartsWith => "STARTSWITH",
            Comparator::EndsWith => "ENDSWITH",
            Comparator::Defined => "DEFINED",
            Comparator::Matches => "MATCHES",
            Comparator::NoCaseMatches => "NOCASEMATCHES",
        }
    }
}

/// Operation applied to vector fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VectorOp {
    /// Some element matches the comparator.
    Contains,
    LengthEq,
    LengthGr,
    LengthLe,
    LengthLeEq,
    LengthGrEq,
}

impl VectorOp {
    pub fn code(&self) -> u8 {
        match self {
            VectorOp::Contains => 1,
            VectorOp::LengthEq => 4,
            VectorOp::LengthGr => 5,
            VectorOp::LengthLe => 6,
            VectorOp::LengthLeEq => 7,
            VectorOp::LengthGrEq => 8,
        }
    }

    /// Named operator for a code. Codes 2 and 3 are valid on the wire but have no name.
    pub fn from_code(code: u8) -> Option<Self> {
        let op = match code {
            1 => VectorOp::Contains,
            4 => VectorOp::LengthEq,
            5 => VectorOp::LengthGr,
            6 => VectorOp::LengthLe,
            7 => VectorOp::LengthLeEq,
            8 => VectorOp::LengthGrEq,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorOp::Contains => "CONTAINS",
            VectorOp::LengthEq => "LENGTHEQ",
            VectorOp::LengthGr => "LENGTHGR",
            VectorOp::LengthLe => "LENGTHLE",
            VectorOp::LengthLeEq => "LENGTHLEEQ",
            VectorOp::LengthGrEq => "LENGTHGREQ",
        }
    }
}

/// Which part of an object a node compares against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldSelector {
    Name(String),
    Id(i16),
    Label,
    Invid,
}

impl FieldSelector {
    /// Selector for a field id, mapping the reserved ids to [`FieldSelector::Label`] and
    /// [`FieldSelector::Invid`].
    pub fn from_id(id: i16) -> Self {
        match id {
            LABEL_FIELD => FieldSelector::Label,
            INVID_FIELD => FieldSelector::Invid,
            id => FieldSelector::Id(id),
        }
    }

    /// Field id, `None` when selecting by name.
    pub fn field_id(&self) -> Option<i16> {
        match self {
            FieldSelector::Name(_) => None,
            FieldSelector::Id(id) => Some(*id),
            FieldSelector::Label => Some(LABEL_FIELD),
            FieldSelector::Invid => Some(INVID_FIELD),
        }
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.field_id()) {
            (FieldSelector::Name(name), _) => f.write_str(name),
            (_, Some(id)) => write!(f, "<{id}>"),
            (_, None) => Ok(()),
        }
    }
}

/// Value a field is compared with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Text(String),
    Numeric(i32),
    Float(f64),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Boolean(bool),
    Invid(Invid),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Text(value) => f.write_str(value),
            QueryValue::Numeric(value) => write!(f, "{value}"),
            QueryValue::Float(value) => write!(f, "{value}"),
            QueryValue::Date(value) => write!(f, "{value}"),
            QueryValue::Boolean(value) => write!(f, "{value}"),
            QueryValue::Invid(value) => write!(f, "{value}"),
        }
    }
}

/// Error types for `QueryDataNode` construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryNodeError {
    /// Comparator code outside of 1..=11 on a scalar comparison.
    #[error("bad comparator value: {0}")]
    InvalidComparator(u8),

    /// Vector operator code outside of 0..=8.
    #[error("bad vector operator value: {0}")]
    InvalidVectorOp(u8),
}

/// Leaf of a query tree: compares one field of an object with a value.
///
/// Comparator and vector operator are kept as raw codes. A node with a vector operator does not
/// need a valid comparator, so [`QueryDataNode::comparator`] may return `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NodeFields")]
pub struct QueryDataNode {
    field: FieldSelector,
    comparator: u8,
    vector_op: u8,
    value: Option<QueryValue>,
}

impl QueryDataNode {
    /// Validates and builds a node from raw operator codes.
    pub fn new(
        field: FieldSelector,
        comparator: u8,
        vector_op: u8,
        value: Option<QueryValue>,
    ) -> Result<Self, QueryNodeError> {
        let comparator_valid = (FIRST_COMPARATOR..=LAST_COMPARATOR).contains(&comparator);
        if !comparator_valid && vector_op == NO_VECTOR_OP {
            return Err(QueryNodeError::InvalidComparator(comparator));
        }
        if vector_op > LAST_VECTOR_OP {
            return Err(QueryNodeError::InvalidVectorOp(vector_op));
        }

        Ok(Self {
            field,
            comparator,
            vector_op,
            value,
        })
    }

    /// Scalar comparison of a field.
    pub fn compare(
        field: FieldSelector,
        comparator: Comparator,
        value: Option<QueryValue>,
    ) -> Self {
        Self {
            field,
            comparator: comparator.code(),
            vector_op: NO_VECTOR_OP,
            value,
        }
    }

    /// Comparison of a vector field.
    pub fn vector(
        field: FieldSelector,
        vector_op: VectorOp,
        comparator: Comparator,
        value: Option<QueryValue>,
    ) -> Self {
        Self {
            field,
            comparator: comparator.code(),
            vector_op: vector_op.code(),
            value,
        }
    }

    /// Scalar comparison of the label of an object.
    pub fn label(comparator: Comparator, value: Option<QueryValue>) -> Self {
        Self::compare(FieldSelector::Label, comparator, value)
    }

    pub fn field(&self) -> &FieldSelector {
        &self.field
    }

    pub fn comparator(&self) -> Option<Comparator> {
        Comparator::from_code(self.comparator)
    }

    pub fn comparator_code(&self) -> u8 {
        self.comparator
    }

    /// Vector operator, `None` for scalar comparisons and unnamed codes.
    pub fn vector_op(&self) -> Option<VectorOp> {
        VectorOp::from_code(self.vector_op)
    }

    pub fn vector_op_code(&self) -> u8 {
        self.vector_op
    }

    pub fn is_vector(&self) -> bool {
        self.vector_op != NO_VECTOR_OP
    }

    pub fn value(&self) -> Option<&QueryValue> {
        self.value.as_ref()
    }
}

impl fmt::Display for QueryDataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.field)?;

        if self.is_vector() {
            match self.vector_op() {
                Some(VectorOp::Contains) => match self.comparator() {
                    Some(Comparator::Equals) => f.write_str("CONTAINS/EQUALS")?,
                    _ => f.write_str("CONTAINS/?")?,
                },
                Some(op) => f.write_str(op.as_str())?,
                None => f.write_str("?")?,
            }
        } else if let Some(comparator) = self.comparator() {
            f.write_str(comparator.as_str())?;
        }

        f.write_str(" ")?;
        if let Some(value) = &self.value {
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct NodeFields {
    field: FieldSelector,
    comparator: u8,
    vector_op: u8,
    value: Option<QueryValue>,
}

impl TryFrom<NodeFields> for QueryDataNode {
    type Error = QueryNodeError;

    fn try_from(value: NodeFields) -> Result<Self, Self::Error> {
        QueryDataNode::new(value.field, value.comparator, value.vector_op, value.value)
    }
}

/// Boolean query tree built from [`QueryDataNode`] leaves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    Data(QueryDataNode),
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
    Not(Box<QueryNode>),
}

impl QueryNode {
    pub fn and(left: impl Into<QueryNode>, right: impl Into<QueryNode>) -> Self {
        QueryNode::And(Box::new(left.into()), Box::new(right.into()))
    }

    pub fn or(left: impl Into<QueryNode>, right: impl Into<QueryNode>) -> Self {
        QueryNode::Or(Box::new(left.into()), Box::new(right.into()))
    }

    pub fn not(node: impl Into<QueryNode>) -> Self {
        QueryNode::Not(Box::new(node.into()))
    }

    /// Comparison leaves of the tree, left to right.
    pub fn data_nodes(&self) -> Vec<&QueryDataNode> {
        let mut nodes = Vec::new();
        self.collect_data_nodes(&mut nodes);
        nodes
    }

    fn collect_data_nodes<'a>(&'a self, nodes: &mut Vec<&'a QueryDataNode>) {
        match self {
            QueryNode::Data(node) => nodes.push(node),
            QueryNode::And(left, right) | QueryNode::Or(left, right) => {
                left.collect_data_nodes(nodes);
                right.collect_data_nodes(nodes);
            }
            QueryNode::Not(node) => node.collect_data_nodes(nodes),
        }
    }
}

impl From<QueryDataNode> for QueryNode {
    fn from(node: QueryDataNode) -> Self {
        QueryNode::Data(node)
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Data(node) => write!(f, "{node}"),
            QueryNode::And(left, right) => write!(f, "({left}) and ({right})"),
            QueryNode::Or(left, right) => write!(f, "({left}) or ({right})"),
            QueryNode::Not(node) => write!(f, "not ({node})"),
        }
    }
}

/// Object base a [`Query`] runs against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryTarget {
    /// Base type id.
    Type(i16),
    /// Base name, resolved by the server.
    Name(String),
}

/// Translates type and field ids into names for query diagnostics.
pub trait QueryDescriber {
    fn describe_type(&self, type_id: i16) -> String;

    fn describe_field(&self, target: &QueryTarget, field_id: i16) -> String;
}

/// Database lookup sent from a client: the base to search, an optional filter tree and the fields
/// to return.
///
/// Without a permit set every field is returned. Adding the first field starts a permit set, from
/// then on only listed fields are returned until [`Query::reset_permit_set`] is called.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    target: QueryTarget,
    root: Option<QueryNode>,
    editable_only: bool,
    filtered: bool,
    save_name: Option<String>,
    permit_set: Option<BTreeSet<i16>>,
}

impl Query {
    pub fn new(target: QueryTarget, root: Option<QueryNode>, editable_only: bool) -> Self {
        Self {
            target,
            root,
            editable_only,
            filtered: false,
            save_name: None,
            permit_set: None,
        }
    }

    /// Query for all editable objects of a base type.
    pub fn for_type(type_id: i16) -> Self {
        Self::new(QueryTarget::Type(type_id), None, true)
    }

    /// Query for all editable objects of a named base.
    pub fn for_name(name: impl Into<String>) -> Self {
        Self::new(QueryTarget::Name(name.into()), None, true)
    }

    pub fn with_root(mut self, root: impl Into<QueryNode>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn target(&self) -> &QueryTarget {
        &self.target
    }

    pub fn object_type(&self) -> Option<i16> {
        match self.target {
            QueryTarget::Type(type_id) => Some(type_id),
            QueryTarget::Name(_) => None,
        }
    }

    pub fn object_name(&self) -> Option<&str> {
        match &self.target {
            QueryTarget::Type(_) => None,
            QueryTarget::Name(name) => Some(name),
        }
    }

    pub fn root(&self) -> Option<&QueryNode> {
        self.root.as_ref()
    }

    /// Only objects the session may edit are returned.
    pub fn is_editable_only(&self) -> bool {
        self.editable_only
    }

    pub fn set_editable_only(&mut self, editable_only: bool) {
        self.editable_only = editable_only;
    }

    /// Results pass through the owner filter of the session.
    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn set_filtered(&mut self, filtered: bool) {
        self.filtered = filtered;
    }

    /// Name the query was saved under on the client.
    pub fn save_name(&self) -> Option<&str> {
        self.save_name.as_deref()
    }

    pub fn set_save_name(&mut self, save_name: Option<String>) {
        self.save_name = save_name;
    }

    pub fn has_permit_set(&self) -> bool {
        self.permit_set.is_some()
    }

    pub fn reset_permit_set(&mut self) {
        self.permit_set = None;
    }

    /// Adds a field to the returned fields, starting a permit set if there is none.
    pub fn add_field(&mut self, field_id: i16) {
        self.permit_set
            .get_or_insert_with(BTreeSet::new)
            .insert(field_id);
    }

    /// Removes a field from the permit set. Does nothing without a permit set.
    pub fn remove_field(&mut self, field_id: i16) {
        if let Some(permit_set) = &mut self.permit_set {
            permit_set.remove(&field_id);
        }
    }

    /// Returns true if the field is part of the result.
    pub fn return_field(&self, field_id: i16) -> bool {
        self.permit_set
            .as_ref()
            .is_none_or(|permit_set| permit_set.contains(&field_id))
    }

    /// Copy of the permit set, empty if there is none.
    pub fn field_set(&self) -> BTreeSet<i16> {
        self.permit_set.clone().unwrap_or_default()
    }

    /// Name of a field for diagnostics, `<id>` without a describer.
    pub fn describe_field(&self, field_id: i16, describer: Option<&dyn QueryDescriber>) -> String {
        match describer {
            Some(describer) => describer.describe_field(&self.target, field_id),
            None => format!("<{field_id}>"),
        }
    }

    /// Diagnostic form with type names resolved through `describer`.
    pub fn describe(&self, describer: Option<&dyn QueryDescriber>) -> String {
        let mut result = String::new();
        match &self.target {
            QueryTarget::Type(type_id) => {
                let name = match describer {
                    Some(describer) => describer.describe_type(*type_id),
                    None => type_id.to_string(),
                };
                result.push_str(&format!("objectType = {name},"));
            }
            QueryTarget::Name(name) => result.push_str(&format!("objectName = {name},")),
        }

        result.push_str("editableOnly = ");
        result.push_str(if self.editable_only { "True" } else { "False" });

        if let Some(root) = &self.root {
            result.push_str(&format!(",{root}"));
        }
        result
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(None))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ganymede_core::Invid;
    use rstest::rstest;

    use super::{
        Comparator, FieldSelector, Query, QueryDataNode, QueryDescriber, QueryNode, QueryNodeError,
        QueryTarget, QueryValue, VectorOp,
    };

    #[rstest]
    #[case(0, 0, Err(QueryNodeError::InvalidComparator(0)))]
    #[case(12, 0, Err(QueryNodeError::InvalidComparator(12)))]
    #[case(1, 9, Err(QueryNodeError::InvalidVectorOp(9)))]
    #[case(11, 0, Ok(()))]
    #[case(1, 8, Ok(()))]
    // A vector operator lifts the comparator range check.
    #[case(0, 4, Ok(()))]
    #[case(42, 2, Ok(()))]
    fn construction_checks(
        #[case] comparator: u8,
        #[case] vector_op: u8,
        #[case] expected: Result<(), QueryNodeError>,
    ) {
        let node = QueryDataNode::new(
            FieldSelector::Name("uid".into()),
            comparator,
            vector_op,
            None,
        );
        assert_eq!(node.map(|_| ()), expected);
    }

    #[test]
    fn operator_codes() {
        for code in 1..=11 {
            assert_eq!(Comparator::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Comparator::from_code(12), None);

        assert_eq!(VectorOp::from_code(1), Some(VectorOp::Contains));
        assert_eq!(VectorOp::from_code(2), None);
        assert_eq!(VectorOp::LengthGrEq.code(), 8);
    }

    #[rstest]
    #[case(-1, FieldSelector::Label)]
    #[case(-2, FieldSelector::Invid)]
    #[case(256, FieldSelector::Id(256))]
    fn selectors(#[case] id: i16, #[case] selector: FieldSelector) {
        assert_eq!(FieldSelector::from_id(id), selector);
        assert_eq!(selector.field_id(), Some(id));
        assert_eq!(selector.to_string(), format!("<{id}>"));
    }

    #[test]
    fn diagnostic_form() {
        let node = QueryDataNode::compare(
            FieldSelector::Name("username".into()),
            Comparator::StartsWith,
            Some(QueryValue::Text("br".into())),
        );
        assert_eq!(node.to_string(), "username STARTSWITH br");

        let node = QueryDataNode::label(Comparator::Defined, None);
        assert_eq!(node.to_string(), "<-1> DEFINED ");

        let node = QueryDataNode::vector(
            FieldSelector::Id(260),
            VectorOp::Contains,
            Comparator::Equals,
            Some(QueryValue::Invid(Invid::new(3, 7))),
        );
        assert_eq!(node.to_string(), "<260> CONTAINS/EQUALS 3:7");

        let node = QueryDataNode::vector(
            FieldSelector::Id(260),
            VectorOp::Contains,
            Comparator::Less,
            Some(QueryValue::Numeric(1)),
        );
        assert_eq!(node.to_string(), "<260> CONTAINS/? 1");

        let node = QueryDataNode::new(FieldSelector::Id(5), 0, 5, Some(QueryValue::Numeric(2)))
            .unwrap();
        assert_eq!(node.comparator(), None);
        assert_eq!(node.to_string(), "<5> LENGTHGR 2");
    }

    #[test]
    fn serde_validates() {
        let node = QueryDataNode::compare(
            FieldSelector::Id(12),
            Comparator::Equals,
            Some(QueryValue::Boolean(true)),
        );
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(
            serde_json::from_str::<QueryDataNode>(&json).unwrap(),
            node
        );

        let invalid = r#"{"field":"Label","comparator":0,"vector_op":0,"value":null}"#;
        assert!(serde_json::from_str::<QueryDataNode>(invalid).is_err());
        assert_matches!(
            QueryDataNode::new(FieldSelector::Label, 0, 0, None),
            Err(QueryNodeError::InvalidComparator(0))
        );
    }

    fn uid_equals(uid: i32) -> QueryDataNode {
        QueryDataNode::compare(
            FieldSelector::Name("uid".into()),
            Comparator::Equals,
            Some(QueryValue::Numeric(uid)),
        )
    }

    #[test]
    fn query_defaults() {
        let query = Query::for_type(3);
        assert_eq!(query.object_type(), Some(3));
        assert_eq!(query.object_name(), None);
        assert!(query.is_editable_only());
        assert!(!query.is_filtered());
        assert!(query.root().is_none());
        assert_eq!(query.to_string(), "objectType = 3,editableOnly = True");

        let mut query = Query::for_name("User").with_root(uid_equals(1001));
        query.set_editable_only(false);
        assert_eq!(query.object_type(), None);
        assert_eq!(
            query.to_string(),
            "objectName = User,editableOnly = False,uid EQUALS 1001"
        );
    }

    #[rstest]
    #[case::no_permit_set(&[], &[], &[(256, true), (300, true)])]
    #[case::listed_fields_only(&[256, 257], &[], &[(256, true), (257, true), (300, false)])]
    #[case::removed_field(&[256, 257], &[257], &[(256, true), (257, false)])]
    // Emptying the permit set does not bring back the other fields.
    #[case::emptied_permit_set(&[256], &[256], &[(256, false), (300, false)])]
    #[case::remove_without_permit_set(&[], &[256], &[(256, true)])]
    fn permit_set(
        #[case] added: &[i16],
        #[case] removed: &[i16],
        #[case] expected: &[(i16, bool)],
    ) {
        let mut query = Query::for_type(3);
        for field_id in added {
            query.add_field(*field_id);
        }
        for field_id in removed {
            query.remove_field(*field_id);
        }

        assert_eq!(query.has_permit_set(), !added.is_empty());
        for (field_id, returned) in expected {
            assert_eq!(query.return_field(*field_id), *returned, "field {field_id}");
        }
    }

    #[test]
    fn field_set_is_a_copy() {
        let mut query = Query::for_type(3);
        assert!(query.field_set().is_empty());

        query.add_field(257);
        query.add_field(256);
        let mut fields = query.field_set();
        assert_eq!(fields.iter().copied().collect::<Vec<_>>(), [256, 257]);

        fields.insert(999);
        assert!(!query.return_field(999));

        query.reset_permit_set();
        assert!(!query.has_permit_set());
        assert!(query.return_field(999));
    }

    struct Names;

    impl QueryDescriber for Names {
        fn describe_type(&self, type_id: i16) -> String {
            format!("base{type_id}")
        }

        fn describe_field(&self, target: &QueryTarget, field_id: i16) -> String {
            match target {
                QueryTarget::Type(type_id) => format!("base{type_id}.field{field_id}"),
                QueryTarget::Name(name) => format!("{name}.field{field_id}"),
            }
        }
    }

    #[test]
    fn describer() {
        let query = Query::for_type(3);
        assert_eq!(
            query.describe(Some(&Names)),
            "objectType = base3,editableOnly = True"
        );
        assert_eq!(query.describe_field(256, Some(&Names)), "base3.field256");
        assert_eq!(query.describe_field(256, None), "<256>");
        assert_eq!(
            Query::for_name("User").describe_field(1, Some(&Names)),
            "User.field1"
        );
    }

    #[test]
    fn query_tree() {
        let tree = QueryNode::and(
            uid_equals(1),
            QueryNode::not(QueryNode::or(
                uid_equals(2),
                QueryDataNode::label(Comparator::Defined, None),
            )),
        );

        assert_eq!(
            tree.to_string(),
            "(uid EQUALS 1) and (not ((uid EQUALS 2) or (<-1> DEFINED )))"
        );
        let leaves = tree.data_nodes();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[2].field(), &FieldSelector::Label);
    }

    #[test]
    fn query_serde() {
        let mut query = Query::for_type(3).with_root(QueryNode::not(uid_equals(7)));
        query.add_field(256);
        query.set_filtered(true);
        query.set_save_name(Some("locked users".into()));

        let json = serde_json::to_string(&query).unwrap();
        let received: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(received, query);
        assert!(received.is_filtered());
        assert_eq!(received.save_name(), Some("locked users"));
        assert!(!received.return_field(257));
    }
}
