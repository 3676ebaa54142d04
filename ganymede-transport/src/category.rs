// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema transport: the category tree and flat base lists.
//!
//! The server describes its object bases and the category tree they are sorted into by writing
//! them as escaped chunks into a [`CategoryTransport`] or [`BaseListTransport`]. The client decodes
//! the buffer into read-only [`CategoryDump`] and [`BaseDump`] values.
//!
//! A category is written as `cat|name|`, followed by `<|`, its children and `>|` if it has any
//! members, or just `>|` otherwise. A base is written as
//! `base|name|path|typeId|labelId|labelFieldName|canInactivate|canCreate|embedded|`.
use ganymede_auth::PermMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::{ChunkError, ChunkReader, ChunkWriter};

/// Nesting depth of categories at which decoding gives up.
pub const MAX_CATEGORY_DEPTH: usize = 128;

const CATEGORY_TAG: &str = "cat";
const BASE_TAG: &str = "base";
const OPEN: &str = "<";
const CLOSE: &str = ">";

/// Server-side object base which can be written into a transport.
pub trait BaseDefinition {
    fn name(&self) -> &str;

    /// Path of the base including its category, for example `/Admin/Users`.
    fn path(&self) -> String;

    /// Object type code.
    fn type_id(&self) -> i16;

    /// Id of the field used to label objects of this base.
    fn label_field(&self) -> i16;

    fn label_field_name(&self) -> &str;

    fn can_inactivate(&self) -> bool;

    fn is_embedded(&self) -> bool;
}

/// Member of a server-side category.
#[derive(Debug)]
pub enum CategoryMember<'a, C, B> {
    Category(&'a C),
    Base(&'a B),
}

/// Server-side category which can be written into a transport.
pub trait CategoryDefinition: Sized {
    type Base: BaseDefinition;

    fn name(&self) -> &str;

    /// Members in display order.
    fn members(&self) -> Vec<CategoryMember<'_, Self, Self::Base>>;
}

/// Decides which bases a client gets to see and what it may do with them.
pub trait TransportPolicy<B: BaseDefinition> {
    fn include_base(&self, base: &B) -> bool;

    fn can_create(&self, base: &B) -> bool;

    /// If false, every category is written even if none of its bases is included.
    fn is_filtering(&self) -> bool {
        true
    }
}

/// Writes everything and allows creating objects of every base.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPolicy;

impl<B: BaseDefinition> TransportPolicy<B> for NoPolicy {
    fn include_base(&self, _base: &B) -> bool {
        true
    }

    fn can_create(&self, _base: &B) -> bool {
        true
    }

    fn is_filtering(&self) -> bool {
        false
    }
}

/// Filters bases through the permission matrix of a session.
///
/// A base is included if its base entry is visible, or editable when `hide_non_editables` is set.
#[derive(Clone, Copy, Debug)]
pub struct MatrixPolicy<'a> {
    pub matrix: &'a PermMatrix,
    pub hide_non_editables: bool,
}

impl<'a> MatrixPolicy<'a> {
    pub fn new(matrix: &'a PermMatrix, hide_non_editables: bool) -> Self {
        Self {
            matrix,
            hide_non_editables,
        }
    }
}

impl<B: BaseDefinition> TransportPolicy<B> for MatrixPolicy<'_> {
    fn include_base(&self, base: &B) -> bool {
        match self.matrix.get_base_perm(base.type_id()) {
            Some(perm) if self.hide_non_editables => perm.is_editable(),
            Some(perm) => perm.is_visible(),
            None => false,
        }
    }

    fn can_create(&self, base: &B) -> bool {
        self.matrix
            .get_base_perm(base.type_id())
            .is_some_and(|perm| perm.is_creatable())
    }
}

fn write_base<B, P>(writer: &mut ChunkWriter, base: &B, policy: &P)
where
    B: BaseDefinition,
    P: TransportPolicy<B>,
{
    writer
        .add_chunk(BASE_TAG)
        .add_chunk(base.name())
        .add_chunk(&base.path())
        .add_raw_chunk(&base.type_id().to_string())
        .add_raw_chunk(&base.label_field().to_string())
        .add_chunk(base.label_field_name())
        .add_raw_chunk(bool_chunk(base.can_inactivate()))
        .add_raw_chunk(bool_chunk(policy.can_create(base)))
        .add_raw_chunk(bool_chunk(base.is_embedded()));
}

fn write_category<C, P>(writer: &mut ChunkWriter, category: &C, policy: &P)
where
    C: CategoryDefinition,
    P: TransportPolicy<C::Base>,
{
    writer.add_chunk(CATEGORY_TAG).add_chunk(category.name());

    let members = category.members();
    if !members.is_empty() {
        writer.add_chunk(OPEN);

        for member in members {
            match member {
                CategoryMember::Base(base) => {
                    if policy.include_base(base) {
                        write_base(writer, base, policy);
                    }
                }
                CategoryMember::Category(sub_category) => {
                    if !policy.is_filtering() || contains_included_base(sub_category, policy) {
                        write_category(writer, sub_category, policy);
                    }
                }
            }
        }
    }

    writer.add_chunk(CLOSE);
}

fn contains_included_base<C, P>(category: &C, policy: &P) -> bool
where
    C: CategoryDefinition,
    P: TransportPolicy<C::Base>,
{
    category.members().into_iter().any(|member| match member {
        CategoryMember::Base(base) => policy.include_base(base),
        CategoryMember::Category(sub_category) => contains_included_base(sub_category, policy),
    })
}

fn bool_chunk(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Encoded category tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTransport {
    buffer: String,
}

impl CategoryTransport {
    /// Encodes the tree below `root`, filtered through `policy`.
    pub fn new<C, P>(root: &C, policy: &P) -> Self
    where
        C: CategoryDefinition,
        P: TransportPolicy<C::Base>,
    {
        let mut transport = Self::default();
        transport.add_category(root, policy);
        transport
    }

    /// Appends a category and everything `policy` lets through below it.
    pub fn add_category<C, P>(&mut self, category: &C, policy: &P)
    where
        C: CategoryDefinition,
        P: TransportPolicy<C::Base>,
    {
        let mut writer = ChunkWriter::from_buffer(std::mem::take(&mut self.buffer));
        write_category(&mut writer, category, policy);
        self.buffer = writer.into_string();
    }

    /// Appends a single base record.
    pub fn add_base<B, P>(&mut self, base: &B, policy: &P)
    where
        B: BaseDefinition,
        P: TransportPolicy<B>,
    {
        let mut writer = ChunkWriter::from_buffer(std::mem::take(&mut self.buffer));
        write_base(&mut writer, base, policy);
        self.buffer = writer.into_string();
    }

    /// Transport around an already encoded buffer.
    pub fn from_buffer(buffer: String) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Decodes the category tree.
    pub fn tree(&self) -> Result<CategoryDump, ChunkError> {
        let mut reader = ChunkReader::new(&self.buffer);
        let root = CategoryDump::read(&mut reader)?;
        debug!(
            category = root.name(),
            bytes = self.buffer.len(),
            "decoded category tree"
        );
        Ok(root)
    }
}

/// Encoded flat list of bases.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseListTransport {
    buffer: String,
}

impl BaseListTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes every base `policy` includes.
    pub fn from_bases<'a, B, P>(bases: impl IntoIterator<Item = &'a B>, policy: &P) -> Self
    where
        B: BaseDefinition + 'a,
        P: TransportPolicy<B>,
    {
        let mut transport = Self::new();
        for base in bases {
            if policy.include_base(base) {
                transport.add_base(base, policy);
            }
        }
        transport
    }

    pub fn from_buffer(buffer: String) -> Self {
        Self { buffer }
    }

    /// Appends a base, asking `policy` only whether objects of it may be created.
    pub fn add_base<B, P>(&mut self, base: &B, policy: &P)
    where
        B: BaseDefinition,
        P: TransportPolicy<B>,
    {
        let mut writer = ChunkWriter::from_buffer(std::mem::take(&mut self.buffer));
        write_base(&mut writer, base, policy);
        self.buffer = writer.into_string();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Decodes all bases in transport order.
    pub fn bases(&self) -> Result<Vec<BaseDump>, ChunkError> {
        let mut reader = ChunkReader::new(&self.buffer);
        let mut bases = Vec::new();

        while !reader.is_exhausted() {
            reader.expect(BASE_TAG)?;
            bases.push(BaseDump::read(&mut reader, None)?);
        }

        debug!(bases = bases.len(), "decoded base list");
        Ok(bases)
    }
}

/// Client-side, read-only description of an object base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseDump {
    name: String,
    path: String,
    type_id: i16,
    label_field: i16,
    label_field_name: String,
    can_inactivate: bool,
    can_create: bool,
    embedded: bool,
    category: Option<String>,
}

impl BaseDump {
    /// Reads the fields following a `base` tag.
    ///
    /// Decoding is stricter than older writers expect: ids must be plain integers and flags must
    /// read `true` or `false`, anything else fails with [`ChunkError::InvalidNumber`] or
    /// [`ChunkError::InvalidBool`].
    pub fn read(reader: &mut ChunkReader<'_>, category: Option<&str>) -> Result<Self, ChunkError> {
        Ok(Self {
            name: reader.next_chunk()?,
            path: reader.next_chunk()?,
            type_id: reader.next_i16()?,
            label_field: reader.next_i16()?,
            label_field_name: reader.next_chunk()?,
            can_inactivate: reader.next_bool()?,
            can_create: reader.next_bool()?,
            embedded: reader.next_bool()?,
            category: category.map(str::to_string),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the base as written by the server.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn type_id(&self) -> i16 {
        self.type_id
    }

    pub fn label_field(&self) -> i16 {
        self.label_field
    }

    pub fn label_field_name(&self) -> &str {
        &self.label_field_name
    }

    pub fn can_inactivate(&self) -> bool {
        self.can_inactivate
    }

    /// Whether the session which requested the transport may create objects of this base.
    pub fn can_create(&self) -> bool {
        self.can_create
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Path of the category holding this base, `None` for bases from a flat list.
    pub fn category_path(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Node of a decoded category tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryNode {
    Category(CategoryDump),
    Base(BaseDump),
}

impl CategoryNode {
    pub fn name(&self) -> &str {
        match self {
            CategoryNode::Category(category) => category.name(),
            CategoryNode::Base(base) => base.name(),
        }
    }
}

/// Client-side, read-only category tree.
///
/// Instead of pointing at its parent every category knows its own path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryDump {
    name: String,
    path: String,
    parent: Option<String>,
    nodes: Vec<CategoryNode>,
}

impl CategoryDump {
    /// Reads a root category, starting at its `cat` tag.
    pub fn read(reader: &mut ChunkReader<'_>) -> Result<Self, ChunkError> {
        reader.expect(CATEGORY_TAG)?;
        Self::read_body(reader, None, 0)
    }

    fn read_body(
        reader: &mut ChunkReader<'_>,
        parent: Option<&str>,
        depth: usize,
    ) -> Result<Self, ChunkError> {
        if depth >= MAX_CATEGORY_DEPTH {
            return Err(ChunkError::RecursionLimitExceeded);
        }

        let name = reader.next_chunk()?;
        let path = format!("{}/{}", parent.unwrap_or(""), name);
        let mut nodes = Vec::new();

        let mut token = reader.next_chunk()?;
        if token == OPEN {
            token = reader.next_chunk()?;
            while token != CLOSE {
                match token.as_str() {
                    CATEGORY_TAG => nodes.push(CategoryNode::Category(Self::read_body(
                        reader,
                        Some(&path),
                        depth + 1,
                    )?)),
                    BASE_TAG => {
                        nodes.push(CategoryNode::Base(BaseDump::read(reader, Some(&path))?))
                    }
                    _ => {
                        return Err(ChunkError::UnexpectedToken {
                            expected: "cat, base or >".into(),
                            found: token,
                        });
                    }
                }
                token = reader.next_chunk()?;
            }
        }

        if token != CLOSE {
            return Err(ChunkError::UnexpectedToken {
                expected: CLOSE.into(),
                found: token,
            });
        }

        Ok(Self {
            name,
            path,
            parent: parent.map(str::to_string),
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path from the root, for example `/Admin/Users`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of the enclosing category, `None` for the root.
    pub fn parent_path(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Direct members in transport order.
    pub fn nodes(&self) -> &[CategoryNode] {
        &self.nodes
    }

    /// Direct member with the given name.
    pub fn node(&self, name: &str) -> Option<&CategoryNode> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    /// All bases in this category and its sub-categories, depth first in transport order.
    pub fn bases(&self) -> Vec<&BaseDump> {
        let mut bases = Vec::new();
        self.collect_bases(&mut bases);
        bases
    }

    fn collect_bases<'a>(&'a self, bases: &mut Vec<&'a BaseDump>) {
        for node in &self.nodes {
            match node {
                CategoryNode::Base(base) => bases.push(base),
                CategoryNode::Category(category) => category.collect_bases(bases),
            }
        }
    }

    /// Returns true if this category is `other` or lies somewhere below it.
    pub fn is_under(&self, other: &CategoryDump) -> bool {
        self.path == other.path
            || self
                .path
                .strip_prefix(other.path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ganymede_auth::{PermEntry, PermMatrix};

    use crate::chunk::{ChunkError, ChunkReader};

    use super::{
        BaseDefinition, BaseListTransport, CategoryDefinition, CategoryDump, CategoryMember,
        CategoryNode, CategoryTransport, MatrixPolicy, NoPolicy,
    };

    struct TestBase {
        name: String,
        path: String,
        type_id: i16,
        embedded: bool,
    }

    impl TestBase {
        fn new(category: &str, name: &str, type_id: i16) -> Self {
            Self {
                name: name.to_string(),
                path: format!("{category}/{name}"),
                type_id,
                embedded: false,
            }
        }
    }

    impl BaseDefinition for TestBase {
        fn name(&self) -> &str {
            &self.name
        }

        fn path(&self) -> String {
            self.path.clone()
        }

        fn type_id(&self) -> i16 {
            self.type_id
        }

        fn label_field(&self) -> i16 {
            100
        }

        fn label_field_name(&self) -> &str {
            "Name|Label"
        }

        fn can_inactivate(&self) -> bool {
            self.type_id % 2 == 0
        }

        fn is_embedded(&self) -> bool {
            self.embedded
        }
    }

    enum Member {
        Category(TestCategory),
        Base(TestBase),
    }

    struct TestCategory {
        name: String,
        members: Vec<Member>,
    }

    impl CategoryDefinition for TestCategory {
        type Base = TestBase;

        fn name(&self) -> &str {
            &self.name
        }

        fn members(&self) -> Vec<CategoryMember<'_, Self, TestBase>> {
            self.members
                .iter()
                .map(|member| match member {
                    Member::Category(category) => CategoryMember::Category(category),
                    Member::Base(base) => CategoryMember::Base(base),
                })
                .collect()
        }
    }

    /// Admin
    ///  - Users (1)
    ///  - Network
    ///     - Systems (2)
    ///     - DNS
    ///        - Zones (3)
    ///  - Empty
    fn schema() -> TestCategory {
        TestCategory {
            name: "Admin".into(),
            members: vec![
                Member::Base(TestBase::new("/Admin", "Users", 1)),
                Member::Category(TestCategory {
                    name: "Network".into(),
                    members: vec![
                        Member::Base(TestBase::new("/Admin/Network", "Systems", 2)),
                        Member::Category(TestCategory {
                            name: "DNS".into(),
                            members: vec![Member::Base(TestBase::new(
                                "/Admin/Network/DNS",
                                "Zones",
                                3,
                            ))],
                        }),
                    ],
                }),
                Member::Category(TestCategory {
                    name: "Empty".into(),
                    members: vec![],
                }),
            ],
        }
    }

    #[test]
    fn encodes_category_grammar() {
        let leaf = TestCategory {
            name: "Leaf".into(),
            members: vec![],
        };
        assert_eq!(
            CategoryTransport::new(&leaf, &NoPolicy).buffer(),
            "cat|Leaf|>|"
        );

        let single = TestCategory {
            name: "Top".into(),
            members: vec![Member::Base(TestBase::new("/Top", "Users", 4))],
        };
        assert_eq!(
            CategoryTransport::new(&single, &NoPolicy).buffer(),
            "cat|Top|<|base|Users|/Top/Users|4|100|Name\\|Label|true|true|false|>|"
        );
    }

    #[test]
    fn decodes_tree() {
        let transport = CategoryTransport::new(&schema(), &NoPolicy);
        let root = transport.tree().unwrap();

        assert_eq!(root.name(), "Admin");
        assert_eq!(root.path(), "/Admin");
        assert_eq!(root.parent_path(), None);
        assert_eq!(root.nodes().len(), 3);

        let names: Vec<&str> = root.bases().iter().map(|base| base.name()).collect();
        assert_eq!(names, ["Users", "Systems", "Zones"]);

        let Some(CategoryNode::Category(network)) = root.node("Network") else {
            panic!("expected network category");
        };
        assert_eq!(network.path(), "/Admin/Network");
        assert_eq!(network.parent_path(), Some("/Admin"));

        let Some(CategoryNode::Category(dns)) = network.node("DNS") else {
            panic!("expected dns category");
        };
        assert!(dns.is_under(&root));
        assert!(dns.is_under(network));
        assert!(dns.is_under(dns));
        assert!(!network.is_under(dns));

        let zones = dns.bases()[0];
        assert_eq!(zones.type_id(), 3);
        assert_eq!(zones.path(), "/Admin/Network/DNS/Zones");
        assert_eq!(zones.category_path(), Some("/Admin/Network/DNS"));
        assert_eq!(zones.label_field(), 100);
        assert_eq!(zones.label_field_name(), "Name|Label");
        assert!(!zones.can_inactivate());
        assert!(zones.can_create());
        assert!(!zones.is_embedded());

        let Some(CategoryNode::Category(empty)) = root.node("Empty") else {
            panic!("expected empty category");
        };
        assert!(empty.nodes().is_empty());
        assert!(root.node("Missing").is_none());
    }

    #[test]
    fn sibling_paths_are_not_nested() {
        let transport = CategoryTransport::from_buffer("cat|A|<|cat|B|>|cat|BC|>|>|".into());
        let root = transport.tree().unwrap();

        let Some(CategoryNode::Category(b)) = root.node("B") else {
            panic!("expected category");
        };
        let Some(CategoryNode::Category(bc)) = root.node("BC") else {
            panic!("expected category");
        };
        assert!(!bc.is_under(b));
    }

    #[test]
    fn filters_through_permissions() {
        let mut matrix = PermMatrix::new();
        matrix.set_base_perm(1, PermEntry::full_perms());
        matrix.set_base_perm(3, PermEntry::view_perms());

        let root = CategoryTransport::new(&schema(), &MatrixPolicy::new(&matrix, false))
            .tree()
            .unwrap();

        let names: Vec<&str> = root.bases().iter().map(|base| base.name()).collect();
        assert_eq!(names, ["Users", "Zones"]);
        assert!(root.bases()[0].can_create());
        assert!(!root.bases()[1].can_create());

        // Network only survives because DNS holds a visible base, Empty holds none.
        assert!(root.node("Network").is_some());
        assert!(root.node("Empty").is_none());

        let editable = CategoryTransport::new(&schema(), &MatrixPolicy::new(&matrix, true))
            .tree()
            .unwrap();
        assert_eq!(editable.bases().len(), 1);
        assert!(editable.node("Network").is_none());
    }

    #[test]
    fn base_list() {
        let bases = [
            TestBase::new("/A", "One", 1),
            TestBase {
                embedded: true,
                ..TestBase::new("/A", "Two", 2)
            },
        ];

        let transport = BaseListTransport::from_bases(&bases, &NoPolicy);
        let decoded = transport.bases().unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name(), "One");
        assert_eq!(decoded[0].category_path(), None);
        assert!(decoded[1].is_embedded());
        assert!(decoded[1].can_inactivate());

        assert!(BaseListTransport::new().bases().unwrap().is_empty());
    }

    #[test]
    fn malformed_trees() {
        assert_matches!(
            CategoryTransport::from_buffer("base|x|".into()).tree(),
            Err(ChunkError::UnexpectedToken { .. })
        );
        assert_matches!(
            CategoryTransport::from_buffer("cat|A|<|thing|>|".into()).tree(),
            Err(ChunkError::UnexpectedToken { found, .. }) if found == "thing"
        );
        assert_matches!(
            CategoryTransport::from_buffer("cat|A|<|cat|B|>|".into()).tree(),
            Err(ChunkError::UnexpectedEnd { .. })
        );
        assert_matches!(
            CategoryTransport::from_buffer("cat|A|x|".into()).tree(),
            Err(ChunkError::UnexpectedToken { expected, .. }) if expected == ">"
        );
        assert_matches!(
            CategoryTransport::from_buffer("cat|A|<|base|B|/A/B|x|0|n|true|true|false|>|".into())
                .tree(),
            Err(ChunkError::InvalidNumber(_))
        );
        assert_matches!(
            BaseListTransport::from_buffer("base|B|/B|1|0|n|maybe|true|false|".into()).bases(),
            Err(ChunkError::InvalidBool(_))
        );
    }

    #[test]
    fn recursion_limit() {
        let depth = 200;
        let buffer = format!("{}{}", "cat|deep|<|".repeat(depth), ">|".repeat(depth));
        assert_matches!(
            CategoryTransport::from_buffer(buffer).tree(),
            Err(ChunkError::RecursionLimitExceeded)
        );

        let depth = 10;
        let buffer = format!("{}{}", "cat|deep|<|".repeat(depth), ">|".repeat(depth));
        let root = CategoryTransport::from_buffer(buffer).tree().unwrap();
        assert_eq!(root.path(), "/deep");
    }

    #[test]
    fn incremental_writes() {
        let mut transport = CategoryTransport::default();
        transport.add_category(
            &TestCategory {
                name: "Root".into(),
                members: vec![],
            },
            &NoPolicy,
        );
        transport.add_base(&TestBase::new("/Root", "Loose", 6), &NoPolicy);
        assert_eq!(
            transport.buffer(),
            "cat|Root|>|base|Loose|/Root/Loose|6|100|Name\\|Label|true|true|false|"
        );
        assert_eq!(transport.tree().unwrap().name(), "Root");
    }

    #[test]
    fn sub_structures_decode_in_isolation() {
        let mut reader = ChunkReader::new("cat|Solo|>|trailing|");
        let category = CategoryDump::read(&mut reader).unwrap();
        assert_eq!(category.name(), "Solo");
        assert_eq!(reader.next_chunk().unwrap(), "trailing");
    }

    #[test]
    fn serde_carries_buffer_only() {
        let transport = CategoryTransport::new(&schema(), &NoPolicy);
        let json = serde_json::to_string(&transport).unwrap();
        let received: CategoryTransport = serde_json::from_str(&json).unwrap();
        assert_eq!(received.tree().unwrap(), transport.tree().unwrap());
    }
}
