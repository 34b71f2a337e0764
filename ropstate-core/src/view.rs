//! The ordered row view a cursor walks.
//!
//! A view is rebuilt from the table contents whenever the restriction, sort
//! or collapse state changes:
//!
//! ```text
//! rows --restrict--> matching --sort--> ordered --group--> nodes --collapse--> visible
//! ```
//!
//! Categorized views interleave header rows with leaf rows. A header at
//! depth `d` groups every following node deeper than `d`; collapsing it
//! hides them.

use crate::bookmark::RowKey;
use crate::error::TableError;
use crate::filter;
use crate::table::Row;
use ropstate_codec::property::tags;
use ropstate_codec::{
    FlaggedValue, PropertyRow, PropertyTag, PropertyType, PropertyValue, ResultCode, Restriction,
    SortDirection, SortOrder, WireWriter,
};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

pub const ROW_TYPE_LEAF: i32 = 1;
pub const ROW_TYPE_EXPANDED_HEADER: i32 = 3;
pub const ROW_TYPE_COLLAPSED_HEADER: i32 = 4;

const CATEGORY_ID_FLAG: u64 = 0x8000_0000_0000_0000;

/// Sort order with categorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub sort_orders: Vec<SortOrder>,
    pub categorized_count: u16,
    pub expanded_count: u16,
}

impl SortSpec {
    pub fn new(sort_orders: Vec<SortOrder>, categorized_count: u16, expanded_count: u16) -> Self {
        Self {
            sort_orders,
            categorized_count,
            expanded_count,
        }
    }

    pub fn is_categorized(&self) -> bool {
        self.categorized_count > 0
    }

    pub fn validate(&self) -> Result<(), TableError> {
        let categorized = self.categorized_count as usize;
        if categorized > self.sort_orders.len() {
            return Err(TableError::invalid_parameter(format!(
                "CategorizedCount {} exceeds {} sort orders",
                categorized,
                self.sort_orders.len()
            )));
        }
        if self.expanded_count > self.categorized_count {
            return Err(TableError::invalid_parameter(format!(
                "ExpandedCount {} exceeds CategorizedCount {}",
                self.expanded_count, self.categorized_count
            )));
        }
        let mut seen = HashSet::new();
        for (index, order) in self.sort_orders.iter().enumerate() {
            match order.tag.prop_type {
                PropertyType::Unspecified | PropertyType::ErrorCode | PropertyType::Unknown(_) => {
                    return Err(TableError::invalid_parameter(format!(
                        "sort tag {:#010x} has no sortable type",
                        order.tag.as_u32()
                    )));
                }
                _ => {}
            }
            if !seen.insert(order.tag.id) {
                return Err(TableError::invalid_parameter(format!(
                    "property {:#06x} appears twice in the sort order",
                    order.tag.id
                )));
            }
            if order.direction == SortDirection::MaximumCategory
                && (categorized == 0 || index != categorized)
            {
                return Err(TableError::invalid_parameter(
                    "MaximumCategory must directly follow the last category column",
                ));
            }
        }
        Ok(())
    }

    fn maximum_category(&self) -> Option<PropertyTag> {
        self.sort_orders
            .get(self.categorized_count as usize)
            .filter(|o| self.is_categorized() && o.direction == SortDirection::MaximumCategory)
            .map(|o| o.tag)
    }
}

/// A category header row.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub id: u64,
    pub depth: u16,
    /// Category values from the outermost level down to this one.
    pub path: Vec<(PropertyTag, Option<PropertyValue>)>,
    pub leaf_count: u32,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Header(Header),
    /// Index into the view's ordered rows.
    Leaf(usize),
}

/// Tree form used while grouping.
struct Group {
    header: Header,
    children: Vec<Group>,
    leaves: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct View {
    rows: Vec<Row>,
    nodes: Vec<Node>,
    visible: Vec<usize>,
    leaf_depth: u16,
}

/// Sort position of a value's class. Values of different classes never
/// compare equal.
fn sort_class(value: &PropertyValue) -> u8 {
    match value {
        PropertyValue::Integer16(_)
        | PropertyValue::Integer32(_)
        | PropertyValue::Integer64(_)
        | PropertyValue::Floating64(_) => 0,
        PropertyValue::Boolean(_) => 1,
        PropertyValue::Time(_) => 2,
        PropertyValue::ErrorCode(_) => 3,
        PropertyValue::Guid(_) => 4,
        PropertyValue::Binary(_) => 5,
        PropertyValue::ServerId(_) => 6,
        PropertyValue::String8(_) | PropertyValue::Unicode(_) => 7,
    }
}

/// Numbers order by their `f64` image under `total_cmp`, with an integer
/// after a float of the same image and integers by exact value.
fn numeric_key(value: &PropertyValue) -> (f64, Option<i64>) {
    match value {
        PropertyValue::Integer16(v) => (*v as f64, Some(*v as i64)),
        PropertyValue::Integer32(v) => (*v as f64, Some(*v as i64)),
        PropertyValue::Integer64(v) => (*v as f64, Some(*v)),
        PropertyValue::Floating64(v) => (*v, None),
        _ => (0.0, None),
    }
}

/// Total order over optional sort values. Missing values come first.
fn sort_key_cmp(a: Option<&PropertyValue>, b: Option<&PropertyValue>) -> Ordering {
    let (x, y) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(x), Some(y)) => (x, y),
    };
    sort_class(x).cmp(&sort_class(y)).then_with(|| match (x, y) {
        (PropertyValue::Boolean(x), PropertyValue::Boolean(y)) => x.cmp(y),
        (PropertyValue::Time(x), PropertyValue::Time(y)) => x.cmp(y),
        (PropertyValue::ErrorCode(x), PropertyValue::ErrorCode(y)) => x.cmp(y),
        (PropertyValue::Guid(x), PropertyValue::Guid(y)) => x.cmp(y),
        (PropertyValue::Binary(x), PropertyValue::Binary(y))
        | (PropertyValue::ServerId(x), PropertyValue::ServerId(y)) => x.cmp(y),
        _ => match (x.as_str(), y.as_str()) {
            (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            _ => {
                let (xf, xi) = numeric_key(x);
                let (yf, yi) = numeric_key(y);
                xf.total_cmp(&yf).then(xi.cmp(&yi))
            }
        },
    })
}

fn value_key(value: Option<&PropertyValue>) -> Vec<u8> {
    match value {
        None => vec![0],
        Some(v) => match v.as_str() {
            Some(s) => {
                let mut key = vec![2];
                key.extend_from_slice(s.to_lowercase().as_bytes());
                key
            }
            None => {
                let mut w = WireWriter::new();
                w.put_u8(1);
                w.put_u16(v.prop_type().as_u16());
                // Only string values can fail to encode.
                let _ = v.encode_value(&mut w);
                w.as_slice().to_vec()
            }
        },
    }
}

impl View {
    /// Builds the view. `overrides` holds explicit expand (true) or collapse
    /// (false) states by category id.
    pub fn build(
        rows: &[Row],
        restriction: Option<&Restriction>,
        sort: Option<&SortSpec>,
        overrides: &HashMap<u64, bool>,
    ) -> Self {
        let mut matching: Vec<Row> = rows
            .iter()
            .filter(|r| restriction.map_or(true, |res| filter::matches(res, r)))
            .cloned()
            .collect();

        let sort = match sort {
            Some(sort) => sort,
            None => {
                let nodes: Vec<Node> = (0..matching.len()).map(Node::Leaf).collect();
                let visible = (0..nodes.len()).collect();
                return Self {
                    rows: matching,
                    nodes,
                    visible,
                    leaf_depth: 0,
                };
            }
        };

        let maximum = sort.maximum_category();
        matching.sort_by(|a, b| {
            for order in &sort.sort_orders {
                let ord = sort_key_cmp(a.value(order.tag), b.value(order.tag));
                let ord = match order.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending | SortDirection::MaximumCategory => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.id.cmp(&b.id)
        });

        let mut builder = GroupBuilder {
            rows: &matching,
            sort,
            maximum,
            overrides,
            used_ids: HashSet::new(),
        };
        let indices: Vec<usize> = (0..matching.len()).collect();
        let groups = builder.group(&indices, 0, 0, &[]);

        let mut nodes = Vec::new();
        if sort.is_categorized() {
            flatten(groups, &mut nodes);
        } else {
            nodes.extend(indices.into_iter().map(Node::Leaf));
        }

        let leaf_depth = sort.categorized_count;
        let mut view = Self {
            rows: matching,
            nodes,
            visible: Vec::new(),
            leaf_depth,
        };
        view.visible = view.compute_visible();
        view
    }

    fn node_depth(&self, node: &Node) -> u16 {
        match node {
            Node::Header(h) => h.depth,
            Node::Leaf(_) => self.leaf_depth,
        }
    }

    fn compute_visible(&self) -> Vec<usize> {
        let mut visible = Vec::with_capacity(self.nodes.len());
        let mut hidden_below: Option<u16> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            let depth = self.node_depth(node);
            if let Some(limit) = hidden_below {
                if depth > limit {
                    continue;
                }
                hidden_below = None;
            }
            visible.push(index);
            if let Node::Header(h) = node {
                if !h.expanded {
                    hidden_below = Some(h.depth);
                }
            }
        }
        visible
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn node_at(&self, position: usize) -> Option<&Node> {
        self.visible.get(position).map(|i| &self.nodes[*i])
    }

    /// The underlying row when `position` is a leaf.
    pub fn leaf_at(&self, position: usize) -> Option<&Row> {
        match self.node_at(position)? {
            Node::Leaf(row) => self.rows.get(*row),
            Node::Header(_) => None,
        }
    }

    pub fn key_at(&self, position: usize) -> Option<RowKey> {
        self.node_at(position).map(|node| self.key_of(node))
    }

    fn key_of(&self, node: &Node) -> RowKey {
        match node {
            Node::Header(h) => RowKey::Category(h.id),
            Node::Leaf(row) => RowKey::Leaf(self.rows[*row].id),
        }
    }

    pub fn position_of(&self, key: RowKey) -> Option<usize> {
        self.visible
            .iter()
            .position(|i| self.key_of(&self.nodes[*i]) == key)
    }

    /// Whether `key` names a row anywhere in the view, visible or not.
    pub fn contains(&self, key: RowKey) -> bool {
        self.nodes.iter().any(|n| self.key_of(n) == key)
    }

    /// Resolves an instance id to a row key: category headers first, then
    /// leaf rows.
    pub fn key_for_inst_id(&self, inst_id: u64) -> Option<RowKey> {
        [RowKey::Category(inst_id), RowKey::Leaf(inst_id)]
            .into_iter()
            .find(|key| self.contains(*key))
    }

    pub fn header(&self, category_id: u64) -> Option<&Header> {
        self.nodes.iter().find_map(|n| match n {
            Node::Header(h) if h.id == category_id => Some(h),
            _ => None,
        })
    }

    pub fn headers(&self) -> impl Iterator<Item = &Header> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Header(h) => Some(h),
            Node::Leaf(_) => None,
        })
    }

    /// Projects the row at `position` onto a column set.
    pub fn project(&self, position: usize, columns: &[PropertyTag]) -> Option<PropertyRow> {
        let node = self.node_at(position)?;
        let not_found = FlaggedValue::Error(ResultCode::NotFound.as_u32());
        let slots = columns
            .iter()
            .map(|column| {
                let value = match node {
                    Node::Header(h) => header_value(h, *column),
                    Node::Leaf(row) => self.leaf_value(&self.rows[*row], *column),
                };
                value.map_or_else(|| not_found.clone(), FlaggedValue::Present)
            })
            .collect();
        Some(PropertyRow::from_slots(slots))
    }

    pub fn project_range(
        &self,
        positions: impl Iterator<Item = usize>,
        columns: &[PropertyTag],
    ) -> Vec<PropertyRow> {
        positions
            .filter_map(|p| self.project(p, columns))
            .collect()
    }

    fn leaf_value(&self, row: &Row, column: PropertyTag) -> Option<PropertyValue> {
        if let Some(v) = row.value(column) {
            return Some(v.clone());
        }
        if column == tags::ROW_TYPE {
            Some(PropertyValue::Integer32(ROW_TYPE_LEAF))
        } else if column == tags::DEPTH {
            Some(PropertyValue::Integer32(self.leaf_depth as i32))
        } else if column == tags::INST_ID {
            Some(PropertyValue::Integer64(row.id as i64))
        } else if column == tags::INSTANCE_NUM {
            Some(PropertyValue::Integer32(0))
        } else {
            None
        }
    }
}

fn header_value(header: &Header, column: PropertyTag) -> Option<PropertyValue> {
    if column == tags::INST_ID {
        return Some(PropertyValue::Integer64(header.id as i64));
    }
    if column == tags::ROW_TYPE {
        let row_type = if header.expanded {
            ROW_TYPE_EXPANDED_HEADER
        } else {
            ROW_TYPE_COLLAPSED_HEADER
        };
        return Some(PropertyValue::Integer32(row_type));
    }
    if column == tags::DEPTH {
        return Some(PropertyValue::Integer32(header.depth as i32));
    }
    if column == tags::CONTENT_COUNT {
        return Some(PropertyValue::Integer32(header.leaf_count as i32));
    }
    if column == tags::INSTANCE_NUM {
        return Some(PropertyValue::Integer32(0));
    }
    header
        .path
        .iter()
        .find(|(tag, _)| tag.same_property(column))
        .and_then(|(_, value)| value.clone())
        .filter(|v| {
            column.prop_type == PropertyType::Unspecified || v.prop_type() == column.prop_type
        })
}

struct GroupBuilder<'a> {
    rows: &'a [Row],
    sort: &'a SortSpec,
    maximum: Option<PropertyTag>,
    overrides: &'a HashMap<u64, bool>,
    used_ids: HashSet<u64>,
}

impl GroupBuilder<'_> {
    fn category_id(&mut self, parent: u64, level: u16, value: Option<&PropertyValue>) -> u64 {
        let mut seed = parent.to_le_bytes().to_vec();
        seed.extend_from_slice(&level.to_le_bytes());
        seed.extend_from_slice(&value_key(value));
        let mut low = crc32c::crc32c(&seed);
        let high = CATEGORY_ID_FLAG | ((level as u64) << 32);
        while !self.used_ids.insert(high | low as u64) {
            low = low.wrapping_add(1);
        }
        high | low as u64
    }

    fn group(
        &mut self,
        indices: &[usize],
        level: u16,
        parent: u64,
        path: &[(PropertyTag, Option<PropertyValue>)],
    ) -> Vec<Group> {
        if level >= self.sort.categorized_count {
            return Vec::new();
        }
        let tag = self.sort.sort_orders[level as usize].tag;

        let mut runs: Vec<Vec<usize>> = Vec::new();
        for &index in indices {
            let value = self.rows[index].value(tag);
            match runs.last_mut() {
                Some(run)
                    if sort_key_cmp(self.rows[run[0]].value(tag), value) == Ordering::Equal =>
                {
                    run.push(index)
                }
                _ => runs.push(vec![index]),
            }
        }

        let mut groups = Vec::with_capacity(runs.len());
        for run in runs {
            let value = self.rows[run[0]].value(tag).cloned();
            let id = self.category_id(parent, level, value.as_ref());
            let mut header_path = path.to_vec();
            header_path.push((tag, value));
            let expanded = self
                .overrides
                .get(&id)
                .copied()
                .unwrap_or(level < self.sort.expanded_count);
            let last_level = level + 1 == self.sort.categorized_count;
            let children = self.group(&run, level + 1, id, &header_path);
            groups.push(Group {
                header: Header {
                    id,
                    depth: level,
                    path: header_path,
                    leaf_count: run.len() as u32,
                    expanded,
                },
                children,
                leaves: if last_level { run } else { Vec::new() },
            });
        }

        if let Some(max_tag) = self.maximum {
            if level + 1 == self.sort.categorized_count {
                let rows = self.rows;
                let max_of = |g: &Group| {
                    g.leaves
                        .iter()
                        .filter_map(|i| rows[*i].value(max_tag))
                        .max_by(|a, b| sort_key_cmp(Some(*a), Some(*b)))
                        .cloned()
                };
                let mut keyed: Vec<(Option<PropertyValue>, Group)> =
                    groups.into_iter().map(|g| (max_of(&g), g)).collect();
                keyed.sort_by(|(a, _), (b, _)| sort_key_cmp(a.as_ref(), b.as_ref()).reverse());
                groups = keyed.into_iter().map(|(_, g)| g).collect();
            }
        }
        groups
    }
}

fn flatten(groups: Vec<Group>, out: &mut Vec<Node>) {
    for group in groups {
        out.push(Node::Header(group.header));
        flatten(group.children, out);
        out.extend(group.leaves.into_iter().map(Node::Leaf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ropstate_codec::{RelOp, TaggedPropertyValue};

    const SENDER: PropertyTag = PropertyTag::new(0x0C1A, PropertyType::Unicode);

    fn rows() -> Vec<Row> {
        let mk = |id: u64, sender: &str, size: i32| {
            Row::new(id)
                .with(SENDER, PropertyValue::Unicode(sender.into()))
                .with(tags::MESSAGE_SIZE, PropertyValue::Integer32(size))
        };
        vec![
            mk(1, "carol", 30),
            mk(2, "alice", 10),
            mk(3, "bob", 50),
            mk(4, "alice", 40),
            mk(5, "carol", 20),
        ]
    }

    fn by_sender(categorized: u16, expanded: u16) -> SortSpec {
        SortSpec::new(
            vec![
                SortOrder::new(SENDER, SortDirection::Ascending),
                SortOrder::new(tags::MESSAGE_SIZE, SortDirection::Ascending),
            ],
            categorized,
            expanded,
        )
    }

    fn leaf_ids(view: &View) -> Vec<Option<u64>> {
        (0..view.len())
            .map(|p| view.leaf_at(p).map(|r| r.id))
            .collect()
    }

    #[test]
    fn test_unsorted_view_keeps_order() {
        let view = View::build(&rows(), None, None, &HashMap::new());
        assert_eq!(view.len(), 5);
        assert_eq!(view.leaf_at(0).unwrap().id, 1);
        assert_eq!(view.key_at(4), Some(RowKey::Leaf(5)));
        assert_eq!(view.key_at(5), None);
    }

    #[test]
    fn test_restriction_filters_rows() {
        let big = Restriction::Property {
            relop: RelOp::GreaterThanOrEqual,
            tag: tags::MESSAGE_SIZE,
            value: TaggedPropertyValue::new(tags::MESSAGE_SIZE, PropertyValue::Integer32(30)),
        };
        let view = View::build(&rows(), Some(&big), None, &HashMap::new());
        assert_eq!(leaf_ids(&view), vec![Some(1), Some(3), Some(4)]);
    }

    #[test]
    fn test_multi_column_sort() {
        let spec = SortSpec::new(
            vec![
                SortOrder::new(SENDER, SortDirection::Ascending),
                SortOrder::new(tags::MESSAGE_SIZE, SortDirection::Descending),
            ],
            0,
            0,
        );
        let view = View::build(&rows(), None, Some(&spec), &HashMap::new());
        assert_eq!(
            leaf_ids(&view),
            vec![Some(4), Some(2), Some(3), Some(1), Some(5)]
        );
    }

    #[test]
    fn test_missing_values_sort_first() {
        let mut data = rows();
        data.push(Row::new(9));
        let spec = SortSpec::new(
            vec![SortOrder::new(tags::MESSAGE_SIZE, SortDirection::Ascending)],
            0,
            0,
        );
        let view = View::build(&data, None, Some(&spec), &HashMap::new());
        assert_eq!(view.leaf_at(0).unwrap().id, 9);
    }

    #[test]
    fn test_sort_order_is_total_across_numeric_types() {
        let score = PropertyTag::new(0x6701, PropertyType::Floating64);
        let data = vec![
            Row::new(1).with(score, PropertyValue::Integer32(2)),
            Row::new(2).with(score, PropertyValue::Floating64(f64::NAN)),
            Row::new(3).with(score, PropertyValue::Floating64(2.0)),
            Row::new(4).with(score, PropertyValue::Integer64(1)),
            Row::new(5).with(score, PropertyValue::Floating64(f64::NEG_INFINITY)),
            Row::new(6).with(score, PropertyValue::Boolean(false)),
            Row::new(7).with(score, PropertyValue::Floating64(1.5)),
        ];
        let spec = SortSpec::new(vec![SortOrder::new(score, SortDirection::Ascending)], 0, 0);
        let view = View::build(&data, None, Some(&spec), &HashMap::new());
        assert_eq!(
            leaf_ids(&view),
            vec![Some(5), Some(4), Some(7), Some(3), Some(1), Some(2), Some(6)]
        );

        let nan = PropertyValue::Floating64(f64::NAN);
        assert_eq!(sort_key_cmp(Some(&nan), Some(&nan)), Ordering::Equal);
        assert_eq!(
            sort_key_cmp(Some(&nan), Some(&PropertyValue::Integer32(0))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_categorized_expanded() {
        let view = View::build(&rows(), None, Some(&by_sender(1, 1)), &HashMap::new());
        // alice(2,4) bob(3) carol(5,1), each led by a header
        assert_eq!(
            leaf_ids(&view),
            vec![None, Some(2), Some(4), None, Some(3), None, Some(5), Some(1)]
        );
        let headers: Vec<&Header> = view.headers().collect();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].leaf_count, 2);
        assert!(headers.iter().all(|h| h.expanded && h.depth == 0));
        assert!(headers.iter().all(|h| h.id & CATEGORY_ID_FLAG != 0));
    }

    #[test]
    fn test_categorized_collapsed_by_default() {
        let view = View::build(&rows(), None, Some(&by_sender(1, 0)), &HashMap::new());
        assert_eq!(view.len(), 3);
        assert!(view.headers().all(|h| !h.expanded));
    }

    #[test]
    fn test_override_expands_one_category() {
        let collapsed = View::build(&rows(), None, Some(&by_sender(1, 0)), &HashMap::new());
        let bob = collapsed.headers().nth(1).unwrap().id;
        let overrides = HashMap::from([(bob, true)]);
        let view = View::build(&rows(), None, Some(&by_sender(1, 0)), &overrides);
        assert_eq!(leaf_ids(&view), vec![None, None, Some(3), None]);
        assert_eq!(view.position_of(RowKey::Category(bob)), Some(1));
    }

    #[test]
    fn test_category_ids_are_stable() {
        let a = View::build(&rows(), None, Some(&by_sender(1, 1)), &HashMap::new());
        let b = View::build(&rows(), None, Some(&by_sender(1, 0)), &HashMap::new());
        let ids_a: Vec<u64> = a.headers().map(|h| h.id).collect();
        let ids_b: Vec<u64> = b.headers().map(|h| h.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_two_level_collapse_hides_subtree() {
        let spec = by_sender(2, 2);
        let view = View::build(&rows(), None, Some(&spec), &HashMap::new());
        // 3 sender headers + 5 size headers + 5 leaves
        assert_eq!(view.len(), 13);

        let alice = view.headers().next().unwrap().id;
        let overrides = HashMap::from([(alice, false)]);
        let view = View::build(&rows(), None, Some(&spec), &overrides);
        assert_eq!(view.len(), 13 - 4);
    }

    #[test]
    fn test_maximum_category_orders_groups() {
        let spec = SortSpec::new(
            vec![
                SortOrder::new(SENDER, SortDirection::Ascending),
                SortOrder::new(tags::MESSAGE_SIZE, SortDirection::MaximumCategory),
            ],
            1,
            1,
        );
        let view = View::build(&rows(), None, Some(&spec), &HashMap::new());
        // bob max 50, alice max 40, carol max 30
        assert_eq!(
            leaf_ids(&view),
            vec![None, Some(3), None, Some(4), Some(2), None, Some(1), Some(5)]
        );
    }

    #[test]
    fn test_projection_of_headers_and_leaves() {
        let view = View::build(&rows(), None, Some(&by_sender(1, 1)), &HashMap::new());
        let columns = [tags::ROW_TYPE, SENDER, tags::CONTENT_COUNT, tags::SUBJECT];

        let header = view.project(0, &columns).unwrap();
        assert_eq!(
            header.get(0),
            Some(&PropertyValue::Integer32(ROW_TYPE_EXPANDED_HEADER))
        );
        assert_eq!(header.get(1), Some(&PropertyValue::Unicode("alice".into())));
        assert_eq!(header.get(2), Some(&PropertyValue::Integer32(2)));
        assert_eq!(header.get(3), None);

        let leaf = view.project(1, &columns).unwrap();
        assert_eq!(leaf.get(0), Some(&PropertyValue::Integer32(ROW_TYPE_LEAF)));
        assert_eq!(leaf.get(2), None);
        match leaf {
            PropertyRow::Flagged(slots) => {
                assert_eq!(slots[3], FlaggedValue::Error(ResultCode::NotFound.as_u32()))
            }
            other => panic!("expected flagged row, got {:?}", other),
        }
    }

    #[test]
    fn test_sort_spec_validation() {
        assert!(by_sender(1, 1).validate().is_ok());
        assert!(by_sender(3, 0).validate().is_err());
        assert!(by_sender(1, 2).validate().is_err());

        let misplaced = SortSpec::new(
            vec![SortOrder::new(SENDER, SortDirection::MaximumCategory)],
            0,
            0,
        );
        assert!(misplaced.validate().is_err());

        let untyped = SortSpec::new(
            vec![SortOrder::new(
                PropertyTag::new(0x0037, PropertyType::Unspecified),
                SortDirection::Ascending,
            )],
            0,
            0,
        );
        assert_eq!(
            untyped.validate().unwrap_err().code(),
            ResultCode::InvalidParameter
        );
    }
}
