//! YAML scenarios.
//!
//! A scenario describes a table, its rows and a list of ROP steps, each with
//! the result code it is expected to produce:
//!
//! ```yaml
//! name: bookmark lifecycle
//! generation: exchange2010
//! table_type: contents
//! columns: [subject, message_size]
//! rows:
//!   - id: 1
//!     values: { subject: first, message_size: 10 }
//! steps:
//!   - op: set_columns
//!     columns: [subject]
//!   - op: query_rows
//!     count: 10
//!     rows: 1
//!   - op: seek_row_bookmark
//!     bookmark: missing
//!     expect: INVALID_BOOKMARK
//! ```
//!
//! Tags are written as well-known names or as a hex `0xIIIITTTT` tag.
//! Bookmarks and collapse states are named by the step that created them.

use ropstate_codec::property::tags;
use ropstate_codec::table::*;
use ropstate_codec::{
    BitmaskOp, BookmarkOrigin, FuzzyLevel, PropertyTag, PropertyType, PropertyValue,
    QueryRowsFlags, RelOp, Restriction, ResultCode, RopHeader, RopOutcome, SortDirection,
    SortOrder, TableFlags, TableRequest, TableResponse, TaggedPropertyValue,
};
use ropstate_core::handler::execute;
use ropstate_core::{Row, ServerBehavior, ServerGeneration, TableContents, TableSession, TableType};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;

type ScenarioResult<T> = Result<T, Box<dyn Error>>;

const NAMED_TAGS: [(&str, PropertyTag); 9] = [
    ("display_name", tags::DISPLAY_NAME),
    ("subject", tags::SUBJECT),
    ("message_size", tags::MESSAGE_SIZE),
    ("importance", tags::IMPORTANCE),
    ("row_type", tags::ROW_TYPE),
    ("depth", tags::DEPTH),
    ("content_count", tags::CONTENT_COUNT),
    ("inst_id", tags::INST_ID),
    ("instance_num", tags::INSTANCE_NUM),
];

/// Resolves a tag name or `0x`-prefixed 32-bit tag.
pub fn parse_tag(s: &str) -> ScenarioResult<PropertyTag> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let raw = u32::from_str_radix(hex, 16).map_err(|e| format!("bad tag {}: {}", s, e))?;
        return Ok(PropertyTag::from_u32(raw));
    }
    NAMED_TAGS
        .iter()
        .find(|(name, _)| *name == s)
        .map(|(_, tag)| *tag)
        .ok_or_else(|| format!("unknown tag name: {}", s).into())
}

pub fn tag_name(tag: PropertyTag) -> String {
    NAMED_TAGS
        .iter()
        .find(|(_, t)| *t == tag)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| format!("{:#010x}", tag.as_u32()))
}

fn parse_tags(names: &[String]) -> ScenarioResult<Vec<PropertyTag>> {
    names.iter().map(|n| parse_tag(n)).collect()
}

/// Converts a YAML scalar into a value of the tag's type.
pub fn parse_value(tag: PropertyTag, raw: &Value) -> ScenarioResult<PropertyValue> {
    let bad = || format!("value {:?} does not fit {}", raw, tag_name(tag));
    let int = || raw.as_i64().ok_or_else(bad);
    let bytes = || -> ScenarioResult<Vec<u8>> {
        let s = raw.as_str().ok_or_else(bad)?;
        Ok(hex::decode(s)?)
    };
    Ok(match tag.prop_type {
        PropertyType::Integer16 => PropertyValue::Integer16(i16::try_from(int()?)?),
        PropertyType::Integer32 => PropertyValue::Integer32(i32::try_from(int()?)?),
        PropertyType::Integer64 => PropertyValue::Integer64(int()?),
        PropertyType::Floating64 => PropertyValue::Floating64(raw.as_f64().ok_or_else(bad)?),
        PropertyType::Boolean => PropertyValue::Boolean(raw.as_bool().ok_or_else(bad)?),
        PropertyType::ErrorCode => PropertyValue::ErrorCode(u32::try_from(int()?)?),
        PropertyType::Time => PropertyValue::Time(raw.as_u64().ok_or_else(bad)?),
        PropertyType::String8 | PropertyType::Unicode => {
            let s = match raw {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(bad().into()),
            };
            if tag.prop_type == PropertyType::String8 {
                PropertyValue::String8(s)
            } else {
                PropertyValue::Unicode(s)
            }
        }
        PropertyType::Binary => PropertyValue::Binary(bytes()?),
        PropertyType::ServerId => PropertyValue::ServerId(bytes()?),
        PropertyType::Guid => {
            let raw: [u8; 16] = bytes()?.try_into().map_err(|_| bad())?;
            PropertyValue::Guid(raw)
        }
        PropertyType::Unspecified | PropertyType::Unknown(_) => return Err(bad().into()),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub generation: Option<ServerGeneration>,
    pub table_type: TableType,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<RowSpec>,
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowSpec {
    pub id: u64,
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepSpec {
    #[serde(flatten)]
    pub step: Step,
    #[serde(default = "success")]
    pub expect: ResultCode,
    /// Rows the step must return.
    #[serde(default)]
    pub rows: Option<usize>,
    /// Cursor position after the step.
    #[serde(default)]
    pub cursor: Option<usize>,
}

fn success() -> ResultCode {
    ResultCode::Success
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Beginning,
    Current,
    End,
}

impl From<&Origin> for BookmarkOrigin {
    fn from(origin: &Origin) -> Self {
        match origin {
            Origin::Beginning => BookmarkOrigin::Beginning,
            Origin::Current => BookmarkOrigin::Current,
            Origin::End => BookmarkOrigin::End,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortKey {
    pub tag: String,
    #[serde(default = "ascending")]
    pub direction: SortDirection,
}

fn ascending() -> SortDirection {
    SortDirection::Ascending
}

/// A category header, by id or by the value it groups on.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(u64),
    Value(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMatch {
    FullString,
    Substring,
    Prefix,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionSpec {
    And(Vec<RestrictionSpec>),
    Or(Vec<RestrictionSpec>),
    Not(Box<RestrictionSpec>),
    Property {
        tag: String,
        relop: RelOp,
        value: Value,
    },
    Content {
        tag: String,
        value: Value,
        #[serde(default = "substring")]
        mode: ContentMatch,
        #[serde(default)]
        ignore_case: bool,
    },
    CompareProperties {
        relop: RelOp,
        tag1: String,
        tag2: String,
    },
    Bitmask {
        tag: String,
        mask: u32,
        #[serde(default)]
        zero: bool,
    },
    Size {
        tag: String,
        relop: RelOp,
        size: u32,
    },
    Exist {
        tag: String,
    },
}

fn substring() -> ContentMatch {
    ContentMatch::Substring
}

impl RestrictionSpec {
    pub fn build(&self) -> ScenarioResult<Restriction> {
        let all = |specs: &[RestrictionSpec]| -> ScenarioResult<Vec<Restriction>> {
            specs.iter().map(RestrictionSpec::build).collect()
        };
        Ok(match self {
            RestrictionSpec::And(specs) => Restriction::And(all(specs)?),
            RestrictionSpec::Or(specs) => Restriction::Or(all(specs)?),
            RestrictionSpec::Not(spec) => Restriction::Not(Box::new(spec.build()?)),
            RestrictionSpec::Property { tag, relop, value } => {
                let tag = parse_tag(tag)?;
                Restriction::Property {
                    relop: *relop,
                    tag,
                    value: TaggedPropertyValue::new(tag, parse_value(tag, value)?),
                }
            }
            RestrictionSpec::Content {
                tag,
                value,
                mode,
                ignore_case,
            } => {
                let tag = parse_tag(tag)?;
                let low = match mode {
                    ContentMatch::FullString => FuzzyLevel::FULLSTRING,
                    ContentMatch::Substring => FuzzyLevel::SUBSTRING,
                    ContentMatch::Prefix => FuzzyLevel::PREFIX,
                };
                let high = if *ignore_case { FuzzyLevel::IGNORECASE } else { 0 };
                Restriction::Content {
                    fuzzy_level: FuzzyLevel::new(low, high),
                    tag,
                    value: TaggedPropertyValue::new(tag, parse_value(tag, value)?),
                }
            }
            RestrictionSpec::CompareProperties { relop, tag1, tag2 } => {
                Restriction::CompareProperties {
                    relop: *relop,
                    tag1: parse_tag(tag1)?,
                    tag2: parse_tag(tag2)?,
                }
            }
            RestrictionSpec::Bitmask { tag, mask, zero } => Restriction::Bitmask {
                op: if *zero {
                    BitmaskOp::EqualToZero
                } else {
                    BitmaskOp::NotEqualToZero
                },
                tag: parse_tag(tag)?,
                mask: *mask,
            },
            RestrictionSpec::Size { tag, relop, size } => Restriction::Size {
                relop: *relop,
                tag: parse_tag(tag)?,
                size: *size,
            },
            RestrictionSpec::Exist { tag } => Restriction::Exist {
                tag: parse_tag(tag)?,
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    SetColumns {
        columns: Vec<String>,
        #[serde(default)]
        r#async: bool,
    },
    SortTable {
        sort: Vec<SortKey>,
        #[serde(default)]
        categorized: u16,
        #[serde(default)]
        expanded: u16,
        #[serde(default)]
        r#async: bool,
    },
    Restrict {
        #[serde(default)]
        restriction: Option<RestrictionSpec>,
        #[serde(default)]
        r#async: bool,
    },
    QueryRows {
        count: u16,
        #[serde(default)]
        backward: bool,
        #[serde(default)]
        no_advance: bool,
    },
    GetStatus,
    QueryPosition,
    SeekRow {
        origin: Origin,
        #[serde(default)]
        count: i32,
        #[serde(default)]
        want_count: bool,
    },
    SeekRowBookmark {
        bookmark: String,
        #[serde(default)]
        count: i32,
        #[serde(default)]
        want_count: bool,
    },
    SeekRowFractional {
        numerator: u32,
        denominator: u32,
    },
    CreateBookmark {
        name: String,
    },
    Abort,
    QueryColumnsAll,
    FindRow {
        #[serde(default)]
        restriction: Option<RestrictionSpec>,
        #[serde(default)]
        origin: Option<Origin>,
        /// Starts from a named bookmark instead of `origin`.
        #[serde(default)]
        bookmark: Option<String>,
        #[serde(default)]
        backward: bool,
    },
    ExpandRow {
        category: CategoryRef,
        #[serde(default)]
        max_rows: u16,
    },
    CollapseRow {
        category: CategoryRef,
    },
    GetCollapseState {
        name: String,
        #[serde(default)]
        row_id: u64,
    },
    SetCollapseState {
        state: String,
        /// Name for the returned bookmark.
        #[serde(default)]
        bookmark: Option<String>,
    },
    ResetTable,
    FreeBookmark {
        bookmark: String,
    },
    Release,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub rop: String,
    pub expected: ResultCode,
    pub actual: ResultCode,
    pub detail: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.passed)
    }

    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.passed).count()
    }
}

impl Scenario {
    pub fn from_yaml(content: &str) -> ScenarioResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn contents(&self) -> ScenarioResult<TableContents> {
        let columns = parse_tags(&self.columns)?;
        let rows = self
            .rows
            .iter()
            .map(|spec| {
                spec.values
                    .iter()
                    .try_fold(Row::new(spec.id), |row, (name, raw)| {
                        let tag = parse_tag(name)?;
                        Ok::<_, Box<dyn Error>>(row.with(tag, parse_value(tag, raw)?))
                    })
            })
            .collect::<ScenarioResult<Vec<_>>>()?;
        Ok(TableContents::new(columns, rows))
    }

    /// Runs every step. A step whose arguments cannot be built is an error;
    /// an unexpected result code is a failed step.
    pub fn run(&self, behavior: ServerBehavior, max_rows: u16) -> ScenarioResult<ScenarioReport> {
        let mut runner = Runner {
            session: TableSession::new(self.table_type, behavior, self.contents()?)
                .with_max_rows(max_rows),
            bookmarks: HashMap::new(),
            collapse_states: HashMap::new(),
        };

        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, spec) in self.steps.iter().enumerate() {
            let report = runner
                .step(index + 1, spec)
                .map_err(|e| format!("step {}: {}", index + 1, e))?;
            steps.push(report);
        }
        Ok(ScenarioReport {
            name: self.name.clone(),
            steps,
        })
    }
}

struct Runner {
    session: TableSession,
    bookmarks: HashMap<String, Vec<u8>>,
    collapse_states: HashMap<String, Vec<u8>>,
}

fn flags(is_async: bool) -> TableFlags {
    if is_async {
        TableFlags::new().with_async()
    } else {
        TableFlags::new()
    }
}

impl Runner {
    /// Bytes for a named bookmark. Unknown names produce bytes the session
    /// never issued.
    fn bookmark(&self, name: &str) -> Vec<u8> {
        self.bookmarks
            .get(name)
            .cloned()
            .unwrap_or_else(|| vec![0xFF; 4])
    }

    fn category(&self, category: &CategoryRef) -> u64 {
        match category {
            CategoryRef::Id(id) => *id,
            CategoryRef::Value(wanted) => self
                .session
                .view()
                .headers()
                .find(|h| {
                    h.path
                        .last()
                        .and_then(|(_, v)| v.as_ref())
                        .and_then(PropertyValue::as_str)
                        .is_some_and(|s| s.eq_ignore_ascii_case(wanted))
                })
                .map_or(0, |h| h.id),
        }
    }

    fn request(&self, step: &Step) -> ScenarioResult<TableRequest> {
        let header = RopHeader::new(0, 0);
        Ok(match step {
            Step::SetColumns { columns, r#async } => TableRequest::SetColumns(SetColumnsRequest {
                header,
                flags: flags(*r#async),
                columns: parse_tags(columns)?,
            }),
            Step::SortTable {
                sort,
                categorized,
                expanded,
                r#async,
            } => TableRequest::SortTable(SortTableRequest {
                header,
                flags: flags(*r#async),
                categorized_count: *categorized,
                expanded_count: *expanded,
                sort_orders: sort
                    .iter()
                    .map(|k| Ok(SortOrder::new(parse_tag(&k.tag)?, k.direction)))
                    .collect::<ScenarioResult<Vec<_>>>()?,
            }),
            Step::Restrict {
                restriction,
                r#async,
            } => TableRequest::Restrict(RestrictRequest {
                header,
                flags: flags(*r#async),
                restriction: restriction.as_ref().map(RestrictionSpec::build).transpose()?,
            }),
            Step::QueryRows {
                count,
                backward,
                no_advance,
            } => TableRequest::QueryRows(QueryRowsRequest {
                header,
                flags: if *no_advance {
                    QueryRowsFlags::new().with_no_advance()
                } else {
                    QueryRowsFlags::new()
                },
                forward_read: !backward,
                row_count: *count,
            }),
            Step::GetStatus => TableRequest::GetStatus(GetStatusRequest { header }),
            Step::QueryPosition => TableRequest::QueryPosition(QueryPositionRequest { header }),
            Step::SeekRow {
                origin,
                count,
                want_count,
            } => TableRequest::SeekRow(SeekRowRequest {
                header,
                origin: origin.into(),
                row_count: *count,
                want_row_moved_count: *want_count,
            }),
            Step::SeekRowBookmark {
                bookmark,
                count,
                want_count,
            } => TableRequest::SeekRowBookmark(SeekRowBookmarkRequest {
                header,
                bookmark: self.bookmark(bookmark),
                row_count: *count,
                want_row_moved_count: *want_count,
            }),
            Step::SeekRowFractional {
                numerator,
                denominator,
            } => TableRequest::SeekRowFractional(SeekRowFractionalRequest {
                header,
                numerator: *numerator,
                denominator: *denominator,
            }),
            Step::CreateBookmark { .. } => {
                TableRequest::CreateBookmark(CreateBookmarkRequest { header })
            }
            Step::Abort => TableRequest::Abort(AbortRequest { header }),
            Step::QueryColumnsAll => {
                TableRequest::QueryColumnsAll(QueryColumnsAllRequest { header })
            }
            Step::FindRow {
                restriction,
                origin,
                bookmark,
                backward,
            } => {
                let (origin, bookmark) = match bookmark {
                    Some(name) => (BookmarkOrigin::Custom, self.bookmark(name)),
                    None => (
                        origin.as_ref().map_or(BookmarkOrigin::Beginning, Into::into),
                        Vec::new(),
                    ),
                };
                TableRequest::FindRow(FindRowRequest {
                    header,
                    backward: *backward,
                    restriction: restriction.as_ref().map(RestrictionSpec::build).transpose()?,
                    origin,
                    bookmark,
                })
            }
            Step::ExpandRow { category, max_rows } => TableRequest::ExpandRow(ExpandRowRequest {
                header,
                max_row_count: *max_rows,
                category_id: self.category(category),
            }),
            Step::CollapseRow { category } => TableRequest::CollapseRow(CollapseRowRequest {
                header,
                category_id: self.category(category),
            }),
            Step::GetCollapseState { row_id, .. } => {
                TableRequest::GetCollapseState(GetCollapseStateRequest {
                    header,
                    row_id: *row_id,
                    row_instance_number: 0,
                })
            }
            Step::SetCollapseState { state, .. } => {
                TableRequest::SetCollapseState(SetCollapseStateRequest {
                    header,
                    collapse_state: self.collapse_states.get(state).cloned().unwrap_or_default(),
                })
            }
            Step::ResetTable => TableRequest::ResetTable(ResetTableRequest { header }),
            Step::FreeBookmark { bookmark } => TableRequest::FreeBookmark(FreeBookmarkRequest {
                header,
                bookmark: self.bookmark(bookmark),
            }),
            Step::Release => TableRequest::Release(ReleaseRequest { header }),
        })
    }

    fn step(&mut self, index: usize, spec: &StepSpec) -> ScenarioResult<StepReport> {
        let request = self.request(&spec.step)?;
        let rop = request.rop_id().to_string();

        let (actual, rows, detail) = match execute(&mut self.session, &request) {
            // Release answers nothing; report the session state instead.
            None => {
                let code = if self.session.is_released() {
                    ResultCode::Success
                } else {
                    ResultCode::NullObject
                };
                (code, None, String::from("released"))
            }
            Some(response) => {
                let code = ResultCode::from_u32(response.return_value())
                    .unwrap_or(ResultCode::Unexpected);
                let (rows, detail) = self.record(&spec.step, &response);
                (code, rows, detail)
            }
        };

        let mut passed = actual == spec.expect;
        let mut detail = detail;
        if let (Some(expected), Some(got)) = (spec.rows, rows) {
            if expected != got {
                passed = false;
                detail = format!("{} (expected {} rows)", detail, expected);
            }
        }
        if let Some(expected) = spec.cursor {
            if expected != self.session.cursor() {
                passed = false;
                detail = format!(
                    "{} (cursor {} expected {})",
                    detail,
                    self.session.cursor(),
                    expected
                );
            }
        }

        Ok(StepReport {
            index,
            rop,
            expected: spec.expect,
            actual,
            detail,
            passed,
        })
    }

    /// Keeps named bookmarks and collapse states, and summarizes the
    /// response. Returns the number of rows it carried, if any.
    fn record(&mut self, step: &Step, response: &TableResponse) -> (Option<usize>, String) {
        match (step, response) {
            (Step::CreateBookmark { name }, TableResponse::CreateBookmark(r)) => {
                if let RopOutcome::Success(p) = &r.outcome {
                    self.bookmarks.insert(name.clone(), p.bookmark.clone());
                }
                (None, format!("bookmark {}", name))
            }
            (Step::SetCollapseState { bookmark, .. }, TableResponse::SetCollapseState(r)) => {
                if let (RopOutcome::Success(p), Some(name)) = (&r.outcome, bookmark) {
                    self.bookmarks.insert(name.clone(), p.bookmark.clone());
                }
                (None, format!("{} rows visible", self.session.row_count()))
            }
            (Step::GetCollapseState { name, .. }, TableResponse::GetCollapseState(r)) => {
                if let RopOutcome::Success(p) = &r.outcome {
                    self.collapse_states
                        .insert(name.clone(), p.collapse_state.clone());
                    return (None, format!("{} byte state {}", p.collapse_state.len(), name));
                }
                (None, String::new())
            }
            (_, TableResponse::QueryRows(r)) => match &r.outcome {
                RopOutcome::Success(p) => (
                    Some(p.rows.len()),
                    format!("{} rows, origin {:?}", p.rows.len(), p.origin),
                ),
                RopOutcome::Failure { .. } => (None, String::new()),
            },
            (_, TableResponse::FindRow(r)) => match &r.outcome {
                RopOutcome::Success(p) => {
                    let found = usize::from(p.row.is_some());
                    let detail = if p.row_no_longer_visible {
                        format!("{} rows, bookmark row gone", found)
                    } else {
                        format!("{} rows", found)
                    };
                    (Some(found), detail)
                }
                RopOutcome::Failure { .. } => (None, String::new()),
            },
            (_, TableResponse::ExpandRow(r)) => match &r.outcome {
                RopOutcome::Success(p) => (
                    Some(p.rows.len()),
                    format!("expanded {}, returned {}", p.expanded_row_count, p.rows.len()),
                ),
                RopOutcome::Failure { .. } => (None, String::new()),
            },
            (_, TableResponse::CollapseRow(r)) => (
                None,
                r.payload()
                    .map(|p| format!("collapsed {}", p.collapsed_row_count))
                    .unwrap_or_default(),
            ),
            (_, TableResponse::QueryPosition(r)) => (
                None,
                r.payload()
                    .map(|p| format!("{}/{}", p.numerator, p.denominator))
                    .unwrap_or_default(),
            ),
            (_, TableResponse::SeekRow(r)) => (
                None,
                r.payload()
                    .map(|p| format!("moved {}, sought less {}", p.rows_sought, p.has_sought_less))
                    .unwrap_or_default(),
            ),
            (_, TableResponse::SeekRowBookmark(r)) => (
                None,
                r.payload()
                    .map(|p| {
                        format!(
                            "moved {}, row gone {}",
                            p.rows_sought, p.row_no_longer_visible
                        )
                    })
                    .unwrap_or_default(),
            ),
            (_, TableResponse::QueryColumnsAll(r)) => (
                None,
                r.payload()
                    .map(|p| {
                        p.columns
                            .iter()
                            .map(|t| tag_name(*t))
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default(),
            ),
            (_, TableResponse::GetStatus(r)) => (
                None,
                r.payload()
                    .map(|p| format!("{:?}", p.table_status))
                    .unwrap_or_default(),
            ),
            (_, TableResponse::Abort(r)) => (
                None,
                r.payload()
                    .map(|p| format!("aborted {:?}", p.table_status))
                    .unwrap_or_default(),
            ),
            _ => (None, String::new()),
        }
    }
}
