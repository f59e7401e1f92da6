//! Name/id resolution over a loaded P4Info descriptor.

use crate::entry::{MatchValue, TableEntry};
use crate::error::{CatalogError, CatalogResult, DescriptorError};
use crate::ids::{ActionId, CounterId, MatchFieldId, ParamId, RawId, TableId};
use p4ctl_proto::p4info::{self, ActionRefScope, CounterUnit, MatchType, P4Info, Preamble};
use p4ctl_types::MacAddress;
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

/// Match kind of a table key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Exact,
    Lpm,
    Ternary,
    Range,
    Optional,
    Unspecified,
}

impl MatchKind {
    /// Kinds whose fields may be left out of an entry (wildcard).
    pub fn is_wildcardable(&self) -> bool {
        !matches!(self, MatchKind::Exact)
    }
}

impl From<MatchType> for MatchKind {
    fn from(match_type: MatchType) -> Self {
        match match_type {
            MatchType::Exact => MatchKind::Exact,
            MatchType::Lpm => MatchKind::Lpm,
            MatchType::Ternary => MatchKind::Ternary,
            MatchType::Range => MatchKind::Range,
            MatchType::Optional => MatchKind::Optional,
            MatchType::Unspecified => MatchKind::Unspecified,
        }
    }
}

impl From<MatchKind> for MatchType {
    fn from(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Exact => MatchType::Exact,
            MatchKind::Lpm => MatchType::Lpm,
            MatchKind::Ternary => MatchType::Ternary,
            MatchKind::Range => MatchType::Range,
            MatchKind::Optional => MatchType::Optional,
            MatchKind::Unspecified => MatchType::Unspecified,
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchKind::Exact => "exact",
            MatchKind::Lpm => "lpm",
            MatchKind::Ternary => "ternary",
            MatchKind::Range => "range",
            MatchKind::Optional => "optional",
            MatchKind::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}

/// How encoded values of a field or parameter are rendered for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueFormat {
    #[default]
    Integer,
    Ipv4,
    Mac,
}

impl ValueFormat {
    /// Picks a rendering from the declared P4 type name, falling back to the
    /// last dotted component of the field name. Only 32-bit addresses render
    /// as IPv4 and only 48-bit addresses as MAC.
    pub fn infer(name: &str, type_name: Option<&str>, bitwidth: u32) -> Self {
        let leaf = name.rsplit('.').next().unwrap_or(name).to_ascii_lowercase();
        let type_name = type_name.unwrap_or_default().to_ascii_lowercase();
        let address = type_name.contains("addr") || leaf.contains("addr");
        match bitwidth {
            32 if address || leaf.contains("ipv4") || type_name.contains("ip4") => ValueFormat::Ipv4,
            48 if address || leaf.contains("mac") || type_name.contains("mac") => ValueFormat::Mac,
            _ => ValueFormat::Integer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFieldInfo {
    pub id: MatchFieldId,
    pub name: String,
    pub kind: MatchKind,
    pub bitwidth: u32,
    pub format: ValueFormat,
}

/// Whether an action may be used in entries, as the default action, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionScope {
    TableAndDefault,
    TableOnly,
    DefaultOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRefInfo {
    pub id: ActionId,
    pub scope: ActionScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub id: TableId,
    pub name: String,
    pub alias: String,
    /// In declaration order.
    pub match_fields: Vec<MatchFieldInfo>,
    pub action_refs: Vec<ActionRefInfo>,
    pub size: i64,
    pub is_const: bool,
}

impl TableInfo {
    pub fn match_field(&self, name: &str) -> Option<&MatchFieldInfo> {
        self.match_fields.iter().find(|f| f.name == name)
    }

    pub fn match_field_by_id(&self, id: MatchFieldId) -> Option<&MatchFieldInfo> {
        self.match_fields.iter().find(|f| f.id == id)
    }

    /// True if `action` can be the action of a regular (non-default) entry.
    pub fn permits(&self, action: ActionId) -> bool {
        self.action_refs
            .iter()
            .any(|r| r.id == action && r.scope != ActionScope::DefaultOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub id: ParamId,
    pub name: String,
    pub bitwidth: u32,
    pub format: ValueFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInfo {
    pub id: ActionId,
    pub name: String,
    pub alias: String,
    /// In declaration order.
    pub params: Vec<ParamInfo>,
}

impl ActionInfo {
    pub fn param(&self, name: &str) -> Option<&ParamInfo> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn param_by_id(&self, id: ParamId) -> Option<&ParamInfo> {
        self.params.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterInfo {
    pub id: CounterId,
    pub name: String,
    pub alias: String,
    pub unit: CounterUnit,
    pub size: i64,
}

trait Named {
    fn raw_id(&self) -> RawId;
    fn name(&self) -> &str;
    fn alias(&self) -> &str;
}

macro_rules! impl_named {
    ($($t:ty),*) => {
        $(impl Named for $t {
            fn raw_id(&self) -> RawId {
                self.id.as_raw()
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn alias(&self) -> &str {
                &self.alias
            }
        })*
    };
}

impl_named!(TableInfo, ActionInfo, CounterInfo);

/// Entities of one kind, indexed by id and by both name and alias.
#[derive(Debug, Clone)]
struct Registry<T> {
    kind: &'static str,
    items: Vec<T>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<RawId, usize>,
}

impl<T: Named> Registry<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: Vec::new(),
            by_name: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    fn insert(&mut self, item: T) -> Result<(), DescriptorError> {
        let index = self.items.len();
        if self.by_id.insert(item.raw_id(), index).is_some() {
            return Err(DescriptorError::invalid(format!(
                "duplicate {} id {}",
                self.kind,
                item.raw_id()
            )));
        }
        for key in [item.name(), item.alias()] {
            if key.is_empty() {
                continue;
            }
            if let Some(previous) = self.by_name.insert(key.to_string(), index) {
                if previous != index {
                    return Err(DescriptorError::invalid(format!(
                        "duplicate {} name '{}'",
                        self.kind, key
                    )));
                }
            }
        }
        self.items.push(item);
        Ok(())
    }

    fn get(&self, name: &str) -> CatalogResult<&T> {
        self.by_name
            .get(name)
            .map(|&i| &self.items[i])
            .ok_or_else(|| CatalogError::not_found(self.kind, name))
    }

    fn by_id(&self, raw: RawId) -> Option<&T> {
        self.by_id.get(&raw).map(|&i| &self.items[i])
    }
}

/// Read-only index over a pipeline descriptor.
///
/// Tables, actions and counters resolve by fully qualified name
/// (`MyIngress.ipv4_lpm`) or alias (`ipv4_lpm`). Match fields and action
/// parameters resolve by exact name within their owner.
#[derive(Debug, Clone)]
pub struct Catalog {
    p4info: P4Info,
    tables: Registry<TableInfo>,
    actions: Registry<ActionInfo>,
    counters: Registry<CounterInfo>,
}

impl Catalog {
    /// Indexes a decoded descriptor, rejecting duplicate names or ids and
    /// table references to undeclared actions.
    pub fn from_p4info(p4info: P4Info) -> CatalogResult<Self> {
        let mut actions = Registry::new("action");
        for action in &p4info.actions {
            actions.insert(action_info(action)?)?;
        }

        let mut tables = Registry::new("table");
        for table in &p4info.tables {
            let info = table_info(table)?;
            if let Some(missing) = info
                .action_refs
                .iter()
                .find(|r| actions.by_id(r.id.as_raw()).is_none())
            {
                return Err(DescriptorError::invalid(format!(
                    "table '{}' references undeclared action id {}",
                    info.name, missing.id
                ))
                .into());
            }
            tables.insert(info)?;
        }

        let mut counters = Registry::new("counter");
        for counter in &p4info.counters {
            let (id, name, alias) = preamble(counter.preamble.as_ref(), "counter")?;
            counters.insert(CounterInfo {
                id: CounterId::from_raw(id),
                name,
                alias,
                unit: counter.spec.as_ref().map_or(CounterUnit::Unspecified, |s| s.unit()),
                size: counter.size,
            })?;
        }

        debug!(
            tables = tables.items.len(),
            actions = actions.items.len(),
            counters = counters.items.len(),
            "Catalog indexed"
        );

        Ok(Catalog {
            p4info,
            tables,
            actions,
            counters,
        })
    }

    /// Starts an in-memory catalog, for tests and tooling that have no
    /// descriptor file at hand.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// The descriptor this catalog was built from, as sent to devices on
    /// pipeline installation.
    pub fn p4info(&self) -> &P4Info {
        &self.p4info
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.items.iter()
    }

    pub fn actions(&self) -> impl Iterator<Item = &ActionInfo> {
        self.actions.items.iter()
    }

    pub fn counters(&self) -> impl Iterator<Item = &CounterInfo> {
        self.counters.items.iter()
    }

    pub fn table(&self, name: &str) -> CatalogResult<&TableInfo> {
        self.tables.get(name)
    }

    pub fn action(&self, name: &str) -> CatalogResult<&ActionInfo> {
        self.actions.get(name)
    }

    pub fn counter(&self, name: &str) -> CatalogResult<&CounterInfo> {
        self.counters.get(name)
    }

    pub fn table_by_id(&self, id: TableId) -> Option<&TableInfo> {
        self.tables.by_id(id.as_raw())
    }

    pub fn action_by_id(&self, id: ActionId) -> Option<&ActionInfo> {
        self.actions.by_id(id.as_raw())
    }

    pub fn counter_by_id(&self, id: CounterId) -> Option<&CounterInfo> {
        self.counters.by_id(id.as_raw())
    }

    pub fn resolve_table(&self, name: &str) -> CatalogResult<TableId> {
        self.table(name).map(|t| t.id)
    }

    pub fn resolve_action(&self, name: &str) -> CatalogResult<ActionId> {
        self.action(name).map(|a| a.id)
    }

    pub fn resolve_counter(&self, name: &str) -> CatalogResult<CounterId> {
        self.counter(name).map(|c| c.id)
    }

    /// Resolves a key field of `table` to its id, match kind and bit-width.
    pub fn resolve_match_field(
        &self,
        table: &str,
        field: &str,
    ) -> CatalogResult<(MatchFieldId, MatchKind, u32)> {
        let table = self.table(table)?;
        table
            .match_field(field)
            .map(|f| (f.id, f.kind, f.bitwidth))
            .ok_or_else(|| CatalogError::not_found_in("match field", field, &table.name))
    }

    pub fn resolve_action_param(&self, action: &str, param: &str) -> CatalogResult<ParamId> {
        let action = self.action(action)?;
        action
            .param(param)
            .map(|p| p.id)
            .ok_or_else(|| CatalogError::not_found_in("action parameter", param, &action.name))
    }

    pub fn table_name(&self, id: TableId) -> Option<&str> {
        self.table_by_id(id).map(|t| t.name.as_str())
    }

    pub fn action_name(&self, id: ActionId) -> Option<&str> {
        self.action_by_id(id).map(|a| a.name.as_str())
    }

    pub fn counter_name(&self, id: CounterId) -> Option<&str> {
        self.counter_by_id(id).map(|c| c.name.as_str())
    }

    pub fn match_field_name(&self, table: TableId, field: MatchFieldId) -> Option<&str> {
        self.table_by_id(table)?
            .match_field_by_id(field)
            .map(|f| f.name.as_str())
    }

    pub fn action_param_name(&self, action: ActionId, param: ParamId) -> Option<&str> {
        self.action_by_id(action)?
            .param_by_id(param)
            .map(|p| p.name.as_str())
    }

    /// Renders an entry with names instead of ids, e.g.
    /// `MyIngress.ipv4_lpm: hdr.ipv4.dstAddr=10.0.1.1/32 -> MyIngress.ipv4_forward(dstAddr=08:00:00:00:01:01, port=2)`.
    ///
    /// Values render according to the field's [`ValueFormat`]. Ids missing
    /// from the catalog render as `#<id>` and their values as integers.
    pub fn describe(&self, entry: &TableEntry) -> String {
        let table = self.table_by_id(entry.table_id);
        let action = self.action_by_id(entry.action.action_id);

        let matches: Vec<String> = entry
            .matches
            .iter()
            .map(|m| {
                let field = table.and_then(|t| t.match_field_by_id(m.field_id));
                let name = field.map_or_else(|| format!("#{}", m.field_id), |f| f.name.clone());
                let format = field.map_or(ValueFormat::Integer, |f| f.format);
                let value = render_bytes(m.value.value(), format);
                match &m.value {
                    MatchValue::Exact { .. } => format!("{name}={value}"),
                    MatchValue::Lpm { prefix_len, .. } => format!("{name}={value}/{prefix_len}"),
                    MatchValue::Ternary { mask, .. } => {
                        format!("{name}={value}&&&{}", render_bytes(mask, format))
                    }
                }
            })
            .collect();

        let params: Vec<String> = entry
            .action
            .params
            .iter()
            .map(|p| {
                let info = action.and_then(|a| a.param_by_id(p.param_id));
                let name = info.map_or_else(|| format!("#{}", p.param_id), |i| i.name.clone());
                let format = info.map_or(ValueFormat::Integer, |i| i.format);
                format!("{name}={}", render_bytes(&p.value, format))
            })
            .collect();

        let table_name = table.map_or_else(|| format!("#{}", entry.table_id), |t| t.name.clone());
        let action_name =
            action.map_or_else(|| format!("#{}", entry.action.action_id), |a| a.name.clone());
        let key = if matches.is_empty() {
            "(default)".to_string()
        } else {
            matches.join(" ")
        };
        format!("{table_name}: {key} -> {action_name}({})", params.join(", "))
    }
}

fn render_bytes(bytes: &[u8], format: ValueFormat) -> String {
    let trimmed = &bytes[bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len())..];
    if format == ValueFormat::Ipv4 && trimmed.len() <= 4 {
        let mut octets = [0u8; 4];
        octets[4 - trimmed.len()..].copy_from_slice(trimmed);
        return Ipv4Addr::from(octets).to_string();
    }
    if format == ValueFormat::Mac && trimmed.len() <= 6 {
        let mut octets = [0u8; 6];
        octets[6 - trimmed.len()..].copy_from_slice(trimmed);
        return MacAddress::new(octets).to_string();
    }
    if trimmed.len() <= 16 {
        let n = trimmed.iter().fold(0u128, |acc, &b| (acc << 8) | u128::from(b));
        return n.to_string();
    }
    let hex: String = trimmed.iter().map(|b| format!("{b:02x}")).collect();
    format!("0x{hex}")
}

fn preamble(p: Option<&Preamble>, kind: &str) -> Result<(RawId, String, String), DescriptorError> {
    let p = p.ok_or_else(|| DescriptorError::invalid(format!("{kind} without preamble")))?;
    if p.name.is_empty() {
        return Err(DescriptorError::invalid(format!("{kind} {} has no name", p.id)));
    }
    Ok((p.id, p.name.clone(), p.alias.clone()))
}

fn bitwidth(raw: i32, what: &str) -> Result<u32, DescriptorError> {
    u32::try_from(raw).map_err(|_| DescriptorError::invalid(format!("{what} has negative bitwidth {raw}")))
}

fn table_info(table: &p4info::Table) -> Result<TableInfo, DescriptorError> {
    let (id, name, alias) = preamble(table.preamble.as_ref(), "table")?;

    let mut match_fields: Vec<MatchFieldInfo> = Vec::with_capacity(table.match_fields.len());
    for field in &table.match_fields {
        if match_fields.iter().any(|f| f.id.as_raw() == field.id || f.name == field.name) {
            return Err(DescriptorError::invalid(format!(
                "table '{name}' declares match field '{}' twice",
                field.name
            )));
        }
        let width = bitwidth(field.bitwidth, &field.name)?;
        let type_name = field.type_name.as_ref().map(|t| t.name.as_str());
        match_fields.push(MatchFieldInfo {
            id: MatchFieldId::from_raw(field.id),
            name: field.name.clone(),
            kind: MatchKind::from(field.match_type()),
            bitwidth: width,
            format: ValueFormat::infer(&field.name, type_name, width),
        });
    }

    let action_refs = table
        .action_refs
        .iter()
        .map(|r| ActionRefInfo {
            id: ActionId::from_raw(r.id),
            scope: match r.scope() {
                ActionRefScope::TableAndDefault => ActionScope::TableAndDefault,
                ActionRefScope::TableOnly => ActionScope::TableOnly,
                ActionRefScope::DefaultOnly => ActionScope::DefaultOnly,
            },
        })
        .collect();

    Ok(TableInfo {
        id: TableId::from_raw(id),
        name,
        alias,
        match_fields,
        action_refs,
        size: table.size,
        is_const: table.is_const_table,
    })
}

fn action_info(action: &p4info::Action) -> Result<ActionInfo, DescriptorError> {
    let (id, name, alias) = preamble(action.preamble.as_ref(), "action")?;

    let mut params: Vec<ParamInfo> = Vec::with_capacity(action.params.len());
    for param in &action.params {
        if params.iter().any(|p| p.id.as_raw() == param.id || p.name == param.name) {
            return Err(DescriptorError::invalid(format!(
                "action '{name}' declares parameter '{}' twice",
                param.name
            )));
        }
        let width = bitwidth(param.bitwidth, &param.name)?;
        let type_name = param.type_name.as_ref().map(|t| t.name.as_str());
        params.push(ParamInfo {
            id: ParamId::from_raw(param.id),
            name: param.name.clone(),
            bitwidth: width,
            format: ValueFormat::infer(&param.name, type_name, width),
        });
    }

    Ok(ActionInfo {
        id: ActionId::from_raw(id),
        name,
        alias,
        params,
    })
}

/// Assembles a [`Catalog`] in memory.
///
/// ```
/// use p4ctl_catalog::{Catalog, MatchKind};
///
/// let catalog = Catalog::builder()
///     .table(1, "MyIngress.ipv4_lpm", |t| {
///         t.match_field(1, "hdr.ipv4.dstAddr", MatchKind::Lpm, 32).action(10)
///     })
///     .action(10, "MyIngress.ipv4_forward", |a| a.param(1, "dstAddr", 48).param(2, "port", 9))
///     .build()
///     .unwrap();
/// assert_eq!(catalog.resolve_table("ipv4_lpm").unwrap().as_raw(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    p4info: P4Info,
}

impl CatalogBuilder {
    pub fn table(mut self, id: RawId, name: &str, f: impl FnOnce(TableBuilder) -> TableBuilder) -> Self {
        let table = p4info::Table {
            preamble: Some(named(id, name)),
            ..Default::default()
        };
        self.p4info.tables.push(f(TableBuilder(table)).0);
        self
    }

    pub fn action(mut self, id: RawId, name: &str, f: impl FnOnce(ActionBuilder) -> ActionBuilder) -> Self {
        let action = p4info::Action {
            preamble: Some(named(id, name)),
            ..Default::default()
        };
        self.p4info.actions.push(f(ActionBuilder(action)).0);
        self
    }

    pub fn counter(mut self, id: RawId, name: &str, size: i64) -> Self {
        self.p4info.counters.push(p4info::Counter {
            preamble: Some(named(id, name)),
            spec: Some(p4info::CounterSpec {
                unit: CounterUnit::Both.into(),
            }),
            size,
        });
        self
    }

    pub fn build(mut self) -> CatalogResult<Catalog> {
        assign_aliases(self.p4info.tables.iter_mut().filter_map(|t| t.preamble.as_mut()));
        assign_aliases(self.p4info.actions.iter_mut().filter_map(|a| a.preamble.as_mut()));
        assign_aliases(self.p4info.counters.iter_mut().filter_map(|c| c.preamble.as_mut()));
        Catalog::from_p4info(self.p4info)
    }
}

#[derive(Debug)]
pub struct TableBuilder(p4info::Table);

impl TableBuilder {
    pub fn match_field(mut self, id: RawId, name: &str, kind: MatchKind, bitwidth: u32) -> Self {
        self.0.match_fields.push(p4info::MatchField {
            id,
            name: name.to_string(),
            bitwidth: bitwidth as i32,
            match_type: MatchType::from(kind).into(),
            ..Default::default()
        });
        self
    }

    pub fn action(mut self, action_id: RawId) -> Self {
        self.0.action_refs.push(p4info::ActionRef {
            id: action_id,
            ..Default::default()
        });
        self
    }

    pub fn default_only_action(mut self, action_id: RawId) -> Self {
        self.0.action_refs.push(p4info::ActionRef {
            id: action_id,
            scope: ActionRefScope::DefaultOnly.into(),
            ..Default::default()
        });
        self
    }

    pub fn size(mut self, size: i64) -> Self {
        self.0.size = size;
        self
    }
}

#[derive(Debug)]
pub struct ActionBuilder(p4info::Action);

impl ActionBuilder {
    pub fn param(mut self, id: RawId, name: &str, bitwidth: u32) -> Self {
        self.0.params.push(p4info::action::Param {
            id,
            name: name.to_string(),
            bitwidth: bitwidth as i32,
            ..Default::default()
        });
        self
    }
}

fn named(id: RawId, name: &str) -> Preamble {
    Preamble {
        id,
        name: name.to_string(),
        ..Default::default()
    }
}

/// Gives each entity the last dotted component of its name as alias, when
/// that component is unique within the kind.
fn assign_aliases<'a>(preambles: impl Iterator<Item = &'a mut Preamble>) {
    let mut preambles: Vec<&mut Preamble> = preambles.collect();
    let short = |name: &str| name.rsplit('.').next().unwrap_or(name).to_string();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for p in &preambles {
        *counts.entry(short(&p.name)).or_default() += 1;
    }
    for p in preambles.iter_mut() {
        let alias = short(&p.name);
        p.alias = if counts.get(&alias) == Some(&1) {
            alias
        } else {
            p.name.clone()
        };
    }
}
