//! Table entry construction.
//!
//! Building is pure: it only consults the catalog and never touches a device.
//! Checks run in a fixed order (table, match fields, action, parameters) so
//! the first problem reported is deterministic.

use crate::catalog::{Catalog, MatchKind, TableInfo};
use crate::entry::{ActionCall, ActionParam, FieldMatch, MatchValue, TableEntry};
use crate::error::{CatalogError, CatalogResult, ShapeError};
use crate::value::{MatchInput, Value};
use std::collections::HashMap;

impl Catalog {
    /// Builds an entry of `table` matching `matches` and running `action`
    /// with `params`.
    ///
    /// Exact fields must all be supplied. Longest-prefix, ternary, range and
    /// optional fields may be omitted, in which case they match anything;
    /// only exact and longest-prefix inputs can be supplied. Parameters must
    /// cover the action's declaration exactly.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] when the table or action is unknown and
    /// [`CatalogError::Shape`] for every other mismatch.
    pub fn build_table_entry<K, P>(
        &self,
        table: &str,
        matches: &[(K, MatchInput)],
        action: &str,
        params: &[(P, Value)],
    ) -> CatalogResult<TableEntry>
    where
        K: AsRef<str>,
        P: AsRef<str>,
    {
        self.build_table_entry_with_priority(table, matches, action, params, 0)
    }

    pub fn build_table_entry_with_priority<K, P>(
        &self,
        table: &str,
        matches: &[(K, MatchInput)],
        action: &str,
        params: &[(P, Value)],
        priority: i32,
    ) -> CatalogResult<TableEntry>
    where
        K: AsRef<str>,
        P: AsRef<str>,
    {
        let table = self.table(table)?;
        let matches = build_matches(table, matches)?;

        let action_info = self.action(action)?;
        if !table.permits(action_info.id) {
            return Err(ShapeError::ActionNotPermitted {
                table: table.name.clone(),
                action: action_info.name.clone(),
            }
            .into());
        }

        let supplied = index_keys(&action_info.name, params)?;
        if let Some((name, _)) = params
            .iter()
            .find(|(name, _)| action_info.param(name.as_ref()).is_none())
        {
            return Err(ShapeError::UnknownParam {
                action: action_info.name.clone(),
                param: name.as_ref().to_string(),
            }
            .into());
        }

        let mut built = Vec::with_capacity(action_info.params.len());
        for param in &action_info.params {
            let value = supplied.get(param.name.as_str()).ok_or_else(|| ShapeError::MissingParam {
                action: action_info.name.clone(),
                param: param.name.clone(),
            })?;
            let bytes = value.encode(param.bitwidth).map_err(|bits| ShapeError::ValueTooWide {
                name: format!("{}.{}", action_info.name, param.name),
                bits,
                width: param.bitwidth,
            })?;
            built.push(ActionParam {
                param_id: param.id,
                value: bytes,
            });
        }

        Ok(TableEntry {
            table_id: table.id,
            matches,
            action: ActionCall {
                action_id: action_info.id,
                params: built,
            },
            priority,
        })
    }

    /// Starts a fluent builder for an entry of `table`.
    ///
    /// ```
    /// use p4ctl_catalog::{Catalog, MatchKind};
    /// use std::net::Ipv4Addr;
    ///
    /// let catalog = Catalog::builder()
    ///     .table(1, "MyIngress.ipv4_lpm", |t| {
    ///         t.match_field(1, "hdr.ipv4.dstAddr", MatchKind::Lpm, 32).action(10)
    ///     })
    ///     .action(10, "MyIngress.ipv4_forward", |a| a.param(1, "dstAddr", 48).param(2, "port", 9))
    ///     .build()
    ///     .unwrap();
    ///
    /// let entry = catalog
    ///     .entry("MyIngress.ipv4_lpm")
    ///     .lpm("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1), 32)
    ///     .action("MyIngress.ipv4_forward")
    ///     .param("dstAddr", "08:00:00:00:01:01".parse::<p4ctl_types::MacAddress>().unwrap())
    ///     .param("port", 2u32)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(entry.action.params.len(), 2);
    /// ```
    pub fn entry<'c>(&'c self, table: &str) -> EntryBuilder<'c> {
        EntryBuilder {
            catalog: self,
            table: table.to_string(),
            matches: Vec::new(),
            action: String::new(),
            params: Vec::new(),
            priority: 0,
        }
    }
}

fn build_matches<K: AsRef<str>>(
    table: &TableInfo,
    matches: &[(K, MatchInput)],
) -> CatalogResult<Vec<FieldMatch>> {
    let supplied = index_keys(&table.name, matches)?;
    if let Some((name, _)) = matches
        .iter()
        .find(|(name, _)| table.match_field(name.as_ref()).is_none())
    {
        return Err(ShapeError::UnknownMatchField {
            table: table.name.clone(),
            field: name.as_ref().to_string(),
        }
        .into());
    }

    let mut built = Vec::with_capacity(table.match_fields.len());
    for field in &table.match_fields {
        let Some(input) = supplied.get(field.name.as_str()) else {
            if field.kind.is_wildcardable() {
                continue;
            }
            return Err(ShapeError::MissingMatchField {
                table: table.name.clone(),
                field: field.name.clone(),
            }
            .into());
        };

        let shape = |supplied: MatchKind| -> CatalogError {
            ShapeError::MatchKindMismatch {
                table: table.name.clone(),
                field: field.name.clone(),
                expected: field.kind,
                supplied,
            }
            .into()
        };
        let too_wide = |bits: u32| ShapeError::ValueTooWide {
            name: field.name.clone(),
            bits,
            width: field.bitwidth,
        };

        let value = match (field.kind, input) {
            (MatchKind::Exact, MatchInput::Exact(value)) => MatchValue::Exact {
                value: value.encode(field.bitwidth).map_err(too_wide)?,
            },
            (MatchKind::Lpm, MatchInput::Lpm(value, prefix_len)) => {
                if *prefix_len > field.bitwidth {
                    return Err(ShapeError::PrefixTooLong {
                        field: field.name.clone(),
                        prefix_len: *prefix_len,
                        width: field.bitwidth,
                    }
                    .into());
                }
                MatchValue::Lpm {
                    value: value.encode(field.bitwidth).map_err(too_wide)?,
                    prefix_len: *prefix_len,
                }
            }
            (MatchKind::Exact, MatchInput::Lpm(..)) => return Err(shape(MatchKind::Lpm)),
            (MatchKind::Lpm, MatchInput::Exact(_)) => return Err(shape(MatchKind::Exact)),
            (kind, _) => {
                return Err(ShapeError::UnsupportedMatchKind {
                    table: table.name.clone(),
                    field: field.name.clone(),
                    kind,
                }
                .into())
            }
        };
        built.push(FieldMatch {
            field_id: field.id,
            value,
        });
    }
    Ok(built)
}

/// Indexes a caller mapping by key, rejecting repeated keys.
fn index_keys<'a, K: AsRef<str>, V>(
    owner: &str,
    pairs: &'a [(K, V)],
) -> Result<HashMap<&'a str, &'a V>, ShapeError> {
    let mut map = HashMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        if map.insert(key.as_ref(), value).is_some() {
            return Err(ShapeError::DuplicateKey {
                owner: owner.to_string(),
                key: key.as_ref().to_string(),
            });
        }
    }
    Ok(map)
}

/// Fluent form of [`Catalog::build_table_entry`]. Nothing is checked until
/// [`build`](EntryBuilder::build).
#[derive(Debug, Clone)]
pub struct EntryBuilder<'c> {
    catalog: &'c Catalog,
    table: String,
    matches: Vec<(String, MatchInput)>,
    action: String,
    params: Vec<(String, Value)>,
    priority: i32,
}

impl<'c> EntryBuilder<'c> {
    pub fn exact(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.matches.push((field.to_string(), MatchInput::exact(value)));
        self
    }

    pub fn lpm(mut self, field: &str, value: impl Into<Value>, prefix_len: u32) -> Self {
        self.matches
            .push((field.to_string(), MatchInput::lpm(value, prefix_len)));
        self
    }

    pub fn with_match(mut self, field: &str, input: impl Into<MatchInput>) -> Self {
        self.matches.push((field.to_string(), input.into()));
        self
    }

    pub fn action(mut self, action: &str) -> Self {
        self.action = action.to_string();
        self
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn build(self) -> CatalogResult<TableEntry> {
        self.catalog.build_table_entry_with_priority(
            &self.table,
            &self.matches,
            &self.action,
            &self.params,
            self.priority,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ActionId, MatchFieldId, ParamId, TableId};
    use p4ctl_types::MacAddress;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    fn catalog() -> Catalog {
        Catalog::builder()
            .table(37375156, "MyIngress.ipv4_lpm", |t| {
                t.match_field(1, "hdr.ipv4.dstAddr", MatchKind::Lpm, 32)
                    .action(28792405)
                    .default_only_action(25652968)
            })
            .table(40, "MyIngress.myTunnel_exact", |t| {
                t.match_field(1, "hdr.myTunnel.dst_id", MatchKind::Exact, 16)
                    .action(41)
            })
            .table(50, "MyIngress.acl", |t| {
                t.match_field(1, "hdr.ethernet.etherType", MatchKind::Exact, 16)
                    .match_field(2, "hdr.ipv4.srcAddr", MatchKind::Ternary, 32)
                    .action(41)
            })
            .action(28792405, "MyIngress.ipv4_forward", |a| {
                a.param(1, "dstAddr", 48).param(2, "port", 9)
            })
            .action(25652968, "MyIngress.drop", |a| a)
            .action(41, "MyIngress.myTunnel_forward", |a| a.param(1, "port", 9))
            .build()
            .unwrap()
    }

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_ipv4_forward_entry() {
        let catalog = catalog();
        let entry = catalog
            .build_table_entry(
                "MyIngress.ipv4_lpm",
                &[("hdr.ipv4.dstAddr", MatchInput::lpm(Ipv4Addr::new(10, 0, 1, 1), 32))],
                "MyIngress.ipv4_forward",
                &[
                    ("dstAddr", Value::from(mac("08:00:00:00:01:01"))),
                    ("port", Value::from(2u32)),
                ],
            )
            .unwrap();

        assert_eq!(
            entry,
            TableEntry {
                table_id: TableId::from_raw(37375156),
                matches: vec![FieldMatch {
                    field_id: MatchFieldId::from_raw(1),
                    value: MatchValue::Lpm {
                        value: vec![10, 0, 1, 1],
                        prefix_len: 32,
                    },
                }],
                action: ActionCall {
                    action_id: ActionId::from_raw(28792405),
                    params: vec![
                        ActionParam {
                            param_id: ParamId::from_raw(1),
                            value: vec![8, 0, 0, 0, 1, 1],
                        },
                        ActionParam {
                            param_id: ParamId::from_raw(2),
                            value: vec![0, 2],
                        },
                    ],
                },
                priority: 0,
            }
        );
    }

    #[test]
    fn test_unknown_action_is_not_found() {
        let err = catalog()
            .entry("MyIngress.ipv4_lpm")
            .lpm("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1), 32)
            .action("MyIngress.ipv4_forward_v2")
            .param("dstAddr", mac("08:00:00:00:01:01"))
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unknown_table_is_not_found() {
        let err = catalog().entry("MyIngress.nope").build().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_match_kind_mismatch() {
        let catalog = catalog();
        let err = catalog
            .entry("MyIngress.myTunnel_exact")
            .lpm("hdr.myTunnel.dst_id", 100u32, 16)
            .action("MyIngress.myTunnel_forward")
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Shape(ShapeError::MatchKindMismatch {
                expected: MatchKind::Exact,
                supplied: MatchKind::Lpm,
                ..
            })
        ));

        let err = catalog
            .entry("MyIngress.ipv4_lpm")
            .exact("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1))
            .action("MyIngress.ipv4_forward")
            .param("dstAddr", mac("08:00:00:00:01:01"))
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Shape(ShapeError::MatchKindMismatch {
                expected: MatchKind::Lpm,
                supplied: MatchKind::Exact,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_exact_field() {
        let err = catalog()
            .entry("MyIngress.myTunnel_exact")
            .action("MyIngress.myTunnel_forward")
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Shape(ShapeError::MissingMatchField { .. })
        ));
    }

    #[test]
    fn test_lpm_and_ternary_fields_may_be_omitted() {
        let catalog = catalog();
        let entry = catalog
            .entry("MyIngress.ipv4_lpm")
            .action("MyIngress.ipv4_forward")
            .param("dstAddr", mac("08:00:00:00:01:01"))
            .param("port", 2u32)
            .build()
            .unwrap();
        assert!(entry.matches.is_empty());

        let entry = catalog
            .entry("MyIngress.acl")
            .exact("hdr.ethernet.etherType", 0x0800u32)
            .action("MyIngress.myTunnel_forward")
            .param("port", 2u32)
            .build()
            .unwrap();
        assert_eq!(entry.matches.len(), 1);
    }

    #[test]
    fn test_ternary_input_cannot_be_supplied() {
        let err = catalog()
            .entry("MyIngress.acl")
            .exact("hdr.ethernet.etherType", 0x0800u32)
            .exact("hdr.ipv4.srcAddr", Ipv4Addr::new(10, 0, 0, 1))
            .action("MyIngress.myTunnel_forward")
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Shape(ShapeError::UnsupportedMatchKind {
                kind: MatchKind::Ternary,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_field_and_params() {
        let catalog = catalog();
        let err = catalog
            .entry("MyIngress.myTunnel_exact")
            .exact("hdr.myTunnel.dst_id", 100u32)
            .exact("hdr.myTunnel.proto_id", 1u32)
            .action("MyIngress.myTunnel_forward")
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Shape(ShapeError::UnknownMatchField { .. })));

        let err = catalog
            .entry("MyIngress.myTunnel_exact")
            .exact("hdr.myTunnel.dst_id", 100u32)
            .action("MyIngress.myTunnel_forward")
            .param("port", 2u32)
            .param("vlan", 10u32)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Shape(ShapeError::UnknownParam { .. })));

        let err = catalog
            .entry("MyIngress.ipv4_lpm")
            .lpm("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1), 32)
            .action("MyIngress.ipv4_forward")
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Shape(ShapeError::MissingParam { .. })));
    }

    #[test]
    fn test_duplicate_keys() {
        let err = catalog()
            .entry("MyIngress.myTunnel_exact")
            .exact("hdr.myTunnel.dst_id", 100u32)
            .exact("hdr.myTunnel.dst_id", 101u32)
            .action("MyIngress.myTunnel_forward")
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Shape(ShapeError::DuplicateKey { .. })));
    }

    #[test]
    fn test_action_scope() {
        let err = catalog()
            .entry("MyIngress.ipv4_lpm")
            .lpm("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1), 32)
            .action("MyIngress.drop")
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Shape(ShapeError::ActionNotPermitted { .. })));

        let err = catalog()
            .entry("MyIngress.myTunnel_exact")
            .exact("hdr.myTunnel.dst_id", 100u32)
            .action("MyIngress.ipv4_forward")
            .param("dstAddr", mac("08:00:00:00:01:01"))
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Shape(ShapeError::ActionNotPermitted { .. })));
    }

    #[test]
    fn test_width_checks() {
        let catalog = catalog();
        let err = catalog
            .entry("MyIngress.myTunnel_exact")
            .exact("hdr.myTunnel.dst_id", 100u32)
            .action("MyIngress.myTunnel_forward")
            .param("port", 512u32)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Shape(ShapeError::ValueTooWide { bits: 10, width: 9, .. })
        ));

        let err = catalog
            .entry("MyIngress.ipv4_lpm")
            .lpm("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1), 33)
            .action("MyIngress.ipv4_forward")
            .param("dstAddr", mac("08:00:00:00:01:01"))
            .param("port", 2u32)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Shape(ShapeError::PrefixTooLong { prefix_len: 33, .. })
        ));
    }

    #[test]
    fn test_order_follows_declaration() {
        let catalog = catalog();
        let forward = catalog
            .build_table_entry(
                "ipv4_lpm",
                &[("hdr.ipv4.dstAddr", MatchInput::lpm(Ipv4Addr::new(10, 0, 2, 2), 32))],
                "ipv4_forward",
                &[
                    ("port", Value::from(3u32)),
                    ("dstAddr", Value::from(mac("08:00:00:00:02:22"))),
                ],
            )
            .unwrap();
        let params: Vec<u32> = forward
            .action
            .params
            .iter()
            .map(|p| p.param_id.as_raw())
            .collect();
        assert_eq!(params, vec![1, 2]);
    }

    #[test]
    fn test_repeated_builds_are_equal() {
        let catalog = catalog();
        let build = || {
            catalog
                .entry("MyIngress.myTunnel_exact")
                .exact("hdr.myTunnel.dst_id", 100u32)
                .action("MyIngress.myTunnel_forward")
                .param("port", 2u32)
                .build()
                .unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_names_roundtrip_through_ids() {
        let catalog = catalog();
        let entry = catalog
            .entry("ipv4_lpm")
            .lpm("hdr.ipv4.dstAddr", Ipv4Addr::new(10, 0, 1, 1), 32)
            .action("ipv4_forward")
            .param("dstAddr", mac("08:00:00:00:01:01"))
            .param("port", 2u32)
            .build()
            .unwrap();
        assert_eq!(catalog.table_name(entry.table_id), Some("MyIngress.ipv4_lpm"));
        assert_eq!(
            catalog.match_field_name(entry.table_id, entry.matches[0].field_id),
            Some("hdr.ipv4.dstAddr")
        );
        assert_eq!(catalog.action_name(entry.action.action_id), Some("MyIngress.ipv4_forward"));
        let names: Vec<&str> = entry
            .action
            .params
            .iter()
            .filter_map(|p| catalog.action_param_name(entry.action.action_id, p.param_id))
            .collect();
        assert_eq!(names, vec!["dstAddr", "port"]);
    }
}
