//! Fully resolved table entries.

use crate::ids::{ActionId, MatchFieldId, ParamId, TableId};

/// A match-action rule ready for installation.
///
/// Entries only carry ids and encoded bytes; rendering them by name goes
/// through [`Catalog::describe`](crate::Catalog::describe).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableEntry {
    pub table_id: TableId,
    /// In the table's declaration order.
    pub matches: Vec<FieldMatch>,
    pub action: ActionCall,
    /// 0 for tables without ternary or range fields.
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldMatch {
    pub field_id: MatchFieldId,
    pub value: MatchValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchValue {
    Exact { value: Vec<u8> },
    Lpm { value: Vec<u8>, prefix_len: u32 },
    /// Only produced when reading entries back from a device.
    Ternary { value: Vec<u8>, mask: Vec<u8> },
}

impl MatchValue {
    pub fn value(&self) -> &[u8] {
        match self {
            MatchValue::Exact { value }
            | MatchValue::Lpm { value, .. }
            | MatchValue::Ternary { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionCall {
    pub action_id: ActionId,
    /// In the action's declaration order.
    pub params: Vec<ActionParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionParam {
    pub param_id: ParamId,
    pub value: Vec<u8>,
}

impl TableEntry {
    /// Returns the match on `field_id`, if the entry has one.
    pub fn field(&self, field_id: MatchFieldId) -> Option<&MatchValue> {
        self.matches
            .iter()
            .find(|m| m.field_id == field_id)
            .map(|m| &m.value)
    }

    /// Returns the bytes bound to `param_id`, if any.
    pub fn param(&self, param_id: ParamId) -> Option<&[u8]> {
        self.action
            .params
            .iter()
            .find(|p| p.param_id == param_id)
            .map(|p| p.value.as_slice())
    }

    /// True when both entries address the same device slot, i.e. the same
    /// table, match key and priority. A later write of a matching entry
    /// replaces the earlier one.
    pub fn same_key(&self, other: &TableEntry) -> bool {
        self.table_id == other.table_id
            && self.priority == other.priority
            && self.matches == other.matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: u8, action: u32) -> TableEntry {
        TableEntry {
            table_id: TableId::from_raw(1),
            matches: vec![FieldMatch {
                field_id: MatchFieldId::from_raw(1),
                value: MatchValue::Exact { value: vec![key] },
            }],
            action: ActionCall {
                action_id: ActionId::from_raw(action),
                params: vec![ActionParam {
                    param_id: ParamId::from_raw(1),
                    value: vec![0, 2],
                }],
            },
            priority: 0,
        }
    }

    #[test]
    fn test_same_key_ignores_action() {
        assert!(entry(1, 10).same_key(&entry(1, 20)));
        assert!(!entry(1, 10).same_key(&entry(2, 10)));
    }

    #[test]
    fn test_lookups() {
        let e = entry(7, 10);
        assert_eq!(e.field(MatchFieldId::from_raw(1)).map(MatchValue::value), Some(&[7u8][..]));
        assert_eq!(e.param(ParamId::from_raw(1)), Some(&[0u8, 2][..]));
        assert!(e.param(ParamId::from_raw(9)).is_none());
    }
}
