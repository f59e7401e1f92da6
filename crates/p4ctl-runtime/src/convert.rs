//! Mapping between catalog entries and P4Runtime messages.

use crate::session::CounterReading;
use p4ctl_catalog::{
    ActionCall, ActionId, ActionParam, FieldMatch, MatchFieldId, MatchValue, ParamId, TableEntry,
    TableId,
};
use p4ctl_proto::p4runtime::{self as p4, field_match, table_action};

pub(crate) fn table_entry_to_proto(entry: &TableEntry) -> p4::TableEntry {
    let r#match = entry
        .matches
        .iter()
        .map(|m| p4::FieldMatch {
            field_id: m.field_id.as_raw(),
            field_match_type: Some(match &m.value {
                MatchValue::Exact { value } => field_match::FieldMatchType::Exact(field_match::Exact {
                    value: value.clone(),
                }),
                MatchValue::Lpm { value, prefix_len } => {
                    field_match::FieldMatchType::Lpm(field_match::Lpm {
                        value: value.clone(),
                        prefix_len: *prefix_len as i32,
                    })
                }
                MatchValue::Ternary { value, mask } => {
                    field_match::FieldMatchType::Ternary(field_match::Ternary {
                        value: value.clone(),
                        mask: mask.clone(),
                    })
                }
            }),
        })
        .collect();

    let action = p4::Action {
        action_id: entry.action.action_id.as_raw(),
        params: entry
            .action
            .params
            .iter()
            .map(|p| p4::action::Param {
                param_id: p.param_id.as_raw(),
                value: p.value.clone(),
            })
            .collect(),
    };

    p4::TableEntry {
        table_id: entry.table_id.as_raw(),
        r#match,
        action: Some(p4::TableAction {
            r#type: Some(table_action::Type::Action(action)),
        }),
        priority: entry.priority,
        is_default_action: false,
    }
}

pub(crate) fn table_entry_from_proto(entry: p4::TableEntry) -> Result<TableEntry, String> {
    let mut matches = Vec::with_capacity(entry.r#match.len());
    for m in entry.r#match {
        let value = match m.field_match_type {
            Some(field_match::FieldMatchType::Exact(e)) => MatchValue::Exact { value: e.value },
            Some(field_match::FieldMatchType::Lpm(l)) => MatchValue::Lpm {
                value: l.value,
                prefix_len: u32::try_from(l.prefix_len)
                    .map_err(|_| format!("negative prefix length {}", l.prefix_len))?,
            },
            Some(field_match::FieldMatchType::Ternary(t)) => MatchValue::Ternary {
                value: t.value,
                mask: t.mask,
            },
            None => return Err(format!("match on field {} has no value", m.field_id)),
        };
        matches.push(FieldMatch {
            field_id: MatchFieldId::from_raw(m.field_id),
            value,
        });
    }

    let action = match entry.action.and_then(|a| a.r#type) {
        Some(table_action::Type::Action(action)) => action,
        None => return Err(format!("entry of table {} has no direct action", entry.table_id)),
    };

    Ok(TableEntry {
        table_id: TableId::from_raw(entry.table_id),
        matches,
        action: ActionCall {
            action_id: ActionId::from_raw(action.action_id),
            params: action
                .params
                .into_iter()
                .map(|p| ActionParam {
                    param_id: ParamId::from_raw(p.param_id),
                    value: p.value,
                })
                .collect(),
        },
        priority: entry.priority,
    })
}

/// Negative counts never come from a sane device; they read as zero.
pub(crate) fn counter_reading_from_proto(entry: &p4::CounterEntry) -> CounterReading {
    let data = entry.data.clone().unwrap_or_default();
    CounterReading {
        index: entry.index.as_ref().map_or(0, |i| i.index),
        packets: u64::try_from(data.packet_count).unwrap_or(0),
        bytes: u64::try_from(data.byte_count).unwrap_or(0),
    }
}
