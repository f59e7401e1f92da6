//! Type-safe P4 entity identifiers.
//!
//! P4Info assigns every table, action, match field, action parameter and
//! counter a 32-bit id. Match-field and parameter ids are only unique within
//! their owning table or action, and the global ids of different kinds live
//! in different ranges. Wrapping them in distinct types keeps a table id from
//! being passed where an action id is expected.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw id as carried on the wire.
pub type RawId = u32;

/// Marker trait for the kinds of P4 entities that carry an id.
pub trait EntityKind: Send + Sync + 'static {
    /// Human-readable kind, used in error messages ("table", "action", ...).
    fn kind_name() -> &'static str;
}

/// An id of a P4 entity of kind `K`.
///
/// ```
/// use p4ctl_catalog::{ActionId, TableId};
///
/// let table = TableId::from_raw(37375156);
/// let action = ActionId::from_raw(28792405);
/// assert_eq!(table.as_raw(), 37375156);
/// // fn takes_table(t: TableId) {}
/// // takes_table(action); // does not compile
/// # let _ = action;
/// ```
pub struct P4Id<K: EntityKind> {
    raw: RawId,
    _marker: PhantomData<K>,
}

impl<K: EntityKind> P4Id<K> {
    pub const fn from_raw(raw: RawId) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn as_raw(&self) -> RawId {
        self.raw
    }
}

// Manual impls so that `K` itself needs none of these traits.
impl<K: EntityKind> Clone for P4Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: EntityKind> Copy for P4Id<K> {}

impl<K: EntityKind> fmt::Debug for P4Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::kind_name(), self.raw)
    }
}

impl<K: EntityKind> fmt::Display for P4Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<K: EntityKind> PartialEq for P4Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: EntityKind> Eq for P4Id<K> {}

impl<K: EntityKind> PartialOrd for P4Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: EntityKind> Ord for P4Id<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<K: EntityKind> Hash for P4Id<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

macro_rules! define_entity_kind {
    ($name:ident, $kind_name:literal, $id_alias:ident) => {
        #[doc = concat!("Marker type for ", $kind_name, " ids.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl EntityKind for $name {
            fn kind_name() -> &'static str {
                $kind_name
            }
        }

        #[doc = concat!("Id of a ", $kind_name, ".")]
        pub type $id_alias = P4Id<$name>;
    };
}

define_entity_kind!(TableKind, "table", TableId);
define_entity_kind!(ActionKind, "action", ActionId);
define_entity_kind!(MatchFieldKind, "match field", MatchFieldId);
define_entity_kind!(ParamKind, "action parameter", ParamId);
define_entity_kind!(CounterKind, "counter", CounterId);
