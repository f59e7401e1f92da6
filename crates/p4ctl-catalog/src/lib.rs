//! Pipeline catalog and table entry construction.
//!
//! A [`Catalog`] indexes a P4Info descriptor so that tables, actions, match
//! fields, action parameters and counters can be addressed by name. Entries
//! are built against it with [`Catalog::build_table_entry`] or the fluent
//! [`EntryBuilder`]; the result is a self-contained [`TableEntry`] carrying
//! only ids and encoded bytes.
//!
//! ```
//! use p4ctl_catalog::{Catalog, MatchInput, MatchKind, Value};
//! use std::net::Ipv4Addr;
//!
//! let catalog = Catalog::builder()
//!     .table(1, "MyIngress.ipv4_lpm", |t| {
//!         t.match_field(1, "hdr.ipv4.dstAddr", MatchKind::Lpm, 32).action(10)
//!     })
//!     .action(10, "MyIngress.ipv4_forward", |a| a.param(1, "dstAddr", 48).param(2, "port", 9))
//!     .build()
//!     .unwrap();
//!
//! let entry = catalog
//!     .build_table_entry(
//!         "MyIngress.ipv4_lpm",
//!         &[("hdr.ipv4.dstAddr", MatchInput::lpm(Ipv4Addr::new(10, 0, 1, 1), 32))],
//!         "MyIngress.ipv4_forward",
//!         &[("dstAddr", "08:00:00:00:01:01".parse::<Value>().unwrap()), ("port", Value::from(2u32))],
//!     )
//!     .unwrap();
//! assert_eq!(catalog.table_name(entry.table_id), Some("MyIngress.ipv4_lpm"));
//! ```

mod builder;
mod catalog;
pub mod descriptor;
mod entry;
mod error;
mod ids;
mod value;

pub use builder::EntryBuilder;
pub use catalog::{
    ActionBuilder, ActionInfo, ActionRefInfo, ActionScope, Catalog, CatalogBuilder, CounterInfo,
    MatchFieldInfo, MatchKind, ParamInfo, TableBuilder, TableInfo, ValueFormat,
};
pub use descriptor::DescriptorFormat;
pub use entry::{ActionCall, ActionParam, FieldMatch, MatchValue, TableEntry};
pub use error::{CatalogError, CatalogResult, DescriptorError, ShapeError};
pub use ids::{
    ActionId, ActionKind, CounterId, CounterKind, EntityKind, MatchFieldId, MatchFieldKind, P4Id,
    ParamId, ParamKind, RawId, TableId, TableKind,
};
pub use value::{MatchInput, ParseValueError, Value};
