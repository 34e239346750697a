//! Purpose: Define the public Rust API boundary for wtscope.
//! Exports: Session/cursor engine types, the document codec, catalog, reports, dumps, exports.
//! Role: Public, additive-only surface; hides the table file format and record framing.
//! Invariants: This module is the only public path to core functionality.
//! Invariants: Operations take an explicit `&Session`; none open their own.

pub use crate::core::catalog::{CatalogEntries, CatalogEntry, CatalogReader};
pub use crate::core::cursor::{Record, TableCursor};
pub use crate::core::demo::demo_insert;
pub use crate::core::doc::{self, Binary, DocMap, Document, ObjectId, Timestamp};
pub use crate::core::dump::{
    DumpMode, DumpOptions, DumpSummary, PrettyRenderer, RecordOutput, dump, render_key, write_to,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::export::{
    ExportSummary, ExportedNamespace, SkipReason, SkippedNamespace, export_all, export_one,
};
pub use crate::core::extjson::{to_compact_line, to_extended_json, to_pretty_string};
pub use crate::core::layout::{Layout, table_uri};
pub use crate::core::probe::{DiskFileRef, probe};
pub use crate::core::report::{
    IndexReport, NamespaceReport, StatsBlock, Warning, is_internal_namespace, report,
};
pub use crate::core::session::{Session, SessionOptions, Transaction};
pub use crate::core::sizes::{SizeStat, SizeStore};
