//! Purpose: Library behind the `wtscope` CLI and its integration tests.
//! Exports: `api` (session, catalog, reports, dumps, exports, errors) and `notice`.
//! Role: Storage-catalog introspection over an explicit engine session.
//! Invariants: Nothing holds ambient connection state; every call takes a `&Session`.
//! Invariants: Inspection never writes engine state outside test fixtures.
pub mod api;
mod core;
pub mod notice;
