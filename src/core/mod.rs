// Core modules: engine session and table storage, document codec, catalog introspection.
pub mod catalog;
pub mod cursor;
pub mod demo;
pub mod doc;
pub mod dump;
pub mod error;
pub mod export;
pub mod extjson;
pub mod format;
pub mod frame;
pub mod layout;
pub mod probe;
pub mod report;
pub mod session;
pub mod sizes;
pub mod table;
#[cfg(test)]
pub(crate) mod testutil;
