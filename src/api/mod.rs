//! Purpose: Define the stable public Rust API boundary for Rowpack.
//! Exports: Query client, response envelope, tabular model, and flattening.
//! Role: Public, additive-only surface; hides internal module layout.
//! Invariants: This module is the only public path to the pipeline primitives.

mod client;
mod response;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::flatten::{
    FIELD_SEPARATOR, FlattenError, FlattenedString, PAYLOAD_BYTE_CEILING, SEPARATOR_ESCAPE,
    cell_payload, flatten,
};
pub use crate::core::table::{ResultSet, TableError, Value};
pub use client::{DEFAULT_METHOD, DEFAULT_TIMEOUT_MS, QueryClient, QueryConfig};
pub use response::QueryResponse;
