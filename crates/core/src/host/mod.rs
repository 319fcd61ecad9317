//! Boundary with the managed host: integer handles, status codes, flat
//! result structs and versioned function tables. Nothing here panics or
//! returns a Rust error type across the boundary.

pub mod api;
pub mod capability_table;
pub mod result_marshaller;
pub mod status;

pub use capability_table::{capability_table, Capability, DetectEntry, FunctionTable};
