//! # Schema Engine
//!
//! How a type is composed from other types:
//!
//! - `definitions`: association definitions, the fields of composite types
//! - `sequence`: the field order, kept as a tagged chain of edges
//! - `composite`: reading and writing composite values through child topics
//!
//! Everything here is `impl CoreTx` and runs inside the caller's transaction.

mod composite;
mod definitions;
mod sequence;
