//! # Typed CRUD Surface
//!
//! Topic, association and type operations, each available twice:
//! on [`crate::CoreTx`] for use inside an explicit transaction, and on
//! [`crate::TopicGraph`] where every call is its own transaction.
//!
//! These are the operations that check access, fire [`crate::CoreEvent`]s
//! and keep the type cache in step with the graph.

mod associations;
mod properties;
mod topics;
mod types;
