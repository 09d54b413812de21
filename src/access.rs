//! Access-check hook.
//!
//! The engine asks the graph's [`AccessPolicy`] before it reads or changes a
//! topic or association on a caller's behalf. Single-element operations fail
//! with `AccessDenied`; multi-element reads leave the refused elements out.
//! Creating an instance counts as writing to its type.

use std::fmt;

use crate::model::ElementRef;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}

pub trait AccessPolicy: Send + Sync {
    fn may(&self, access: Access, element: ElementRef) -> bool;
}

/// The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn may(&self, _access: Access, _element: ElementRef) -> bool {
        true
    }
}

impl<F> AccessPolicy for F
where
    F: Fn(Access, ElementRef) -> bool + Send + Sync,
{
    fn may(&self, access: Access, element: ElementRef) -> bool {
        self(access, element)
    }
}

impl<B: StorageBackend> CoreTx<'_, B> {
    pub fn may(&self, access: Access, element: ElementRef) -> bool {
        self.graph.access.may(access, element)
    }

    pub(crate) fn check_access(&self, access: Access, element: ElementRef) -> Result<()> {
        if self.may(access, element) {
            Ok(())
        } else {
            Err(Error::AccessDenied(format!("{access} access to {element}")))
        }
    }
}
