//! Field order of a type, kept as a linked chain of edges.
//!
//! ```text
//!  type ──SEQUENCE_START──▶ def₁ ──SEQUENCE──▶ def₂ ──SEQUENCE──▶ def₃
//! ```
//!
//! Every chain edge carries the owning type's URI in its `type_uri` tag and
//! is only followed when the tag matches, so chains of different types never
//! mix even where they touch the same element.

use hashbrown::HashSet;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::tx::CoreTx;
use crate::{Error, Result};

/// A walked chain: definition edges in order, plus the chain edges linking
/// them (start edge first).
#[derive(Debug, Default)]
pub(crate) struct Chain {
    pub defs: Vec<EdgeId>,
    pub links: Vec<EdgeId>,
}

impl<B: StorageBackend> CoreTx<'_, B> {
    /// The chain edge of `kind` where `player` plays `role`, tagged `type_uri`.
    fn chain_edge(
        &self,
        player: ElementRef,
        role: &str,
        kind: MetaEdge,
        type_uri: &str,
    ) -> Result<Option<EdgeRecord>> {
        let mut hits = self
            .incident_edges(player, Some(role))?
            .into_iter()
            .filter(|e| e.meta_kind() == Some(kind) && e.tag() == Some(type_uri));
        match (hits.next(), hits.next()) {
            (None, _) => Ok(None),
            (Some(edge), None) => Ok(Some(edge)),
            (Some(_), Some(_)) => Err(Error::Inconsistency(format!(
                "{player} has more than one {kind:?} edge of type \"{type_uri}\""
            ))),
        }
    }

    fn linked_def(edge: &EdgeRecord, role: &str) -> Result<EdgeId> {
        edge.player(role)
            .and_then(|p| p.as_edge())
            .ok_or_else(|| Error::Inconsistency(format!("sequence edge {} has no \"{role}\" edge", edge.id)))
    }

    /// Walk the chain of `type_uri` starting at its type node.
    pub(crate) fn walk_chain(&self, type_node: NodeId, type_uri: &str) -> Result<Chain> {
        let mut chain = Chain::default();
        let Some(start) = self.chain_edge(
            ElementRef::Node(type_node),
            uri::SEQUENCE_OWNER_ROLE,
            MetaEdge::SequenceStart,
            type_uri,
        )?
        else {
            return Ok(chain);
        };

        let mut visited = HashSet::new();
        let mut current = Self::linked_def(&start, uri::SEQUENCE_HEAD_ROLE)?;
        chain.links.push(start.id);
        loop {
            if !visited.insert(current) {
                return Err(Error::Inconsistency(format!(
                    "field sequence of type \"{type_uri}\" has a cycle at edge {current}"
                )));
            }
            chain.defs.push(current);
            let next = self.chain_edge(
                ElementRef::Edge(current),
                uri::PREDECESSOR_ROLE,
                MetaEdge::Sequence,
                type_uri,
            )?;
            match next {
                Some(link) => {
                    current = Self::linked_def(&link, uri::SUCCESSOR_ROLE)?;
                    chain.links.push(link.id);
                }
                None => break,
            }
        }
        Ok(chain)
    }

    /// Definition edges of `type_uri` in field order.
    pub fn field_sequence(&self, type_node: NodeId, type_uri: &str) -> Result<Vec<EdgeId>> {
        Ok(self.walk_chain(type_node, type_uri)?.defs)
    }

    fn create_chain_edge(&mut self, roles: [Role; 2], type_uri: &str) -> Result<EdgeId> {
        let props = props([(uri::SEQUENCE_TAG, type_uri)]);
        self.create_edge(roles.into_iter().collect(), props)
    }

    fn start_chain(&mut self, type_node: NodeId, head: EdgeId, type_uri: &str) -> Result<EdgeId> {
        self.create_chain_edge(
            [Role::new(type_node, uri::SEQUENCE_OWNER_ROLE), Role::new(head, uri::SEQUENCE_HEAD_ROLE)],
            type_uri,
        )
    }

    fn link_chain(&mut self, predecessor: EdgeId, successor: EdgeId, type_uri: &str) -> Result<EdgeId> {
        self.create_chain_edge(
            [Role::new(predecessor, uri::PREDECESSOR_ROLE), Role::new(successor, uri::SUCCESSOR_ROLE)],
            type_uri,
        )
    }

    /// Append `def` to the end of the chain.
    pub(crate) fn append_to_sequence(&mut self, type_node: NodeId, type_uri: &str, def: EdgeId) -> Result<()> {
        match self.field_sequence(type_node, type_uri)?.last() {
            Some(&last) => self.link_chain(last, def, type_uri)?,
            None => self.start_chain(type_node, def, type_uri)?,
        };
        Ok(())
    }

    /// Take `def` out of the chain, joining its neighbours.
    pub(crate) fn remove_from_sequence(&mut self, type_node: NodeId, type_uri: &str, def: EdgeId) -> Result<()> {
        let element = ElementRef::Edge(def);
        let incoming = match self.chain_edge(element, uri::SUCCESSOR_ROLE, MetaEdge::Sequence, type_uri)? {
            Some(link) => link,
            None => self
                .chain_edge(element, uri::SEQUENCE_HEAD_ROLE, MetaEdge::SequenceStart, type_uri)?
                .ok_or_else(|| Error::Inconsistency(format!(
                    "edge {def} is not in the field sequence of type \"{type_uri}\""
                )))?,
        };
        let outgoing = self.chain_edge(element, uri::PREDECESSOR_ROLE, MetaEdge::Sequence, type_uri)?;
        let next = outgoing.as_ref().map(|link| Self::linked_def(link, uri::SUCCESSOR_ROLE)).transpose()?;

        self.delete_edge(incoming.id)?;
        if let Some(link) = &outgoing {
            self.delete_edge(link.id)?;
        }
        if let Some(next) = next {
            match incoming.meta_kind() {
                Some(MetaEdge::Sequence) => {
                    let previous = Self::linked_def(&incoming, uri::PREDECESSOR_ROLE)?;
                    self.link_chain(previous, next, type_uri)?;
                }
                _ => {
                    self.start_chain(type_node, next, type_uri)?;
                }
            }
        }
        Ok(())
    }

    /// Replace the chain with one in the given order.
    pub(crate) fn rebuild_sequence(&mut self, type_node: NodeId, type_uri: &str, defs: &[EdgeId]) -> Result<()> {
        for link in self.walk_chain(type_node, type_uri)?.links {
            self.delete_edge(link)?;
        }
        let mut previous = None;
        for &def in defs {
            match previous {
                None => self.start_chain(type_node, def, type_uri)?,
                Some(prev) => self.link_chain(prev, def, type_uri)?,
            };
            previous = Some(def);
        }
        Ok(())
    }

    /// Re-tag every chain edge of `old_uri` with `new_uri`. Returns the
    /// number of edges re-tagged.
    pub(crate) fn retag_sequence(&mut self, type_node: NodeId, old_uri: &str, new_uri: &str) -> Result<usize> {
        let links = self.walk_chain(type_node, old_uri)?.links;
        for &link in &links {
            self.set_property(ElementRef::Edge(link), uri::SEQUENCE_TAG, Value::from(new_uri), &[], "")?;
        }
        Ok(links.len())
    }
}
