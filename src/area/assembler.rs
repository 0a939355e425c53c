use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::Buffer;
use crate::errors::{CollectorError, Result};
use crate::types::{Area, Item, Relation, Ring, Way, NO_REF};

/// Turns collected ways into areas.
///
/// An assembler is constructed fresh for every way or relation it handles.
/// Both entry points append zero or more committed `Area` items to `out`.
pub trait Assembler {
    /// Opaque configuration passed unchanged to every assembler.
    type Config: Clone;

    fn new(config: &Self::Config) -> Self;

    /// Builds an area from a single closed way.
    fn assemble_way(&mut self, way: &Way, out: &mut Buffer) -> Result<()>;

    /// Builds an area from a relation.
    ///
    /// `member_offsets` are the offsets in `members` of the relation's
    /// members whose ref is not `NO_REF`, in member order.
    fn assemble_relation(
        &mut self,
        relation: &Relation,
        member_offsets: &[usize],
        members: &Buffer,
        out: &mut Buffer,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Keep the relation's `type` tag on the assembled area.
    pub keep_type_tag: bool,
    /// Log every skipped member way.
    pub debug: bool,
}

/// Simple assembler that turns every closed member way into one ring.
///
/// Ways with role `inner` become inner rings, all others outer rings. Open
/// ways are skipped since joining them into rings is beyond this assembler.
#[derive(Debug, Clone)]
pub struct RoleAssembler {
    config: AssemblerConfig,
}

impl Assembler for RoleAssembler {
    type Config = AssemblerConfig;

    fn new(config: &AssemblerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn assemble_way(&mut self, way: &Way, out: &mut Buffer) -> Result<()> {
        if !way.ends_have_same_location() {
            return Ok(());
        }

        let area = Area {
            id: Area::id_from_way(way.id)?,
            tags: way.tags.clone(),
            outer_rings: vec![Ring {
                nodes: way.nodes.clone(),
            }],
            inner_rings: Vec::new(),
        };
        out.append(&Item::Area(area))?;
        out.commit();
        Ok(())
    }

    fn assemble_relation(
        &mut self,
        relation: &Relation,
        member_offsets: &[usize],
        members: &Buffer,
        out: &mut Buffer,
    ) -> Result<()> {
        let referenced: Vec<_> = relation
            .members
            .iter()
            .filter(|m| m.member_ref != NO_REF)
            .collect();
        if referenced.len() != member_offsets.len() {
            return Err(CollectorError::Assembler {
                message: format!(
                    "{} member offsets for {} referenced members",
                    member_offsets.len(),
                    referenced.len()
                ),
                object_id: relation.id,
            });
        }

        let mut outer_rings = Vec::new();
        let mut inner_rings = Vec::new();

        for (member, &offset) in referenced.iter().zip(member_offsets) {
            let way = match members.get(offset)? {
                Item::Way(way) => way,
                other => {
                    return Err(CollectorError::Assembler {
                        message: format!(
                            "member {} is a {}, expected a way",
                            member.member_ref,
                            other.item_type().as_str()
                        ),
                        object_id: relation.id,
                    })
                }
            };

            if !way.ends_have_same_location() {
                if self.config.debug {
                    debug!(relation_id = relation.id, way_id = way.id, "skipping open way");
                }
                continue;
            }

            let ring = Ring { nodes: way.nodes };
            if member.role == "inner" {
                inner_rings.push(ring);
            } else {
                outer_rings.push(ring);
            }
        }

        if outer_rings.is_empty() {
            debug!(relation_id = relation.id, "no outer ring, area not built");
            return Ok(());
        }

        let tags = if self.config.keep_type_tag {
            relation.tags.clone()
        } else {
            relation.tags.without_key("type")
        };

        let area = Area {
            id: Area::id_from_relation(relation.id)?,
            tags,
            outer_rings,
            inner_rings,
        };
        out.append(&Item::Area(area))?;
        out.commit();
        Ok(())
    }
}
