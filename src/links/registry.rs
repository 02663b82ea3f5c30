//! Link reconciliation
//!
//! Two-way relations are declared independently on each side. Setup pairs
//! every such declaration with its mirror on the target resource and
//! produces an immutable [`Topology`] that the runtime engine trusts without
//! further structural checks.

use crate::core::error::{DeclarationError, DeclarationRule};
use crate::core::link::LinkDeclaration;
use crate::core::resource::ResourceDeclaration;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Identity of a link: (declaring resource, link name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkId {
    pub resource: String,
    pub link: String,
}

impl LinkId {
    pub fn new(resource: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            link: link.into(),
        }
    }
}

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource, self.link)
    }
}

/// A reconciled link: its declaration and the id of its mirror
#[derive(Debug)]
pub struct LinkNode {
    pub(crate) id: LinkId,
    pub(crate) declaration: LinkDeclaration,
    pub(crate) mirror: Option<LinkId>,
}

impl LinkNode {
    pub fn id(&self) -> &LinkId {
        &self.id
    }

    pub fn declaration(&self) -> &LinkDeclaration {
        &self.declaration
    }

    pub fn mirror_id(&self) -> Option<&LinkId> {
        self.mirror.as_ref()
    }
}

/// A registered resource and its reconciled links
#[derive(Debug)]
pub struct ResourceNode {
    pub(crate) declaration: ResourceDeclaration,
    pub(crate) links: IndexMap<String, Arc<LinkNode>>,
}

impl ResourceNode {
    pub fn declaration(&self) -> &ResourceDeclaration {
        &self.declaration
    }

    pub fn name(&self) -> &str {
        self.declaration.name()
    }

    pub fn link(&self, name: &str) -> Option<&Arc<LinkNode>> {
        self.links.get(name)
    }

    pub fn links(&self) -> impl Iterator<Item = &Arc<LinkNode>> {
        self.links.values()
    }
}

/// Mirror pairs discovered during reconciliation
///
/// Wiring a pair that is already wired together is a no-op; wiring a link
/// that is already paired elsewhere is an error.
#[derive(Debug, Default)]
pub struct Wiring {
    pairs: HashMap<LinkId, LinkId>,
}

impl Wiring {
    /// Returns false when the pair was already wired
    pub fn wire(&mut self, a: &LinkId, b: &LinkId) -> Result<bool, DeclarationError> {
        match (self.pairs.get(a), self.pairs.get(b)) {
            (Some(x), Some(y)) if x == b && y == a => Ok(false),
            (None, None) => {
                self.pairs.insert(a.clone(), b.clone());
                self.pairs.insert(b.clone(), a.clone());
                Ok(true)
            }
            _ => Err(DeclarationError::invalid(
                a.to_string(),
                DeclarationRule::MirrorMismatch,
                format!("link is already paired with another link than {b}"),
            )),
        }
    }

    pub fn is_wired(&self, id: &LinkId) -> bool {
        self.pairs.contains_key(id)
    }

    pub fn mirror_of(&self, id: &LinkId) -> Option<&LinkId> {
        self.pairs.get(id)
    }
}

/// Immutable, fully cross-linked metamodel
#[derive(Debug)]
pub struct Topology {
    resources: IndexMap<String, Arc<ResourceNode>>,
}

impl Topology {
    /// Validate every link and pair two-way links with their mirrors
    pub fn reconcile(
        declarations: &IndexMap<String, ResourceDeclaration>,
    ) -> Result<Self, DeclarationError> {
        let mut wiring = Wiring::default();

        for (resource, declaration) in declarations {
            for link in declaration.links() {
                let id = LinkId::new(resource, link.name());
                link.validate_local()?;

                let Some(target) = declarations.get(link.target()) else {
                    return Err(DeclarationError::invalid(
                        id.to_string(),
                        DeclarationRule::UnknownTarget,
                        format!("target resource '{}' is not registered", link.target()),
                    ));
                };

                if link.is_one_way() || wiring.is_wired(&id) {
                    continue;
                }

                let related = link.related().unwrap_or_default();
                let Some(mirror) = target.get_link(related) else {
                    return Err(DeclarationError::invalid(
                        id.to_string(),
                        DeclarationRule::MissingMirror,
                        format!("Related link undefined: {}:{related}", link.target()),
                    ));
                };
                let mirror_id = LinkId::new(link.target(), related);

                if mirror.target() != resource.as_str() || mirror.related() != Some(link.name()) {
                    return Err(DeclarationError::invalid(
                        id.to_string(),
                        DeclarationRule::MirrorMismatch,
                        format!("related link {mirror_id} does not point back at this link"),
                    ));
                }
                match (link.is_master(), mirror.is_master()) {
                    (true, true) => {
                        return Err(DeclarationError::invalid(
                            id.to_string(),
                            DeclarationRule::BothMaster,
                            "this and related link cannot be master ones at the same time",
                        ));
                    }
                    (false, false) => {
                        return Err(DeclarationError::invalid(
                            id.to_string(),
                            DeclarationRule::NoMaster,
                            "this or related link must be a master one",
                        ));
                    }
                    _ => {}
                }

                if wiring.wire(&id, &mirror_id)? {
                    tracing::debug!(link = %id, mirror = %mirror_id, "wired link pair");
                }
            }
        }

        let resources = declarations
            .iter()
            .map(|(name, declaration)| {
                let links = declaration
                    .links()
                    .map(|link| {
                        let id = LinkId::new(name, link.name());
                        let node = LinkNode {
                            mirror: wiring.mirror_of(&id).cloned(),
                            declaration: link.clone(),
                            id,
                        };
                        (link.name().to_string(), Arc::new(node))
                    })
                    .collect();
                let node = ResourceNode {
                    declaration: declaration.clone(),
                    links,
                };
                (name.clone(), Arc::new(node))
            })
            .collect();

        Ok(Self { resources })
    }

    pub fn resource(&self, name: &str) -> Option<&Arc<ResourceNode>> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<ResourceNode>> {
        self.resources.values()
    }

    pub fn link(&self, id: &LinkId) -> Option<&Arc<LinkNode>> {
        self.resources.get(&id.resource)?.links.get(&id.link)
    }

    /// The other side of a two-way link
    pub fn mirror(&self, link: &LinkNode) -> Option<&Arc<LinkNode>> {
        link.mirror.as_ref().and_then(|id| self.link(id))
    }
}
