//! Hierarchical resource paths and discovery.
//!
//! The tree maps slash-separated paths to [`Resource`] entries. Children keep
//! insertion order, which is also the order discovery lists them in.
//! Invisible resources resolve normally but are left out of the listing.

use crate::error::ResourceError;
use crate::state::ResourceId;

/// What serves a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// A stateful resource backed by a `ResourceState`.
    State(ResourceId),
    /// The `/.well-known/core` listing.
    Discovery,
    /// The poller health report.
    Health,
}

/// A mounted resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Full path without the leading slash.
    pub path: String,
    /// Whether discovery lists this resource.
    pub visible: bool,
    /// What answers requests for it.
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, Default)]
struct Node {
    segment: String,
    resource: Option<Resource>,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, segment: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.segment == segment)
    }

    // `index` is in bounds: it was either found or just pushed.
    #[allow(clippy::indexing_slicing)]
    fn child_or_insert(&mut self, segment: &str) -> &mut Self {
        let index = match self.children.iter().position(|c| c.segment == segment) {
            Some(index) => index,
            None => {
                self.children.push(Self {
                    segment: segment.to_owned(),
                    ..Self::default()
                });
                self.children.len().saturating_sub(1)
            }
        };
        &mut self.children[index]
    }

    fn collect_visible(&self, out: &mut Vec<String>) {
        for child in &self.children {
            if let Some(resource) = child.resource.as_ref().filter(|r| r.visible) {
                out.push(resource.path.clone());
            }
            child.collect_visible(out);
        }
    }
}

/// Ordered tree of resources rooted at `/`.
#[derive(Debug, Clone, Default)]
pub struct ResourceTree {
    root: Node,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl ResourceTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// The device tree: `/led` and `/joystick` listed, `/.well-known/core`
    /// and `/health` resolvable but hidden.
    pub fn standard() -> Self {
        let mut tree = Self::new();
        tree.mount(".well-known/core", false, Endpoint::Discovery)
            .mount(ResourceId::Led.name(), true, Endpoint::State(ResourceId::Led))
            .mount(
                ResourceId::Joystick.name(),
                true,
                Endpoint::State(ResourceId::Joystick),
            )
            .mount("health", false, Endpoint::Health);
        tree
    }

    /// Mount `endpoint` at `path`, creating intermediate nodes. Mounting over
    /// an existing path replaces it. An empty path mounts nothing.
    pub fn mount(&mut self, path: &str, visible: bool, endpoint: Endpoint) -> &mut Self {
        let parts: Vec<&str> = segments(path).collect();
        if parts.is_empty() {
            return self;
        }
        let node = parts
            .iter()
            .fold(&mut self.root, |node, segment| node.child_or_insert(segment));
        node.resource = Some(Resource {
            path: parts.join("/"),
            visible,
            endpoint,
        });
        self
    }

    /// Find the resource at `path`.
    pub fn resolve(&self, path: &str) -> Result<&Resource, ResourceError> {
        segments(path)
            .try_fold(&self.root, |node, segment| node.child(segment))
            .and_then(|node| node.resource.as_ref())
            .ok_or_else(|| ResourceError::NotFound(path.to_owned()))
    }

    /// Paths of all visible resources, depth-first in insertion order.
    pub fn list_visible(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_visible(&mut out);
        out
    }

    /// The discovery payload: visible resource paths joined by commas.
    pub fn render_discovery(&self) -> String {
        self.list_visible().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tree_lists_led_and_joystick_only() {
        let tree = ResourceTree::standard();
        assert_eq!(tree.list_visible(), vec!["led", "joystick"]);
        assert_eq!(tree.render_discovery(), "led,joystick");
    }

    #[test]
    fn hidden_resources_still_resolve() {
        let tree = ResourceTree::standard();
        let core = tree.resolve("/.well-known/core").map(|r| r.endpoint);
        assert_eq!(core, Ok(Endpoint::Discovery));
        let health = tree.resolve("health").map(|r| r.visible);
        assert_eq!(health, Ok(false));
    }

    #[test]
    fn resolve_ignores_extra_slashes() {
        let tree = ResourceTree::standard();
        let led = tree.resolve("//led/").map(|r| r.endpoint);
        assert_eq!(led, Ok(Endpoint::State(ResourceId::Led)));
    }

    #[test]
    fn unknown_and_intermediate_paths_are_not_found() {
        let tree = ResourceTree::standard();
        assert_eq!(
            tree.resolve("/missing"),
            Err(ResourceError::NotFound(String::from("/missing")))
        );
        // `.well-known` exists only as a path prefix.
        assert!(tree.resolve("/.well-known").is_err());
        assert!(tree.resolve("/").is_err());
    }

    #[test]
    fn nested_visible_resources_are_listed_with_full_path() {
        let mut tree = ResourceTree::new();
        tree.mount("sensors/joystick", true, Endpoint::State(ResourceId::Joystick))
            .mount("led", true, Endpoint::State(ResourceId::Led))
            .mount("sensors/hidden", false, Endpoint::Health);
        assert_eq!(tree.list_visible(), vec!["sensors/joystick", "led"]);
    }

    #[test]
    fn remounting_replaces_visibility() {
        let mut tree = ResourceTree::standard();
        tree.mount("joystick", false, Endpoint::State(ResourceId::Joystick));
        assert_eq!(tree.list_visible(), vec!["led"]);
        assert!(tree.resolve("joystick").is_ok());
    }

    #[test]
    fn empty_path_mounts_nothing() {
        let mut tree = ResourceTree::new();
        tree.mount("/", true, Endpoint::Health);
        assert!(tree.list_visible().is_empty());
        assert!(tree.resolve("").is_err());
    }
}
