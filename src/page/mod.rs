//! The live document, as seen by the runtime.
//!
//! The runtime never touches a concrete DOM. Everything it needs from the
//! host page goes through the [`Page`] trait:
//!
//! - the location fragment and hostname;
//! - element lookup by [`Selector`];
//! - computed style reads (visibility, cursor);
//! - mutation observation returning a [`WatchHandle`];
//! - fragment-change listeners.
//!
//! A browser build implements [`Page`] over the real document. [`MemoryPage`]
//! is a headless implementation for tests and demos.

mod memory;
mod selector;

use std::fmt;
use std::sync::Arc;

use crate::error::DomError;

pub use memory::{Element, MemoryPage, WatchRecord};
pub use selector::Selector;

/// Opaque reference to an element of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub u64);

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// What a mutation observer reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Attribute changes on the observed node.
    pub attributes: bool,
    /// Children added or removed.
    pub child_list: bool,
    /// Extend the above to every descendant.
    pub subtree: bool,
}

impl ObserveOptions {
    /// Attribute changes on the node itself.
    pub const fn attributes() -> Self {
        Self {
            attributes: true,
            child_list: false,
            subtree: false,
        }
    }

    /// Child-list changes anywhere below the node.
    pub const fn child_list_subtree() -> Self {
        Self {
            attributes: false,
            child_list: true,
            subtree: true,
        }
    }
}

/// Kind of a single mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// An attribute of `target` changed.
    Attributes {
        /// Attribute name (`style`, `class`, ...).
        name: String,
    },
    /// Children of `target` were added or removed.
    ChildList,
}

/// One entry of a mutation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node the mutation happened on.
    pub target: NodeRef,
    /// What changed.
    pub kind: MutationKind,
}

/// Callback receiving one mutation batch.
pub type MutationCallback = Arc<dyn Fn(&[MutationRecord]) + Send + Sync>;

/// Callback receiving the new location fragment.
pub type NavigationCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A live registration on the page (observer or listener).
///
/// Dropping the handle leaves the registration in place; only
/// [`WatchHandle::disconnect`] ends it.
pub trait WatchHandle: Send + Sync {
    /// Stops delivery. Idempotent.
    fn disconnect(&self);

    /// Stable id, for diagnostics.
    fn id(&self) -> u64;
}

/// Style condition checked against mutated targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleMatch {
    /// CSS property name.
    pub property: String,
    /// Expected value.
    pub value: String,
}

impl StyleMatch {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    /// True if `node` currently has the expected style value.
    pub fn matches(&self, page: &dyn Page, node: NodeRef) -> bool {
        page.style(node, &self.property).as_deref() == Some(self.value.as_str())
    }
}

/// # The host document.
///
/// Implementations must deliver mutation batches and fragment changes
/// synchronously from the thread that caused them, and must not hold
/// internal locks while invoking callbacks (callbacks may call back into the
/// page).
pub trait Page: Send + Sync + 'static {
    /// Location fragment including the leading `#`, or empty.
    fn fragment(&self) -> String;

    /// Location hostname.
    fn hostname(&self) -> String;

    /// Every element matching `selector`, in document order.
    fn query_all(&self, selector: &Selector) -> Result<Vec<NodeRef>, DomError>;

    /// First element matching `selector`.
    fn query(&self, selector: &Selector) -> Result<Option<NodeRef>, DomError> {
        Ok(self.query_all(selector)?.into_iter().next())
    }

    /// Current value of a style property, `None` when unset or detached.
    fn style(&self, node: NodeRef, property: &str) -> Option<String>;

    /// Starts observing `node`.
    fn observe(
        &self,
        node: NodeRef,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> Result<Box<dyn WatchHandle>, DomError>;

    /// Registers a fragment-change listener.
    fn on_fragment_change(&self, callback: NavigationCallback) -> Box<dyn WatchHandle>;
}
