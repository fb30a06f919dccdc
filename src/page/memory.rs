//! # Headless page.
//!
//! [`MemoryPage`] keeps a small element tree in memory and implements
//! [`Page`] on top of it. Mutations made through its methods are delivered to
//! observers synchronously, exactly like a browser would deliver a batch at
//! the end of the current task, except that every batch holds one record.
//!
//! Besides driving tests and demos, it records every observer attach and
//! disconnect in a [`WatchRecord`] log so hand-off ordering can be checked.
//!
//! ## Model
//! ```text
//! html (root)
//! └── body
//!     └── ...appended elements
//! ```
//! Document order is insertion order. Removed elements (and their
//! descendants) are detached: they no longer match selectors and report no
//! style, but observers registered on them stay registered until
//! disconnected, as in a browser.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::selector::{parse_query, Combinator, Compound};
use super::{
    MutationCallback, MutationKind, MutationRecord, NavigationCallback, NodeRef, ObserveOptions,
    Page, Selector, WatchHandle,
};
use crate::error::DomError;

/// Blueprint of an element to insert.
#[derive(Debug, Clone, Default)]
pub struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    style: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }
}

/// Observer lifecycle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRecord {
    Attached { observer: u64, node: NodeRef },
    Disconnected { observer: u64, node: NodeRef },
}

struct Node {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    style: BTreeMap<String, String>,
    text: String,
    parent: Option<u64>,
    attached: bool,
}

struct Observer {
    node: u64,
    options: ObserveOptions,
    callback: MutationCallback,
}

struct State {
    fragment: String,
    hostname: String,
    next_node: u64,
    nodes: BTreeMap<u64, Node>,
    next_watch: u64,
    observers: BTreeMap<u64, Observer>,
    navigation: BTreeMap<u64, NavigationCallback>,
    log: Vec<WatchRecord>,
}

impl State {
    fn insert(&mut self, parent: Option<u64>, el: Element) -> u64 {
        let id = self.next_node;
        self.next_node += 1;
        self.nodes.insert(
            id,
            Node {
                tag: el.tag,
                id: el.id,
                classes: el.classes,
                style: el.style,
                text: String::new(),
                parent,
                attached: true,
            },
        );
        id
    }

    fn attached(&self, node: u64) -> Result<&Node, DomError> {
        match self.nodes.get(&node) {
            Some(n) if n.attached => Ok(n),
            _ => Err(DomError::Detached { node }),
        }
    }

    fn is_ancestor(&self, ancestor: u64, node: u64) -> bool {
        let mut cur = self.nodes.get(&node).and_then(|n| n.parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.nodes.get(&p).and_then(|n| n.parent);
        }
        false
    }

    fn detach_subtree(&mut self, node: u64) {
        let doomed: Vec<u64> = self
            .nodes
            .keys()
            .copied()
            .filter(|&n| n == node || self.is_ancestor(node, n))
            .collect();
        for n in doomed {
            if let Some(entry) = self.nodes.get_mut(&n) {
                entry.attached = false;
            }
        }
    }

    fn sees(&self, observer: &Observer, record: &MutationRecord) -> bool {
        let wanted = match record.kind {
            MutationKind::Attributes { .. } => observer.options.attributes,
            MutationKind::ChildList => observer.options.child_list,
        };
        wanted
            && (observer.node == record.target.0
                || (observer.options.subtree && self.is_ancestor(observer.node, record.target.0)))
    }

    fn matches(&self, node: u64, selector: &Selector) -> bool {
        let Some(n) = self.nodes.get(&node) else {
            return false;
        };
        match selector {
            Selector::Id(id) => n.id.as_deref() == Some(id.as_str()),
            Selector::Tag(tag) => n.tag.eq_ignore_ascii_case(tag),
            Selector::Class(class) => n.classes.iter().any(|c| c == class),
            // parsed once by the caller
            Selector::Query(_) => false,
        }
    }

    fn matches_compound(&self, node: u64, compound: &Compound) -> bool {
        let Some(n) = self.nodes.get(&node) else {
            return false;
        };
        compound
            .tag
            .as_deref()
            .map_or(true, |tag| tag.eq_ignore_ascii_case(&n.tag))
            && compound
                .id
                .as_deref()
                .map_or(true, |id| n.id.as_deref() == Some(id))
            && compound
                .classes
                .iter()
                .all(|class| n.classes.iter().any(|c| c == class))
    }

    fn matches_chain(&self, node: u64, chain: &[(Combinator, Compound)]) -> bool {
        let Some(((combinator, last), rest)) = chain.split_last() else {
            return false;
        };
        if !self.matches_compound(node, last) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }

        let parent = self.nodes.get(&node).and_then(|n| n.parent);
        match combinator {
            Combinator::Child => parent.is_some_and(|p| self.matches_chain(p, rest)),
            Combinator::Descendant => {
                let mut cur = parent;
                while let Some(p) = cur {
                    if self.matches_chain(p, rest) {
                        return true;
                    }
                    cur = self.nodes.get(&p).and_then(|n| n.parent);
                }
                false
            }
        }
    }
}

/// In-memory [`Page`] implementation.
///
/// # Example
/// ```
/// use pagevisor::{Element, MemoryPage, Page, Selector};
///
/// let page = MemoryPage::new().with_hostname("www.hordes.fr");
/// let counter = page.append_to_body(Element::new("div").with_id("movesCounter"));
///
/// assert_eq!(page.query(&Selector::id("movesCounter")).unwrap(), Some(counter));
/// assert_eq!(page.hostname(), "www.hordes.fr");
/// ```
pub struct MemoryPage {
    state: Arc<Mutex<State>>,
    root: NodeRef,
    body: NodeRef,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    /// Creates a page holding only `html > body`, with an empty fragment.
    pub fn new() -> Self {
        let mut state = State {
            fragment: String::new(),
            hostname: String::from("localhost"),
            next_node: 1,
            nodes: BTreeMap::new(),
            next_watch: 1,
            observers: BTreeMap::new(),
            navigation: BTreeMap::new(),
            log: Vec::new(),
        };
        let root = state.insert(None, Element::new("html"));
        let body = state.insert(Some(root), Element::new("body"));

        Self {
            state: Arc::new(Mutex::new(state)),
            root: NodeRef(root),
            body: NodeRef(body),
        }
    }

    pub fn with_hostname(self, hostname: impl Into<String>) -> Self {
        self.state.lock().hostname = hostname.into();
        self
    }

    /// Sets the initial fragment without notifying listeners.
    pub fn with_fragment(self, fragment: impl Into<String>) -> Self {
        self.state.lock().fragment = fragment.into();
        self
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    pub fn body(&self) -> NodeRef {
        self.body
    }

    /// Appends an element under `parent` and reports a child-list mutation
    /// on `parent`.
    pub fn append(&self, parent: NodeRef, el: Element) -> Result<NodeRef, DomError> {
        let node = {
            let mut st = self.state.lock();
            st.attached(parent.0)?;
            st.insert(Some(parent.0), el)
        };
        self.dispatch(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList,
        });
        Ok(NodeRef(node))
    }

    /// Appends an element under `body`.
    pub fn append_to_body(&self, el: Element) -> NodeRef {
        let node = {
            let mut st = self.state.lock();
            st.insert(Some(self.body.0), el)
        };
        self.dispatch(MutationRecord {
            target: self.body,
            kind: MutationKind::ChildList,
        });
        NodeRef(node)
    }

    /// Detaches `node` and its descendants.
    pub fn remove(&self, node: NodeRef) -> Result<(), DomError> {
        let parent = {
            let mut st = self.state.lock();
            let parent = st.attached(node.0)?.parent;
            st.detach_subtree(node.0);
            parent
        };
        if let Some(parent) = parent {
            self.dispatch(MutationRecord {
                target: NodeRef(parent),
                kind: MutationKind::ChildList,
            });
        }
        Ok(())
    }

    /// Swaps `old` for a freshly built element at the same place in the tree.
    pub fn replace(&self, old: NodeRef, el: Element) -> Result<NodeRef, DomError> {
        let (parent, node) = {
            let mut st = self.state.lock();
            let parent = st.attached(old.0)?.parent;
            st.detach_subtree(old.0);
            let node = st.insert(parent, el);
            (parent, node)
        };
        if let Some(parent) = parent {
            self.dispatch(MutationRecord {
                target: NodeRef(parent),
                kind: MutationKind::ChildList,
            });
        }
        Ok(NodeRef(node))
    }

    /// Sets a style property and reports a `style` attribute mutation.
    pub fn set_style(
        &self,
        node: NodeRef,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        {
            let mut st = self.state.lock();
            st.attached(node.0)?;
            if let Some(n) = st.nodes.get_mut(&node.0) {
                n.style.insert(property.into(), value.into());
            }
        }
        self.dispatch(MutationRecord {
            target: node,
            kind: MutationKind::Attributes {
                name: String::from("style"),
            },
        });
        Ok(())
    }

    /// Replaces the text content of `node` (a child-list mutation).
    pub fn set_text(&self, node: NodeRef, text: impl Into<String>) -> Result<(), DomError> {
        {
            let mut st = self.state.lock();
            st.attached(node.0)?;
            if let Some(n) = st.nodes.get_mut(&node.0) {
                n.text = text.into();
            }
        }
        self.dispatch(MutationRecord {
            target: node,
            kind: MutationKind::ChildList,
        });
        Ok(())
    }

    /// Text content of `node`.
    pub fn text(&self, node: NodeRef) -> Option<String> {
        self.state.lock().nodes.get(&node.0).map(|n| n.text.clone())
    }

    /// Changes the fragment and notifies fragment-change listeners.
    pub fn navigate(&self, fragment: impl Into<String>) {
        let fragment = fragment.into();
        let listeners: Vec<NavigationCallback> = {
            let mut st = self.state.lock();
            st.fragment = fragment.clone();
            st.navigation.values().cloned().collect()
        };
        for listener in listeners {
            listener(&fragment);
        }
    }

    /// Number of registered observers on `node`.
    pub fn observers_on(&self, node: NodeRef) -> usize {
        self.state
            .lock()
            .observers
            .values()
            .filter(|o| o.node == node.0)
            .count()
    }

    /// Number of registered observers on the whole page.
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// Number of fragment-change listeners.
    pub fn navigation_listener_count(&self) -> usize {
        self.state.lock().navigation.len()
    }

    /// Every observer attach/disconnect so far, in order.
    pub fn watch_log(&self) -> Vec<WatchRecord> {
        self.state.lock().log.clone()
    }

    fn dispatch(&self, record: MutationRecord) {
        let callbacks: Vec<MutationCallback> = {
            let st = self.state.lock();
            st.observers
                .values()
                .filter(|o| st.sees(o, &record))
                .map(|o| Arc::clone(&o.callback))
                .collect()
        };
        for callback in callbacks {
            callback(std::slice::from_ref(&record));
        }
    }

    fn next_watch_id(st: &mut State) -> u64 {
        let id = st.next_watch;
        st.next_watch += 1;
        id
    }
}

impl Page for MemoryPage {
    fn fragment(&self) -> String {
        self.state.lock().fragment.clone()
    }

    fn hostname(&self) -> String {
        self.state.lock().hostname.clone()
    }

    fn query_all(&self, selector: &Selector) -> Result<Vec<NodeRef>, DomError> {
        let chain = match selector {
            Selector::Query(q) => Some(parse_query(q)?),
            _ => None,
        };

        let st = self.state.lock();
        Ok(st
            .nodes
            .iter()
            .filter(|(_, n)| n.attached)
            .map(|(&id, _)| id)
            .filter(|&id| match &chain {
                Some(chain) => st.matches_chain(id, chain),
                None => st.matches(id, selector),
            })
            .map(NodeRef)
            .collect())
    }

    fn style(&self, node: NodeRef, property: &str) -> Option<String> {
        let st = self.state.lock();
        st.attached(node.0).ok()?.style.get(property).cloned()
    }

    fn observe(
        &self,
        node: NodeRef,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> Result<Box<dyn WatchHandle>, DomError> {
        let mut st = self.state.lock();
        st.attached(node.0)?;

        let id = Self::next_watch_id(&mut st);
        st.observers.insert(
            id,
            Observer {
                node: node.0,
                options,
                callback,
            },
        );
        st.log.push(WatchRecord::Attached { observer: id, node });

        Ok(Box::new(MemoryWatch {
            state: Arc::downgrade(&self.state),
            id,
            kind: WatchKind::Observer,
        }))
    }

    fn on_fragment_change(&self, callback: NavigationCallback) -> Box<dyn WatchHandle> {
        let mut st = self.state.lock();
        let id = Self::next_watch_id(&mut st);
        st.navigation.insert(id, callback);

        Box::new(MemoryWatch {
            state: Arc::downgrade(&self.state),
            id,
            kind: WatchKind::Navigation,
        })
    }
}

#[derive(Clone, Copy)]
enum WatchKind {
    Observer,
    Navigation,
}

struct MemoryWatch {
    state: Weak<Mutex<State>>,
    id: u64,
    kind: WatchKind,
}

impl WatchHandle for MemoryWatch {
    fn disconnect(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut st = state.lock();
        match self.kind {
            WatchKind::Observer => {
                if let Some(o) = st.observers.remove(&self.id) {
                    st.log.push(WatchRecord::Disconnected {
                        observer: self.id,
                        node: NodeRef(o.node),
                    });
                }
            }
            WatchKind::Navigation => {
                st.navigation.remove(&self.id);
            }
        }
    }

    fn id(&self) -> u64 {
        self.id
    }
}
