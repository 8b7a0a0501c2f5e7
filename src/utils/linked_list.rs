/*!
A doubly-linked list that exposes its structural nodes.

The structural nodes are exposed to enable O(1) removal of an entry through a handle the
caller kept from insertion time, which is exactly what the snapshot list needs. Links forward
through the list are strong references; links backward are weak so that the list never forms
a reference cycle.
*/

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

type Link<T> = Option<SharedNode<T>>;

type WeakLink<T> = Option<Weak<RwLock<Node<T>>>>;

/// A [`Node`] wrapped in shared-ownership concurrency primitives.
pub(crate) type SharedNode<T> = Arc<RwLock<Node<T>>>;

/// A node in the linked list.
pub(crate) struct Node<T> {
    /// The element that the node holds.
    pub(crate) element: T,

    /// A link to the next node.
    next: Link<T>,

    /// A link to the previous node.
    prev: WeakLink<T>,
}

/// A doubly-linked list with stable node handles.
pub(crate) struct LinkedList<T> {
    /// The first node of the list.
    head: Link<T>,

    /// The last node of the list.
    tail: WeakLink<T>,

    /// The number of nodes in the list.
    length: usize,
}

/// Crate-only methods
impl<T> LinkedList<T> {
    /// Create a new, empty [`LinkedList`].
    pub(crate) fn new() -> Self {
        Self {
            head: None,
            tail: None,
            length: 0,
        }
    }

    /// Push an element onto the back of the list, returning a handle to its node.
    pub(crate) fn push(&mut self, element: T) -> SharedNode<T> {
        let node = Arc::new(RwLock::new(Node {
            element,
            next: None,
            prev: None,
        }));

        match self.tail.take().and_then(|weak_tail| weak_tail.upgrade()) {
            Some(old_tail) => {
                node.write().prev = Some(Arc::downgrade(&old_tail));
                old_tail.write().next = Some(Arc::clone(&node));
            }
            None => {
                // The list was empty
                self.head = Some(Arc::clone(&node));
            }
        }

        self.tail = Some(Arc::downgrade(&node));
        self.length += 1;

        node
    }

    /// Remove the given node from the list.
    pub(crate) fn remove_node(&mut self, node: SharedNode<T>) {
        let (maybe_prev, maybe_next) = {
            let mut node_guard = node.write();
            (
                node_guard
                    .prev
                    .take()
                    .and_then(|weak_prev| weak_prev.upgrade()),
                node_guard.next.take(),
            )
        };

        match &maybe_prev {
            Some(prev_node) => prev_node.write().next = maybe_next.clone(),
            // Only the head has no previous link
            None => self.head = maybe_next.clone(),
        }

        match &maybe_next {
            Some(next_node) => {
                next_node.write().prev = maybe_prev.as_ref().map(Arc::downgrade)
            }
            // Only the tail has no next link
            None => self.tail = maybe_prev.as_ref().map(Arc::downgrade),
        }

        self.length -= 1;
    }

    /// Get the first node of the list.
    pub(crate) fn head(&self) -> Option<SharedNode<T>> {
        self.head.clone()
    }

    /// Get the last node of the list.
    pub(crate) fn tail(&self) -> Option<SharedNode<T>> {
        self.tail.as_ref().and_then(Weak::upgrade)
    }

    /// Get the length of the list.
    pub(crate) fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the list is empty, otherwise false.
    pub(crate) fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl<T> Drop for LinkedList<T> {
    fn drop(&mut self) {
        // Unchain the strong forward links iteratively so that a long list cannot overflow
        // the stack through recursive drops.
        let mut current = self.head.take();
        while let Some(node) = current {
            current = node.write().next.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn an_empty_list_has_zero_length() {
        let list = LinkedList::<u64>::new();

        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
        assert!(list.head().is_none());
        assert!(list.tail().is_none());
    }

    #[test]
    fn pushed_elements_keep_insertion_order() {
        let mut list = LinkedList::<u64>::new();

        list.push(1);
        list.push(2);
        list.push(3);

        assert_eq!(list.len(), 3);
        assert_eq!(list.head().unwrap().read().element, 1);
        assert_eq!(list.tail().unwrap().read().element, 3);
    }

    #[test]
    fn the_head_can_be_unlinked() {
        let mut list = LinkedList::<u64>::new();
        let first = list.push(1);
        list.push(2);
        list.push(3);

        list.remove_node(first);

        assert_eq!(list.len(), 2);
        assert_eq!(list.head().unwrap().read().element, 2);
        assert_eq!(list.tail().unwrap().read().element, 3);
    }

    #[test]
    fn the_tail_can_be_unlinked() {
        let mut list = LinkedList::<u64>::new();
        list.push(1);
        list.push(2);
        let last = list.push(3);

        list.remove_node(last);

        assert_eq!(list.len(), 2);
        assert_eq!(list.head().unwrap().read().element, 1);
        assert_eq!(list.tail().unwrap().read().element, 2);
    }

    #[test]
    fn interior_nodes_can_be_unlinked() {
        let mut list = LinkedList::<u64>::new();
        list.push(1);
        let middle = list.push(2);
        list.push(3);

        list.remove_node(middle);

        assert_eq!(list.len(), 2);
        assert_eq!(list.head().unwrap().read().element, 1);
        assert_eq!(list.tail().unwrap().read().element, 3);
        assert_eq!(
            list.head().unwrap().read().next.as_ref().unwrap().read().element,
            3
        );
    }

    #[test]
    fn removing_every_node_empties_the_list() {
        let mut list = LinkedList::<u64>::new();
        let first = list.push(1);
        let second = list.push(2);

        list.remove_node(second);
        list.remove_node(first);

        assert!(list.is_empty());
        assert!(list.head().is_none());
        assert!(list.tail().is_none());
    }
}
