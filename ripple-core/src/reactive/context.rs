//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently running.
//! This enables automatic dependency tracking: when a reactive key is read,
//! we can register the current subscriber as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of subscribers. Running a subscriber pushes it
//! onto the stack; the guard returned by [`ReactiveContext::enter`] pops it
//! again when dropped, on every exit path including unwinding.
//!
//! This design supports nested runs (e.g., an effect that reads a computed
//! value, which runs the computed getter on top of the effect).

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Rc<dyn Subscriber>>> = RefCell::new(Vec::new());
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the subscriber panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any reactive reads will register the
    /// subscriber as a dependent.
    ///
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.subscriber_id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(subscriber));

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the subscriber on top of the stack, if any.
    pub fn current() -> Option<Rc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|s| s.subscriber_id()))
    }

    /// Check whether a subscriber is anywhere on the stack.
    pub fn contains(id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|s| s.subscriber_id() == id))
    }

    /// Number of nested runs in progress.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The popped subscriber is released outside the stack borrow.
        let popped = CONTEXT_STACK
            .try_with(|stack| stack.borrow_mut().pop())
            .ok()
            .flatten();

        if let Some(subscriber) = popped {
            debug_assert_eq!(
                subscriber.subscriber_id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                subscriber.subscriber_id()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Dep;

    struct Inert(SubscriberId);

    impl Subscriber for Inert {
        fn subscriber_id(&self) -> SubscriberId {
            self.0
        }

        fn notify(self: Rc<Self>) {}

        fn record_dep(&self, _dep: &Rc<Dep>) {}

        fn forget_dep(&self, _dep: &Dep) {}

        fn dependency_count(&self) -> usize {
            0
        }
    }

    fn inert() -> (SubscriberId, Rc<dyn Subscriber>) {
        let id = SubscriberId::new();
        (id, Rc::new(Inert(id)))
    }

    #[test]
    fn context_tracks_subscriber() {
        let (id, subscriber) = inert();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(subscriber);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
            assert!(ReactiveContext::contains(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(!ReactiveContext::contains(id));
    }

    #[test]
    fn nested_contexts() {
        let (id1, outer) = inert();
        let (id2, inner) = inert();

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
                assert!(ReactiveContext::contains(id1));
                assert_eq!(ReactiveContext::depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_pops_on_panic() {
        let (_, subscriber) = inert();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(subscriber);
            panic!("callback failed");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
