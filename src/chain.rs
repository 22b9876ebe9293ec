//! Ordered acquisition of dependent driver objects.
//!
//! A [`Chain`] is a typed stack. Every successful step pushes its object on
//! top of the objects acquired before it, and every step can borrow the whole
//! stack below it. When a step fails, the stack is popped and released in
//! reverse acquisition order and the failing error is returned untouched.
//!
//! ```
//! use desktop_overlay::chain::Chain;
//!
//! let chain = Chain::start("example")
//!     .then("first", |()| Ok::<_, ()>(1_u32))
//!     .unwrap()
//!     .then("second", |(first, ())| Ok::<_, ()>(*first + 1))
//!     .unwrap();
//!
//! let (second, (first, ())) = chain.finish();
//! assert_eq!((first, second), (1, 2));
//! ```
use log::{trace, warn};

/// A stack of acquired objects that can be released in reverse order.
///
/// Implemented for `()` (the empty stack) and `(T, S)` where `T` is the most
/// recently acquired object and `S` the rest of the stack.
pub trait Unwind {
    /// Number of objects on the stack.
    const DEPTH: usize;

    /// Pops and releases every object, most recent first.
    fn unwind(self);
}

impl Unwind for () {
    const DEPTH: usize = 0;

    #[inline]
    fn unwind(self) {}
}

impl<T, S: Unwind> Unwind for (T, S) {
    const DEPTH: usize = S::DEPTH + 1;

    #[inline]
    fn unwind(self) {
        let (top, rest) = self;
        drop(top);
        rest.unwind();
    }
}

/// Acquisition chain over a stack of already acquired objects.
#[must_use = "dropping a chain releases everything it acquired"]
pub struct Chain<S: Unwind> {
    label: &'static str,
    stack: S,
}

impl Chain<()> {
    /// Starts an empty chain. `label` names the object being built in logs.
    #[inline]
    pub const fn start(label: &'static str) -> Self {
        Self { label, stack: () }
    }
}

impl<S: Unwind> Chain<S> {
    /// Runs the next acquisition step.
    ///
    /// `acquire` borrows every object acquired so far. On success its object
    /// is pushed on the stack. On failure the objects acquired by earlier steps
    /// are released in reverse order, nothing is released for the failing
    /// step, and its error is returned as is.
    pub fn then<T, E, F>(self, step: &'static str, acquire: F) -> Result<Chain<(T, S)>, E>
    where
        F: FnOnce(&S) -> Result<T, E>,
    {
        match acquire(&self.stack) {
            Ok(object) => {
                trace!("{}: acquired `{step}` (depth {})", self.label, S::DEPTH + 1);
                Ok(Chain { label: self.label, stack: (object, self.stack) })
            }
            Err(error) => {
                warn!("{}: step `{step}` failed, releasing {} acquired object(s)", self.label, S::DEPTH);
                self.stack.unwind();
                Err(error)
            }
        }
    }

    /// Number of objects acquired so far.
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> usize {
        S::DEPTH
    }

    /// Ends the chain and hands back the stack, most recent object first.
    #[inline]
    #[must_use]
    pub fn finish(self) -> S {
        self.stack
    }
}
