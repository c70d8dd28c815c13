// Grounded on the teacher crate's `fiber::{Handle, spawn, current}` naming
// and on the reference C API (`fiber_create`/`fiber_join`/`fiber_self`/
// `fiber_exit`/`fiber_destroy`) for the operations themselves (§6).

//! The public, ergonomic surface: [`Fiber`] plus the free functions it is
//! built from.

use std::any::Any;
use std::rc::Rc;

use crate::builder::Builder;
use crate::error::Result;
use crate::fcb::FiberId;
use crate::scheduler;

/// A handle to a fiber created with [`spawn`] or [`Builder::spawn`].
///
/// Cloning a `Fiber` is cheap (it is just a generation-counted id) and does
/// not duplicate the underlying fiber — every clone names the same one,
/// and any of them may [`join`](Fiber::join) or [`destroy`](Fiber::destroy)
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fiber(FiberId);

impl Fiber {
    /// Spawn `f` as a new fiber with default settings (§4.6). Equivalent to
    /// `Builder::new().spawn(f)`.
    pub fn spawn<F>(f: F) -> Result<Fiber>
    where
        F: FnOnce() -> Rc<dyn Any> + 'static,
    {
        Builder::new().spawn(f).map(Fiber)
    }

    /// The fiber currently running on this thread.
    pub fn current() -> Result<Fiber> {
        scheduler::self_id().map(Fiber)
    }

    /// Block the calling fiber until this one finishes, then return the
    /// value it exited with (§4.5).
    ///
    /// Any number of fibers may join the same target; each gets an
    /// independent clone of the returned `Rc`.
    ///
    /// # Errors
    ///
    /// `Error::JoinSelf` if `self` names the calling fiber.
    /// `Error::InvalidTarget` if `self` is stale (already reaped).
    /// `Error::Panicked` if the target's entry function unwound instead of
    /// returning.
    pub fn join(self) -> Result<Rc<dyn Any>> {
        scheduler::join(self.0)
    }

    /// Reap a finished fiber's control block and stack (§4.6).
    ///
    /// # Errors
    ///
    /// `Error::NotFinished` if the fiber has not reached `Finished` yet.
    /// `Error::InvalidTarget` if `self` is stale (already reaped).
    pub fn destroy(self) -> Result<()> {
        scheduler::destroy(self.0)
    }
}

/// Spawn `f` as a new fiber with default settings. Equivalent to
/// [`Fiber::spawn`].
pub fn spawn<F>(f: F) -> Result<Fiber>
where
    F: FnOnce() -> Rc<dyn Any> + 'static,
{
    Fiber::spawn(f)
}

/// The fiber currently running on this thread. Equivalent to
/// [`Fiber::current`].
pub fn current() -> Result<Fiber> {
    Fiber::current()
}

/// Exit the calling fiber immediately with `value`, without returning from
/// its entry function (§4.6).
///
/// Never returns. Any fiber that later [`join`](Fiber::join)s this one
/// observes `value`.
pub fn exit(value: Rc<dyn Any>) -> ! {
    scheduler::exit_current(crate::fcb::Outcome::Value(value))
}
