//! Error taxonomy for the runtime's fallible public operations.

use std::any::Any;
use std::fmt;
use std::io;
use std::rc::Rc;

/// The payload carried by a fiber whose entry function unwound.
///
/// A thin wrapper over [`Any`] kept separate from `std::thread`'s
/// equivalent so that `Error::Panicked` has a name of its own in
/// documentation and logs. Held as an `Rc` rather than an owned `Box`
/// because every joiner of a panicked fiber reads the same payload
/// (§4.5) — this crate's runtime state is confined to a single OS thread
/// throughout (§5), so there is no need for the `Send` bound
/// `std::thread::Result` carries.
pub struct PanicPayload(pub Rc<dyn Any>);

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = self
            .0
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| self.0.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Box<dyn Any>");
        f.debug_tuple("PanicPayload").field(&msg).finish()
    }
}

/// Errors returned by the fallible operations of this crate.
///
/// There are no exceptions-like constructs here: every fallible public
/// operation returns `Result<_, Error>` instead of the bare `-1` the
/// reference implementation of this design used.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Allocating a fiber control block, a wait node, or a fiber's stack
    /// failed. The ring was left unchanged.
    #[error("failed to allocate {what}")]
    Alloc {
        /// What was being allocated (`"fiber stack"`, `"control block"`, ...).
        what: &'static str,
    },

    /// `join` was called with the caller's own id.
    #[error("a fiber cannot join itself")]
    JoinSelf,

    /// The id named a fiber not present in the ring, or named a slot whose
    /// generation has since moved on (the fiber it once named is long gone).
    #[error("fiber id is not present in the ring")]
    InvalidTarget,

    /// `destroy` was called on a fiber that has not reached `Finished`.
    #[error("cannot destroy a fiber that has not finished")]
    NotFinished,

    /// The target fiber's entry function unwound; `join` surfaces the panic
    /// payload instead of a return value.
    #[error("target fiber panicked")]
    Panicked(PanicPayload),

    /// A platform syscall (context capture/swap, timer arm, signal install)
    /// failed.
    #[error("platform call failed: {0}")]
    Platform(#[from] io::Error),
}

/// Convenience alias used throughout the crate's public surface.
pub type Result<T> = std::result::Result<T, Error>;
