// Grounded on the teacher crate's `fiber::Options`/`spawn_opts` (name and
// stack-size knob survive; the resume-scheduler-specific knobs do not).

//! Ergonomic, builder-style configuration, mirroring the shape of the
//! teacher crate's own spawn options.

use std::any::Any;
use std::rc::Rc;
use std::time::Duration;

use crate::error::Result;
use crate::fcb::FiberId;
use crate::scheduler::{self, RuntimeConfig};

/// Configures a single fiber before spawning it, and optionally configures
/// the runtime itself (stack size, preemption slice) ahead of its first use
/// on this thread.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    /// Start building a fiber with default settings.
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Name the fiber, for diagnostics (logs, `Debug` output). Not
    /// interpreted by the scheduler.
    pub fn name(mut self, name: impl Into<String>) -> Builder {
        self.name = Some(name.into());
        self
    }

    /// Override this fiber's stack size. Defaults to the runtime's live
    /// configured stack size (whatever [`configure`] last set on this
    /// thread, or [`RuntimeConfig::default`] if it was never called).
    pub fn stack_size(mut self, bytes: usize) -> Builder {
        self.stack_size = Some(bytes);
        self
    }

    /// Spawn `f` as a new fiber with the settings collected so far (§4.6).
    ///
    /// `f`'s return value becomes available to joiners as `Rc<dyn Any>`;
    /// pass a `move` closure and downcast the joined value to recover the
    /// concrete type you returned.
    pub fn spawn<F>(self, f: F) -> Result<FiberId>
    where
        F: FnOnce() -> Rc<dyn Any> + 'static,
    {
        let stack_size = match self.stack_size {
            Some(bytes) => bytes,
            None => scheduler::configured_stack_size()?,
        };
        scheduler::create(stack_size, self.name, Box::new(f))
    }
}

/// Set this thread's runtime configuration before its first fiber is
/// created.
///
/// Returns `false` without effect if a fiber has already run on this
/// thread, since by then the scheduler's stack and timer slice are already
/// committed.
pub fn configure(stack_size: usize, slice: Duration) -> bool {
    scheduler::configure(RuntimeConfig { stack_size, slice })
}
