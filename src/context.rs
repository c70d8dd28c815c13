// Grounded on the reference C implementation's use of getcontext/makecontext/
// swapcontext/setcontext (ucontext(3)) and on the teacher crate's `Context`
// seam (referenced but not shipped in `slide-rs-bran::lib`'s `mod context;`).

//! The context primitive: captured machine state plus the three operations
//! (capture, bind, swap) described in §4.1.

use std::io;
use std::mem::MaybeUninit;

use crate::stack::Stack;

/// A captured machine context: registers plus stack pointer, as populated by
/// `getcontext(3)` and mutated by `makecontext(3)`.
///
/// `Context` owns nothing; the `Stack` a fiber's context is bound to is
/// owned by that fiber's control block for exactly as long as the context
/// might still be resumed.
pub struct Context {
    raw: libc::ucontext_t,
}

impl Context {
    /// An empty context, to be filled in by [`Context::capture`] or used as
    /// the destination of a [`Context::swap`].
    pub fn empty() -> Context {
        Context {
            raw: unsafe { MaybeUninit::zeroed().assume_init() },
        }
    }

    /// Capture the state of the calling context into a fresh `Context`.
    ///
    /// Used once per OS thread, at bootstrap, to record the host thread's
    /// own execution state before the scheduler ever takes over.
    pub fn capture() -> io::Result<Context> {
        let mut ctx = Context::empty();
        if unsafe { libc::getcontext(&mut ctx.raw) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(ctx)
    }

    /// Bind a freshly-captured context to `stack`, so that resuming it
    /// begins execution at `entry(arg)` and never returns there (entry
    /// trampolines always explicitly hand control back to the scheduler;
    /// `successor` is only consulted if one ever does return, as a safety
    /// net).
    ///
    /// `arg` is passed through as a single pointer-sized value. This relies
    /// on the same glibc/x86_64 behavior the reference C implementation
    /// leaned on: `makecontext`'s variadic `int` arguments are in practice
    /// laid out one per integer-argument register, so a single pointer-sized
    /// argument round-trips intact despite the POSIX prototype calling for
    /// `int`.
    pub fn new(
        entry: extern "C" fn(usize) -> !,
        arg: usize,
        stack: &Stack,
        successor: &mut Context,
    ) -> io::Result<Context> {
        let mut ctx = Context::capture()?;
        ctx.raw.uc_stack.ss_sp = stack.start() as *mut libc::c_void;
        ctx.raw.uc_stack.ss_size = stack.len();
        ctx.raw.uc_stack.ss_flags = 0;
        ctx.raw.uc_link = &mut successor.raw;

        unsafe {
            libc::makecontext(
                &mut ctx.raw,
                std::mem::transmute::<extern "C" fn(usize) -> !, extern "C" fn()>(entry),
                1,
                arg,
            );
        }
        Ok(ctx)
    }

    /// Atomically save the calling context into `from` and resume `to`.
    ///
    /// Never returns to its caller through the normal control-flow path;
    /// control instead reappears here the *next* time something swaps back
    /// into `from`.
    ///
    /// # Safety
    ///
    /// `to` must describe a context that is either freshly bound via
    /// [`Context::new`] and not yet resumed, or was itself previously the
    /// `from` of a swap and is therefore suspended (not concurrently
    /// running anywhere else — there is only ever one running fiber per
    /// runtime, §5).
    pub unsafe fn swap(from: &mut Context, to: &Context) {
        if libc::swapcontext(&mut from.raw, &to.raw) == -1 {
            // swapcontext only fails on memory-protection or invalid-context
            // errors, both unrecoverable once stacks may already be
            // half-switched; the scheduler's stack discipline (§4.3) makes
            // this unreachable in correct use.
            libc::abort();
        }
    }

    /// Resume `to` without saving the caller's state anywhere.
    ///
    /// This is how the scheduler hands off to the fiber it selected (§4.3,
    /// step 4): the scheduler's own context is never the destination of a
    /// later `swap`, so it is never overwritten past its original
    /// `makecontext` binding, and each future activation restarts
    /// [`crate::scheduler`]'s trampoline from the top — matching "the
    /// scheduler never returns; it only sets a fresh context" (§2).
    ///
    /// # Safety
    ///
    /// Same precondition as [`Context::swap`]'s `to` argument. Never
    /// returns on success.
    pub unsafe fn set(to: &Context) -> ! {
        libc::setcontext(&to.raw);
        // setcontext only returns on failure.
        libc::abort();
    }
}
