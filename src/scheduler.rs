// Grounded on the reference C implementation's `scheduler()`/`preempt()`/
// `init_fiber_list()`/`fiber_create`/`fiber_join`/`fiber_exit`/`fiber_destroy`
// (§4.3–§4.7 of the design) and on the teacher crate's thread-local parent
// pointer (`slide-rs-bran::fiber::PARENT_CONTEXT`) for how to thread
// scheduler state through a signal-reachable, single-OS-thread global.

//! The scheduler: per-thread runtime state, the context-switch mechanics,
//! the preemption timer, and the public lifecycle operations built on top
//! of them.

use std::any::Any;
use std::cell::UnsafeCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::context::Context;
use crate::error::{Error, PanicPayload, Result};
use crate::fcb::{Fcb, FiberId, Outcome, Status, WaitNode};
use crate::ring::Ring;
use crate::stack::Stack;

/// The few knobs this runtime exposes: stack size and preemption slice.
/// Generalizes the teacher crate's `fiber::Options`.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Size of each fiber's stack, in bytes (before guard-page rounding).
    pub stack_size: usize,
    /// Length of a preemption time slice.
    pub slice: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_size: crate::stack::DEFAULT_STACK_SIZE,
            slice: Duration::from_millis(20),
        }
    }
}

/// All of a runtime's mutable state: the ring, the scheduler's own context
/// and stack, the escape-hatch context back to the host thread, and the
/// configuration it was bootstrapped with.
///
/// Lives in thread-local storage (§4.7): a second OS thread that touches
/// this crate's API gets its own independent `Runtime` rather than
/// corrupting this one.
pub(crate) struct Runtime {
    pub(crate) ring: Ring,
    scheduler_context: Context,
    // Kept alive for as long as the runtime exists; never read directly,
    // only the memory it owns matters (the scheduler's own stack).
    _scheduler_stack: Stack,
    // The host thread's original execution state. Only ever consulted if
    // the ring fully drains (including `main`'s own slot) — unreachable
    // through the current public surface, since nothing unlinks `main`,
    // but kept correct per the reference design's successor-context note
    // (§4.1) and the corrected drain behavior (§9/§11, Open Question 2).
    host_context: Box<Context>,
    config: RuntimeConfig,
    timer_armed: bool,
}

thread_local! {
    static RUNTIME: UnsafeCell<Option<Runtime>> = const { UnsafeCell::new(None) };
}

fn main_fcb() -> Fcb {
    Fcb {
        context: Context::empty(),
        stack: None,
        status: Status::Ready,
        outcome: None,
        join_target: None,
        join_rval: None,
        wait_list: Vec::new(),
        next: 0,
        name: Some("main".to_string()),
    }
}

impl Runtime {
    fn bootstrap(config: RuntimeConfig) -> Result<Runtime> {
        let mut host_context = Box::new(Context::capture().map_err(Error::Platform)?);
        let ring = Ring::new(main_fcb());

        let scheduler_stack = Stack::new(config.stack_size)?;
        let scheduler_context =
            Context::new(scheduler_trampoline, 0, &scheduler_stack, &mut host_context)
                .map_err(Error::Platform)?;

        install_signal_handler().map_err(Error::Platform)?;

        Ok(Runtime {
            ring,
            scheduler_context,
            _scheduler_stack: scheduler_stack,
            host_context,
            config,
            timer_armed: false,
        })
    }

    fn halt_timer(&mut self) {
        if !self.timer_armed {
            return;
        }
        self.timer_armed = false;
        let zero = libc::itimerval {
            it_interval: libc::timeval { tv_sec: 0, tv_usec: 0 },
            it_value: libc::timeval { tv_sec: 0, tv_usec: 0 },
        };
        if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &zero, std::ptr::null_mut()) } == -1 {
            log::error!("setitimer(halt) failed: {}", io::Error::last_os_error());
        }
    }

    fn arm_timer(&mut self) {
        let micros = self.config.slice.as_micros().max(1) as i64;
        let tv = libc::timeval {
            tv_sec: micros / 1_000_000,
            tv_usec: micros % 1_000_000,
        };
        let it = libc::itimerval { it_interval: tv, it_value: tv };
        if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &it, std::ptr::null_mut()) } == -1 {
            log::error!("setitimer(arm) failed: {}", io::Error::last_os_error());
        } else {
            self.timer_armed = true;
        }
    }
}

fn install_signal_handler() -> io::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(preempt_handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only ever performs a single context swap (§4.4).
    unsafe { sigaction(Signal::SIGVTALRM, &action) }
        .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    Ok(())
}

/// The preemption handler. Per §4.4/§9 this does *only* a context swap: no
/// allocation, no logging, no ring surgery. All bookkeeping happens once
/// control reaches the scheduler's own stack.
extern "C" fn preempt_handler(_signum: libc::c_int) {
    let rt = RUNTIME.with(|cell| unsafe { (*cell.get()).as_mut() }.map(|rt| rt as *mut Runtime));
    let Some(rt) = rt else {
        // A signal arriving before bootstrap, or on a thread that never
        // touched this crate's API, has nothing to preempt.
        return;
    };
    unsafe {
        let running = (*rt).ring.running;
        Context::swap(&mut (*rt).ring.fcb_mut(running).context, &(*rt).scheduler_context);
    }
}

fn runtime_ptr() -> Result<*mut Runtime> {
    RUNTIME.with(|cell| {
        let slot = cell.get();
        // SAFETY: access is confined to this thread's own TLS cell.
        unsafe {
            if (*slot).is_none() {
                *slot = Some(Runtime::bootstrap(RuntimeConfig::default())?);
            }
            Ok((*slot).as_mut().unwrap() as *mut Runtime)
        }
    })
}

/// Configure the runtime before it is first used on this thread.
///
/// Returns `false` without effect if the runtime has already been
/// bootstrapped on this thread.
pub(crate) fn configure(config: RuntimeConfig) -> bool {
    RUNTIME.with(|cell| unsafe {
        let slot = cell.get();
        if (*slot).is_some() {
            return false;
        }
        match Runtime::bootstrap(config) {
            Ok(rt) => {
                *slot = Some(rt);
                true
            }
            Err(e) => {
                log::error!("failed to bootstrap configured runtime: {e}");
                false
            }
        }
    })
}

/// The scheduler's own entry point (§4.3). Bound once at bootstrap; because
/// it is only ever the *destination* of a `swapcontext` call (the
/// scheduler always hands off with a one-way `setcontext`, never a
/// `swapcontext` that would overwrite its own saved state), each
/// activation restarts this function from the top with a fresh activation
/// record — exactly as the reference implementation's `scheduler()` does.
extern "C" fn scheduler_trampoline(_: usize) -> ! {
    // SAFETY: only ever entered on the thread that owns this TLS slot, and
    // only after bootstrap has populated it — nothing can reach this
    // trampoline otherwise, since it is the bound entry of only this
    // thread's own scheduler stack.
    let rt = RUNTIME.with(|cell| unsafe { (*cell.get()).as_mut().unwrap() as *mut Runtime });
    unsafe { run_scheduler(rt) }
}

/// Steps 1–4 of §4.3.
unsafe fn run_scheduler(rt: *mut Runtime) -> ! {
    (*rt).halt_timer();

    let mut candidate = (*rt).ring.fcb((*rt).ring.running).next;
    loop {
        match (*rt).ring.fcb(candidate).status {
            Status::Ready => break,
            Status::Finished => {
                release_wait_list(rt, candidate);
                let next = (*rt).ring.unlink(candidate);
                if (*rt).ring.size == 0 {
                    log::warn!("fiber ring fully drained; resuming host context");
                    Context::set(&(*rt).host_context);
                }
                candidate = next;
            }
            Status::Blocked => {
                let target = (*rt)
                    .ring
                    .fcb(candidate)
                    .join_target
                    .expect("a Blocked fiber always has a join_target (§4.5 invariant)");
                let target_index = (*rt)
                    .ring
                    .locate(target)
                    .expect("a Blocked fiber's join_target is always still in the ring");
                if (*rt).ring.fcb(target_index).is_finished() {
                    (*rt).ring.fcb_mut(candidate).status = Status::Ready;
                    break;
                }
                candidate = (*rt).ring.fcb(candidate).next;
            }
        }
    }

    (*rt).ring.running = candidate;
    (*rt).arm_timer();
    Context::set(&(*rt).ring.fcb(candidate).context)
}

/// Release every waiter on `target`'s wait list (§4.5): each still-`Blocked`
/// waiter is handed a clone of `target`'s outcome (an `Rc`, so every
/// waiter shares the same underlying value rather than racing to move out
/// of it) and transitioned to `Ready`. Idempotent on an already-empty list.
unsafe fn release_wait_list(rt: *mut Runtime, target: usize) {
    let outcome = (*rt).ring.fcb(target).outcome.clone();
    let nodes: Vec<WaitNode> = std::mem::take(&mut (*rt).ring.fcb_mut(target).wait_list);
    for node in nodes {
        if let Some(waiter_index) = (*rt).ring.locate(node.waiter) {
            let waiter = (*rt).ring.fcb_mut(waiter_index);
            if waiter.status == Status::Blocked {
                waiter.join_rval = outcome.clone();
                waiter.status = Status::Ready;
            }
        }
    }
}

/// The id of the fiber currently running on this thread.
pub(crate) fn self_id() -> Result<FiberId> {
    let rt = runtime_ptr()?;
    unsafe { Ok((*rt).ring.id_of((*rt).ring.running)) }
}

/// This thread's live configured stack size, bootstrapping the runtime
/// (with defaults, if [`configure`] was never called) the same way any
/// other runtime-touching operation would.
pub(crate) fn configured_stack_size() -> Result<usize> {
    let rt = runtime_ptr()?;
    unsafe { Ok((*rt).config.stack_size) }
}

/// Entry function every fiber's stack is bound to. Catches unwinding so one
/// fiber's panic cannot cross into the scheduler's stack, then hands
/// control to [`exit_current`].
pub(crate) extern "C" fn fiber_entry(arg: usize) -> ! {
    type Thunk = Box<dyn FnOnce() -> Rc<dyn Any>>;
    // SAFETY: `arg` was produced by `Box::into_raw` on a `Box<Thunk>` in
    // `create`, and this trampoline is that box's only consumer.
    let thunk: Box<Thunk> = unsafe { Box::from_raw(arg as *mut Thunk) };
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (*thunk)())) {
        Ok(value) => exit_current(Outcome::Value(value)),
        Err(payload) => {
            // `Box<dyn Any + Send>` coerces to `Box<dyn Any>` by dropping
            // the auto-trait bound; this runtime is confined to one OS
            // thread throughout (§5), so the `Send` bound carried no
            // information worth keeping.
            let payload: Box<dyn Any> = payload;
            exit_current(Outcome::Panicked(Rc::from(payload)))
        }
    }
}

/// `exit(v)` (§4.6): publish the outcome, mark `Finished`, and hand control
/// to the scheduler. Never returns.
pub(crate) fn exit_current(outcome: Outcome) -> ! {
    let rt = runtime_ptr().unwrap_or_else(|e| {
        // The runtime must already exist — we are running *inside* a fiber
        // it created. A failure here means the TLS slot was torn down out
        // from under a running fiber, which cannot happen in correct use.
        panic!("fiber exited with no runtime on this thread: {e}");
    });
    unsafe {
        let running = (*rt).ring.running;
        let fcb = (*rt).ring.fcb_mut(running);
        fcb.outcome = Some(outcome);
        fcb.status = Status::Finished;
        Context::swap(&mut (*rt).ring.fcb_mut(running).context, &(*rt).scheduler_context);
    }
    unreachable!("the scheduler never resumes a Finished fiber's context")
}

/// `create(entry, arg)` / `Builder::spawn` (§4.6).
pub(crate) fn create(
    stack_size: usize,
    name: Option<String>,
    f: Box<dyn FnOnce() -> Rc<dyn Any>>,
) -> Result<FiberId> {
    let rt = runtime_ptr()?;
    unsafe {
        (*rt).halt_timer();
        let result = (|| -> Result<FiberId> {
            let stack = Stack::new(stack_size)?;
            let thunk: Box<Box<dyn FnOnce() -> Rc<dyn Any>>> = Box::new(f);
            let arg = Box::into_raw(thunk) as usize;
            let context = Context::new(fiber_entry, arg, &stack, &mut (*rt).scheduler_context)
                .map_err(Error::Platform)?;
            let fcb = Fcb {
                context,
                stack: Some(stack),
                status: Status::Ready,
                outcome: None,
                join_target: None,
                join_rval: None,
                wait_list: Vec::new(),
                next: 0,
                name,
            };
            Ok((*rt).ring.append(fcb))
        })();
        (*rt).arm_timer();
        result
    }
}

/// `join(target)` (§4.5), including the corrected fast path from Open
/// Question 1 (§11): the target's outcome is always captured before any
/// unlink can run, so a joiner never races a reap — the two operations
/// never run concurrently on one OS thread in the first place.
pub(crate) fn join(target: FiberId) -> Result<Rc<dyn Any>> {
    let rt = runtime_ptr()?;
    unsafe {
        let running = (*rt).ring.running;
        let target_index = (*rt).ring.locate(target).ok_or(Error::InvalidTarget)?;
        if target_index == running {
            return Err(Error::JoinSelf);
        }

        if (*rt).ring.fcb(target_index).is_finished() {
            let outcome = (*rt).ring.fcb(target_index).outcome.clone();
            release_wait_list(rt, target_index);
            return unwrap_outcome(outcome.expect("a Finished fiber always has an outcome"));
        }

        (*rt).halt_timer();
        (*rt)
            .ring
            .fcb_mut(target_index)
            .wait_list
            .push(WaitNode { waiter: (*rt).ring.id_of(running) });
        (*rt).ring.fcb_mut(running).join_target = Some(target);
        (*rt).ring.fcb_mut(running).status = Status::Blocked;
        Context::swap(&mut (*rt).ring.fcb_mut(running).context, &(*rt).scheduler_context);

        // Resumed. The scheduler promotes a Blocked joiner to Ready the
        // moment its target is seen to be Finished (run_scheduler's
        // Status::Blocked arm), which happens the first time the target's
        // own ring slot is reaped via `release_wait_list` -- but usually
        // happens earlier than that, while the target is still sitting in
        // the ring waiting for the scheduler's cursor to reach it. In the
        // first case `join_rval` carries the outcome already; in the
        // second it is still None and the target is still present, so we
        // read its outcome directly (§4.5's fallback).
        let join_target = (*rt)
            .ring
            .fcb(running)
            .join_target
            .expect("a resumed joiner always recorded its join_target");
        let outcome = match (*rt).ring.fcb_mut(running).join_rval.take() {
            Some(outcome) => outcome,
            None => {
                let target_index = (*rt).ring.locate(join_target).expect(
                    "a Blocked joiner's target is still in the ring whenever join_rval was never deposited",
                );
                (*rt)
                    .ring
                    .fcb(target_index)
                    .outcome
                    .clone()
                    .expect("a Finished fiber always has an outcome")
            }
        };
        (*rt).ring.fcb_mut(running).join_target = None;
        unwrap_outcome(outcome)
    }
}

fn unwrap_outcome(outcome: Outcome) -> Result<Rc<dyn Any>> {
    match outcome {
        Outcome::Value(v) => Ok(v),
        Outcome::Panicked(payload) => Err(Error::Panicked(PanicPayload(payload))),
    }
}

/// `destroy(id)` (§4.6).
pub(crate) fn destroy(id: FiberId) -> Result<()> {
    let rt = runtime_ptr()?;
    unsafe {
        (*rt).halt_timer();
        let result = (|| {
            let index = (*rt).ring.locate(id).ok_or(Error::InvalidTarget)?;
            if !(*rt).ring.fcb(index).is_finished() {
                return Err(Error::NotFinished);
            }
            (*rt).ring.unlink(index);
            Ok(())
        })();
        (*rt).arm_timer();
        result
    }
}
