// Copyright 2013 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A preemptive, round-robin fiber runtime confined to a single OS thread.
//!
//! Fibers are scheduled cooperatively-preemptively: each gets a fixed
//! virtual-time slice (20ms by default) before the runtime's `SIGVTALRM`
//! handler forces a switch to the next `Ready` fiber, so a fiber that never
//! calls [`Fiber::join`] still yields the CPU on schedule. There is no
//! work-stealing and no cross-thread scheduling — a second OS thread that
//! uses this crate gets its own independent runtime (see the crate's
//! design notes on scope).
//!
//! ```no_run
//! use std::rc::Rc;
//! use ringfiber::Fiber;
//!
//! let child = Fiber::spawn(|| Rc::new(42i32) as Rc<dyn std::any::Any>).unwrap();
//! let result = child.join().unwrap();
//! assert_eq!(*result.downcast::<i32>().unwrap(), 42);
//! ```

pub use builder::{configure, Builder};
pub use error::{Error, PanicPayload, Result};
pub use fcb::FiberId;
pub use fiber::{current, exit, spawn, Fiber};
pub use scheduler::RuntimeConfig;

mod builder;
mod context;
mod error;
mod fcb;
pub mod fiber;
mod ring;
mod scheduler;
mod stack;

#[cfg(test)]
mod tests;
