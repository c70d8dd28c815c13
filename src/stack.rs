// Copyright 2013 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A fiber's stack. The name "Stack" is a vestige of segmented stacks.

use std::fmt;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{mmap_anonymous, mprotect, munmap, MapFlags, ProtFlags};

use crate::error::{Error, Result};

/// Default size for a fiber's stack, matching the reference design's
/// recommendation (64 KiB).
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

fn page_size() -> usize {
    // SAFETY: sysconf(_SC_PAGESIZE) never fails on the platforms this crate
    // targets.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// An owned, guard-paged stack mapped directly from the kernel.
///
/// There is no pool here: the ring's lifecycle model already owns exactly
/// one stack per fiber control block and frees it the moment the block is
/// unlinked (§4.2), so a reuse pool would just be a second allocator
/// bolted onto the first for no benefit.
pub struct Stack {
    base: NonNull<libc::c_void>,
    len: usize,
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("base", &self.base)
            .field("len", &self.len)
            .finish()
    }
}

// The mapping itself has no thread affinity; only the fiber runtime that
// uses it (one OS thread per runtime, §5) is thread-confined.
unsafe impl Send for Stack {}

impl Stack {
    /// Map a new stack of at least `size` bytes, rounded up to a whole
    /// number of pages plus one extra guard page at the low end (stacks
    /// grow down on every architecture this crate targets).
    pub fn new(size: usize) -> Result<Stack> {
        let page = page_size();
        let usable = size.next_multiple_of(page);
        let total = usable + page;

        let len = NonZeroUsize::new(total).expect("stack size must be non-zero");
        // SAFETY: anonymous mapping, not backed by a file, private to this
        // process.
        let base = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_STACK,
            )
        }
        .map_err(|_| Error::Alloc { what: "fiber stack" })?;

        // The low page becomes the guard: an overflow walking off the low
        // end of the stack hits PROT_NONE and traps instead of corrupting a
        // neighboring mapping.
        unsafe { mprotect(base, page, ProtFlags::PROT_NONE) }
            .map_err(|_| Error::Alloc { what: "stack guard page" })?;

        Ok(Stack { base, len: total })
    }

    /// Pointer to the low end of the allocated region (the guard page).
    pub fn start(&self) -> *mut u8 {
        self.base.as_ptr() as *mut u8
    }

    /// Pointer one byte past the high end of the allocated region — the
    /// value `uc_stack.ss_sp`/`ss_size` want as the fiber's initial `sp`.
    pub fn end(&self) -> *mut u8 {
        unsafe { self.start().add(self.len) }
    }

    /// Usable size in bytes, including the guard page.
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // SAFETY: `base`/`len` describe exactly the mapping created in
        // `new`, and nothing else can still reference it once the owning
        // fiber control block has been unlinked from the ring.
        if let Err(e) = unsafe { munmap(self.base, self.len) } {
            log::warn!("munmap of fiber stack failed: {e}");
        }
    }
}
