//! Integration tests that need a real preemption timer in play: a fiber
//! that never calls `join` still gets interleaved with its sibling because
//! the 20ms virtual-time slice forces a switch out from under it.

use std::cell::RefCell;
use std::rc::Rc;

use ringfiber::Fiber;

#[test]
fn busy_fibers_interleave_without_yielding() {
    // Each fiber spins on a shared, unsynchronized counter it expects to
    // make local progress on. If neither fiber voluntarily yielded and the
    // scheduler only switched on `join`/`exit`, one of them would run to
    // completion before the other ever got a slice. Record the order
    // individual fibers observe ticks in; if both sequences are
    // interleaved (not strictly before/after one another), preemption
    // actually happened.
    let log = Rc::new(RefCell::new(Vec::new()));

    let log_a = log.clone();
    let a = Fiber::spawn(move || {
        for tick in 0..500_000u64 {
            if tick % 100_000 == 0 {
                log_a.borrow_mut().push(('a', tick));
            }
        }
        Rc::new(()) as Rc<dyn std::any::Any>
    })
    .expect("failed to spawn fiber a");

    let log_b = log.clone();
    let b = Fiber::spawn(move || {
        for tick in 0..500_000u64 {
            if tick % 100_000 == 0 {
                log_b.borrow_mut().push(('b', tick));
            }
        }
        Rc::new(()) as Rc<dyn std::any::Any>
    })
    .expect("failed to spawn fiber b");

    a.join().expect("failed to join fiber a");
    b.join().expect("failed to join fiber b");

    let observed = log.borrow();
    let first_a = observed.iter().position(|(who, _)| *who == 'a').unwrap();
    let first_b = observed.iter().position(|(who, _)| *who == 'b').unwrap();
    let last_a = observed.iter().rposition(|(who, _)| *who == 'a').unwrap();
    let last_b = observed.iter().rposition(|(who, _)| *who == 'b').unwrap();

    assert!(
        first_a < last_b && first_b < last_a,
        "expected the two fibers' progress to interleave under preemption, got {observed:?}"
    );
}

#[test]
fn join_wakes_a_blocked_waiter_exactly_once() {
    let target = Fiber::spawn(|| Rc::new(5i32) as Rc<dyn std::any::Any>)
        .expect("failed to spawn target fiber");

    let waiter = Fiber::spawn(move || {
        let value = target.join().expect("failed to join target fiber");
        Rc::new(*value.downcast::<i32>().unwrap() * 2) as Rc<dyn std::any::Any>
    })
    .expect("failed to spawn waiter fiber");

    let result = waiter.join().expect("failed to join waiter fiber");
    assert_eq!(*result.downcast::<i32>().unwrap(), 10);
}
