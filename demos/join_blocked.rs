//! Scenario S4: joining a fiber that is itself blocked on a join.

use std::rc::Rc;

use ringfiber::Fiber;

fn main() {
    env_logger::init();

    // `leaf` takes a few preemption slices to finish; `middle` blocks on it
    // immediately. By the time main joins `middle`, `middle` is already
    // `Blocked` rather than `Finished` or `Ready`.
    let leaf = Fiber::spawn(|| {
        let mut total = 0u64;
        for n in 0..200_000 {
            total = total.wrapping_add(n);
        }
        Rc::new(total) as Rc<dyn std::any::Any>
    })
    .expect("failed to spawn leaf fiber");

    let middle = Fiber::spawn(move || {
        let total = leaf.join().expect("failed to join leaf fiber");
        total
    })
    .expect("failed to spawn middle fiber");

    let total = middle.join().expect("failed to join middle fiber");
    let total = total.downcast::<u64>().expect("fiber returned a u64");

    println!("leaf's total, relayed through a blocked joiner: {total}");
}
