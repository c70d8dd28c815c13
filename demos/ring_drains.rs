//! Scenario S6: after every spawned fiber has been joined and destroyed,
//! only `main` is left in the ring, and the host thread keeps running
//! normally — reaping the last fiber does not tear anything down early.

use std::rc::Rc;

use ringfiber::Fiber;

fn main() {
    env_logger::init();

    for i in 0..4 {
        let coro = Fiber::spawn(move || {
            println!("fiber {i} running");
            Rc::new(()) as Rc<dyn std::any::Any>
        })
        .expect("failed to spawn fiber");
        coro.join().expect("failed to join fiber");
        coro.destroy().expect("failed to destroy a finished fiber");
    }

    println!("ring is back down to just main; host thread is unaffected");
}
