//! Scenario S2: three fibers joined in sequence, one at a time.

use std::rc::Rc;

use ringfiber::Fiber;

fn main() {
    env_logger::init();

    for i in 0..3 {
        let coro = Fiber::spawn(move || {
            println!("fiber {i} counting");
            Rc::new(()) as Rc<dyn std::any::Any>
        })
        .expect("failed to spawn fiber");
        coro.join().expect("failed to join fiber");
    }

    println!("all three fibers finished, in order");
}
