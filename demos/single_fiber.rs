//! Scenario S1: one fiber, joined once.

use std::rc::Rc;

use ringfiber::Fiber;

fn main() {
    env_logger::init();

    let coro = Fiber::spawn(move || {
        println!("1. Hello from a fiber!");
        Rc::new(()) as Rc<dyn std::any::Any>
    })
    .expect("failed to spawn fiber");

    println!("2. We are here, waiting on the fiber!");

    coro.join().expect("failed to join fiber");

    println!("3. Back in main.");
}
