//! Scenario S3: a fiber's return value propagates to its joiner.

use std::rc::Rc;

use ringfiber::Fiber;

fn main() {
    env_logger::init();

    let coro = Fiber::spawn(|| Rc::new(6 * 7) as Rc<dyn std::any::Any>)
        .expect("failed to spawn fiber");

    let value = coro.join().expect("failed to join fiber");
    let value = value.downcast::<i32>().expect("fiber returned an i32");

    println!("the fiber returned {value}");
}
