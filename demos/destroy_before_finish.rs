//! Scenario S5: destroying a fiber before it has finished is rejected.

use std::rc::Rc;

use ringfiber::{Error, Fiber};

fn main() {
    env_logger::init();

    let coro = Fiber::spawn(|| Rc::new(()) as Rc<dyn std::any::Any>)
        .expect("failed to spawn fiber");

    match coro.destroy() {
        Err(Error::NotFinished) => println!("destroy correctly refused: fiber is not finished"),
        other => panic!("expected Error::NotFinished, got {other:?}"),
    }

    coro.join().expect("failed to join fiber");
    coro.destroy().expect("destroy should succeed once finished");
    println!("destroy succeeded after the fiber finished");
}
