// The MIT License (MIT)

// Copyright (c) 2015 Rustcc developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use std::any::Any;
use std::rc::Rc;
use std::sync::mpsc::channel;

use crate::error::Error;
use crate::fiber::Fiber;

fn rc_unit() -> Rc<dyn Any> {
    Rc::new(())
}

#[test]
fn test_fiber_basic() {
    let (tx, rx) = channel();
    Fiber::spawn(move || {
        tx.send(1).unwrap();
        rc_unit()
    })
    .unwrap()
    .join()
    .expect("failed to join");

    assert_eq!(rx.recv().unwrap(), 1);
}

#[test]
fn test_fiber_sequential_joins() {
    let (tx, rx) = channel();
    for i in 0..3 {
        let tx = tx.clone();
        Fiber::spawn(move || {
            tx.send(i).unwrap();
            rc_unit()
        })
        .unwrap()
        .join()
        .expect("failed to join");
    }

    assert_eq!(rx.recv().unwrap(), 0);
    assert_eq!(rx.recv().unwrap(), 1);
    assert_eq!(rx.recv().unwrap(), 2);
}

#[test]
fn test_fiber_return_value_propagates() {
    let fiber = Fiber::spawn(|| Rc::new(42i32) as Rc<dyn Any>).unwrap();
    let value = fiber.join().expect("failed to join");
    assert_eq!(*value.downcast::<i32>().unwrap(), 42);
}

#[test]
fn test_fiber_spawn_inside() {
    let (tx, rx) = channel();
    Fiber::spawn(move || {
        tx.send(1).unwrap();

        let tx = tx.clone();
        Fiber::spawn(move || {
            tx.send(2).unwrap();
            rc_unit()
        })
        .unwrap()
        .join()
        .expect("failed to join");

        rc_unit()
    })
    .unwrap()
    .join()
    .expect("failed to join");

    assert_eq!(rx.recv().unwrap(), 1);
    assert_eq!(rx.recv().unwrap(), 2);
}

#[test]
fn test_fiber_panic_surfaces_as_error() {
    let fiber = Fiber::spawn(|| panic!("panic inside a fiber")).unwrap();
    match fiber.join() {
        Err(Error::Panicked(_)) => {}
        other => panic!("expected Error::Panicked, got {other:?}"),
    }
}

#[test]
fn test_fiber_child_panic_does_not_take_parent_down() {
    Fiber::spawn(move || {
        let child = Fiber::spawn(|| panic!("panic inside a fiber's child")).unwrap();
        assert!(child.join().is_err());
        rc_unit()
    })
    .unwrap()
    .join()
    .expect("parent fiber should survive its child's panic");
}

#[test]
fn test_join_self_is_rejected() {
    Fiber::spawn(|| {
        let err = Fiber::current().unwrap().join().unwrap_err();
        assert!(matches!(err, Error::JoinSelf));
        rc_unit()
    })
    .unwrap()
    .join()
    .expect("failed to join");
}

#[test]
fn test_multiple_joiners_see_the_same_outcome() {
    let target = Fiber::spawn(|| Rc::new(7i32) as Rc<dyn Any>).unwrap();

    let a = Fiber::spawn(move || {
        let v = target.join().unwrap();
        Rc::new(*v.downcast::<i32>().unwrap()) as Rc<dyn Any>
    })
    .unwrap();
    let b = Fiber::spawn(move || {
        let v = target.join().unwrap();
        Rc::new(*v.downcast::<i32>().unwrap()) as Rc<dyn Any>
    })
    .unwrap();

    assert_eq!(*a.join().unwrap().downcast::<i32>().unwrap(), 7);
    assert_eq!(*b.join().unwrap().downcast::<i32>().unwrap(), 7);
}

#[test]
fn test_destroy_before_finish_errors() {
    // A freshly created fiber is `Ready`, not `Finished`, until something
    // actually resumes it (a timer tick or an explicit join).
    let fiber = Fiber::spawn(|| rc_unit()).unwrap();

    assert!(matches!(fiber.destroy(), Err(Error::NotFinished)));
    fiber.join().expect("failed to join");
}

#[test]
fn test_destroy_after_finish_succeeds() {
    let fiber = Fiber::spawn(|| rc_unit()).unwrap();
    fiber.join().expect("failed to join");
    fiber.destroy().expect("failed to destroy a finished fiber");
}

#[test]
fn test_stale_id_is_rejected() {
    let fiber = Fiber::spawn(|| rc_unit()).unwrap();
    fiber.join().expect("failed to join");
    fiber.destroy().expect("failed to destroy a finished fiber");

    assert!(matches!(fiber.join(), Err(Error::InvalidTarget)));
}
