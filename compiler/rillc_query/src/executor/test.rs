use std::sync::Arc;

use crate::{executor::Executor, key::Key, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Doubled(i64);

impl Key for Doubled {
    type Value = i64;
}

#[derive(Debug)]
struct DoubledExecutor;

impl Executor<Doubled> for DoubledExecutor {
    fn execute(&self, _: &Context, key: Doubled) -> i64 { key.0 * 2 }
}

#[derive(Debug)]
struct TripledExecutor;

impl Executor<Doubled> for TripledExecutor {
    fn execute(&self, _: &Context, key: Doubled) -> i64 { key.0 * 3 }
}

#[test]
fn register_and_retrieve() {
    let mut context = Context::new();

    assert!(context.executor::<Doubled>().is_none());

    context.register_executor(Arc::new(DoubledExecutor));
    let executor = context.executor::<Doubled>().unwrap();

    assert_eq!(executor.execute(&context, Doubled(21)), 42);
}

#[test]
fn registering_again_replaces_and_returns_the_old_executor() {
    let mut context = Context::new();

    context.register_executor(Arc::new(DoubledExecutor));
    let old = context.register_executor::<Doubled, _>(Arc::new(TripledExecutor));

    assert!(old.is_some());
    assert_eq!(old.unwrap().execute(&context, Doubled(1)), 2);
    assert_eq!(context.query(&Doubled(1)), 3);
}

#[test]
#[should_panic(expected = "no executor registered")]
fn querying_without_an_executor_panics() {
    let context = Context::new();
    let _ = context.query(&Doubled(0));
}
