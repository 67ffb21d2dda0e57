use crate::Arena;

#[test]
fn insert_assigns_distinct_ids() {
    let mut arena = Arena::new();

    let one = arena.insert("one");
    let two = arena.insert("two");

    assert_ne!(one, two);
    assert_eq!(arena[one], "one");
    assert_eq!(arena[two], "two");
    assert_eq!(arena.len(), 2);
}

#[test]
fn ids_stay_valid_across_growth() {
    let mut arena = Arena::new();

    let first = arena.insert(0usize);
    let ids: Vec<_> = (1..512usize).map(|i| arena.insert(i)).collect();

    assert_eq!(arena[first], 0);
    for (expected, id) in (1..512usize).zip(ids) {
        assert_eq!(arena[id], expected);
    }
}

#[test]
fn get_mut_updates_in_place() {
    let mut arena = Arena::new();

    let id = arena.insert(1);
    *arena.get_mut(id).unwrap() += 41;

    assert_eq!(arena[id], 42);
}

#[test]
fn missing_id_is_none() {
    let arena = Arena::<u32>::new();

    assert!(arena.get(crate::Id::new(7)).is_none());
    assert!(arena.is_empty());
}
