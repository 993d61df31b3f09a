use super::facts::FactStore;

#[test]
fn first_export_wins() {
    let mut store = FactStore::<String, bool>::new();
    assert!(store.is_empty());
    assert!(store.export("a.f".to_owned(), true));
    assert!(!store.export("a.f".to_owned(), false));
    assert_eq!(store.import("a.f"), Some(&true));
    assert_eq!(store.len(), 1);
}

#[test]
fn missing_fact() {
    let mut store = FactStore::<String, bool>::new();
    store.export("a.f".to_owned(), false);
    assert_eq!(store.import("a.g"), None);
    assert_eq!(store.import("a.f"), Some(&false));
}

#[test]
fn iteration_is_ordered() {
    let mut store = FactStore::new();
    store.export("b.g", true);
    store.export("a.z", false);
    store.export("a.f", true);
    let keys: Vec<_> = store.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec!["a.f", "a.z", "b.g"]);
}

#[test]
fn exports_commute() {
    let mut first = FactStore::new();
    first.export(1, true);
    first.export(2, false);

    let mut second = FactStore::new();
    second.export(2, false);
    second.export(1, true);
    second.export(1, true);

    assert_eq!(first, second);
}
