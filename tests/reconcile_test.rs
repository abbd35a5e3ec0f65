use h5io::store::{Container, Mode, Node};
use h5io::{
    list_contents, read, write, Error, NdArray, Overwrite, ReadOptions, SlashDecode, SlashPolicy, Value, WriteOptions,
};
use std::path::Path;

fn update() -> WriteOptions {
    WriteOptions { overwrite: Overwrite::Update, ..WriteOptions::default() }
}

fn ints(range: std::ops::Range<i64>) -> Value {
    Value::List(range.map(Value::Int).collect())
}

fn stored_keys(path: &Path) -> Vec<String> {
    let container = Container::open(path, Mode::Read).unwrap();
    match container.root().get("h5io") {
        Some(Node::Group(g)) => g.keys().map(str::to_owned).collect(),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_update_with_same_value_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("same.h5io");
    let value: Value = [
        ("a", ints(0..4)),
        ("b", Value::Array(NdArray::from_vec(vec![1.5f32, 2.5]))),
        ("c", Value::Text("hi".into())),
    ]
    .into_iter()
    .collect();

    write(&path, &value, &update()).unwrap();
    let first = list_contents(&path, "h5io").unwrap();
    write(&path, &value, &update()).unwrap();
    assert_eq!(list_contents(&path, "h5io").unwrap(), first);
    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), value);
}

#[test]
fn test_update_shrinks_lists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("list.h5io");
    write(&path, &ints(0..5), &update()).unwrap();
    write(&path, &ints(10..12), &update()).unwrap();

    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), ints(10..12));
    assert_eq!(stored_keys(&path), vec!["idx_0", "idx_1"]);
}

#[test]
fn test_update_drops_stale_dict_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dict.h5io");
    let big: Value = (0..5).map(|i| (format!("k{i}"), Value::Int(i))).collect();
    let small: Value = [("k1", Value::Int(10)), ("new", Value::Null)].into_iter().collect();
    write(&path, &big, &update()).unwrap();
    write(&path, &small, &update()).unwrap();

    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), small);
    assert_eq!(stored_keys(&path), vec!["key_k1", "key_new"]);
}

#[test]
fn test_update_replaces_a_node_of_another_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("retype.h5io");
    let before: Value = [("x", ints(0..3))].into_iter().collect();
    let after: Value = [("x", Value::Text("flat".into()))].into_iter().collect();
    write(&path, &before, &update()).unwrap();
    write(&path, &after, &update()).unwrap();
    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), after);
}

#[test]
fn test_slashes_roundtrip_with_replace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slash.h5io");
    let value: Value = [("a/b", Value::Int(1)), ("plain", Value::Int(2))].into_iter().collect();

    let strict = WriteOptions::default();
    assert!(matches!(write(&path, &value, &strict), Err(Error::InvalidKey { .. })));
    assert!(!path.exists());

    let opts = WriteOptions { slash: SlashPolicy::Replace, ..WriteOptions::default() };
    write(&path, &value, &opts).unwrap();

    let decoded = read(&path, &ReadOptions { slash: SlashDecode::Replace, ..ReadOptions::default() }).unwrap();
    assert_eq!(decoded, value);

    let raw = read(&path, &ReadOptions::default()).unwrap();
    assert!(raw.as_dict().unwrap().contains_key("a{FWDSLASH}b"));
}

#[test]
fn test_failed_update_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atomic.h5io");
    let good: Value = [("a", Value::Int(1))].into_iter().collect();
    write(&path, &good, &update()).unwrap();

    let bad: Value = [("a", Value::Int(2)), ("b/c", Value::Int(3))].into_iter().collect();
    assert!(write(&path, &bad, &update()).is_err());
    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), good);
}
