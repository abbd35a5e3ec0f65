use chrono::{FixedOffset, NaiveDate, TimeZone};
use h5io::{
    has, list_contents, object_diff, read, write, ChunkedArray, Error, FrameKind, NdArray, Overwrite, ReadOptions, Scalar,
    SlashDecode, SlashPolicy, SparseFormat, SparseMatrix, TabularFrame, Timestamp, Value, WriteOptions, ZoneOffset,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn scratch() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.h5io");
    (dir, path)
}

fn roundtrip(value: &Value) -> Value {
    let (_dir, path) = scratch();
    write(&path, value, &WriteOptions::default()).unwrap();
    read(&path, &ReadOptions::default()).unwrap()
}

#[test]
fn test_dict_with_int_and_list() {
    let value: Value = [
        ("a", Value::Int(1)),
        ("b", Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])),
    ]
    .into_iter()
    .collect();
    let back = roundtrip(&value);
    assert_eq!(back, value);
    let map = back.as_dict().unwrap();
    assert!(matches!(map["a"], Value::Int(1)));
    assert!(matches!(map["b"], Value::List(_)));
}

#[test]
fn test_scalars_roundtrip() {
    let naive = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap().and_hms_micro_opt(5, 6, 7, 890).unwrap();
    let aware = FixedOffset::west_opt(5 * 3600).unwrap().with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
    let value = Value::List(vec![
        Value::Null,
        Value::Bool(true),
        Value::Int(-7),
        Value::Float(0.25),
        Value::Text("héllo wörld".into()),
        Value::Scalar(Scalar::Float32(1.5)),
        Value::Scalar(Scalar::UInt8(200)),
        Value::Scalar(Scalar::Bool(false)),
        Value::Datetime(Timestamp::Naive(naive)),
        Value::Datetime(Timestamp::Aware(aware)),
        Value::Timezone(ZoneOffset::utc()),
        Value::Timezone(ZoneOffset::new(-5 * 3_600_000_000, Some("EST".into())).unwrap()),
    ]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn test_tuple_stays_tuple() {
    let value = Value::Tuple(vec![Value::Int(1), Value::Text("x".into())]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn test_arrays_roundtrip() {
    let value = Value::List(vec![
        Value::Array(NdArray::from_shape_vec(&[2, 3], vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()),
        Value::Array(NdArray::from_vec(vec![true, false, true])),
        Value::Array(NdArray::from_vec(Vec::<i16>::new())),
        Value::MultiArray(vec![
            NdArray::from_shape_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap(),
            NdArray::from_shape_vec(&[1, 2], vec![5i32, 6]).unwrap(),
        ]),
    ]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn test_sparse_roundtrip() {
    let csr = SparseMatrix::new(
        SparseFormat::Csr,
        (3, 4),
        NdArray::from_vec(vec![1.0f64, 2.0, 3.0]),
        vec![0, 3, 1],
        vec![0, 2, 2, 3],
    )
    .unwrap();
    let csc = SparseMatrix::new(
        SparseFormat::Csc,
        (3, 2),
        NdArray::from_vec(vec![4.0f64, 5.0]),
        vec![2, 0],
        vec![0, 1, 2],
    )
    .unwrap();
    let value: Value = [("csr", Value::Sparse(csr)), ("csc", Value::Sparse(csc))].into_iter().collect();
    let back = roundtrip(&value);
    assert!(object_diff(&value, &back).is_empty());
    assert_eq!(back, value);
}

#[test]
fn test_frames_are_written_after_close() {
    let frame = TabularFrame::data_frame(vec!["x".into(), "y".into()], 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let series = TabularFrame::series("s", vec![9.0, 8.0, 7.0]).unwrap();
    let value: Value = [("df", Value::Frame(frame)), ("s", Value::Frame(series))].into_iter().collect();
    let back = roundtrip(&value);
    assert_eq!(back, value);
    match &back.as_dict().unwrap()["s"] {
        Value::Frame(f) => assert_eq!(f.kind(), FrameKind::Series),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_existing_file_needs_overwrite() {
    let (_dir, path) = scratch();
    write(&path, &Value::Int(1), &WriteOptions::default()).unwrap();
    let err = write(&path, &Value::Int(2), &WriteOptions::default());
    assert!(matches!(err, Err(Error::FileExists(_))));

    let opts = WriteOptions { overwrite: Overwrite::Replace, ..WriteOptions::default() };
    write(&path, &Value::Int(2), &opts).unwrap();
    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), Value::Int(2));
}

#[test]
fn test_update_keeps_other_titles() {
    let (_dir, path) = scratch();
    let a = WriteOptions { title: "first".into(), ..WriteOptions::default() };
    write(&path, &Value::Text("one".into()), &a).unwrap();
    let b = WriteOptions { title: "second".into(), overwrite: Overwrite::Update, ..WriteOptions::default() };
    write(&path, &Value::Text("two".into()), &b).unwrap();

    assert!(has(&path, "first").unwrap());
    assert!(has(&path, "second").unwrap());
    assert!(!has(&path, "third").unwrap());
    let first = read(&path, &ReadOptions { title: "first".into(), ..ReadOptions::default() }).unwrap();
    assert_eq!(first, Value::Text("one".into()));
}

#[test]
fn test_missing_title_and_file() {
    let (_dir, path) = scratch();
    assert!(matches!(has(&path, "h5io"), Err(Error::NotFound(_))));
    write(&path, &Value::Null, &WriteOptions::default()).unwrap();
    let opts = ReadOptions { title: "other".into(), ..ReadOptions::default() };
    assert!(matches!(read(&path, &opts), Err(Error::NotFound(t)) if t == "other"));
}

#[test]
fn test_compression_level_is_validated() {
    let (_dir, path) = scratch();
    let opts = WriteOptions { compression: 10, ..WriteOptions::default() };
    assert!(matches!(write(&path, &Value::Int(1), &opts), Err(Error::InvalidArgument(_))));
    assert!(!path.exists());
}

#[test]
fn test_uncompressed_and_lz4_containers_read_back() {
    let value = Value::Array(NdArray::from_vec((0..1000).map(|i| i as f32).collect::<Vec<_>>()));
    for (codec, level) in [(h5io::CodecId::None, 0), (h5io::CodecId::Lz4, 1), (h5io::CodecId::Zstd, 9)] {
        let (_dir, path) = scratch();
        let opts = WriteOptions { codec, compression: level, ..WriteOptions::default() };
        write(&path, &value, &opts).unwrap();
        assert_eq!(read(&path, &ReadOptions::default()).unwrap(), value);
    }
}

#[test]
fn test_json_fast_path_roundtrip() {
    let (_dir, path) = scratch();
    let mut inner = BTreeMap::new();
    inner.insert("k/1".to_owned(), Value::List(vec![Value::Float(1.5), Value::Null, Value::Bool(true)]));
    let value = Value::Dict(inner);
    let opts = WriteOptions { use_json: true, slash: SlashPolicy::Replace, ..WriteOptions::default() };
    write(&path, &value, &opts).unwrap();

    let listing = list_contents(&path, "h5io").unwrap();
    assert!(listing.starts_with("Root type: json"));

    let ropts = ReadOptions { slash: SlashDecode::Replace, ..ReadOptions::default() };
    assert_eq!(read(&path, &ropts).unwrap(), value);
}

#[test]
fn test_listing_describes_children() {
    let (_dir, path) = scratch();
    let value: Value = [
        ("arr", Value::Array(NdArray::from_shape_vec(&[3, 2], vec![0u8; 6]).unwrap())),
        ("text", Value::Text("a fairly long string".into())),
        ("items", Value::List(vec![Value::Int(1), Value::Int(2)])),
    ]
    .into_iter()
    .collect();
    write(&path, &value, &WriteOptions::default()).unwrap();
    let listing = list_contents(&path, "h5io").unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines[0], "Root type: dict | Items: 3");
    assert!(lines[2].starts_with("---- Key: key_arr"));
    assert!(lines[2].contains("Shape: (3, 2)"));
    assert!(lines[3].contains("Type: list") && lines[3].contains("Items: 2"));
    assert!(lines[4].contains("Text: a fairly l..."));
}

fn nested_lists(depth: usize) -> Value {
    let mut value = Value::Int(42);
    for _ in 0..depth {
        value = Value::List(vec![value, Value::Text("pad".into())]);
    }
    value
}

#[test]
fn test_deeply_nested_lists_roundtrip() {
    let (_dir, path) = scratch();
    let value = nested_lists(120);
    write(&path, &value, &WriteOptions::default()).unwrap();
    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), value);

    // update mode has to load the existing deep tree first
    let shallower = nested_lists(100);
    let opts = WriteOptions { overwrite: Overwrite::Update, ..WriteOptions::default() };
    write(&path, &shallower, &opts).unwrap();
    assert_eq!(read(&path, &ReadOptions::default()).unwrap(), shallower);
}

#[test]
fn test_csc_keeps_trailing_empty_rows() {
    let csc = SparseMatrix::new(
        SparseFormat::Csc,
        (5, 2),
        NdArray::from_vec(vec![4.0f64, 5.0]),
        vec![1, 0],
        vec![0, 1, 2],
    )
    .unwrap();
    let value = Value::Sparse(csc);
    match roundtrip(&value) {
        Value::Sparse(m) => assert_eq!(m.shape(), (5, 2)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_listing_shows_chunked_array_shape() {
    let (_dir, path) = scratch();
    let chunk = ChunkedArray::new(
        NdArray::from_shape_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap(),
        vec![2, 6],
        vec![2, 2],
        0,
    )
    .unwrap();
    let value: Value = [("x", Value::ChunkedArray(chunk))].into_iter().collect();
    write(&path, &value, &WriteOptions::default()).unwrap();
    let listing = list_contents(&path, "h5io").unwrap();
    let line = listing.lines().find(|l| l.contains("key_x")).unwrap();
    assert!(line.contains("Type: chunkedarray"), "{line}");
    assert!(line.contains("Shape: (2, 6)"), "{line}");
}
