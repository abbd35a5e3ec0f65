use h5io::{
    read, write, ChunkedArray, ChunkedList, Error, NdArray, Overwrite, ReadOptions, Value, WriteOptions,
};
use std::path::Path;

const ROWS: usize = 3;
const CHUNK: usize = 2;
const CHUNKS: usize = 4;

fn update() -> WriteOptions {
    WriteOptions { overwrite: Overwrite::Update, ..WriteOptions::default() }
}

/// Columns `[i*CHUNK, (i+1)*CHUNK)` of the row-major `ROWS x CHUNK*CHUNKS`
/// matrix whose entries count up from zero.
fn chunk_payload(i: usize) -> NdArray {
    let width = CHUNK * CHUNKS;
    let mut values = Vec::with_capacity(ROWS * CHUNK);
    for r in 0..ROWS {
        for c in i * CHUNK..(i + 1) * CHUNK {
            values.push((r * width + c) as f64);
        }
    }
    NdArray::from_shape_vec(&[ROWS, CHUNK], values).unwrap()
}

fn write_array_chunk(path: &Path, i: usize) -> h5io::Result<()> {
    let fragment = ChunkedArray::new(chunk_payload(i), vec![ROWS, CHUNK * CHUNKS], vec![ROWS, CHUNK], i)?;
    let value: Value = [("x", Value::ChunkedArray(fragment))].into_iter().collect();
    write(path, &value, &update())
}

fn stored_x(path: &Path) -> Value {
    let back = read(path, &ReadOptions::default()).unwrap();
    back.as_dict().unwrap()["x"].clone()
}

#[test]
fn test_chunks_assemble_in_any_order() {
    let expected = NdArray::from_shape_vec(
        &[ROWS, CHUNK * CHUNKS],
        (0..ROWS * CHUNK * CHUNKS).map(|v| v as f64).collect(),
    )
    .unwrap();

    for order in [[0, 1, 2, 3], [3, 1, 0, 2], [2, 3, 1, 0]] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.h5io");
        for i in order {
            write_array_chunk(&path, i).unwrap();
        }
        assert_eq!(stored_x(&path), Value::Array(expected.clone()));
    }
}

#[test]
fn test_unwritten_chunks_read_as_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.h5io");
    write_array_chunk(&path, 1).unwrap();
    let x = match stored_x(&path) {
        Value::Array(a) => a.to_f64_vec(),
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(&x[..4], &[0.0, 0.0, 2.0, 3.0]);
    assert!(x[4..8].iter().all(|&v| v == 0.0));
}

#[test]
fn test_chunk_geometry_must_match_the_stored_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geometry.h5io");
    write_array_chunk(&path, 0).unwrap();

    let wider = ChunkedArray::new(chunk_payload(0), vec![ROWS, 10], vec![ROWS, CHUNK], 0).unwrap();
    let value: Value = [("x", Value::ChunkedArray(wider))].into_iter().collect();
    assert!(matches!(write(&path, &value, &update()), Err(Error::ShapeMismatch(_))));
}

#[test]
fn test_chunk_past_the_extent_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("range.h5io");
    let fragment = ChunkedArray::new(chunk_payload(0), vec![ROWS, CHUNK * CHUNKS], vec![ROWS, CHUNK], CHUNKS).unwrap();
    let value: Value = [("x", Value::ChunkedArray(fragment))].into_iter().collect();
    assert!(matches!(write(&path, &value, &update()), Err(Error::ChunkOutOfRange { .. })));
}

#[test]
fn test_short_payload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.h5io");
    let narrow = NdArray::from_shape_vec(&[ROWS, 1], vec![1.0f64, 2.0, 3.0]).unwrap();
    let fragment = ChunkedArray::new(narrow, vec![ROWS, CHUNK * CHUNKS], vec![ROWS, CHUNK], 0).unwrap();
    let value: Value = [("x", Value::ChunkedArray(fragment))].into_iter().collect();
    assert!(matches!(
        write(&path, &value, &update()),
        Err(Error::ChunkSizeMismatch { expected: 2, got: 1 })
    ));
}

#[test]
fn test_chunked_list_fills_gaps_with_null() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("list.h5io");
    let first = ChunkedList::new((0..10).map(Value::Int).collect(), 100, 0).unwrap();
    let later = ChunkedList::new((50..60).map(Value::Int).collect(), 100, 50).unwrap();
    write(&path, &Value::ChunkedList(first), &update()).unwrap();
    write(&path, &Value::ChunkedList(later), &update()).unwrap();

    let items = match read(&path, &ReadOptions::default()).unwrap() {
        Value::List(items) => items,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(items.len(), 100);
    for (i, item) in items.iter().enumerate() {
        let expected = if i < 10 || (50..60).contains(&i) { Value::Int(i as i64) } else { Value::Null };
        assert_eq!(*item, expected, "element {i}");
    }
}

#[test]
fn test_chunked_list_restarts_when_size_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restart.h5io");
    let old = ChunkedList::new(vec![Value::Int(1), Value::Int(2)], 4, 0).unwrap();
    let new = ChunkedList::new(vec![Value::Text("z".into())], 3, 2).unwrap();
    write(&path, &Value::ChunkedList(old), &update()).unwrap();
    write(&path, &Value::ChunkedList(new), &update()).unwrap();

    assert_eq!(
        read(&path, &ReadOptions::default()).unwrap(),
        Value::List(vec![Value::Null, Value::Null, Value::Text("z".into())])
    );
}

#[test]
fn test_chunked_list_rejects_items_past_size() {
    let err = ChunkedList::new(vec![Value::Null; 3], 4, 2);
    assert!(matches!(err, Err(Error::ChunkOutOfRange { .. })));
}
