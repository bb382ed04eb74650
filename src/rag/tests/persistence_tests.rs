use super::{hash_embedder, strings, TestLoader};
use crate::error::RagError;
use crate::flat::DistanceBackend;
use crate::rag::persistence::{read_state, write_state};
use crate::rag::{RagIndex, VectorLoad};
use std::fs;
use tempfile::TempDir;

fn populated(dir: &TempDir) -> RagIndex {
    let mut index = RagIndex::new("paper", hash_embedder(24), Some(dir.path()));
    index
        .add_texts(&strings(&["abstract text", "method section", "results table"]))
        .unwrap();
    index
}

fn assert_same_index(a: &RagIndex, b: &RagIndex) {
    assert_eq!(a.count(), b.count());
    assert_eq!(a.texts(), b.texts());
    assert_eq!(a.document_id(), b.document_id());
    assert_eq!(a.model_identifier(), b.model_identifier());
    for i in 0..a.count() {
        let va = a.get_vector_by_index(i).unwrap();
        let vb = b.get_vector_by_index(i).unwrap();
        for (x, y) in va.iter().zip(vb.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
    }
}

#[test]
fn test_add_texts_persists_both_artifacts() {
    let dir = TempDir::new().unwrap();
    let _index = populated(&dir);

    assert!(dir.path().join("paper_rag_index.bin").exists());
    assert!(dir.path().join("paper_rag_state.json").exists());

    let state = read_state(&dir.path().join("paper_rag_state.json")).unwrap();
    assert_eq!(state.document_id, "paper");
    assert_eq!(state.model_identifier, "hash-24");
    assert_eq!(state.text_store.len(), 3);
    assert_eq!(state.dimension, Some(24));
    assert_eq!(state.state_folder_path.as_deref(), Some(dir.path()));
}

#[test]
fn test_save_then_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let index = populated(&dir);
    let state_path = index.state_path().unwrap().to_path_buf();
    index.save_state(&state_path).unwrap();

    let restored = RagIndex::load_state(&state_path, &TestLoader, DistanceBackend::Unrolled).unwrap();
    assert_same_index(&index, &restored);
    assert_eq!(restored.vector_load(), &VectorLoad::Loaded);

    // Restored index keeps appending in place
    let mut restored = restored;
    restored.add_texts(&strings(&["appendix"])).unwrap();
    let again = RagIndex::from_document_id("paper", dir.path(), &TestLoader, DistanceBackend::Unrolled)
        .unwrap();
    assert_eq!(again.count(), 4);
    assert_eq!(again.get_text_by_index(3).unwrap(), "appendix");
}

#[test]
fn test_memory_only_save_state_keeps_vectors() {
    let dir = TempDir::new().unwrap();
    let mut index = RagIndex::new("mem", hash_embedder(8), None);
    index.add_texts(&strings(&["a", "b", "c"])).unwrap();

    let state_path = dir.path().join("mem_rag_state.json");
    index.save_state(&state_path).unwrap();
    assert!(dir.path().join("mem_rag_index.bin").exists());
    assert!(index.index_path().is_none());

    let restored = RagIndex::load_state(&state_path, &TestLoader, DistanceBackend::Unrolled).unwrap();
    assert_eq!(restored.vector_load(), &VectorLoad::Loaded);
    assert_same_index(&index, &restored);
}

#[test]
fn test_failed_autosave_keeps_prior_state_file() {
    let dir = TempDir::new().unwrap();
    let mut index = RagIndex::new("doc", hash_embedder(8), Some(dir.path()));
    index.add_texts(&strings(&["first"])).unwrap();

    let state_path = dir.path().join("doc_rag_state.json");
    let before = fs::read(&state_path).unwrap();

    // A directory squatting on the temp name makes the state write fail
    fs::create_dir(dir.path().join("doc_rag_state.json.tmp")).unwrap();
    index.add_texts(&strings(&["second"])).unwrap();

    assert_eq!(index.count(), 2);
    assert_eq!(index.get_text_by_index(1).unwrap(), "second");
    assert_eq!(fs::read(&state_path).unwrap(), before);
}

#[test]
fn test_failed_vector_autosave_keeps_prior_artifact() {
    let dir = TempDir::new().unwrap();
    let mut index = RagIndex::new("doc", hash_embedder(4), Some(dir.path()));
    index.add_vectors(&[vec![1.0, 0.0, 0.0, 0.0]]).unwrap();

    let index_path = dir.path().join("doc_rag_index.bin");
    let before = fs::read(&index_path).unwrap();

    fs::create_dir(dir.path().join("doc_rag_index.bin.tmp")).unwrap();
    index.add_vectors(&[vec![0.0, 1.0, 0.0, 0.0]]).unwrap();

    assert_eq!(index.count(), 2);
    assert_eq!(fs::read(&index_path).unwrap(), before);
}

#[test]
fn test_save_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let index = populated(&dir);

    index.save().unwrap();
    let first = RagIndex::from_document_id("paper", dir.path(), &TestLoader, DistanceBackend::Unrolled)
        .unwrap();
    index.save().unwrap();
    let second = RagIndex::from_document_id("paper", dir.path(), &TestLoader, DistanceBackend::Unrolled)
        .unwrap();

    assert_same_index(&first, &second);
}

#[test]
fn test_mixed_vectors_and_texts_roundtrip() {
    let dir = TempDir::new().unwrap();
    let mut index = RagIndex::new("mixed", hash_embedder(4), Some(dir.path()));
    let raw: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32, 0.0, 0.0, 1.0]).collect();
    index.add_vectors(&raw).unwrap();
    index
        .add_texts(&strings(&["t0", "t1", "t2", "t3", "t4"]))
        .unwrap();
    index.save().unwrap();

    let restored = RagIndex::from_document_id("mixed", dir.path(), &TestLoader, DistanceBackend::Unrolled)
        .unwrap();
    assert_eq!(restored.count(), 10);
    assert_eq!(restored.text_count(), 5);
    assert_eq!(restored.get_vector_by_index(3).unwrap(), vec![3.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_deleted_vector_artifact_keeps_texts() {
    let dir = TempDir::new().unwrap();
    let index = populated(&dir);
    let state_path = index.state_path().unwrap().to_path_buf();
    fs::remove_file(index.index_path().unwrap()).unwrap();

    let restored = RagIndex::load_state(&state_path, &TestLoader, DistanceBackend::Unrolled).unwrap();
    assert_eq!(restored.count(), 0);
    assert_eq!(restored.text_count(), 3);
    assert_eq!(restored.vector_load(), &VectorLoad::Missing);
    assert_eq!(restored.get_text_by_index(1).unwrap(), "method section");
}

#[test]
fn test_corrupt_vector_artifact_recovers_empty() {
    let dir = TempDir::new().unwrap();
    let index = populated(&dir);
    let state_path = index.state_path().unwrap().to_path_buf();
    let index_path = index.index_path().unwrap().to_path_buf();

    let mut bytes = fs::read(&index_path).unwrap();
    bytes.truncate(bytes.len() - 3);
    fs::write(&index_path, bytes).unwrap();

    let restored = RagIndex::load_state(&state_path, &TestLoader, DistanceBackend::Unrolled).unwrap();
    assert_eq!(restored.count(), 0);
    assert_eq!(restored.dimension(), 24);
    assert_eq!(restored.text_count(), 3);
    assert!(matches!(restored.vector_load(), VectorLoad::Recovered(_)));
}

#[test]
fn test_state_dimension_must_match_model() {
    let dir = TempDir::new().unwrap();
    let index = populated(&dir);
    let state_path = index.state_path().unwrap().to_path_buf();

    let mut state = index.to_state();
    state.dimension = Some(99);
    write_state(&state, &state_path).unwrap();

    let result = RagIndex::load_state(&state_path, &TestLoader, DistanceBackend::Unrolled);
    assert!(matches!(
        result,
        Err(RagError::DimensionMismatch { expected: 24, got: 99 })
    ));
}

#[test]
fn test_corrupt_state_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let index = populated(&dir);
    let state_path = index.state_path().unwrap().to_path_buf();
    fs::write(&state_path, "not json at all").unwrap();

    let result = RagIndex::load_state(&state_path, &TestLoader, DistanceBackend::Unrolled);
    assert!(matches!(result, Err(RagError::Persistence(_))));
}

#[test]
fn test_state_for_other_document_is_rejected() {
    let dir = TempDir::new().unwrap();
    let index = populated(&dir);

    // Copy paper's artifacts under another document's names
    fs::copy(index.state_path().unwrap(), dir.path().join("other_rag_state.json")).unwrap();
    fs::copy(index.index_path().unwrap(), dir.path().join("other_rag_index.bin")).unwrap();

    let result = RagIndex::from_document_id("other", dir.path(), &TestLoader, DistanceBackend::Unrolled);
    assert!(matches!(result, Err(RagError::Persistence(_))));
}
