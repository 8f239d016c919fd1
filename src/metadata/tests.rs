use super::*;
use tempfile::TempDir;

const PAIRS_JSONL: &str = r#"{"source_text": "hello", "target_text": "hola", "provenance": "tatoeba"}
{"en": "goodbye", "es": "adiós", "source": "opus"}
"#;

const TRAVEL_JSONL: &str = r#"{"lang": "en", "city": "Oaxaca", "source": "wikivoyage", "chunk_id": "oaxaca_en_0", "text": "Oaxaca is known for its mole.", "section": "Eat"}
{"city": "Madrid", "chunk_id": "madrid_es_3", "text": "El Prado abre a las diez.", "section": "See"}
"#;

#[test]
fn parses_sentence_pairs_with_short_field_aliases() {
    let store = MetadataStore::parse(PAIRS_JSONL, RecordKind::SentencePair)
        .expect("should parse sentence pairs");

    assert_eq!(store.len(), 2);
    assert_eq!(store.kind(), RecordKind::SentencePair);

    let Record::SentencePair(second) = store.get(1).expect("record 1 exists") else {
        panic!("expected a sentence pair");
    };
    assert_eq!(second.source_text, "goodbye");
    assert_eq!(second.target_text, "adiós");
    assert_eq!(second.provenance, "opus");
}

#[test]
fn parses_travel_chunks() {
    let store = MetadataStore::parse(TRAVEL_JSONL, RecordKind::TravelChunk)
        .expect("should parse travel chunks");

    let Record::TravelChunk(first) = store.get(0).expect("record 0 exists") else {
        panic!("expected a travel chunk");
    };
    assert_eq!(first.city, "Oaxaca");
    assert_eq!(first.section, "Eat");
    assert_eq!(first.lang.as_deref(), Some("en"));

    let Record::TravelChunk(second) = store.get(1).expect("record 1 exists") else {
        panic!("expected a travel chunk");
    };
    assert_eq!(second.lang, None);
    assert_eq!(second.chunk_id, "madrid_es_3");
}

#[test]
fn missing_required_field_is_a_hard_error() {
    let content = r#"{"chunk_id": "x_0", "city": "Lima", "section": "Go"}"#;
    let result = MetadataStore::parse(content, RecordKind::TravelChunk);

    let Err(RagError::Metadata(msg)) = result else {
        panic!("expected metadata error, got {:?}", result);
    };
    assert!(msg.contains("line 1"));
    assert!(msg.contains("text"));
}

#[test]
fn blank_line_in_the_middle_is_rejected() {
    let content = "{\"en\": \"a\", \"es\": \"b\", \"source\": \"c\"}\n\n{\"en\": \"d\", \"es\": \"e\", \"source\": \"f\"}\n";
    let result = MetadataStore::parse(content, RecordKind::SentencePair);
    assert!(matches!(result, Err(RagError::Metadata(msg)) if msg.contains("line 2")));
}

#[test]
fn out_of_range_position_is_integrity_error() {
    let store = MetadataStore::parse(PAIRS_JSONL, RecordKind::SentencePair)
        .expect("should parse sentence pairs");
    assert!(matches!(store.get(2), Err(RagError::Integrity(_))));
}

#[test]
fn from_records_rejects_mixed_kinds() {
    let records = vec![Record::TravelChunk(TravelChunk {
        text: "t".to_string(),
        chunk_id: "c".to_string(),
        city: "Rome".to_string(),
        section: "intro".to_string(),
        lang: None,
        source: None,
    })];
    let result = MetadataStore::from_records(RecordKind::SentencePair, records);
    assert!(matches!(result, Err(RagError::Metadata(_))));
}

#[test]
fn indexed_text_and_summary() {
    let pair = Record::SentencePair(SentencePair {
        source_text: "thanks".to_string(),
        target_text: "gracias".to_string(),
        provenance: "tatoeba".to_string(),
    });
    assert_eq!(pair.indexed_text(), "thanks");
    assert_eq!(pair.summary(), "thanks -> gracias");
}

#[test]
fn save_and_reload_preserves_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("meta").join("travel.jsonl");

    let store = MetadataStore::parse(TRAVEL_JSONL, RecordKind::TravelChunk)
        .expect("should parse travel chunks");
    store.save(&path).expect("should save store");

    let reloaded = MetadataStore::load(&path, RecordKind::TravelChunk).expect("should reload");
    assert_eq!(reloaded, store);
}
