use super::*;
use tempfile::TempDir;

const TEMPLATES_JSON: &str = r#"{
    "general": {
        "prompt_1": "Translate the user's sentence into Spanish.",
        "prompt_2": "Correct the user's Spanish gently."
    },
    "travel": {
        "prompt_1": "Answer using only the context."
    }
}"#;

#[test]
fn lookup_by_corpus_and_id() {
    let templates = PromptTemplates::parse(TEMPLATES_JSON).expect("valid templates");

    assert_eq!(templates.len(), 3);
    assert_eq!(
        templates
            .get(CorpusSelector::Travel, "prompt_1")
            .expect("defined"),
        "Answer using only the context."
    );
    assert_eq!(
        templates.ids(CorpusSelector::General).collect::<Vec<_>>(),
        vec!["prompt_1", "prompt_2"]
    );
    assert_eq!(templates.ids(CorpusSelector::NoRetrieval).count(), 0);
}

#[test]
fn missing_pair_is_config_error() {
    let templates = PromptTemplates::parse(TEMPLATES_JSON).expect("valid templates");

    let err = templates
        .get(CorpusSelector::Travel, "prompt_2")
        .expect_err("not defined for travel");
    assert!(matches!(err, RagError::Config(ref msg) if msg.contains("prompt_2") && msg.contains("travel")));

    assert!(templates.get(CorpusSelector::NoRetrieval, "prompt_1").is_err());
}

#[test]
fn pairs_are_ordered() {
    let templates = PromptTemplates::parse(TEMPLATES_JSON).expect("valid templates");
    let pairs: Vec<_> = templates.pairs().collect();
    assert_eq!(
        pairs,
        vec![
            (CorpusSelector::General, "prompt_1"),
            (CorpusSelector::General, "prompt_2"),
            (CorpusSelector::Travel, "prompt_1"),
        ]
    );
}

#[test]
fn unknown_corpus_key_is_rejected() {
    let result = PromptTemplates::parse(r#"{"sports": {"prompt_1": "x"}}"#);
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[test]
fn load_from_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("prompt_templates.json");
    fs::write(&path, TEMPLATES_JSON).expect("should write templates");

    let templates = PromptTemplates::load(&path).expect("should load");
    assert!(!templates.is_empty());

    let missing = PromptTemplates::load(&temp_dir.path().join("absent.json"));
    assert!(matches!(missing, Err(RagError::Config(_))));
}
