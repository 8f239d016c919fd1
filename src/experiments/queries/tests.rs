use super::*;

const QUERY_FILE: &str = "\
Mode: General
En:
How do I say good morning?
Where is the library?

Es:
¿Cómo se dice gracias?

Mode: travel
En: What should I see in Oaxaca?
Mode: no_retrieval
En:
Tell me a fun fact.
Es:
Cuéntame un dato curioso.
";

#[test]
fn parses_blocks_in_file_order() {
    let queries = parse_query_file(QUERY_FILE).expect("query file should parse");

    let flat: Vec<(CorpusSelector, &str)> = queries
        .iter()
        .map(|q| (q.corpus, q.query.as_str()))
        .collect();
    assert_eq!(
        flat,
        vec![
            (CorpusSelector::General, "How do I say good morning?"),
            (CorpusSelector::General, "Where is the library?"),
            (CorpusSelector::General, "¿Cómo se dice gracias?"),
            (CorpusSelector::Travel, "What should I see in Oaxaca?"),
            (CorpusSelector::NoRetrieval, "Tell me a fun fact."),
            (CorpusSelector::NoRetrieval, "Cuéntame un dato curioso."),
        ]
    );
}

#[test]
fn unknown_mode_is_config_error() {
    let result = parse_query_file("Mode: sports\nEn: Who won?\n");
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[test]
fn text_before_first_mode_is_ignored() {
    let queries =
        parse_query_file("notes\nEn: ignored\nMode: travel\nEs: ¿Qué ver?\n").expect("parses");
    assert_eq!(
        queries,
        vec![BatchQuery {
            corpus: CorpusSelector::Travel,
            query: "¿Qué ver?".to_string(),
        }]
    );
}

#[test]
fn experiment_queries_by_corpus() {
    let queries = ExperimentQueries::parse(
        r#"{"travel": {"en": ["What to eat in Lima?"], "es": ["¿Qué comer en Lima?"]}}"#,
    )
    .expect("valid experiment queries");

    let travel = queries
        .for_corpus(CorpusSelector::Travel)
        .expect("travel queries exist");
    assert_eq!(travel.keys().collect::<Vec<_>>(), vec!["en", "es"]);
    assert!(matches!(
        queries.for_corpus(CorpusSelector::General),
        Err(RagError::Config(_))
    ));
}
