use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

fn configs_for(server: &MockServer) -> (OllamaConfig, GenerationConfig) {
    let uri = Url::parse(&server.uri()).expect("mock server uri is valid");
    let ollama = OllamaConfig {
        host: uri.host_str().expect("mock server has host").to_string(),
        port: uri.port().expect("mock server has port"),
        ..OllamaConfig::default()
    };
    let generation = GenerationConfig {
        model: "mistral:7b-instruct".to_string(),
        max_new_tokens: 64,
        timeout_seconds: 5,
    };
    (ollama, generation)
}

#[test]
fn greedy_options_zero_the_temperature() {
    let generator = OllamaGenerator::new(&OllamaConfig::default(), &GenerationConfig::default())
        .expect("generator should build");

    let greedy = generator.options(&SamplingParams::GREEDY);
    assert_eq!(greedy.temperature, 0.0);
    assert_eq!(greedy.top_p, None);
    assert_eq!(greedy.num_predict, 512);

    let sampled = generator.options(&SamplingParams::sampled(0.9, 0.8));
    assert_eq!(sampled.temperature, 0.8);
    assert_eq!(sampled.top_p, Some(0.9));
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_prompt_and_sampling_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "mistral:7b-instruct",
            "prompt": "User: Hi\nAnswer:",
            "stream": false,
            "options": {"num_predict": 64, "temperature": 0.6, "top_p": 0.85}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "mistral:7b-instruct",
            "response": " ¡Hola!",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (ollama, generation) = configs_for(&server);
    let generator = OllamaGenerator::new(&ollama, &generation).expect("generator should build");

    let output = tokio::task::spawn_blocking(move || {
        generator.generate("User: Hi\nAnswer:", &SamplingParams::sampled(0.85, 0.6))
    })
    .await
    .expect("blocking task should join")
    .expect("generation should succeed");

    assert_eq!(output, " ¡Hola!");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_surfaced_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let (ollama, generation) = configs_for(&server);
    let generator = OllamaGenerator::new(&ollama, &generation).expect("generator should build");

    let result = tokio::task::spawn_blocking(move || {
        generator.generate("prompt", &SamplingParams::GREEDY)
    })
    .await
    .expect("blocking task should join");

    assert!(result.is_err());
}
