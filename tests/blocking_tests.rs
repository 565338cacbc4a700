//! Integration tests for the blocking client.
//!
//! The mock server runs on its own runtime; the blocking client drives its
//! requests from plain `#[test]` functions.

use fhir_client::{blocking, BaseUrl, ClientConfig, FhirError, HttpMethod, Include};
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    client: blocking::FhirClient,
    server: MockServer,
    runtime: Runtime,
}

impl Harness {
    fn new() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        let config = ClientConfig::builder()
            .base_url(BaseUrl::new(format!("{}/fhir", server.uri())).unwrap())
            .build()
            .unwrap();
        let client = blocking::FhirClient::new(config).unwrap();
        Self {
            client,
            server,
            runtime,
        }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }
}

fn bundle(entries: &[Value], next: Option<&str>) -> Value {
    let mut bundle = json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "entry": entries.iter().map(|r| json!({"resource": r})).collect::<Vec<_>>()
    });
    if let Some(next) = next {
        bundle["link"] = json!([{"relation": "next", "url": next}]);
    }
    bundle
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn test_blocking_resource_lifecycle() {
    let harness = Harness::new();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/fhir/Patient"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "resourceType": "Patient",
                "id": "p1",
                "active": true
            }))),
    );
    harness.mount(
        Mock::given(method("PATCH"))
            .and(path("/fhir/Patient/p1"))
            .and(body_json(json!({"active": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Patient",
                "id": "p1",
                "active": false
            }))),
    );
    harness.mount(
        Mock::given(method("DELETE"))
            .and(path("/fhir/Patient/p1"))
            .respond_with(ResponseTemplate::new(204)),
    );

    let mut patient = harness.client.resource("Patient");
    patient.set("active", true).unwrap();
    patient.save().unwrap();
    assert_eq!(patient.id(), Some("p1"));

    patient.set("active", false).unwrap();
    patient.save_changes().unwrap();
    assert_eq!(patient["active"], false);

    patient.delete().unwrap();
}

#[test]
fn test_blocking_get_and_reference() {
    let harness = Harness::new();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/fhir/Patient/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Patient",
                "id": "p1",
                "generalPractitioner": [{"reference": "Practitioner/pr1"}]
            }))),
    );
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/fhir/Practitioner/pr1"))
            .respond_with(ResponseTemplate::new(404)),
    );

    let patient = harness.client.get("Patient", "p1").unwrap();
    let gp = patient
        .reference_at(&fhir_client::path!["generalPractitioner", 0])
        .unwrap();
    let error = gp.to_resource().unwrap_err();
    assert!(error.is_not_found());
}

#[test]
fn test_blocking_operation() {
    let harness = Harness::new();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/fhir/Patient/$validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "fatal", "code": "structure", "diagnostics": "bad json"}]
            }))),
    );

    let patient = harness.client.resource("Patient");
    assert!(!patient.is_valid().unwrap());
    let error = patient.validate().unwrap_err();
    assert!(matches!(error, FhirError::OperationOutcome { .. }));

    let outcome = patient
        .execute("$validate", HttpMethod::Post, Some(patient.serialize()), &[])
        .unwrap();
    assert_eq!(outcome.unwrap()["issue"][0]["severity"], "fatal");
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn test_blocking_search() {
    let harness = Harness::new();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/fhir/Encounter"))
            .and(query_param("_include", "Encounter:subject"))
            .and(query_param("status", "finished"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(
                &[
                    json!({"resourceType": "Encounter", "id": "e1"}),
                    json!({"resourceType": "Patient", "id": "p1"}),
                ],
                None,
            ))),
    );

    let encounters = harness
        .client
        .resources("Encounter")
        .search("status", "finished")
        .include(Include::new("Encounter", "subject"))
        .fetch()
        .unwrap();
    assert_eq!(encounters.len(), 1);
    assert_eq!(encounters[0].id(), Some("e1"));
}

#[test]
fn test_blocking_count() {
    let harness = Harness::new();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/fhir/Patient"))
            .and(query_param("_totalMethod", "count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resourceType": "Bundle",
                "type": "searchset",
                "total": 7
            }))),
    );

    let count = harness.client.resources("Patient").count().unwrap();
    assert_eq!(count, 7);
}

#[test]
fn test_blocking_pages_iterator() {
    let harness = Harness::new();
    let next = format!("{}/fhir/Observation?page=2", harness.server.uri());
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/fhir/Observation"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(
                &[json!({"resourceType": "Observation", "id": "o3"})],
                None,
            ))),
    );
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/fhir/Observation"))
            .and(query_param("_count", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(bundle(
                &[
                    json!({"resourceType": "Observation", "id": "o1"}),
                    json!({"resourceType": "Observation", "id": "o2"}),
                ],
                Some(&next),
            ))),
    );

    let pages: Vec<Vec<String>> = harness
        .client
        .resources("Observation")
        .limit(2)
        .pages()
        .map(|page| {
            page.unwrap()
                .iter()
                .filter_map(|o| o.id().map(str::to_string))
                .collect()
        })
        .collect();

    assert_eq!(pages, vec![vec!["o1", "o2"], vec!["o3"]]);
}

#[test]
fn test_blocking_pages_stop_after_error() {
    let harness = Harness::new();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/fhir/Observation"))
            .respond_with(ResponseTemplate::new(500)),
    );

    let mut pages = harness.client.resources("Observation").pages();
    assert!(matches!(pages.next(), Some(Err(FhirError::OperationOutcome { status: 500, .. }))));
    assert!(pages.next().is_none());
}
