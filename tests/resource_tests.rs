//! Integration tests for `Resource` and `Reference`.

use fhir_client::document::PathError;
use fhir_client::{path, BaseUrl, ClientConfig, FhirClient, FhirError, HttpMethod, ResourceModel};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, method, path as url_path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, FhirClient) {
    let server = MockServer::start().await;
    let config = ClientConfig::builder()
        .base_url(BaseUrl::new(format!("{}/fhir", server.uri())).unwrap())
        .build()
        .unwrap();
    (server, FhirClient::new(config).unwrap())
}

fn offline_client() -> FhirClient {
    let config = ClientConfig::builder()
        .base_url(BaseUrl::new("http://localhost:8080/fhir").unwrap())
        .build()
        .unwrap();
    FhirClient::new(config).unwrap()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Organization {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
}

impl ResourceModel for Organization {
    const RESOURCE_TYPE: &'static str = "Organization";
}

// ============================================================================
// Local State
// ============================================================================

#[test]
fn test_new_resource_has_type_and_no_id() {
    let client = offline_client();
    let patient = client.resource("Patient");

    assert_eq!(patient.resource_type(), "Patient");
    assert_eq!(patient["resourceType"], "Patient");
    assert!(patient.id().is_none());
    assert!(patient.reference().is_none());
    assert!(!patient.is_dirty());
}

#[test]
fn test_resource_type_is_immutable() {
    let client = offline_client();
    let mut patient = client.resource("Patient");

    assert_ok!(patient.set("resourceType", "Patient"));
    let error = assert_err!(patient.set("resourceType", "Practitioner"));
    assert!(matches!(error, FhirError::ImmutableResourceType { .. }));
    assert!(patient.remove("resourceType").is_err());
    assert!(patient.setdefault("resourceType", "x").is_err());
    assert!(patient.get_mut("resourceType").is_err());
    assert!(patient
        .set_by_path(&path!["resourceType"], "Practitioner")
        .is_err());
    assert_eq!(patient.resource_type(), "Patient");
}

#[test]
fn test_mutations_are_tracked() {
    let client = offline_client();
    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1", "gender": "male"}))
        .unwrap();
    assert!(!patient.is_dirty());

    patient.set("active", true).unwrap();
    patient.remove("gender").unwrap();
    patient.setdefault("name", json!([])).unwrap();
    patient
        .set_by_path(&path!["telecom", 0, "value"], "555-0100")
        .unwrap();

    let dirty: Vec<_> = patient.dirty_fields().iter().collect();
    assert_eq!(dirty, vec!["active", "gender", "name", "telecom"]);
    assert_eq!(patient["telecom"], json!([{"value": "555-0100"}]));
    assert_eq!(patient["gender"], json!(null));
}

#[test]
fn test_setdefault_keeps_existing_value() {
    let client = offline_client();
    let mut patient = client.resource("Patient");
    patient.set("name", json!([{"family": "Rivera"}])).unwrap();

    let name = patient.setdefault("name", json!([])).unwrap();
    name.as_array_mut()
        .unwrap()
        .push(json!({"family": "Smith"}));

    assert_eq!(patient["name"].as_array().unwrap().len(), 2);
}

#[test]
fn test_path_access() {
    let client = offline_client();
    let mut patient = client
        .resource_from(json!({
            "resourceType": "Patient",
            "identifier": [
                {"system": "ssn", "value": "123"},
                {"system": "mrn", "value": "MRN-1"}
            ]
        }))
        .unwrap();

    let mrn = path!["identifier", json!({"system": "mrn"}), "value"];
    assert_eq!(patient.get_by_path(&mrn), Some(&json!("MRN-1")));
    assert_eq!(patient.get_by_path(&path!["name", 0, "family"]), None);
    assert_eq!(
        patient.get_by_path_or(&path!["name", 0, "family"], &json!("unknown")),
        &json!("unknown")
    );

    patient.set_by_path(&mrn, "MRN-2").unwrap();
    assert_eq!(patient["identifier"][1]["value"], "MRN-2");

    let missing = path!["identifier", json!({"system": "npi"}), "value"];
    let error = assert_err!(patient.set_by_path(&missing, "x"));
    assert!(matches!(error, FhirError::Path(PathError::Lookup { .. })));
    assert_eq!(patient["identifier"].as_array().unwrap().len(), 2);
}

#[test]
fn test_failed_set_by_path_leaves_resource_untouched() {
    let client = offline_client();
    let mut patient = client.resource("Patient");

    let mrn = path!["identifier", json!({"system": "mrn"}), "value"];
    assert!(patient.set_by_path(&mrn, "1").is_err());

    assert_eq!(patient.serialize(), json!({"resourceType": "Patient"}));
    assert!(patient.get("identifier").is_none());
    assert!(!patient.is_dirty());
}

#[test]
fn test_serialize_drops_nulls() {
    let client = offline_client();
    let mut patient = client.resource("Patient");
    patient.set("gender", json!(null)).unwrap();
    patient
        .set("name", json!([{"given": ["Jo"], "family": null}]))
        .unwrap();

    assert_eq!(
        patient.serialize(),
        json!({"resourceType": "Patient", "name": [{"given": ["Jo"]}]})
    );
    assert!(patient.as_map().contains_key("gender"));
}

#[test]
fn test_references() {
    let client = offline_client();
    let unsaved = client.resource("Patient");
    let error = assert_err!(unsaved.to_reference(None::<(&str, &str)>));
    assert!(matches!(error, FhirError::MissingId { .. }));

    let patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1"}))
        .unwrap();
    let reference = patient.to_reference([("display", "Jo Rivera")]).unwrap();

    assert_eq!(reference.reference(), Some("Patient/p1"));
    assert_eq!(reference.get("display"), Some(&json!("Jo Rivera")));
    assert!(reference.is_local());
    assert_eq!(reference.resource_type(), Some("Patient"));
    assert_eq!(reference.id(), Some("p1"));
    assert!(patient == reference);
    assert!(reference == patient);
    assert!(reference == client.reference("Patient", "p1"));

    let remote = client.reference_from("http://other.example.com/fhir/Patient/p1");
    assert!(!remote.is_local());
    assert!(remote.id().is_none());
}

#[test]
fn test_reference_at_nested_path() {
    let client = offline_client();
    let patient = client
        .resource_from(json!({
            "resourceType": "Patient",
            "generalPractitioner": [{"reference": "Practitioner/pr1", "display": "Dr. Who"}]
        }))
        .unwrap();

    let gp = patient
        .reference_at(&path!["generalPractitioner", 0])
        .unwrap();
    assert_eq!(gp.reference(), Some("Practitioner/pr1"));
    assert!(patient.reference_at(&path!["managingOrganization"]).is_none());
}

#[test]
fn test_typed_model_conversion() {
    let client = offline_client();
    let org = client
        .resource_from(json!({"resourceType": "Organization", "id": "o1", "name": "ACME"}))
        .unwrap();
    let model: Organization = org.to_model().unwrap();
    assert_eq!(model.name, "ACME");

    let patient = client.resource("Patient");
    assert!(patient.to_model::<Organization>().is_err());
}

// ============================================================================
// Network Operations
// ============================================================================

#[tokio::test]
async fn test_save_without_id_creates() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(url_path("/fhir/Patient"))
        .and(body_json(json!({"resourceType": "Patient", "active": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "resourceType": "Patient",
            "id": "new",
            "active": true,
            "meta": {"versionId": "1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client.resource("Patient");
    patient.set("active", true).unwrap();
    patient.set("gender", json!(null)).unwrap();
    assert_ok!(patient.save().await);

    assert_eq!(patient.id(), Some("new"));
    assert_eq!(patient["meta"]["versionId"], "1");
    assert!(!patient.is_dirty());
}

#[tokio::test]
async fn test_save_with_id_replaces() {
    let (server, client) = setup().await;
    Mock::given(method("PUT"))
        .and(url_path("/fhir/Patient/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1", "active": true}))
        .unwrap();
    patient.set("active", false).unwrap();
    assert_ok!(patient.save().await);
    assert_eq!(patient["active"], false);
}

#[tokio::test]
async fn test_save_fields_patches_named_fields_including_nulls() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(url_path("/fhir/Patient/p1"))
        .and(body_json(json!({"active": false, "gender": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": false,
            "name": [{"family": "Rivera"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1", "gender": "male"}))
        .unwrap();
    patient.set("active", false).unwrap();
    patient.remove("gender").unwrap();

    assert_ok!(patient.save_fields(&["active", "gender"]).await);
    assert_eq!(patient["name"][0]["family"], "Rivera");
}

#[tokio::test]
async fn test_save_fields_requires_id() {
    let (_server, client) = setup().await;
    let mut patient = client.resource("Patient");
    let error = assert_err!(patient.save_fields(&["active"]).await);
    assert!(matches!(error, FhirError::MissingId { operation: "patch" }));
}

#[tokio::test]
async fn test_save_changes_sends_only_dirty_fields() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(url_path("/fhir/Patient/p1"))
        .and(body_json(json!({"active": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1", "active": true}))
        .unwrap();

    // Clean resources are not sent.
    assert_ok!(patient.save_changes().await);

    patient.set("active", false).unwrap();
    assert_ok!(patient.save_changes().await);
    assert!(!patient.is_dirty());
}

#[tokio::test]
async fn test_save_changes_sends_removed_fields_as_null() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(url_path("/fhir/Patient/p1"))
        .and(body_json(json!({"gender": "female", "birthDate": null})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "gender": "female"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1", "birthDate": "1990-01-01"}))
        .unwrap();
    patient.set("gender", "female").unwrap();
    patient.remove("birthDate").unwrap();

    assert_ok!(patient.save_changes().await);
    assert!(patient.get("birthDate").is_none());
    assert!(!patient.is_dirty());
}

#[tokio::test]
async fn test_update_requires_id() {
    let (server, client) = setup().await;
    let mut patient = client.resource("Patient");
    let error = assert_err!(patient.update().await);
    assert_eq!(error.to_string(), "Resource id is required for update operation");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_posts_even_with_id() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(url_path("/fhir/Patient"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "resourceType": "Patient",
            "id": "server-assigned"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "client-id"}))
        .unwrap();
    assert_ok!(patient.create().await);
    assert_eq!(patient.id(), Some("server-assigned"));
}

#[tokio::test]
async fn test_patch_merges_locally_and_on_server() {
    let (server, client) = setup().await;
    Mock::given(method("PATCH"))
        .and(url_path("/fhir/Patient/p1"))
        .and(body_json(json!({"birthDate": "1990-01-01"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": true,
            "birthDate": "1990-01-01"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1", "active": true}))
        .unwrap();
    assert_ok!(patient.patch([("birthDate", "1990-01-01")]).await);
    assert_eq!(patient["birthDate"], "1990-01-01");
    assert_eq!(patient["active"], true);
}

#[tokio::test]
async fn test_delete_and_refresh() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(url_path("/fhir/Patient/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(url_path("/fhir/Patient/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Patient",
            "id": "p1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1", "gender": "male"}))
        .unwrap();
    patient.set("active", false).unwrap();

    assert_ok!(patient.refresh().await);
    assert_eq!(patient["active"], true);
    assert!(patient.get("gender").is_none());
    assert!(!patient.is_dirty());

    assert_ok!(patient.delete().await);

    let unsaved = client.resource("Patient");
    let error = assert_err!(unsaved.delete().await);
    assert!(matches!(error, FhirError::MissingId { operation: "delete" }));
}

#[tokio::test]
async fn test_validation() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(url_path("/fhir/Patient/$validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "OperationOutcome",
            "issue": [
                {"severity": "warning", "code": "informational", "diagnostics": "no narrative"},
                {"severity": "error", "code": "invalid", "diagnostics": "bad gender"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(url_path("/fhir/Observation/$validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "information", "code": "informational"}]
        })))
        .mount(&server)
        .await;

    let mut patient = client.resource("Patient");
    patient.set("gender", "unknown-value").unwrap();
    assert!(!assert_ok!(patient.is_valid().await));

    let error = assert_err!(patient.validate().await);
    assert!(error.to_string().contains("bad gender"));
    assert!(error.outcome().is_some());

    let observation = client.resource("Observation");
    assert!(assert_ok!(observation.is_valid().await));
    assert_ok!(observation.validate().await);
}

#[tokio::test]
async fn test_instance_operation() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(url_path("/fhir/Patient/p1/$everything"))
        .and(query_param("_count", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "entry": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let patient = client
        .resource_from(json!({"resourceType": "Patient", "id": "p1"}))
        .unwrap();
    let result = assert_ok!(
        patient
            .execute("$everything", HttpMethod::Get, None, &[("_count", "50")])
            .await
    );
    assert_eq!(result.unwrap()["resourceType"], "Bundle");
}

#[tokio::test]
async fn test_reference_operations() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(url_path("/fhir/Practitioner/pr1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Practitioner",
            "id": "pr1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(url_path("/fhir/Practitioner/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(url_path("/fhir/Practitioner/pr1"))
        .and(body_json(json!({"active": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Practitioner",
            "id": "pr1",
            "active": false
        })))
        .mount(&server)
        .await;

    let resolved = assert_ok!(client.reference("Practitioner", "pr1").to_resource().await);
    assert_eq!(resolved.resource_type(), "Practitioner");

    let error = assert_err!(client.reference("Practitioner", "gone").to_resource().await);
    assert!(error.is_not_found());

    let error = assert_err!(
        client
            .reference_from("http://other.example.com/Practitioner/pr1")
            .to_resource()
            .await
    );
    assert!(error.is_not_found());

    let patched = assert_ok!(
        client
            .reference("Practitioner", "pr1")
            .patch([("active", false)])
            .await
    );
    assert_eq!(patched["active"], false);

    // Only exact path lookups are issued.
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.query().is_none()));
}

#[tokio::test]
async fn test_client_level_crud() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(url_path("/fhir/Patient/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "resourceType": "OperationOutcome",
            "issue": [{
                "severity": "error",
                "code": "not-found",
                "diagnostics": "Resource Patient/missing not found"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(url_path("/fhir/Organization"))
        .and(body_json(json!({"resourceType": "Organization", "name": "ACME"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "resourceType": "Organization",
            "id": "o1",
            "name": "ACME"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(url_path("/fhir/Organization/o1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let error = assert_err!(client.get("Patient", "missing").await);
    assert!(error.to_string().contains("Resource Patient/missing not found"));

    let created = assert_ok!(
        client
            .create(&Organization {
                id: None,
                name: "ACME".to_string()
            })
            .await
    );
    assert_eq!(created.id.as_deref(), Some("o1"));

    let error = assert_err!(
        client
            .update(&Organization {
                id: None,
                name: "ACME".to_string()
            })
            .await
    );
    assert!(matches!(error, FhirError::MissingId { operation: "update" }));

    assert_ok!(client.delete("Organization", "o1").await);
}

#[tokio::test]
async fn test_transaction_bundle_posts_to_base_url() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(url_path("/fhir"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "Bundle",
            "type": "transaction-response"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut bundle = client.resource("Bundle");
    bundle.set("type", "transaction").unwrap();
    bundle.set("entry", json!([])).unwrap();
    assert_ok!(bundle.save().await);
    assert_eq!(bundle["type"], "transaction-response");
}
