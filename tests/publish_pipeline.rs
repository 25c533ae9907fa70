mod support;

use std::sync::Arc;

use assert_matches::assert_matches;
use oxigraph::model::vocab::rdf;
use oxigraph::model::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Term, Triple};
use support::{FOAF, Harness, NS, ORG, WORKSPACE, closed_port, config, persons_alignment, request, worksheet};
use worksheet_rdf::alignment::{AlignmentModel, SemanticType, SemanticTypes};
use worksheet_rdf::ontology::Ontology;
use worksheet_rdf::orchestrator::{PublishRun, RunState, SkipReason, StoreResult};
use worksheet_rdf::preferences::PublishRdfPreferences;
use worksheet_rdf::report::Severity;
use worksheet_rdf::serializer::{RdfSyntax, read_back};
use worksheet_rdf::store::{PublishLedger, StoreBackendKind, StoreConnectionInfo, StorePool, StorePublisher};
use worksheet_rdf::vocab::RDFS_LABEL;

fn iri(value: &str) -> NamedNode {
    NamedNode::new(value).unwrap()
}

fn done(run: PublishRun) -> worksheet_rdf::PublishOutcome {
    match run {
        PublishRun::Done(outcome) => outcome,
        PublishRun::Aborted(aborted) => panic!("run aborted: {aborted:?}"),
    }
}

#[tokio::test]
async fn persons_with_organization_share_blank_nodes() {
    let harness = Harness::new(Ontology::new());
    let (alignment, types) = persons_alignment();
    harness.registry.register(WORKSPACE, "Persons", alignment);

    let sheet = worksheet("Persons", &["name", "worksOrg"], &[&["Alice", "ISI"]]);
    let outcome = done(harness.orchestrator.publish(request(sheet, types, config())).await);

    assert!(outcome.error_report.is_empty());
    assert_eq!(outcome.triple_count, 5);
    assert_eq!(outcome.artifact_relative_path, "publish/RDF/WSP1Persons.ttl");

    let triples = read_back(&outcome.file_path, RdfSyntax::Turtle).unwrap();
    let b1 = BlankNode::new("b1").unwrap();
    let b2 = BlankNode::new("b2").unwrap();
    for expected in [
        Triple::new(b1.clone(), iri(&format!("{FOAF}name")), Literal::new_simple_literal("Alice")),
        Triple::new(b1.clone(), iri(&format!("{ORG}memberOf")), b2.clone()),
        Triple::new(b2.clone(), rdf::TYPE, iri(&format!("{ORG}Organization"))),
        Triple::new(b2.clone(), iri(RDFS_LABEL), Literal::new_simple_literal("ISI")),
    ] {
        assert!(triples.contains(&expected), "missing {expected}");
    }
}

#[tokio::test]
async fn missing_alignment_aborts_without_artifact() {
    let harness = Harness::new(Ontology::new());
    let (_, types) = persons_alignment();
    let sheet = worksheet("Persons", &["name", "worksOrg"], &[&["Alice", "ISI"]]);

    let run = harness.orchestrator.publish(request(sheet, types, config())).await;
    let response = run.to_response();
    let PublishRun::Aborted(aborted) = run else {
        panic!("expected abort");
    };

    assert_eq!(aborted.message, "alignment missing");
    assert!(aborted.error_report.is_empty());
    assert!(!harness.workspace.path("publish").exists());
    assert_eq!(response["Error"], "alignment missing");
    assert!(
        PublishRdfPreferences::load(harness.preferences.as_ref())
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn unreachable_store_keeps_artifact() {
    let harness = Harness::new(Ontology::new());
    let (alignment, types) = persons_alignment();
    harness.registry.register(WORKSPACE, "Persons", alignment);

    let mut config = config();
    config.persist_to_store = true;
    config.store = StoreConnectionInfo::new(
        StoreBackendKind::Http,
        format!("127.0.0.1:{}", closed_port()),
        "store",
    );
    let sheet = worksheet("Persons", &["name", "worksOrg"], &[&["Alice", "ISI"]]);
    let run = harness.orchestrator.publish(request(sheet, types, config)).await;
    assert_eq!(run.states().last(), Some(&RunState::Done));
    assert!(run.states().contains(&RunState::StoreAttempted));
    let outcome = done(run);

    assert!(outcome.file_path.is_file());
    assert_matches!(
        &outcome.store_result,
        StoreResult::Failure { reason, .. } if reason == "connection refused"
    );
}

#[tokio::test]
async fn non_numeric_integer_cell_skips_one_triple() {
    let mut ontology = Ontology::new();
    ontology.declare_range(&format!("{FOAF}age"), "http://www.w3.org/2001/XMLSchema#integer");
    let harness = Harness::new(ontology);

    let mut alignment = AlignmentModel::new();
    alignment
        .add_class("n1", format!("{FOAF}Person"))
        .add_column("c1", "name")
        .add_column("c2", "age")
        .data_property("n1", "c1", format!("{FOAF}name"))
        .data_property("n1", "c2", format!("{FOAF}age"));
    harness.registry.register(WORKSPACE, "people", alignment);
    let types = SemanticTypes::new(vec![
        SemanticType::new("name", format!("{FOAF}Person"), format!("{FOAF}name")),
        SemanticType::new("age", format!("{FOAF}Person"), format!("{FOAF}age")),
    ]);

    let sheet = worksheet("people", &["name", "age"], &[&["Alice", "forty"], &["Bob", "41"]]);
    let outcome = done(harness.orchestrator.publish(request(sheet, types, config())).await);

    assert_eq!(outcome.error_report.error_count(), 1);
    let entry = &outcome.error_report.entries()[0];
    assert_eq!(entry.row_index, Some(0));
    assert_eq!(entry.column_id.as_deref(), Some("age"));
    assert_eq!(entry.severity, Severity::Error);
    // row 0: type + name, row 1: type + name + age
    assert_eq!(outcome.triple_count, 5);

    let triples = read_back(&outcome.file_path, RdfSyntax::Turtle).unwrap();
    let age = Term::from(Literal::new_typed_literal(
        "41",
        iri("http://www.w3.org/2001/XMLSchema#integer"),
    ));
    assert!(triples.iter().any(|t| t.object == age));
    assert_eq!(harness.metrics.row_errors_total.get(), 1);
}

#[tokio::test]
async fn inverse_properties_follow_the_ontology() {
    let mut ontology = Ontology::new();
    ontology.declare_inverse(&format!("{ORG}memberOf"), &format!("{ORG}hasMember"));
    let harness = Harness::new(ontology);
    let (alignment, types) = persons_alignment();
    harness.registry.register(WORKSPACE, "Persons", alignment);

    let mut config = config();
    config.add_inverse_properties = true;
    let sheet = worksheet("Persons", &["name", "worksOrg"], &[&["Alice", "ISI"]]);
    let outcome = done(harness.orchestrator.publish(request(sheet, types, config)).await);

    let triples = read_back(&outcome.file_path, RdfSyntax::Turtle).unwrap();
    let inverse = Triple::new(
        BlankNode::new("b2").unwrap(),
        iri(&format!("{ORG}hasMember")),
        BlankNode::new("b1").unwrap(),
    );
    assert!(triples.contains(&inverse));
    assert_eq!(outcome.error_report.warning_count(), 0);
}

#[tokio::test]
async fn undeclared_inverse_becomes_a_warning() {
    let harness = Harness::new(Ontology::new());
    let (alignment, types) = persons_alignment();
    harness.registry.register(WORKSPACE, "Persons", alignment);

    let mut config = config();
    config.add_inverse_properties = true;
    let sheet = worksheet("Persons", &["name", "worksOrg"], &[&["Alice", "ISI"]]);
    let outcome = done(harness.orchestrator.publish(request(sheet, types, config)).await);

    assert_eq!(outcome.error_report.warning_count(), 1);
    assert_eq!(outcome.triple_count, 5);
}

#[tokio::test]
async fn keyed_subjects_use_the_namespace_template() {
    let harness = Harness::new(Ontology::new());
    let mut alignment = AlignmentModel::new();
    alignment
        .add_class("n1", format!("{FOAF}Person"))
        .add_column("c1", "id")
        .add_column("c2", "name")
        .data_property("n1", "c1", format!("{FOAF}account"))
        .data_property("n1", "c2", format!("{FOAF}name"));
    harness.registry.register(WORKSPACE, "people", alignment);
    let types = SemanticTypes::new(vec![
        SemanticType::new("id", format!("{FOAF}Person"), format!("{FOAF}account")).key(),
        SemanticType::new("name", format!("{FOAF}Person"), format!("{FOAF}name")),
    ]);

    let sheet = worksheet("people", &["id", "name"], &[&["a 1", "Ann"]]);
    let outcome = done(harness.orchestrator.publish(request(sheet, types, config())).await);

    let triples = read_back(&outcome.file_path, RdfSyntax::Turtle).unwrap();
    let subject = NamedOrBlankNode::from(iri(&format!("{NS}Person/a%201")));
    assert_eq!(triples.len(), 3);
    assert!(triples.iter().all(|t| t.subject == subject));
}

#[tokio::test]
async fn embedded_store_commits_once_per_content() {
    let pool = Arc::new(StorePool::new());
    let harness = Harness::with_store(
        Ontology::new(),
        StorePublisher::new(pool.clone(), Arc::new(PublishLedger::in_memory())),
    );
    let (alignment, types) = persons_alignment();
    harness.registry.register(WORKSPACE, "Persons", alignment);

    let mut config = config();
    config.persist_to_store = true;
    config.store = StoreConnectionInfo::new(
        StoreBackendKind::Embedded,
        harness.workspace.path("stores").display().to_string(),
        "db",
    );
    let sheet = worksheet("Persons", &["name", "worksOrg"], &[&["Alice", "ISI"]]);

    let first = done(
        harness
            .orchestrator
            .publish(request(sheet.clone(), types.clone(), config.clone()))
            .await,
    );
    assert_matches!(&first.store_result, StoreResult::Success(ack) if ack.triples_loaded == Some(5));

    let second = done(harness.orchestrator.publish(request(sheet, types, config)).await);
    assert_matches!(
        &second.store_result,
        StoreResult::Skipped(SkipReason::AlreadyPublished { collection, .. }) if collection == "karma"
    );

    let store = pool
        .get_or_open(&harness.workspace.path("stores").join("db"))
        .unwrap();
    assert_eq!(store.len().unwrap(), 5);
}

#[tokio::test]
async fn response_payload_shape() {
    let harness = Harness::new(Ontology::new());
    let (alignment, types) = persons_alignment();
    harness.registry.register(WORKSPACE, "Persons", alignment);

    let sheet = worksheet("Persons", &["name", "worksOrg"], &[&["Alice", ""]]);
    let run = harness.orchestrator.publish(request(sheet, types, config())).await;
    let response = run.to_response();

    assert_eq!(response["updateType"], "PublishRDFUpdate");
    assert_eq!(response["fileUrl"], "publish/RDF/WSP1Persons.ttl");
    assert_eq!(response["worksheetId"], "Persons");
    assert!(response["errorReport"].as_array().unwrap().is_empty());
    assert_eq!(response["storeResult"]["status"], "skipped");
    assert_eq!(response["storeResult"]["reason"], "notRequested");

    // no organization instance for the empty cell
    let outcome = done(run);
    assert_eq!(outcome.triple_count, 2);
    let triples = read_back(&outcome.file_path, RdfSyntax::Turtle).unwrap();
    let organization = Term::from(iri(&format!("{ORG}Organization")));
    assert!(!triples.iter().any(|t| t.object == organization));
}
