use resource_graph::{Action, GraphError, RequestContext, ResolveRequest};
use resource_graph_sample::lifecycle::DirectorySystem;
use serde_json::{json, Map, Value};

async fn seeded() -> DirectorySystem {
    let system = DirectorySystem::new();
    system.seed().await.expect("seed");
    system
}

fn ids(document: &Value) -> Vec<String> {
    document["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

fn included_types(document: &Value) -> Vec<(String, String)> {
    let mut types: Vec<(String, String)> = document["included"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["type"].as_str().unwrap().to_string(),
                r["id"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    types.sort();
    types
}

fn pair(type_name: &str, id: &str) -> (String, String) {
    (type_name.to_string(), id.to_string())
}

#[tokio::test]
async fn test_index_includes_nested_relationships() {
    let system = seeded().await;
    let document = system
        .resolver
        .render(ResolveRequest::index(
            "employees",
            json!({"include": "positions.department"}),
        ))
        .await
        .unwrap();

    assert_eq!(ids(&document), vec!["1", "2", "3", "4"]);
    assert_eq!(
        document["data"][0]["relationships"]["positions"]["data"],
        json!([{"type": "positions", "id": "1"}, {"type": "positions", "id": "2"}])
    );
    assert_eq!(
        included_types(&document),
        vec![
            pair("departments", "1"),
            pair("departments", "2"),
            pair("positions", "1"),
            pair("positions", "2"),
            pair("positions", "3"),
            pair("positions", "4"),
        ]
    );
    let engineer = document["included"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["type"] == "positions" && r["id"] == "1")
        .unwrap();
    assert_eq!(
        engineer["relationships"]["department"]["data"],
        json!({"type": "departments", "id": "1"})
    );

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_filter_sort_and_stats() {
    let system = seeded().await;
    let document = system
        .resolver
        .render(ResolveRequest::index(
            "employees",
            json!({
                "filter": {"age": {"gt": "30"}},
                "sort": "-age",
                "stats": {"total": "count", "age": "maximum,minimum"},
            }),
        ))
        .await
        .unwrap();

    assert_eq!(ids(&document), vec!["4", "1", "3"]);
    assert_eq!(document["meta"]["stats"]["total"], json!({"count": 3}));
    assert_eq!(document["meta"]["stats"]["age"], json!({"maximum": 58, "minimum": 33}));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_string_operators_and_pagination() {
    let system = seeded().await;

    let document = system
        .resolver
        .render(ResolveRequest::index(
            "employees",
            json!({"filter": {"last_name": {"suffix": "e"}}}),
        ))
        .await
        .unwrap();
    assert_eq!(ids(&document), vec!["1", "3", "4"]);

    let document = system
        .resolver
        .render(ResolveRequest::index(
            "employees",
            json!({"page": {"size": 2, "number": 2}, "stats": {"total": "count"}}),
        ))
        .await
        .unwrap();
    assert_eq!(ids(&document), vec!["3", "4"]);
    assert_eq!(document["meta"]["stats"]["total"]["count"], json!(4));

    let document = system
        .resolver
        .render(ResolveRequest::index(
            "employees",
            json!({"page": {"number": "18446744073709551615", "size": "20"}}),
        ))
        .await
        .unwrap();
    assert!(ids(&document).is_empty());

    let document = system
        .resolver
        .render(ResolveRequest::index("employees", Value::Null))
        .await
        .unwrap();
    assert_eq!(ids(&document), vec!["1", "2", "3", "4"]);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_sparse_fields_extra_fields_and_computed_attribute() {
    let system = seeded().await;
    let document = system
        .resolver
        .render(ResolveRequest::index(
            "employees",
            json!({
                "filter": {"id": "1"},
                "fields": {"employees": "first_name,full_name"},
                "extra_fields": {"employees": "salary"},
            }),
        ))
        .await
        .unwrap();

    assert_eq!(
        document["data"][0]["attributes"],
        json!({"first_name": "Jane", "full_name": "Jane Doe", "salary": 150000})
    );

    let document = system
        .resolver
        .render(ResolveRequest::index("employees", json!({"filter": {"id": "2"}})))
        .await
        .unwrap();
    assert!(document["data"][0]["attributes"].get("salary").is_none());

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_show_prunes_includes_outside_whitelist() {
    let system = seeded().await;
    let document = system
        .resolver
        .render(ResolveRequest::show(
            "employees",
            "1",
            json!({"include": "positions.department,teams"}),
        ))
        .await
        .unwrap();

    assert_eq!(document["data"]["id"], json!("1"));
    assert!(document["data"]["relationships"].get("teams").is_none());
    assert_eq!(
        included_types(&document),
        vec![pair("departments", "1"), pair("positions", "1"), pair("positions", "2")]
    );

    let error = system
        .resolver
        .render(ResolveRequest::show("employees", "99", Value::Null))
        .await
        .unwrap_err();
    assert!(matches!(error, GraphError::RecordNotFound { .. }));
    assert_eq!(error.status(), 404);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_context_hook_restricts_to_active_employees() {
    let system = seeded().await;
    let context = RequestContext::new(Action::Index).with_value("active_only", true);
    let document = system
        .resolver
        .render(ResolveRequest::index("employees", Value::Null).with_context(context))
        .await
        .unwrap();

    assert_eq!(ids(&document), vec!["1", "2", "3"]);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_parameters_are_rejected() {
    let system = seeded().await;

    let error = system
        .resolver
        .render(ResolveRequest::index("employees", json!({"filter": {"age": "old"}})))
        .await
        .unwrap_err();
    assert!(matches!(error, GraphError::InvalidParameterKind { .. }));
    assert_eq!(error.status(), 400);

    let error = system
        .resolver
        .render(ResolveRequest::index("employees", json!({"page": {"size": 500}})))
        .await
        .unwrap_err();
    assert_eq!(error.status(), 400);

    let error = system
        .resolver
        .render(ResolveRequest::index("employees", json!({"sort": "salary"})))
        .await
        .unwrap_err();
    assert!(matches!(error, GraphError::UnknownAttribute { usage: "sort", .. }));

    let error = system
        .resolver
        .render(ResolveRequest::index("employees", json!({"include": "managers"})))
        .await
        .unwrap_err();
    assert_eq!(error.status(), 400);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_writes_go_through_the_table_actor() {
    let system = seeded().await;

    let mut attributes = Map::new();
    attributes.insert("first_name".into(), json!("Lena"));
    attributes.insert("last_name".into(), json!("Park"));
    attributes.insert("age".into(), json!(29));
    attributes.insert("active".into(), json!(true));
    attributes.insert("hired_on".into(), json!("2024-02-01"));
    attributes.insert("salary".into(), json!(95000));
    let created = system
        .resolver
        .create("employees", attributes)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.id, "5");

    let mut change = Map::new();
    change.insert("age".into(), json!(30));
    let updated = system
        .resolver
        .update("employees", "5", change)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.attribute("age"), Some(&json!(30)));

    let document = system
        .resolver
        .render(ResolveRequest::show("employees", "5", Value::Null))
        .await
        .unwrap();
    assert_eq!(document["data"]["attributes"]["full_name"], json!("Lena Park"));

    system.resolver.destroy("employees", "5").await.unwrap();
    let error = system
        .resolver
        .render(ResolveRequest::show("employees", "5", Value::Null))
        .await
        .unwrap_err();
    assert_eq!(error.status(), 404);

    let error = system.resolver.destroy("employees", "5").await.unwrap_err();
    assert!(matches!(error, GraphError::Adapter(_)));

    system.shutdown().await.unwrap();
}
