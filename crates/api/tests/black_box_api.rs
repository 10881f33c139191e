use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over the in-memory store, bound to an
        // ephemeral port.
        let app = orgdir_api::app::build_app().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> reqwest::Response {
    client.post(url).json(&body).send().await.unwrap()
}

async fn create_employee(client: &reqwest::Client, base: &str, first_name: &str) -> i64 {
    let res = post(
        client,
        format!("{base}/employees"),
        json!({"firstName": first_name}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_returns_201_with_location_and_assigned_id() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = post(
        &client,
        format!("{}/enterprises", server.base_url),
        json!({"name": "Acme", "address": "1 Main St", "phone": "555-0100"}),
    )
    .await;

    assert_eq!(res.status(), StatusCode::CREATED);
    let location = res
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .expect("Location header");

    let body: Value = res.json().await.unwrap();
    let id = body["id"].as_i64().unwrap();
    assert!(id > 0);
    assert_eq!(location, format!("/enterprises/{id}"));
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["departments"], json!([]));
}

#[tokio::test]
async fn listing_is_shallow_while_lookup_nests_one_level() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let emp_id = create_employee(&client, base, "Ada").await;

    let res = post(
        &client,
        format!("{base}/departments"),
        json!({"name": "Eng", "employees": [{"id": emp_id}]}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let dept_id = res.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let listed: Value = client
        .get(format!("{base}/departments"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["employees"], json!([]));

    let detailed: Value = client
        .get(format!("{base}/departments/{dept_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let employees = detailed["employees"].as_array().unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0]["firstName"], "Ada");
    // one level only: the nested employee does not carry its departments
    assert_eq!(employees[0]["departments"], json!([]));
}

#[tokio::test]
async fn unknown_ids_answer_404_with_error_body() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let res = client
        .get(format!("{base}/employees/4040"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "entity with id 4040 not found");

    let res = client
        .put(format!("{base}/employees/4040"))
        .json(&json!({"firstName": "Nobody"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .delete(format!("{base}/employees/4040"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_path_id_answers_400() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/employees/abc", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn put_fully_replaces_the_relation_list() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let e1 = create_employee(&client, base, "a").await;
    let e2 = create_employee(&client, base, "b").await;

    let res = post(
        &client,
        format!("{base}/departments"),
        json!({"name": "Support", "employees": [{"id": e1}, {"id": e2}]}),
    )
    .await;
    let dept_id = res.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    // omit e2: it must be detached, not kept
    let res = client
        .put(format!("{base}/departments/{dept_id}"))
        .json(&json!({"name": "Support", "employees": [{"id": e1}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let detailed: Value = client
        .get(format!("{base}/departments/{dept_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let employees = detailed["employees"].as_array().unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0]["id"].as_i64(), Some(e1));
}

#[tokio::test]
async fn save_against_unknown_relation_id_answers_404() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = post(
        &client,
        format!("{}/departments", server.base_url),
        json!({"name": "Eng", "employees": [{"id": 999}]}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn deleting_a_referenced_employee_conflicts_and_keeps_it() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let emp_id = create_employee(&client, base, "Ada").await;
    post(
        &client,
        format!("{base}/departments"),
        json!({"name": "Eng", "employees": [{"id": emp_id}]}),
    )
    .await;

    let res = client
        .delete(format!("{base}/employees/{emp_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    // the rejected delete left the employee retrievable
    let res = client
        .get(format!("{base}/employees/{emp_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_answers_204_and_subsequent_lookup_404() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let emp_id = create_employee(&client, base, "Ada").await;
    let res = client
        .delete(format!("{base}/employees/{emp_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(format!("{base}/employees/{emp_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_lifecycle_hides_credentials_and_attaches_seeded_roles() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    // seeded roles are attachable by id from the first request on
    let res = post(
        &client,
        format!("{base}/users"),
        json!({
            "firstName": "Ada",
            "email": "ada@example.com",
            "password": "s3cret",
            "roles": [{"id": 1}]
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    let user_id = body["id"].as_i64().unwrap();
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());

    let detailed: Value = client
        .get(format!("{base}/users/{user_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let roles = detailed["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0]["authority"], "ROLE_USER");
    assert!(detailed.get("password").is_none());

    // updates carry no password field and keep the account working
    let res = client
        .put(format!("{base}/users/{user_id}"))
        .json(&json!({"firstName": "Ada B.", "email": "ada@example.com", "roles": [{"id": 1}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["firstName"], "Ada B.");
}

#[tokio::test]
async fn user_creation_without_password_answers_400() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = post(
        &client,
        format!("{}/users", server.base_url),
        json!({"firstName": "Ada"}),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}
