mod common;

use actix_web::{http::StatusCode, test};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{create_task, init_app, register_and_login, send, test_services, TestUser};

async fn create_subtask(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
    >,
    user: &TestUser,
    task_id: &serde_json::Value,
    title: &str,
) -> serde_json::Value {
    let req = test::TestRequest::post()
        .uri("/api/subtasks/")
        .insert_header(user.bearer())
        .set_json(json!({ "task": task_id, "title": title }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Body: {}", body);
    body
}

#[actix_rt::test]
async fn test_subtask_crud() {
    let (services, _) = test_services().await;
    let app = init_app(services).await;
    let alice = register_and_login(&app, "alice").await;
    let task = create_task(&app, &alice, json!({ "title": "Move house" })).await;

    let subtask = create_subtask(&app, &alice, &task["id"], "Pack books").await;
    assert_eq!(
        subtask,
        json!({ "id": 1, "task": task["id"], "title": "Pack books", "completed": false })
    );

    let uri = format!("/api/subtasks/{}/", subtask["id"]);
    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(alice.bearer())
        .set_json(json!({ "completed": true }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
    assert_eq!(body["title"], "Pack books");

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(alice.bearer())
        .set_json(json!({ "completed": false }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "title": ["This field is required."] }));

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(alice.bearer())
        .set_json(json!({ "title": "Pack all books" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Pack all books");
    assert_eq!(body["completed"], true);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(alice.bearer())
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(alice.bearer())
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Subtask not found" }));
}

#[actix_rt::test]
async fn test_subtask_list_is_scoped_and_filterable() {
    let (services, _) = test_services().await;
    let app = init_app(services).await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    let house = create_task(&app, &alice, json!({ "title": "Move house" })).await;
    let trip = create_task(&app, &alice, json!({ "title": "Plan trip" })).await;
    let bobs = create_task(&app, &bob, json!({ "title": "Bob's task" })).await;

    let books = create_subtask(&app, &alice, &house["id"], "Pack books").await;
    let tickets = create_subtask(&app, &alice, &trip["id"], "Book tickets").await;
    create_subtask(&app, &bob, &bobs["id"], "Bob's subtask").await;

    let req = test::TestRequest::get()
        .uri("/api/subtasks/")
        .insert_header(alice.bearer())
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body, json!([books, tickets]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/subtasks/?task={}", trip["id"]))
        .insert_header(alice.bearer())
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body, json!([tickets]));

    // Filtering by someone else's task yields nothing rather than their data.
    let req = test::TestRequest::get()
        .uri(&format!("/api/subtasks/?task={}", bobs["id"]))
        .insert_header(alice.bearer())
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body, json!([]));
}

#[actix_rt::test]
async fn test_subtasks_of_other_users_are_not_found() {
    let (services, _) = test_services().await;
    let app = init_app(services).await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;
    let task = create_task(&app, &alice, json!({ "title": "Move house" })).await;
    let subtask = create_subtask(&app, &alice, &task["id"], "Pack books").await;

    let uri = format!("/api/subtasks/{}/", subtask["id"]);
    for req in vec![
        test::TestRequest::get().uri(&uri),
        test::TestRequest::patch()
            .uri(&uri)
            .set_json(json!({ "completed": true })),
        test::TestRequest::delete().uri(&uri),
    ] {
        let (status, _) = send(&app, req.insert_header(bob.bearer()).to_request()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // Bob cannot attach a subtask to Alice's task either.
    let req = test::TestRequest::post()
        .uri("/api/subtasks/")
        .insert_header(bob.bearer())
        .set_json(json!({ "task": task["id"], "title": "Sneaky" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&uri)
        .insert_header(alice.bearer())
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, subtask);
}

#[actix_rt::test]
async fn test_subtask_parent_cannot_change() {
    let (services, _) = test_services().await;
    let app = init_app(services).await;
    let alice = register_and_login(&app, "alice").await;
    let house = create_task(&app, &alice, json!({ "title": "Move house" })).await;
    let trip = create_task(&app, &alice, json!({ "title": "Plan trip" })).await;
    let subtask = create_subtask(&app, &alice, &house["id"], "Pack books").await;

    let req = test::TestRequest::patch()
        .uri(&format!("/api/subtasks/{}/", subtask["id"]))
        .insert_header(alice.bearer())
        .set_json(json!({ "task": trip["id"], "title": "Pack records" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"], house["id"]);
    assert_eq!(body["title"], "Pack records");
}

#[actix_rt::test]
async fn test_create_subtask_validation() {
    let (services, _) = test_services().await;
    let app = init_app(services).await;
    let alice = register_and_login(&app, "alice").await;

    let req = test::TestRequest::post()
        .uri("/api/subtasks/")
        .insert_header(alice.bearer())
        .set_json(json!({}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "task": ["This field is required."],
            "title": ["This field is required."]
        })
    );
}
