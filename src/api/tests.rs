use super::*;
use crate::session::Session;
use crate::testing::{gateway_with, signed_in_session, token_for, FakeTransport, Reply};
use futures::StreamExt;

fn api(transport: std::sync::Arc<FakeTransport>, session: Session) -> Api {
    Api::new(gateway_with(transport, session).0)
}

#[tokio::test]
async fn login_stores_token_and_user() {
    let token = token_for(json!({"sub": "17"}));
    let transport = FakeTransport::new(vec![Reply::json(
        200,
        json!({"access_token": token, "token_type": "bearer", "user": {"id": 17, "account": "ann"}}),
    )]);
    let session = Session::in_memory();
    let api = api(transport.clone(), session.clone());

    api.login(&LoginRequest {
        account: "ann".into(),
        password: "pw".into(),
    })
    .await
    .unwrap();

    assert_eq!(session.user_id().unwrap().as_str(), "17");
    assert_eq!(session.store().user().unwrap()["account"], "ann");
    let sent = &transport.requests()[0];
    assert!(sent.header("Authorization").is_none());
    assert_eq!(transport.last_json(), json!({"account": "ann", "password": "pw"}));
}

#[tokio::test]
async fn create_task_sends_numeric_user_id_from_token() {
    let transport = FakeTransport::new(vec![Reply::json(200, json!({"task_id": 88, "message": "任务已创建"}))]);
    let api = api(transport.clone(), signed_in_session(4));

    let task = api.create_task("雪地", TaskType::Inspiration).await.unwrap();
    assert_eq!(task.task_id, Id::new("88"));
    assert_eq!(
        transport.last_json(),
        json!({"prompt": "雪地", "user_id": 4, "task_type": "INSPIRATION", "is_continue": false})
    );
}

#[tokio::test]
async fn crazy_walk_task_carries_options_and_prompt() {
    let transport = FakeTransport::new(vec![Reply::json(200, json!({"task_id": 90}))]);
    let api = api(transport.clone(), signed_in_session(4));
    let options = CrazyWalkOptions {
        audience: "male".to_string(),
        category: "玄幻".to_string(),
        seeds: vec!["天才少年".to_string(), "逆袭".to_string()],
        chapter_count: 5,
    };

    let task = api.create_crazy_walk(&options).await.unwrap();
    assert_eq!(task.task_id, Id::new("90"));
    assert_eq!(
        transport.last_json(),
        json!({
            "type": "male",
            "category": "玄幻",
            "seeds": ["天才少年", "逆袭"],
            "chapter_count": 5,
            "prompt": "玄幻、天才少年、逆袭",
            "user_id": 4,
            "task_type": "CRAZY_WALK"
        })
    );
}

#[tokio::test]
async fn crazy_result_is_read_by_task_id_in_chapter_order() {
    let transport = FakeTransport::new(vec![
        Reply::json(
            200,
            json!({
                "title": "逆天",
                "description": null,
                "chapters": [
                    {"id": 2, "order": 2, "title": "第二章", "content": "二", "summary": "s2"},
                    {"id": 1, "order": 1, "title": "第一章", "content": "一", "summary": null}
                ]
            }),
        ),
        Reply::json(200, Value::Null),
    ]);
    let api = api(transport.clone(), signed_in_session(1));

    let book = api.crazy_result(&Id::new("90")).await.unwrap();
    assert_eq!(transport.requests()[0].url.path(), "/crazy/90");
    assert_eq!(book.title, "逆天");
    assert_eq!(book.description, "");
    let titles: Vec<&str> = book.chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["第一章", "第二章"]);

    let err = api.crazy_result(&Id::new("91")).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn signed_out_calls_fail_before_the_network() {
    let transport = FakeTransport::new(vec![]);
    let api = api(transport.clone(), Session::in_memory());

    let err = api.create_task("x", TaskType::Inspiration).await.unwrap_err();
    assert!(matches!(err, ApiError::Session(SessionError::Unauthenticated)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn missing_story_is_not_found() {
    let transport = FakeTransport::new(vec![Reply::json(200, Value::Null)]);
    let api = api(transport.clone(), signed_in_session(1));

    let err = api.story(&Id::new("5")).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound("story")));
    assert_eq!(transport.requests()[0].url.path(), "/spirate/getOne/5");
}

#[tokio::test]
async fn story_tolerates_nulls_and_integer_ids() {
    let body = json!({
        "id": 5,
        "title": "雪",
        "content": null,
        "story_direction": null,
        "characters": [{"id": 2, "name": "林", "description": null, "image_url": "", "prompt": "p"}]
    });
    let transport = FakeTransport::new(vec![Reply::json(200, body)]);
    let story = api(transport, signed_in_session(1)).story(&Id::new("5")).await.unwrap();

    assert_eq!(story.content, "");
    assert!(story.story_direction.is_empty());
    let character = &story.characters[0];
    assert_eq!(character.id, Id::new("2"));
    assert!(character.needs_portrait());
    assert_eq!(character.extra["prompt"], "p");
}

#[tokio::test]
async fn character_update_round_trips_unknown_fields() {
    let transport = FakeTransport::new(vec![Reply::json(200, json!({}))]);
    let api = api(transport.clone(), signed_in_session(1));
    let mut character: Character =
        serde_json::from_value(json!({"id": 3, "name": "林", "description": "d", "is_used": true})).unwrap();
    character.image_url = Some("https://img/x.png".into());

    api.put_character(&character).await.unwrap();

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, crate::gateway::Method::Put);
    assert_eq!(sent.url.path(), "/character/3");
    let body = transport.last_json();
    assert_eq!(body["id"], 3);
    assert_eq!(body["is_used"], true);
    assert_eq!(body["image_url"], "https://img/x.png");
}

#[tokio::test]
async fn task_status_reads_completion_fields() {
    let transport = FakeTransport::new(vec![Reply::json(
        200,
        json!({"id": 9, "status": "completed", "completion_percentage": 100, "result_id": 31}),
    )]);
    let status = api(transport, signed_in_session(1)).task_status(&Id::new("9")).await.unwrap();
    assert!(status.is_completed());
    assert_eq!(status.result_id, Some(Id::new("31")));
}

#[tokio::test]
async fn chat_message_streams_chunks() {
    let transport = FakeTransport::new(vec![Reply::sse(&["data: 你好\n\n", "data: 呀\n\n"])]);
    let api = api(transport.clone(), signed_in_session(1));

    let stream = api.send_chat_message(&Id::new("12"), "hi").await.unwrap();
    let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;
    assert_eq!(chunks, vec!["你好".to_string(), "呀".to_string()]);
    assert_eq!(transport.last_json(), json!({"content": "hi"}));
}

#[tokio::test]
async fn logout_clears_session_even_on_failure() {
    let transport = FakeTransport::new(vec![Reply::json(500, json!({"detail": "down"}))]);
    let session = signed_in_session(1);
    let api = api(transport, session.clone());

    assert!(api.logout().await.is_err());
    assert!(session.token().is_none());
}

#[tokio::test]
async fn username_availability_reads_success_flag() {
    let transport = FakeTransport::new(vec![Reply::json(
        200,
        json!({"message": "Username already exists", "success": false}),
    )]);
    let api = api(transport.clone(), Session::in_memory());
    assert!(!api.username_available("ann lee").await.unwrap());
    assert_eq!(
        transport.requests()[0].url.path(),
        "/auth/check_username_available/ann%20lee"
    );
}

#[test]
fn ids_accept_strings_and_numbers() {
    let a: Id = serde_json::from_value(json!(7)).unwrap();
    let b: Id = serde_json::from_value(json!("7")).unwrap();
    assert_eq!(a, b);
    assert_eq!(serde_json::to_value(&a).unwrap(), json!(7));
    assert_eq!(serde_json::to_value(Id::new("abc")).unwrap(), json!("abc"));
}

#[test]
fn task_types_use_backend_names() {
    assert_eq!(serde_json::to_value(TaskType::Inspiration).unwrap(), json!("INSPIRATION"));
    assert_eq!(serde_json::to_value(TaskType::CrazyWalk).unwrap(), json!("CRAZY_WALK"));
    let parsed: TaskType = serde_json::from_value(json!("CRAZY_WALK")).unwrap();
    assert_eq!(parsed, TaskType::CrazyWalk);
}
