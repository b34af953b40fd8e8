use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
};
use chrono::{Duration, Utc};
use fake::{faker::name::en::FirstName, Fake};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use planetarium::{
    app,
    config::Config,
    models::{NewDome, NewSession, NewShow, NewTheme, NewUser},
    services::auth::{self, TokenKind},
    store::{MemoryStore, ResourceStore},
    AppState,
};

const PASSWORD: &str = "password123";

struct Member {
    id: i64,
    token: String,
}

/// Приложение с каталогом:
/// темы Cosmogony(1), Astrobiology(2);
/// шоу "Star come back"(1) {1}, "Alien Life"(2) {2}, "Star and Aliens"(3) {2};
/// купола Andromeda(1) 10x20, Orion(2) 2x3;
/// сеансы 1 = шоу 1 в Andromeda, 2 = шоу 2 в Andromeda, 3 = шоу 1 в Orion.
struct TestApp {
    state: Arc<AppState>,
    staff: Member,
    alice: Member,
    bob: Member,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::with_store(Config::in_memory("integration-secret"), store);

        let staff = seed_user(&state, "staff@planetarium.test", true).await;
        let alice = seed_user(&state, "alice@planetarium.test", false).await;
        let bob = seed_user(&state, "bob@planetarium.test", false).await;
        seed_catalog(state.store.as_ref()).await;

        TestApp { state, staff, alice, bob }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|json| json.to_string());
        self.send_raw(method, uri, token, body).await
    }

    async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn reserve(&self, token: &str, tickets: Value) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/planetarium/reservations",
            Some(token),
            Some(json!({ "tickets": tickets })),
        )
        .await
    }
}

async fn seed_user(state: &AppState, email: &str, is_staff: bool) -> Member {
    let password_hash = auth::hash_password(PASSWORD.to_string(), 4).await.unwrap();
    let user = state
        .store
        .insert_user(NewUser {
            email: email.to_string(),
            password_hash,
            first_name: FirstName().fake(),
            last_name: String::new(),
            is_staff,
        })
        .await
        .unwrap();
    let token = state.tokens.issue(user.id, TokenKind::Access).unwrap();
    Member { id: user.id, token }
}

async fn seed_catalog(store: &dyn ResourceStore) {
    for name in ["Cosmogony", "Astrobiology"] {
        store.insert_theme(NewTheme { name: name.to_string() }).await.unwrap();
    }
    for (title, theme) in [("Star come back", 1), ("Alien Life", 2), ("Star and Aliens", 2)] {
        store
            .insert_show(NewShow {
                title: title.to_string(),
                description: format!("{title} in full dome"),
                themes: vec![theme],
            })
            .await
            .unwrap();
    }
    for (name, rows, seats_in_row) in [("Andromeda", 10, 20), ("Orion", 2, 3)] {
        store
            .insert_dome(NewDome { name: name.to_string(), rows, seats_in_row })
            .await
            .unwrap();
    }
    for (hours, show, dome) in [(1, 1, 1), (2, 2, 1), (3, 1, 2)] {
        store
            .insert_session(NewSession {
                astronomy_show: show,
                planetarium_dome: dome,
                show_time: Utc::now() + Duration::hours(hours),
            })
            .await
            .unwrap();
    }
}

fn ids(value: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = value
        .as_array()
        .expect("list response")
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn anonymous_requests_are_unauthenticated() {
    let app = TestApp::new().await;

    for uri in [
        "/api/planetarium/planetarium_domes",
        "/api/planetarium/show_themes",
        "/api/planetarium/astronomy_shows",
        "/api/planetarium/show_sessions",
        "/api/planetarium/show_sessions/1",
        "/api/planetarium/tickets",
        "/api/planetarium/reservations",
        "/api/planetarium/reservations/1",
    ] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["error"].is_string());
    }

    let (status, _) = app.reserve("", json!([{ "row": 1, "seat": 1, "show_session": 1 }])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_bearer_token_is_unauthenticated() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/api/planetarium/planetarium_domes", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // refresh-токен не годится для заголовка Authorization
    let refresh = app.state.tokens.issue(app.alice.id, TokenKind::Refresh).unwrap();
    let (status, _) = app.get("/api/planetarium/planetarium_domes", Some(refresh.as_str())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn members_read_catalog_but_cannot_write_it() {
    let app = TestApp::new().await;
    let alice = Some(app.alice.token.as_str());

    let (status, body) = app.get("/api/planetarium/planetarium_domes", alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 2]);

    let writes = [
        (Method::POST, "/api/planetarium/planetarium_domes", json!({ "name": "Vega", "rows": 5, "seats_in_row": 5 })),
        (Method::PUT, "/api/planetarium/planetarium_domes/1", json!({ "name": "Vega", "rows": 5, "seats_in_row": 5 })),
        (Method::POST, "/api/planetarium/show_themes", json!({ "name": "Black holes" })),
        (Method::PUT, "/api/planetarium/show_themes/1", json!({ "name": "Black holes" })),
        (Method::POST, "/api/planetarium/astronomy_shows", json!({ "title": "Void", "description": "Dark" })),
        (Method::PUT, "/api/planetarium/astronomy_shows/1", json!({ "title": "Void", "description": "Dark" })),
        (
            Method::POST,
            "/api/planetarium/show_sessions",
            json!({ "astronomy_show": 1, "planetarium_dome": 1, "show_time": "2026-11-01T19:00:00Z" }),
        ),
        (
            Method::PUT,
            "/api/planetarium/show_sessions/1",
            json!({ "astronomy_show": 1, "planetarium_dome": 1, "show_time": "2026-11-01T19:00:00Z" }),
        ),
    ];
    for (method, uri, body) in writes {
        let (status, _) = app.send(method.clone(), uri, alice, Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
    }
}

#[tokio::test]
async fn staff_manage_catalog() {
    let app = TestApp::new().await;
    let staff = Some(app.staff.token.as_str());

    let (status, dome) = app
        .send(
            Method::POST,
            "/api/planetarium/planetarium_domes",
            staff,
            Some(json!({ "name": "Vega", "rows": 5, "seats_in_row": 8 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(dome["capacity"], 40);
    let dome_id = dome["id"].as_i64().unwrap();

    let (status, dome) = app
        .send(
            Method::PUT,
            &format!("/api/planetarium/planetarium_domes/{dome_id}"),
            staff,
            Some(json!({ "name": "Vega II", "rows": 6, "seats_in_row": 8 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dome["name"], "Vega II");
    assert_eq!(dome["capacity"], 48);

    let (status, session) = app
        .send(
            Method::PUT,
            "/api/planetarium/show_sessions/1",
            staff,
            Some(json!({
                "astronomy_show": 3,
                "planetarium_dome": dome_id,
                "show_time": "2026-11-01T19:00:00Z"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["astronomy_show_title"], "Star and Aliens");
    assert_eq!(session["planetarium_dome_name"], "Vega II");
    assert_eq!(session["capacity"], 48);
}

#[tokio::test]
async fn catalog_payloads_are_validated() {
    let app = TestApp::new().await;
    let staff = Some(app.staff.token.as_str());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/planetarium/planetarium_domes",
            staff,
            Some(json!({ "name": "Empty", "rows": 0, "seats_in_row": 8 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send_raw(
            Method::POST,
            "/api/planetarium/planetarium_domes",
            staff,
            Some("{\"name\": ".to_string()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/planetarium/astronomy_shows",
            staff,
            Some(json!({ "title": "Void", "description": "Dark", "themes": [99] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/planetarium/show_sessions",
            staff,
            Some(json!({ "astronomy_show": 1, "planetarium_dome": 99, "show_time": "2026-11-01T19:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Имя из одних пробелов - пустое имя
    let blank = [
        ("/api/planetarium/planetarium_domes", json!({ "name": "   ", "rows": 2, "seats_in_row": 2 })),
        ("/api/planetarium/show_themes", json!({ "name": "   " })),
        ("/api/planetarium/astronomy_shows", json!({ "title": " ", "description": "Dark" })),
    ];
    for (uri, body) in blank {
        let (status, _) = app.send(Method::POST, uri, staff, Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
    }

    let (status, theme) = app
        .send(
            Method::POST,
            "/api/planetarium/show_themes",
            staff,
            Some(json!({ "name": "  Cosmology " })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(theme["name"], "Cosmology");
}

#[tokio::test]
async fn dome_deletion_is_always_forbidden() {
    let app = TestApp::new().await;

    for token in [app.staff.token.as_str(), app.alice.token.as_str()] {
        let (status, _) = app
            .send(Method::DELETE, "/api/planetarium/planetarium_domes/1", Some(token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    // Политика класса срабатывает раньше поиска записи
    let (status, _) = app
        .send(Method::DELETE, "/api/planetarium/planetarium_domes/999", Some(app.staff.token.as_str()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, "/api/planetarium/planetarium_domes/1", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/planetarium/planetarium_domes/1", Some(app.staff.token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unrouted_actions_are_not_allowed() {
    let app = TestApp::new().await;
    let staff = Some(app.staff.token.as_str());

    let (status, _) = app.send(Method::DELETE, "/api/planetarium/show_themes/1", staff, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = app.send(Method::POST, "/api/planetarium/tickets", staff, Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = app
        .send(Method::PUT, "/api/planetarium/reservations/1", staff, Some(json!({ "tickets": [] })))
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = TestApp::new().await;
    let alice = Some(app.alice.token.as_str());

    for uri in [
        "/api/planetarium/planetarium_domes/999",
        "/api/planetarium/astronomy_shows/999",
        "/api/planetarium/show_sessions/999",
        "/api/planetarium/tickets/999",
        "/api/planetarium/reservations/999",
        "/api/planetarium/planetarium_domes/abc",
    ] {
        let (status, _) = app.get(uri, alice).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn shows_filter_by_title_and_theme() {
    let app = TestApp::new().await;
    let alice = Some(app.alice.token.as_str());

    let (status, body) = app.get("/api/planetarium/astronomy_shows?title=star&themes=2", alice).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|show| show["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Star and Aliens"]);

    let (_, body) = app.get("/api/planetarium/astronomy_shows?title=STAR", alice).await;
    assert_eq!(ids(&body), vec![1, 3]);

    // Пустое значение и незнакомые ключи не ограничивают выборку
    let (_, body) = app.get("/api/planetarium/astronomy_shows?title=&page=2", alice).await;
    assert_eq!(ids(&body), vec![1, 2, 3]);

    // Повтор запроса даёт тот же результат в том же порядке
    let (_, first) = app.get("/api/planetarium/astronomy_shows?themes=1,2", alice).await;
    let (_, second) = app.get("/api/planetarium/astronomy_shows?themes=1,2", alice).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn show_matching_several_themes_is_listed_once() {
    let app = TestApp::new().await;

    let (status, show) = app
        .send(
            Method::POST,
            "/api/planetarium/astronomy_shows",
            Some(app.staff.token.as_str()),
            Some(json!({ "title": "Origins", "description": "Life and stars", "themes": [1, 2] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(show["themes"], json!([1, 2]));

    let (_, body) = app
        .get("/api/planetarium/astronomy_shows?themes=1,2", Some(app.alice.token.as_str()))
        .await;
    assert_eq!(ids(&body), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn sessions_filters_intersect() {
    let app = TestApp::new().await;
    let alice = Some(app.alice.token.as_str());

    let (_, body) = app.get("/api/planetarium/show_sessions?astronomy_shows=1", alice).await;
    assert_eq!(ids(&body), vec![1, 3]);

    let (_, body) = app
        .get("/api/planetarium/show_sessions?astronomy_shows=1&planetarium_domes=2", alice)
        .await;
    assert_eq!(ids(&body), vec![3]);

    let (status, body) = app
        .get("/api/planetarium/show_sessions?astronomy_shows=2&planetarium_domes=2", alice)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn malformed_id_filters_are_rejected() {
    let app = TestApp::new().await;
    let alice = Some(app.alice.token.as_str());

    for uri in [
        "/api/planetarium/astronomy_shows?themes=1,x",
        "/api/planetarium/astronomy_shows?themes=1,,2",
        "/api/planetarium/show_sessions?planetarium_domes=orion",
        "/api/planetarium/tickets?show_sessions=1.5",
    ] {
        let (status, body) = app.get(uri, alice).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].as_str().unwrap().len() > 0);
    }
}

#[tokio::test]
async fn reservation_is_visible_to_owner_and_staff_only() {
    let app = TestApp::new().await;

    let (status, reservation) = app
        .reserve(&app.alice.token, json!([{ "row": 1, "seat": 1, "show_session": 3 }]))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["user"], app.alice.id);
    assert_eq!(reservation["tickets"].as_array().unwrap().len(), 1);
    let uri = format!("/api/planetarium/reservations/{}", reservation["id"]);

    let (status, _) = app.get(&uri, Some(app.alice.token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&uri, Some(app.staff.token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&uri, Some(app.bob.token.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reservation_listing_is_scoped_to_the_actor() {
    let app = TestApp::new().await;
    app.reserve(&app.alice.token, json!([{ "row": 1, "seat": 1, "show_session": 1 }])).await;
    app.reserve(&app.bob.token, json!([{ "row": 1, "seat": 2, "show_session": 1 }])).await;

    let (_, body) = app.get("/api/planetarium/reservations", Some(app.alice.token.as_str())).await;
    let owners: Vec<i64> = body.as_array().unwrap().iter().map(|r| r["user"].as_i64().unwrap()).collect();
    assert_eq!(owners, vec![app.alice.id]);

    // Чужой user в фильтре пересекается с ограничением - пусто
    let uri = format!("/api/planetarium/reservations?user={}", app.bob.id);
    let (_, body) = app.get(&uri, Some(app.alice.token.as_str())).await;
    assert_eq!(body, json!([]));

    let (_, body) = app.get("/api/planetarium/reservations", Some(app.staff.token.as_str())).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    let (_, body) = app.get(&uri, Some(app.staff.token.as_str())).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reservation_updates_session_counters() {
    let app = TestApp::new().await;
    let (status, _) = app
        .reserve(
            &app.alice.token,
            json!([
                { "row": 1, "seat": 1, "show_session": 3 },
                { "row": 2, "seat": 3, "show_session": 3 }
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, session) = app.get("/api/planetarium/show_sessions/3", Some(app.bob.token.as_str())).await;
    assert_eq!(session["capacity"], 6);
    assert_eq!(session["tickets_sold"], 2);
    assert_eq!(session["tickets_available"], 4);

    let (_, tickets) = app.get("/api/planetarium/tickets?show_sessions=3", Some(app.bob.token.as_str())).await;
    assert_eq!(tickets.as_array().unwrap().len(), 2);
    assert!(tickets[0].get("owner").is_none());
}

#[tokio::test]
async fn invalid_seats_are_rejected() {
    let app = TestApp::new().await;
    let alice = app.alice.token.as_str();
    app.reserve(alice, json!([{ "row": 1, "seat": 1, "show_session": 3 }])).await;

    let rejected = [
        // Orion: 2 ряда по 3 места
        json!([{ "row": 3, "seat": 1, "show_session": 3 }]),
        json!([{ "row": 1, "seat": 4, "show_session": 3 }]),
        json!([{ "row": 0, "seat": 1, "show_session": 3 }]),
        // уже занято
        json!([{ "row": 1, "seat": 1, "show_session": 3 }]),
        // повтор внутри одной брони
        json!([
            { "row": 2, "seat": 2, "show_session": 3 },
            { "row": 2, "seat": 2, "show_session": 3 }
        ]),
        json!([{ "row": 1, "seat": 1, "show_session": 999 }]),
        json!([]),
    ];
    for tickets in rejected {
        let (status, _) = app.reserve(&app.bob.token, tickets.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{tickets}");
    }

    // Неудачные попытки ничего не записали
    let (_, session) = app.get("/api/planetarium/show_sessions/3", Some(alice)).await;
    assert_eq!(session["tickets_sold"], 1);
}

#[tokio::test]
async fn issued_seats_pin_the_dome_size() {
    let app = TestApp::new().await;
    let staff = Some(app.staff.token.as_str());
    let (status, _) = app
        .reserve(&app.alice.token, json!([{ "row": 9, "seat": 15, "show_session": 1 }]))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Orion 2x3 не вмещает ряд 9
    let (status, _) = app
        .send(
            Method::PUT,
            "/api/planetarium/show_sessions/1",
            staff,
            Some(json!({ "astronomy_show": 1, "planetarium_dome": 2, "show_time": "2026-11-01T19:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/planetarium/planetarium_domes/1",
            staff,
            Some(json!({ "name": "Andromeda", "rows": 1, "seats_in_row": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, session) = app.get("/api/planetarium/show_sessions/1", staff).await;
    assert_eq!(session["planetarium_dome"], 1);
    assert_eq!(session["capacity"], 200);
    assert_eq!(session["tickets_sold"], 1);

    // Сжатие, при котором место 9/15 остаётся внутри, разрешено
    let (status, dome) = app
        .send(
            Method::PUT,
            "/api/planetarium/planetarium_domes/1",
            staff,
            Some(json!({ "name": "Andromeda", "rows": 9, "seats_in_row": 15 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dome["capacity"], 135);
}

#[tokio::test]
async fn tickets_are_readable_by_any_member() {
    let app = TestApp::new().await;
    let (_, reservation) = app
        .reserve(&app.alice.token, json!([{ "row": 5, "seat": 5, "show_session": 1 }]))
        .await;
    let ticket_id = reservation["tickets"][0]["id"].as_i64().unwrap();

    let (status, ticket) = app
        .get(&format!("/api/planetarium/tickets/{ticket_id}"), Some(app.bob.token.as_str()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["reservation"], reservation["id"]);
    assert_eq!(ticket["row"], 5);
}

#[tokio::test]
async fn register_obtain_and_refresh_tokens() {
    let app = TestApp::new().await;
    let first_name: String = FirstName().fake();

    let (status, user) = app
        .send(
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "email": "Carol@Planetarium.test", "password": PASSWORD, "first_name": first_name })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "carol@planetarium.test");
    assert_eq!(user["is_staff"], false);
    assert!(user.get("password_hash").is_none());

    let (status, pair) = app
        .send(
            Method::POST,
            "/api/token",
            None,
            Some(json!({ "email": "carol@planetarium.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = pair["access"].as_str().unwrap().to_string();
    let refresh = pair["refresh"].as_str().unwrap().to_string();

    let (status, me) = app.get("/api/user/me", Some(access.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["first_name"], first_name);

    // Зарегистрированный пользователь не staff
    let (status, _) = app
        .send(
            Method::POST,
            "/api/planetarium/show_themes",
            Some(access.as_str()),
            Some(json!({ "name": "Comets" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, renewed) = app
        .send(Method::POST, "/api/token/refresh", None, Some(json!({ "refresh": refresh })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/user/me", renewed["access"].as_str()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::POST, "/api/token/refresh", None, Some(json!({ "refresh": access })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_and_registrations_are_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/token",
            None,
            Some(json!({ "email": "alice@planetarium.test", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/token",
            None,
            Some(json!({ "email": "nobody@planetarium.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/user/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for body in [
        json!({ "email": "alice@planetarium.test", "password": PASSWORD }),
        json!({ "email": "dave@planetarium.test", "password": "short" }),
        json!({ "email": "not-an-email", "password": PASSWORD }),
    ] {
        let (status, _) = app.send(Method::POST, "/api/user/register", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
}
