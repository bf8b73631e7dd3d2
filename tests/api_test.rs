//! End-to-end tests: the full router served on an ephemeral port and driven
//! over HTTP.
//!
//! Covers:
//! - Association, account and user sign-up flows
//! - Tier separation of tokens
//! - The master rule and cross-association updates
//! - Participant symmetry and the association delete cascade
//! - Error envelopes

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use agora::config::{AdminConfig, Config};
use agora::{build_state, db, routes};

const ADMIN_EMAIL: &str = "admin@example.org";
const ADMIN_PASSWORD: &str = "root-password";

struct TestServer {
    base: String,
    client: Client,
    _tmp: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    async fn start_with(tweak: impl FnOnce(&mut Config)) -> Self {
        let tmp = TempDir::new().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();

        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        tweak(&mut config);
        let admin = AdminConfig {
            name: "Admin".into(),
            email: ADMIN_EMAIL.into(),
            password: ADMIN_PASSWORD.into(),
        };
        db::seed_admin(&pool, &admin, config.auth.bcrypt_cost).unwrap();

        let app = routes::app(build_state(pool, config));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base: format!("http://{}", addr),
            client: Client::new(),
            _tmp: tmp,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let text = res.text().await.unwrap();
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, Some(token), None).await
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, token, Some(body)).await
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, Some(token), Some(body)).await
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, Some(token), None).await
    }

    /// Returns (token, subject) for an association login.
    async fn login_association(&self, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/login/association",
                None,
                json!({ "username": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["subject"].as_str().unwrap().to_string(),
        )
    }

    async fn admin(&self) -> (String, String) {
        self.login_association(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Create an association with a login account; returns its id.
    async fn create_association(&self, admin_token: &str, name: &str, email: &str) -> String {
        let (status, body) = self
            .post(
                "/association",
                Some(admin_token),
                json!({ "name": name, "email": email, "password": "club-password" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["ID"].as_str().unwrap().to_string()
    }

    /// Sign up and log in a user; returns (token, user id).
    async fn user(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/signin/user/ST-12345",
                None,
                json!({ "username": username, "device": "test" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let authtoken = body["credentials"]["authtoken"].as_str().unwrap().to_string();

        let (status, body) = self
            .post(
                "/login/user",
                None,
                json!({ "username": username, "authtoken": authtoken }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["ID"].as_str().unwrap().to_string(),
        )
    }
}

fn gala(association: &str) -> Value {
    let start = chrono::Utc::now() + chrono::Duration::days(7);
    json!({
        "name": "Gala",
        "association": association,
        "description": "Annual gala",
        "dateStart": start,
        "dateEnd": start + chrono::Duration::hours(6),
    })
}

fn ids(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn public_routes_need_no_token() {
    let server = TestServer::start().await;
    for path in ["/", "/credit", "/legal"] {
        let res = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn gala_scenario_cascades_to_participants() {
    let server = TestServer::start().await;
    let (admin, _) = server.admin().await;
    let bde = server.create_association(&admin, "BDE", "bde@example.org").await;
    let (bde_token, subject) = server.login_association("bde@example.org", "club-password").await;
    assert_eq!(subject, bde, "non-master accounts act as their association");

    let (status, event) = server.post("/event", Some(&bde_token), gala(&bde)).await;
    assert_eq!(status, StatusCode::CREATED, "{event}");
    let gala_id = event["ID"].as_str().unwrap().to_string();

    let (_, association) = server.get(&format!("/association/{bde}"), &bde_token).await;
    assert_eq!(ids(&association["events"]), vec![gala_id.as_str()]);

    let (ada, ada_id) = server.user("ada").await;
    let (status, body) = server
        .post(&format!("/event/{gala_id}/participant/{ada_id}"), Some(&ada), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(ids(&body["event"]["participants"]), vec![ada_id.as_str()]);
    assert_eq!(ids(&body["user"]["events"]), vec![gala_id.as_str()]);

    // Joining twice changes nothing
    let (_, body) = server
        .post(&format!("/event/{gala_id}/participant/{ada_id}"), Some(&ada), json!({}))
        .await;
    assert_eq!(body["event"]["participants"].as_array().unwrap().len(), 1);

    let (status, _) = server.delete(&format!("/association/{bde}"), &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, user) = server.get(&format!("/user/{ada_id}"), &ada).await;
    assert!(user["events"].as_array().unwrap().is_empty());
    let (status, body) = server.get(&format!("/event/{gala_id}"), &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
    let (status, _) = server.get(&format!("/association/{bde}"), &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.get("/event", &bde_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn deleted_master_account_loses_its_sessions() {
    let server = TestServer::start().await;
    let (admin, _) = server.admin().await;
    let (status, body) = server
        .post(
            "/association",
            Some(&admin),
            json!({ "name": "Ghost", "email": "ghost@example.org" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let ghost = body["ID"].as_str().unwrap().to_string();
    let (status, body) = server
        .post(
            &format!("/association/{ghost}/user"),
            Some(&admin),
            json!({ "password": "ghost-password", "master": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let (ghost_token, _) = server.login_association("ghost@example.org", "ghost-password").await;
    let (status, _) = server.get("/user", &ghost_token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server.delete(&format!("/association/{ghost}"), &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = server
        .post("/association", Some(&ghost_token), json!({ "name": "Revenant" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
    let (status, _) = server.get("/user", &ghost_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server.get("/association", &ghost_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The admin's own session is untouched
    let (status, _) = server.get("/user", &admin).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn non_master_cannot_touch_another_association() {
    let server = TestServer::start().await;
    let (admin, _) = server.admin().await;
    let a = server.create_association(&admin, "Chess", "chess@example.org").await;
    let b = server.create_association(&admin, "Drama", "drama@example.org").await;
    let (a_token, _) = server.login_association("chess@example.org", "club-password").await;
    let (b_token, _) = server.login_association("drama@example.org", "club-password").await;

    let (status, body) = server
        .put(&format!("/association/{a}"), &b_token, json!({ "name": "Hijacked" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");
    assert_eq!(body["error"], "Protected content");
    let (status, body) = server.get(&format!("/association/{a}"), &b_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Chess");

    // Event owned by A cannot be moved or edited by B, whatever the payload says
    let (_, event) = server.post("/event", Some(&a_token), gala(&a)).await;
    let event_id = event["ID"].as_str().unwrap();
    let (status, _) = server
        .put(&format!("/event/{event_id}"), &b_token, gala(&b))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server.delete(&format!("/event/{event_id}"), &b_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .put(&format!("/association/{a}"), &a_token, json!({ "name": "Chess Club" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Chess Club");
    assert_eq!(ids(&body["events"]), vec![event_id]);
}

#[tokio::test]
async fn master_account_acts_for_its_own_association_only() {
    let server = TestServer::start().await;
    let (admin, subject) = server.admin().await;
    let other = server.create_association(&admin, "Chess", "chess@example.org").await;

    let (status, me) = server.get(&format!("/association/{other}"), &admin).await;
    assert_eq!(status, StatusCode::OK, "{me}");

    let (status, _) = server
        .put(&format!("/association/{other}"), &admin, json!({ "name": "Nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, mine) = server
        .get(&format!("/association/{subject}/myassociations"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let owned: Vec<_> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["ID"].as_str().unwrap())
        .collect();
    assert_eq!(owned, vec![other.as_str()]);

    let (_, associations) = server.get("/association", &admin).await;
    let own = associations
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["email"] == ADMIN_EMAIL)
        .unwrap()["ID"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, body) = server
        .put(
            &format!("/association/{own}"),
            &admin,
            json!({ "name": "Admin", "email": ADMIN_EMAIL, "description": "Root" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["description"], "Root");
}

#[tokio::test]
async fn tiers_gate_routes() {
    let server = TestServer::start().await;
    let (admin, _) = server.admin().await;
    server.create_association(&admin, "Chess", "chess@example.org").await;
    let (club, _) = server.login_association("chess@example.org", "club-password").await;
    let (ada, _) = server.user("ada").await;

    let (status, body) = server.send(reqwest::Method::GET, "/event", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    // User token is not an association token, association token is not super
    let (status, _) = server.post("/event", Some(&ada), gala("5a0c3e9f1b2c3d4e5f6a7b8c")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = server.get("/user", &club).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, users) = server.get("/user", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);

    // Query parameter works as well as the header
    let res = server
        .client
        .get(server.url(&format!("/event?token={ada}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn signin_conflicts_unless_erase() {
    let server = TestServer::start().await;
    server.user("ada").await;

    let (status, body) = server
        .post("/signin/user/ST-1", None, json!({ "username": "ADA" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, body) = server
        .post("/signin/user/ST-1", None, json!({ "username": "ada", "erase": true }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["username"], "ada");

    let (status, body) = server
        .post("/signin/user/ST-1", None, json!({ "username": " Ada ", "erase": true }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["username"], "ada");
}

#[tokio::test]
async fn signin_can_be_disabled() {
    let server = TestServer::start_with(|c| c.auth.signup_enabled = false).await;
    let (status, body) = server
        .post("/signin/user/ST-1", None, json!({ "username": "ada" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
}

#[tokio::test]
async fn user_profile_rules() {
    let server = TestServer::start().await;
    let (ada, ada_id) = server.user("ada").await;
    let (grace, _) = server.user("grace").await;

    let (status, body) = server
        .put(&format!("/user/{ada_id}"), &ada, json!({ "promotion": "9XYZ" }))
        .await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(body["kind"], "validation");

    let (status, _) = server
        .put(&format!("/user/{ada_id}"), &grace, json!({ "name": "Not Ada" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .put(
            &format!("/user/{ada_id}"),
            &ada,
            json!({ "name": "Ada", "promotion": "4INFO", "gender": "female", "emailpublic": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["promotion"], "4INFO");
    assert_eq!(body["emailpublic"], true);

    let (status, body) = server.get("/user/not-an-id", &ada).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");

    let (status, body) = server
        .send(
            reqwest::Method::PUT,
            &format!("/user/{ada_id}"),
            Some(&ada),
            Some(json!({ "name": 42 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn posts_likes_comments_and_notifications() {
    let server = TestServer::start().await;
    let (admin, _) = server.admin().await;
    let bde = server.create_association(&admin, "BDE", "bde@example.org").await;
    let (club, _) = server.login_association("bde@example.org", "club-password").await;
    let (ada, ada_id) = server.user("ada").await;
    let (grace, grace_id) = server.user("grace").await;

    let (status, post) = server
        .post(
            "/post",
            Some(&club),
            json!({ "title": "Soirée", "association": bde, "description": "Jeudi" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{post}");
    let post_id = post["ID"].as_str().unwrap().to_string();

    let (status, body) = server
        .post(&format!("/post/{post_id}/like/{ada_id}"), Some(&ada), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["post"]["likes"]), vec![ada_id.as_str()]);
    assert_eq!(ids(&body["user"]["postsliked"]), vec![post_id.as_str()]);

    // Liking on behalf of someone else is refused
    let (status, _) = server
        .post(&format!("/post/{post_id}/like/{grace_id}"), Some(&ada), json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .post(
            &format!("/post/{post_id}/comment"),
            Some(&ada),
            json!({
                "user": ada_id,
                "content": "On y sera @grace",
                "tags": [{ "user": grace_id, "name": "grace" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let comment_id = body["comments"][0]["ID"].as_str().unwrap().to_string();

    let (status, body) = server
        .put(&format!("/report/{post_id}/comment/{comment_id}"), &grace, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reports"], 1);

    // Grace gets the news broadcast and the tag; delivery is asynchronous
    let mut kinds = Vec::new();
    for _ in 0..50 {
        let (_, list) = server.get(&format!("/notification/{grace_id}"), &grace).await;
        kinds = list
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["type"].as_str().unwrap().to_string())
            .collect();
        if kinds.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    kinds.sort();
    assert_eq!(kinds, vec!["post", "tag"]);

    // The association may remove any comment on its post, others may not
    let (status, _) = server
        .delete(&format!("/post/{post_id}/comment/{comment_id}"), &grace)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = server
        .delete(&format!("/post/{post_id}/comment/{comment_id}"), &club)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["comments"].as_array().unwrap().is_empty());

    let (status, _) = server.delete(&format!("/post/{post_id}"), &club).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, user) = server.get(&format!("/user/{ada_id}"), &ada).await;
    assert!(user["postsliked"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_finds_across_kinds() {
    let server = TestServer::start().await;
    let (admin, _) = server.admin().await;
    server.create_association(&admin, "Robotics", "robots@example.org").await;
    let (ada, _) = server.user("robotfan").await;

    let (status, body) = server.get("/search/robot", &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["associations"].as_array().unwrap().len(), 1);

    let (_, users) = server.get("/search/users/ROBOT", &ada).await;
    assert_eq!(users.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn logout_revokes_token_and_credentials() {
    let server = TestServer::start().await;
    let (ada, ada_id) = server.user("ada").await;

    let (status, _) = server.post("/logout", Some(&ada), json!({})).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = server.get(&format!("/user/{ada_id}"), &ada).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Old auth token no longer logs in
    let (status, body) = server
        .post("/login/user", None, json!({ "username": "ada", "authtoken": "whatever" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn deleting_user_cleans_up() {
    let server = TestServer::start().await;
    let (admin, _) = server.admin().await;
    let bde = server.create_association(&admin, "BDE", "bde@example.org").await;
    let (club, _) = server.login_association("bde@example.org", "club-password").await;
    let (ada, ada_id) = server.user("ada").await;

    let (_, event) = server.post("/event", Some(&club), gala(&bde)).await;
    let event_id = event["ID"].as_str().unwrap().to_string();
    server
        .post(&format!("/event/{event_id}/participant/{ada_id}"), Some(&ada), json!({}))
        .await;

    let (status, _) = server.delete(&format!("/user/{ada_id}"), &ada).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, event) = server.get(&format!("/event/{event_id}"), &club).await;
    assert!(event["participants"].as_array().unwrap().is_empty());

    let (status, body) = server.get("/event", &ada).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
}
