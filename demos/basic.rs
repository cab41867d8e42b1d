//! Minimal conduit example: validated JSON endpoints and health checks.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/1
//!   curl http://localhost:3000/users/abc            # 400, id is not an integer
//!   curl http://localhost:3000/users/7              # 404 from the handler
//!   curl -X POST http://localhost:3000/users \
//!        -H 'authorization: Bearer demo' \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"carol","age":"29"}'
//!   curl http://localhost:3000/healthz

use conduit::config::Settings;
use conduit::middleware::{self, RequestId};
use conduit::{Delta, HttpError, Pipeline, Router, Server, health, schema};
use http::StatusCode;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let app = Router::new()
        .get("/users/{id}", get_user())
        .post("/users", create_user())
        .get("/healthz", health::liveness())
        .get("/readyz", health::readiness());

    Server::from_settings(&settings)
        .serve(app)
        .await
        .expect("server error");
}

fn user_schema() -> schema::SharedSchema {
    schema::object([("id", schema::integer()), ("name", schema::string())])
}

// GET /users/{id}
//
// `id` arrives as a string and reaches the handler as an integer. The
// result schema drops anything that is not part of the public user shape.
fn get_user() -> Pipeline {
    Pipeline::builder()
        .with(RequestId)
        .params([("id", schema::integer())])
        .result(user_schema())
        .handler(|ctx, _reply| {
            let id = ctx.param("id").and_then(Value::as_i64);
            Box::pin(async move {
                match id {
                    Some(1) => Ok(json!({"id": 1, "name": "alice", "password_hash": "…"})),
                    Some(id) => Err(HttpError::not_found(format!("user {id} not found")).into()),
                    None => Err(HttpError::bad_request("missing id").into()),
                }
            })
        })
}

// POST /users
//
// The auth step adds `actor` to the context; the handler sets 201 and
// returns the created user, which the result schema checks.
fn create_user() -> Pipeline {
    let auth = middleware::from_fn(|ctx, _reply| {
        let token = ctx.header("authorization").map(str::to_owned);
        Box::pin(async move {
            match token.as_deref().and_then(|t| t.strip_prefix("Bearer ")) {
                Some(name) if !name.is_empty() => Ok(Delta::new().set("actor", name)),
                _ => Err(HttpError::unauthorized("bearer token required").into()),
            }
        })
    });

    Pipeline::builder()
        .with(RequestId)
        .with(auth)
        .body([("name", schema::string()), ("age", schema::optional(schema::integer()))])
        .result(user_schema())
        .handler(|ctx, reply| {
            let name = ctx.body()["name"].clone();
            let actor = ctx.get("actor").cloned().unwrap_or(Value::Null);
            Box::pin(async move {
                tracing::info!(%actor, "creating user");
                reply.set_status(StatusCode::CREATED);
                Ok(json!({"id": 99, "name": name}))
            })
        })
}
