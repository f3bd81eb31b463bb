//! `/demo` CRUD endpoints served by the `pakket` binary.
//!
//! The instance payload is
//!
//! ```json
//! {"id": 1, "name": "test", "other": ["a", "b"], "otherstuff": {"a": 1, "b": 2}, "temp": 1}
//! ```
//!
//! with `temp` optional. Replies echo the bound values back, rendering lists
//! and maps as `['a', 'b']` and `{'a': 1, 'b': 2}` and a missing `temp` as
//! `None`.

use crate::protocols::http::{HttpResponse, StatusCode};
use crate::router::{Args, HandlerError, ParamShape, ParamType, Router};
use serde_json::Value;

/// The only item id that exists.
const KNOWN_ID: i64 = 1;

/// A router with the demo endpoints registered.
pub fn routes() -> Router {
    let mut router = Router::new();
    register(&mut router);
    router
}

pub fn register(router: &mut Router) {
    router
        .get("/demo/{item_id}", item_id(), get_item)
        .post("/demo", instance(), create_instance)
        .put("/demo/{id}", instance(), update_instance)
        .delete("/demo/{item_id}", item_id(), delete_item);
}

fn item_id() -> Vec<ParamShape> {
    vec![ParamShape::required("item_id", ParamType::Int)]
}

fn instance() -> Vec<ParamShape> {
    vec![
        ParamShape::required("id", ParamType::Int),
        ParamShape::required("name", ParamType::Str),
        ParamShape::required("other", ParamType::list(ParamType::Str)),
        ParamShape::required("otherstuff", ParamType::map(ParamType::Int)),
        ParamShape::optional("temp", ParamType::Int),
    ]
}

fn get_item(args: &Args) -> Result<HttpResponse, HandlerError> {
    Ok(match args.int("item_id")? {
        KNOWN_ID => HttpResponse::ok(format!("You got ID :{KNOWN_ID} "), StatusCode::Ok),
        _ => invalid_id(),
    })
}

fn delete_item(args: &Args) -> Result<HttpResponse, HandlerError> {
    Ok(match args.int("item_id")? {
        KNOWN_ID => HttpResponse::ok(format!("You deleted ID :{KNOWN_ID} "), StatusCode::Ok),
        _ => invalid_id(),
    })
}

fn create_instance(args: &Args) -> Result<HttpResponse, HandlerError> {
    let summary = describe(args)?;
    Ok(HttpResponse::ok(
        format!("You created instance {summary}"),
        StatusCode::Ok,
    ))
}

/// `id` is the path segment; a body `id` is shadowed by it and not echoed.
fn update_instance(args: &Args) -> Result<HttpResponse, HandlerError> {
    let summary = describe(args)?;
    Ok(HttpResponse::ok(
        format!("You updated instance {summary}"),
        StatusCode::Ok,
    ))
}

fn invalid_id() -> HttpResponse {
    HttpResponse::error("Invalid ID", StatusCode::BadRequest)
}

fn describe(args: &Args) -> Result<String, HandlerError> {
    let temp = match args.opt_int("temp")? {
        Some(temp) => temp.to_string(),
        None => "None".to_string(),
    };
    Ok(format!(
        "id: {}, name: {},other: {}, otherstuff: {}, temp: {}",
        args.int("id")?,
        args.str("name")?,
        literal(&Value::Array(args.list("other")?.clone())),
        literal(&Value::Object(args.map("otherstuff")?.clone())),
        temp,
    ))
}

/// Render a value the way the demo replies print it: `None`, `True`,
/// single-quoted strings, `[..]` and `{'k': v}`.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => format!("{f:?}"),
            _ => n.to_string(),
        },
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", quote(key), literal(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}
