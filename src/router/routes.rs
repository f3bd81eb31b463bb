//! Route table and request dispatch.
//!
//! Routes are kept per method in registration order and the first template
//! that matches the path wins. Arguments are merged from the path captures,
//! the query and the JSON body, with earlier sources taking precedence, and
//! bound against the route's declared shapes before the handler runs.

use crate::protocols::http::{decode, HttpRequest, HttpResponse, Method};
use crate::router::{bind, Args, HandlerError, ParamShape, PathTemplate, RouteError, TemplateError};
use crate::runtime::Service;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Route handler. Receives the bound arguments of its route.
pub type Handler = dyn Fn(&Args) -> Result<HttpResponse, HandlerError> + Send + Sync;

/// A registered (method, template, shapes, handler) entry.
pub struct Route {
    method: Method,
    template: PathTemplate,
    shapes: Vec<ParamShape>,
    handler: Box<Handler>,
}

impl Route {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn shapes(&self) -> &[ParamShape] {
        &self.shapes
    }
}

/// Ordered route table per method. First registered match wins.
///
/// Built once before serving, then shared read-only between workers.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// # Panics
    ///
    /// On a malformed template. Use [`try_add_route`](Self::try_add_route)
    /// for templates that are not fixed at compile time.
    pub fn add_route<F>(
        &mut self,
        method: Method,
        template: &str,
        shapes: Vec<ParamShape>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&Args) -> Result<HttpResponse, HandlerError> + Send + Sync + 'static,
    {
        if let Err(e) = self.try_add_route(method, template, shapes, handler) {
            panic!("invalid route template {template:?}: {e}");
        }
        self
    }

    pub fn try_add_route<F>(
        &mut self,
        method: Method,
        template: &str,
        shapes: Vec<ParamShape>,
        handler: F,
    ) -> Result<&mut Self, TemplateError>
    where
        F: Fn(&Args) -> Result<HttpResponse, HandlerError> + Send + Sync + 'static,
    {
        let template = PathTemplate::parse(template)?;
        self.routes.entry(method).or_default().push(Route {
            method,
            template,
            shapes,
            handler: Box::new(handler),
        });
        Ok(self)
    }

    pub fn get<F>(&mut self, template: &str, shapes: Vec<ParamShape>, handler: F) -> &mut Self
    where
        F: Fn(&Args) -> Result<HttpResponse, HandlerError> + Send + Sync + 'static,
    {
        self.add_route(Method::Get, template, shapes, handler)
    }

    pub fn post<F>(&mut self, template: &str, shapes: Vec<ParamShape>, handler: F) -> &mut Self
    where
        F: Fn(&Args) -> Result<HttpResponse, HandlerError> + Send + Sync + 'static,
    {
        self.add_route(Method::Post, template, shapes, handler)
    }

    pub fn put<F>(&mut self, template: &str, shapes: Vec<ParamShape>, handler: F) -> &mut Self
    where
        F: Fn(&Args) -> Result<HttpResponse, HandlerError> + Send + Sync + 'static,
    {
        self.add_route(Method::Put, template, shapes, handler)
    }

    pub fn delete<F>(&mut self, template: &str, shapes: Vec<ParamShape>, handler: F) -> &mut Self
    where
        F: Fn(&Args) -> Result<HttpResponse, HandlerError> + Send + Sync + 'static,
    {
        self.add_route(Method::Delete, template, shapes, handler)
    }

    /// Routes for `method` in registration order.
    pub fn routes(&self, method: Method) -> &[Route] {
        self.routes.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a decoded request, turning every failure into an error response.
    pub fn route(&self, request: &HttpRequest) -> HttpResponse {
        match self.dispatch(request) {
            Ok(response) => {
                debug!(
                    method = %request.method(),
                    path = request.path(),
                    status = response.status().code(),
                    "Routed request"
                );
                response
            }
            Err(e) => {
                let status = e.status();
                match e {
                    RouteError::NotFound { .. } => {
                        debug!(method = %request.method(), path = request.path(), "No route")
                    }
                    _ => warn!(
                        method = %request.method(),
                        path = request.path(),
                        status = status.code(),
                        error = %e,
                        "Request failed"
                    ),
                }
                e.into_response()
            }
        }
    }

    /// Match, bind and invoke.
    ///
    /// Parameters merge with precedence path > query > body before binding.
    /// Handler panics are reported as handler errors.
    pub fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, RouteError> {
        for route in self.routes(request.method()) {
            let Some(path_params) = route.template.matches(request.path()) else {
                continue;
            };

            let params = merge(path_params, request);
            let args = bind(&route.shapes, &params)?;
            return invoke(route, &args);
        }

        Err(RouteError::NotFound {
            method: request.method(),
            path: request.path().to_string(),
        })
    }
}

impl Service for Router {
    type Message = HttpResponse;

    fn call(&self, request: &[u8]) -> HttpResponse {
        match decode(request) {
            Ok(request) => self.route(&request),
            Err(e) => {
                warn!(error = %e, "Rejecting malformed request");
                RouteError::from(e).into_response()
            }
        }
    }
}

fn merge(path_params: HashMap<String, String>, request: &HttpRequest) -> Map<String, Value> {
    let mut params = request.body().clone();
    for (key, value) in request.query() {
        params.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in path_params {
        params.insert(key, Value::String(value));
    }
    params
}

fn invoke(route: &Route, args: &Args) -> Result<HttpResponse, RouteError> {
    match panic::catch_unwind(AssertUnwindSafe(|| (route.handler)(args))) {
        Ok(result) => result.map_err(RouteError::from),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(
                method = %route.method,
                template = route.template.as_str(),
                panic = message.as_str(),
                "Handler panicked"
            );
            Err(HandlerError::new(message).into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::http::StatusCode;
    use crate::router::ParamType;
    use serde_json::json;

    fn call(router: &Router, raw: &str) -> HttpResponse {
        router.call(raw.as_bytes())
    }

    fn body(response: &HttpResponse) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    /// Echoes its bound arguments back as the response data.
    fn echo_args(args: &Args) -> Result<HttpResponse, HandlerError> {
        let data: Map<String, Value> = args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        Ok(HttpResponse::ok(data, StatusCode::Ok))
    }

    #[test]
    fn test_first_registered_match_wins() {
        let mut router = Router::new();
        router
            .get("/items/{id}", vec![], |_| Ok(HttpResponse::ok("by id", StatusCode::Ok)))
            .get("/items/latest", vec![], |_| Ok(HttpResponse::ok("latest", StatusCode::Ok)));

        let response = call(&router, "GET /items/latest HTTP/1.1\r\n\r\n");
        assert_eq!(body(&response)["data"], "by id");
        assert_eq!(router.routes(Method::Get).len(), 2);
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_literal_route_matches() {
        let mut router = Router::new();
        router.get("/health", vec![], |_| Ok(HttpResponse::ok("up", StatusCode::Ok)));

        let response = call(&router, "GET /health HTTP/1.1\r\n\r\n");
        assert_eq!(response.status(), StatusCode::Ok);
    }

    #[test]
    fn test_parameter_precedence() {
        let mut router = Router::new();
        let shapes = vec![
            ParamShape::required("id", ParamType::Any),
            ParamShape::required("q", ParamType::Any),
            ParamShape::required("b", ParamType::Any),
        ];
        router.put("/things/{id}", shapes, echo_args);

        let raw = "PUT /things/path?id=query&q=query HTTP/1.1\r\n\r\n{\"id\":\"body\",\"q\":\"body\",\"b\":\"body\"}";
        let response = call(&router, raw);

        assert_eq!(
            body(&response)["data"],
            json!({"id": "path", "q": "query", "b": "body"})
        );
    }

    #[test]
    fn test_not_found() {
        let mut router = Router::new();
        router.get("/demo/{id}", vec![], echo_args);

        for raw in [
            "GET /demo HTTP/1.1\r\n\r\n",
            "GET /demo/1/extra HTTP/1.1\r\n\r\n",
            "POST /demo/1 HTTP/1.1\r\n\r\n",
        ] {
            let response = call(&router, raw);
            assert_eq!(response.status(), StatusCode::NotFound);
            assert_eq!(body(&response), json!({"status": "error", "error": "Bad endpoint"}));
        }
    }

    #[test]
    fn test_validation_failure_names_param() {
        let mut router = Router::new();
        router.get(
            "/demo/{id}",
            vec![ParamShape::required("id", ParamType::Int)],
            echo_args,
        );

        let response = call(&router, "GET /demo/abc HTTP/1.1\r\n\r\n");
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(
            body(&response)["error"],
            "parameter 'id' expected int, got string"
        );

        let mut router = Router::new();
        router.post("/demo", vec![ParamShape::required("name", ParamType::Str)], echo_args);
        let response = call(&router, "POST /demo HTTP/1.1\r\n\r\n{}");
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(body(&response)["error"], "missing required parameter 'name'");
    }

    #[test]
    fn test_handler_error_is_bad_request() {
        let mut router = Router::new();
        router.delete("/demo/{id}", vec![], |_| Err("nope".into()));

        let response = call(&router, "DELETE /demo/9 HTTP/1.1\r\n\r\n");
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(body(&response), json!({"status": "error", "error": "nope"}));
    }

    #[test]
    fn test_handler_panic_is_bad_request() {
        let mut router = Router::new();
        router.get("/boom", vec![], |_| panic!("handler blew up"));

        let response = call(&router, "GET /boom HTTP/1.1\r\n\r\n");
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(body(&response)["error"], "handler blew up");
    }

    #[test]
    fn test_malformed_request_is_bad_request() {
        let router = Router::new();

        let response = call(&router, "NONSENSE\r\n\r\n");
        assert_eq!(response.status(), StatusCode::BadRequest);

        let response = call(&router, "PATCH /demo HTTP/1.1\r\n\r\n");
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(body(&response)["error"], "malformed request: unknown method \"PATCH\"");
    }

    #[test]
    fn test_undeclared_params_not_passed() {
        let mut router = Router::new();
        router.get("/search", vec![ParamShape::optional("q", ParamType::Str)], echo_args);

        let response = call(&router, "GET /search?q=rust&page=2 HTTP/1.1\r\n\r\n");
        assert_eq!(body(&response)["data"], json!({"q": "rust"}));

        let response = call(&router, "GET /search HTTP/1.1\r\n\r\n");
        assert_eq!(body(&response)["data"], json!({"q": null}));
    }

    #[test]
    fn test_try_add_route_rejects_bad_template() {
        let mut router = Router::new();
        let err = router
            .try_add_route(Method::Get, "/demo/{id", vec![], echo_args)
            .err()
            .unwrap();
        assert!(matches!(err, TemplateError::Unbalanced(_)));
        assert!(router.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid route template")]
    fn test_add_route_panics_on_bad_template() {
        Router::new().get("/demo/{}", vec![], echo_args);
    }

    #[test]
    fn test_encoded_reply() {
        let mut router = Router::new();
        router.get("/ping", vec![], |_| Ok(HttpResponse::ok("pong", StatusCode::Ok)));

        let reply = crate::runtime::Message::to_bytes(&call(&router, "GET /ping HTTP/1.1\r\n\r\n"));
        let body = br#"{"status":"ok","data":"pong"}"#;
        let expected = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            std::str::from_utf8(body).unwrap()
        );
        assert_eq!(&reply[..], expected.as_bytes());
    }
}
