//! Path-template router.
//!
//! A [`Router`] is the HTTP [`Service`](crate::runtime::Service): it decodes
//! the request, picks the first route registered for the method whose
//! template matches the path, merges path, query and body parameters (in
//! that order of precedence), binds them against the route's declared
//! [`ParamShape`]s and calls the handler.
//!
//! | outcome                       | status |
//! |-------------------------------|--------|
//! | handler returned a response   | as set |
//! | malformed request             | 400    |
//! | no matching route             | 404    |
//! | parameter validation failed   | 400    |
//! | handler error or panic        | 400    |

mod error;
mod params;
mod routes;
mod template;

pub use error::{HandlerError, RouteError, TemplateError, ValidationError};
pub use params::{bind, Args, ParamShape, ParamType};
pub use routes::{Handler, Route, Router};
pub use template::PathTemplate;
