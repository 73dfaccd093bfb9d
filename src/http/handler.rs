//! Request handlers and their lifecycle.
//!
//! A route stores a [`HandlerFactory`]; every dispatched request gets a fresh
//! handler from it, driven through [`run_lifecycle`]:
//!
//! ```text
//! init(ctx, name) → prepare → get | post | put | delete | head | patch | options
//!     → render → finish
//! ```

use std::fmt;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::http::context::Context;
use crate::session::error::{MultiError, SessionError};

/// Errors a handler stage can return. Each maps to one response status.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    SessionSave(#[from] MultiError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HandlerError::Session(SessionError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            HandlerError::Session(_) | HandlerError::SessionSave(_) | HandlerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// One stage per lifecycle step. Method stages default to
/// [`HandlerError::MethodNotAllowed`]; the other stages default to no-ops.
pub trait Handler: Send {
    fn init(&mut self, _ctx: &mut Context, _name: &str) {}

    fn prepare(&mut self, _ctx: &mut Context) -> HandlerResult {
        Ok(())
    }

    fn get(&mut self, _ctx: &mut Context) -> HandlerResult {
        Err(HandlerError::MethodNotAllowed)
    }

    fn post(&mut self, _ctx: &mut Context) -> HandlerResult {
        Err(HandlerError::MethodNotAllowed)
    }

    fn put(&mut self, _ctx: &mut Context) -> HandlerResult {
        Err(HandlerError::MethodNotAllowed)
    }

    fn delete(&mut self, _ctx: &mut Context) -> HandlerResult {
        Err(HandlerError::MethodNotAllowed)
    }

    fn head(&mut self, _ctx: &mut Context) -> HandlerResult {
        Err(HandlerError::MethodNotAllowed)
    }

    fn patch(&mut self, _ctx: &mut Context) -> HandlerResult {
        Err(HandlerError::MethodNotAllowed)
    }

    fn options(&mut self, _ctx: &mut Context) -> HandlerResult {
        Err(HandlerError::MethodNotAllowed)
    }

    fn render(&mut self, _ctx: &mut Context) -> HandlerResult {
        Ok(())
    }

    fn finish(&mut self, _ctx: &mut Context) -> HandlerResult {
        Ok(())
    }
}

type MakeHandler = dyn Fn() -> Box<dyn Handler> + Send + Sync;

/// Produces a fresh handler per request.
#[derive(Clone)]
pub struct HandlerFactory {
    name: String,
    make: Arc<MakeHandler>,
}

impl HandlerFactory {
    /// Factory for a `Default` handler type, named after the type.
    pub fn of<H>() -> Self
    where
        H: Handler + Default + 'static,
    {
        let full = std::any::type_name::<H>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self::new(name, || Box::new(H::default()))
    }

    pub fn new<F>(name: impl Into<String>, make: F) -> Self
    where
        F: Fn() -> Box<dyn Handler> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            make: Arc::new(make),
        }
    }

    /// Name passed to [`Handler::init`].
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self) -> Box<dyn Handler> {
        (self.make)()
    }
}

impl fmt::Debug for HandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFactory").field("name", &self.name).finish()
    }
}

/// Drive `handler` through every stage for the request in `ctx`.
pub fn run_lifecycle(handler: &mut dyn Handler, ctx: &mut Context, name: &str) -> HandlerResult {
    handler.init(ctx, name);
    handler.prepare(ctx)?;

    let method = ctx.method.clone();
    match method {
        Method::GET => handler.get(ctx)?,
        Method::POST => handler.post(ctx)?,
        Method::PUT => handler.put(ctx)?,
        Method::DELETE => handler.delete(ctx)?,
        Method::HEAD => handler.head(ctx)?,
        Method::PATCH => handler.patch(ctx)?,
        Method::OPTIONS => handler.options(ctx)?,
        _ => return Err(HandlerError::MethodNotAllowed),
    }

    handler.render(ctx)?;
    handler.finish(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::Services;

    #[derive(Default)]
    struct Recorder {
        steps: Vec<String>,
    }

    impl Recorder {
        fn flush(&self, ctx: &mut Context) {
            ctx.reply.text(self.steps.join(","));
        }
    }

    impl Handler for Recorder {
        fn init(&mut self, _ctx: &mut Context, name: &str) {
            self.steps.push(format!("init:{}", name));
        }

        fn prepare(&mut self, _ctx: &mut Context) -> HandlerResult {
            self.steps.push("prepare".to_string());
            Ok(())
        }

        fn get(&mut self, _ctx: &mut Context) -> HandlerResult {
            self.steps.push("get".to_string());
            Ok(())
        }

        fn render(&mut self, _ctx: &mut Context) -> HandlerResult {
            self.steps.push("render".to_string());
            Ok(())
        }

        fn finish(&mut self, ctx: &mut Context) -> HandlerResult {
            self.steps.push("finish".to_string());
            self.flush(ctx);
            Ok(())
        }
    }

    fn context(method: Method) -> Context {
        Context::for_test(method, "/", Arc::new(Services::default()))
    }

    #[test]
    fn test_stages_run_in_order() {
        let factory = HandlerFactory::of::<Recorder>();
        assert_eq!(factory.name(), "Recorder");

        let mut ctx = context(Method::GET);
        let mut handler = factory.build();
        run_lifecycle(handler.as_mut(), &mut ctx, factory.name()).unwrap();
        assert_eq!(
            ctx.reply.body_text(),
            "init:Recorder,prepare,get,render,finish"
        );
    }

    #[test]
    fn test_unimplemented_method_is_rejected() {
        let mut ctx = context(Method::POST);
        let mut handler = Recorder::default();
        let err = run_lifecycle(&mut handler, &mut ctx, "Recorder").unwrap_err();
        assert!(matches!(err, HandlerError::MethodNotAllowed));
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(handler.steps, vec!["init:Recorder", "prepare"]);
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let mut ctx = context(Method::TRACE);
        let mut handler = Recorder::default();
        assert!(matches!(
            run_lifecycle(&mut handler, &mut ctx, "Recorder"),
            Err(HandlerError::MethodNotAllowed)
        ));
    }

    #[test]
    fn test_closure_factory() {
        let factory = HandlerFactory::new("custom", || Box::new(Recorder::default()));
        assert_eq!(factory.name(), "custom");
        assert_eq!(format!("{:?}", factory), "HandlerFactory { name: \"custom\" }");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            HandlerError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HandlerError::Session(SessionError::InvalidName("a b".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HandlerError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
