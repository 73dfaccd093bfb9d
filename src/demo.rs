//! Demo handlers served by the `waypost` binary.
//!
//! | Pattern | Handler | Shows |
//! |---|---|---|
//! | `/` | [`Home`] | literal route |
//! | `/users/:id([0-9]+)/:name(\w+)` | [`UserProfile`] | captures, per-key flashes |
//! | `/flash` | [`FlashBoard`] | one-shot flashes, session deletion |
//! | `/counter` | [`Counter`] | in-memory sessions |

use serde::Serialize;

use crate::http::{Context, Handler, HandlerError, HandlerFactory, HandlerResult, Routes};
use crate::http::{COOKIE_STORE, FILESYSTEM_STORE};
use crate::routing::RegistrationError;
use crate::session::Value;

/// Cookie name of the profile session.
pub const PROFILE_SESSION: &str = "waypost_profile";

/// Cookie name of the flash board session.
pub const FLASH_SESSION: &str = "waypost_flash";

/// Register the demo routes.
pub fn routes() -> Result<Routes, RegistrationError> {
    Routes::new()
        .with_route("/", HandlerFactory::of::<Home>())?
        .with_route(r"/users/:id([0-9]+)/:name(\w+)", HandlerFactory::of::<UserProfile>())?
        .with_route("/flash", HandlerFactory::of::<FlashBoard>())?
        .with_route("/counter", HandlerFactory::of::<Counter>())
}

#[derive(Default)]
pub struct Home;

impl Handler for Home {
    fn get(&mut self, ctx: &mut Context) -> HandlerResult {
        ctx.reply.text("waypost is running\n");
        Ok(())
    }

    fn head(&mut self, _ctx: &mut Context) -> HandlerResult {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Profile {
    id: String,
    name: String,
    query: Vec<(String, String)>,
    flashed_name: Vec<Value>,
}

/// Echoes the route parameters and records them as flashes.
#[derive(Default)]
pub struct UserProfile {
    profile: Option<Profile>,
}

impl Handler for UserProfile {
    fn get(&mut self, ctx: &mut Context) -> HandlerResult {
        let id = ctx
            .param("id")
            .ok_or_else(|| HandlerError::BadRequest("missing id".to_string()))?
            .to_string();
        let name = ctx
            .param("name")
            .ok_or_else(|| HandlerError::BadRequest("missing name".to_string()))?
            .to_string();

        let numeric: i64 = id
            .parse()
            .map_err(|e| HandlerError::BadRequest(format!("invalid id {:?}: {}", id, e)))?;

        let resolved = ctx.session(COOKIE_STORE, PROFILE_SESSION)?;
        if let Some(e) = &resolved.error {
            tracing::debug!(error = %e, "Profile session reset");
        }
        let flashed_name = {
            let mut session = resolved.session.lock();
            session.add_flash_to("user_id", numeric);
            session.add_flash_to("name", name.as_str());
            session.flashes_for("name")
        };
        ctx.save_sessions()?;

        self.profile = Some(Profile {
            id,
            name,
            query: ctx.query.clone(),
            flashed_name,
        });
        Ok(())
    }

    fn render(&mut self, ctx: &mut Context) -> HandlerResult {
        match &self.profile {
            Some(profile) => ctx.reply.json(profile),
            None => Ok(()),
        }
    }
}

/// `POST /flash?msg=...` queues a message, `GET /flash` consumes them all,
/// `DELETE /flash` drops the session.
#[derive(Default)]
pub struct FlashBoard;

impl FlashBoard {
    /// Prefer the filesystem store when it is configured.
    fn store_key(ctx: &Context) -> &'static str {
        if ctx.services().store(FILESYSTEM_STORE).is_some() {
            FILESYSTEM_STORE
        } else {
            COOKIE_STORE
        }
    }
}

impl Handler for FlashBoard {
    fn get(&mut self, ctx: &mut Context) -> HandlerResult {
        let store = Self::store_key(ctx);
        let resolved = ctx.session(store, FLASH_SESSION)?;
        let messages = resolved.session.lock().flashes();
        ctx.save_sessions()?;
        ctx.reply.json(&messages)
    }

    fn post(&mut self, ctx: &mut Context) -> HandlerResult {
        let message = ctx
            .query_value("msg")
            .ok_or_else(|| HandlerError::BadRequest("missing msg".to_string()))?
            .to_string();
        let store = Self::store_key(ctx);
        let resolved = ctx.session(store, FLASH_SESSION)?;
        resolved.session.lock().add_flash(message);
        ctx.save_sessions()?;
        ctx.reply.text("queued\n");
        Ok(())
    }

    fn delete(&mut self, ctx: &mut Context) -> HandlerResult {
        let store = Self::store_key(ctx);
        let resolved = ctx.session(store, FLASH_SESSION)?;
        resolved.session.lock().options.max_age = -1;
        ctx.save_sessions()?;
        ctx.reply.text("cleared\n");
        Ok(())
    }
}

/// Counts visits in an in-memory session.
#[derive(Default)]
pub struct Counter;

impl Handler for Counter {
    fn get(&mut self, ctx: &mut Context) -> HandlerResult {
        let manager = ctx
            .memory()
            .ok_or_else(|| HandlerError::Internal("in-memory sessions are disabled".to_string()))?;

        let id = match manager.session_id(ctx.cookies()) {
            Some(id) => {
                manager.update_last_access(&id);
                id
            }
            None => manager.start_session(&mut ctx.reply.cookies),
        };

        let visits = manager
            .get_val(&id, "visits")
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            + 1;
        manager.set_val(&id, "visits", visits);

        ctx.reply.text(format!("visits: {}\n", visits));
        Ok(())
    }

    fn delete(&mut self, ctx: &mut Context) -> HandlerResult {
        let manager = ctx
            .memory()
            .ok_or_else(|| HandlerError::Internal("in-memory sessions are disabled".to_string()))?;
        if let Some(id) = manager.session_id(ctx.cookies()) {
            manager.end_session(&id, &mut ctx.reply.cookies);
        }
        ctx.reply.text("ended\n");
        Ok(())
    }
}
