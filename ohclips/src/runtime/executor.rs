use std::borrow::Cow;

use redis::aio::ConnectionLike;
use serde_json::Value;

use crate::{
    errors::StoreError,
    runtime::{
        commands::StoreCommand,
        scripts::{
            APPEND_COMMENT_SCRIPT, DELETE_CLIP_SCRIPT, HIT_WINDOW_SCRIPT, INSERT_CLIP_SCRIPT, MUTATE_FOLLOWING_SCRIPT,
            REGISTER_USER_SCRIPT, TOGGLE_LIKE_SCRIPT,
        },
    },
};

/// Runs one command through its Lua script and decodes the JSON reply.
///
/// Scripts answer either `{"ok": true, ...}` or `{"error": "<code>", ...}`;
/// error codes are mapped onto [`StoreError`] variants here.
pub async fn execute_command<C>(conn: &mut C, command: &StoreCommand) -> Result<Value, StoreError>
where
    C: ConnectionLike + Send,
{
    let script = match command {
        StoreCommand::RegisterUser(_) => &*REGISTER_USER_SCRIPT,
        StoreCommand::InsertClip(_) => &*INSERT_CLIP_SCRIPT,
        StoreCommand::ToggleLike(_) => &*TOGGLE_LIKE_SCRIPT,
        StoreCommand::AppendComment(_) => &*APPEND_COMMENT_SCRIPT,
        StoreCommand::DeleteClip(_) => &*DELETE_CLIP_SCRIPT,
        StoreCommand::MutateFollowing(_) => &*MUTATE_FOLLOWING_SCRIPT,
        StoreCommand::HitWindow(_) => &*HIT_WINDOW_SCRIPT,
    };

    let payload = serde_json::to_string(command).map_err(|err| StoreError::Other {
        message: Cow::Owned(format!("failed to serialize {} command: {err}", command.name())),
    })?;

    let mut invocation = script.prepare_invoke();
    invocation.arg(payload);
    let raw: String = invocation.invoke_async(conn).await?;

    let value: Value = serde_json::from_str(&raw).map_err(|err| StoreError::Other {
        message: Cow::Owned(format!("failed to parse lua response: {err}")),
    })?;

    if let Some(error) = value.get("error") {
        return Err(decode_script_error(error, &value));
    }

    Ok(value)
}

fn decode_script_error(error: &Value, value: &Value) -> StoreError {
    let text = |field: &str| value.get(field).and_then(|v| v.as_str()).map(|s| s.to_string());
    match error.as_str() {
        Some("document_not_found") => StoreError::NotFound {
            document: text("document"),
        },
        Some("not_owner") => StoreError::NotOwner {
            document: text("document").unwrap_or_default(),
        },
        Some("unique_constraint_violation") => StoreError::UniqueConstraintViolation {
            field: text("field").unwrap_or_default(),
            value: text("value").unwrap_or_default(),
        },
        Some(other) => StoreError::Other {
            message: Cow::Owned(other.to_string()),
        },
        None => StoreError::Other {
            message: Cow::Borrowed("lua_error"),
        },
    }
}

#[allow(async_fn_in_trait)]
pub trait ScriptExecutor {
    async fn execute(&mut self, command: StoreCommand) -> Result<Value, StoreError>;
}

pub struct RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    connection: &'a mut C,
}

impl<'a, C> RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    pub fn new(connection: &'a mut C) -> Self {
        Self { connection }
    }
}

impl<C> ScriptExecutor for RedisExecutor<'_, C>
where
    C: ConnectionLike + Send,
{
    async fn execute(&mut self, command: StoreCommand) -> Result<Value, StoreError> {
        execute_command(self.connection, &command).await
    }
}
