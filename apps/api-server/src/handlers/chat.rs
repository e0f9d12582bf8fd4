//! Assistant chat with per-user history kept in the cache.

use std::time::Duration;

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use fellowship_core::domain::ChatMessage;
use fellowship_core::ports::Cache;
use fellowship_core::{Action, Resource};
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::{ChatMessageDto, ChatReply, ChatRequest};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views;

const HISTORY_LIMIT: usize = 20;
const HISTORY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn history_key(user_id: Uuid) -> String {
    format!("chat:{user_id}")
}

async fn load_history(state: &AppState, user_id: Uuid) -> Vec<ChatMessage> {
    let Some(raw) = state.cache.get(&history_key(user_id)).await else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, user_id = %user_id, "Discarding unreadable chat history");
        Vec::new()
    })
}

async fn store_history(
    state: &AppState,
    user_id: Uuid,
    mut history: Vec<ChatMessage>,
) -> AppResult<()> {
    if history.len() > HISTORY_LIMIT {
        history.drain(..history.len() - HISTORY_LIMIT);
    }
    let raw = serde_json::to_string(&history).map_err(|e| AppError::Internal(e.to_string()))?;
    state
        .cache
        .set(&history_key(user_id), &raw, Some(HISTORY_TTL))
        .await?;
    Ok(())
}

/// POST /api/chat
pub async fn send(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<ChatRequest>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Chat, Action::Create)
        .await?;

    let question = ChatMessage::user(&body.message)?;
    let mut history = load_history(&state, identity.user_id).await;

    let answer = state.assistant.reply(&history, &question.content).await?;
    let reply = ChatMessage::assistant(answer);

    history.push(question);
    history.push(reply.clone());
    store_history(&state, identity.user_id, history).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(ChatReply {
        reply: views::chat_message(&reply),
    })))
}

/// GET /api/chat/history
pub async fn history(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Chat, Action::Create)
        .await?;

    let messages: Vec<ChatMessageDto> = load_history(&state, identity.user_id)
        .await
        .iter()
        .map(views::chat_message)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::ok(messages)))
}

/// DELETE /api/chat/history
pub async fn clear(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Chat, Action::Create)
        .await?;

    state.cache.delete(&history_key(identity.user_id)).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Chat history cleared")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{self, bearer, test_app};
    use actix_web::test;
    use fellowship_core::domain::Role;
    use serde_json::{Value, json};

    fn ask(token: &str, message: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/chat")
            .insert_header(bearer(token))
            .set_json(json!({ "message": message }))
    }

    #[actix_web::test]
    async fn test_chat_reply_and_history() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, token) = testing::user(&state, "Ana", Role::Member).await;

        let body: Value =
            test::call_and_read_body_json(&app, ask(&token, "When is Sunday worship?").to_request())
                .await;
        assert_eq!(body["data"]["reply"]["role"], "assistant");
        assert!(body["data"]["reply"]["content"]
            .as_str()
            .unwrap()
            .contains("11:00"));

        let req = test::TestRequest::get()
            .uri("/api/chat/history")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let messages = body["data"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");

        let req = test::TestRequest::delete()
            .uri("/api/chat/history")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::get()
            .uri("/api/chat/history")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_history_is_capped() {
        let state = testing::state();
        let app = test_app!(state);
        let (ana, token) = testing::user(&state, "Ana", Role::Member).await;

        for i in 0..15 {
            let res = test::call_service(&app, ask(&token, &format!("question {i}")).to_request()).await;
            assert_eq!(res.status(), 200);
        }

        let history = load_history(&state, ana.id).await;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.last().unwrap().role, fellowship_core::domain::ChatRole::Assistant);
        assert_eq!(history[0].content, "question 5");
    }

    #[actix_web::test]
    async fn test_empty_message_rejected() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, token) = testing::user(&state, "Ana", Role::Member).await;

        let res = test::call_service(&app, ask(&token, "   ").to_request()).await;
        assert_eq!(res.status(), 400);
    }
}
