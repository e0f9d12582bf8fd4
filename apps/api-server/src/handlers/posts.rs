//! Bulletin board posts and likes.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use fellowship_core::domain::{NotificationKind, Post, PostCategory, PostDraft};
use fellowship_core::ports::{
    BaseRepository, Cache, CommentRepository, LikeRepository, PostRepository,
};
use fellowship_core::{Action, Page, PageRequest, Resource};
use fellowship_shared::ApiResponse;
use fellowship_shared::dto::{CreatePostRequest, LikeResponse, PostResponse, UpdatePostRequest};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::views::{self, PostCounts};

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub category: Option<String>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

pub(crate) fn post_link(post_id: Uuid) -> String {
    format!("/board/{post_id}")
}

pub(crate) async fn load_post(state: &AppState, id: Uuid) -> AppResult<Post> {
    state
        .posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

async fn with_counts(state: &AppState, post: Post, viewer: Uuid) -> AppResult<PostResponse> {
    let counts = PostCounts {
        likes: state.likes.count(post.id).await?,
        comments: state.comments.count_by_post(post.id).await?,
        liked_by_me: state.likes.has_liked(post.id, viewer).await?,
    };
    Ok(views::post(post, counts))
}

/// GET /api/posts
pub async fn list(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<ListPostsQuery>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Post, Action::Read)
        .await?;

    let category = query
        .category
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(str::parse::<PostCategory>)
        .transpose()?;
    let page = state
        .posts
        .list(category, PageRequest::new(query.offset, query.limit))
        .await?;

    let mut items = Vec::with_capacity(page.items.len());
    for post in page.items {
        items.push(with_counts(&state, post, identity.user_id).await?);
    }

    Ok(HttpResponse::Ok().json(ApiResponse::ok(Page {
        items,
        offset: page.offset,
        limit: page.limit,
        has_more: page.has_more,
    })))
}

/// POST /api/posts
///
/// Notices are restricted to moderators.
pub async fn create(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Post, Action::Create)
        .await?;

    let req = body.into_inner();
    let category: PostCategory = req.category.parse()?;
    if category.is_restricted() {
        state
            .authorizer
            .require(&identity, Resource::Post, Action::Moderate)
            .await?;
    }

    let draft = PostDraft {
        category,
        title: req.title,
        content: req.content,
        image_urls: req.image_urls,
    }
    .validated()?;

    let post = state
        .posts
        .save(Post::new(identity.user_id, identity.display_name.clone(), draft))
        .await?;
    tracing::info!(post_id = %post.id, author_id = %post.author_id, category = %post.category, "Post created");

    let counts = PostCounts {
        likes: 0,
        comments: 0,
        liked_by_me: false,
    };
    Ok(HttpResponse::Created().json(ApiResponse::ok(views::post(post, counts))))
}

/// GET /api/posts/{id}
///
/// A viewer adds at most one view per de-duplication window.
pub async fn get(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Post, Action::Read)
        .await?;

    let id = path.into_inner();
    let mut post = load_post(&state, id).await?;

    let key = format!("post_view:{}:{}", id, identity.user_id);
    match state
        .cache
        .set_if_absent(&key, "1", state.config.view_dedup)
        .await
    {
        Ok(true) => post.view_count = state.posts.increment_views(id).await?,
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, post_id = %id, "View de-duplication unavailable"),
    }

    let response = with_counts(&state, post, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// PUT /api/posts/{id}
pub async fn update(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let mut post = load_post(&state, path.into_inner()).await?;
    state
        .authorizer
        .require_owner_or_moderator(&identity, post.author_id, Resource::Post, Action::Update, post.id)
        .await?;

    let req = body.into_inner();
    let mut draft = PostDraft::from(&post);
    if let Some(category) = req.category {
        draft.category = category.parse()?;
    }
    if let Some(title) = req.title {
        draft.title = title;
    }
    if let Some(content) = req.content {
        draft.content = content;
    }
    if let Some(image_urls) = req.image_urls {
        draft.image_urls = image_urls;
    }

    if draft.category.is_restricted() && !post.category.is_restricted() {
        state
            .authorizer
            .require(&identity, Resource::Post, Action::Moderate)
            .await?;
    }

    post.revise(draft.validated()?);
    let post = state.posts.save(post).await?;
    let response = with_counts(&state, post, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// DELETE /api/posts/{id}
pub async fn delete(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = load_post(&state, path.into_inner()).await?;
    state
        .authorizer
        .require_owner_or_moderator(&identity, post.author_id, Resource::Post, Action::Delete, post.id)
        .await?;

    state.posts.delete(post.id).await?;
    // Postgres cascades these; the in-memory store does not.
    let comments = state.comments.delete_by_post(post.id).await?;
    let likes = state.likes.clear_post(post.id).await?;
    tracing::info!(
        post_id = %post.id,
        deleted_by = %identity.user_id,
        comments,
        likes,
        "Post deleted"
    );
    Ok(HttpResponse::Ok().json(ApiResponse::message("Post deleted")))
}

/// POST /api/posts/{id}/like
pub async fn like(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Post, Action::Read)
        .await?;
    let post = load_post(&state, path.into_inner()).await?;

    let created = state.likes.like(post.id, identity.user_id).await?;
    if created && post.author_id != identity.user_id {
        let notified = state
            .notifier
            .notify(
                post.author_id,
                NotificationKind::Like,
                "New like",
                format!("{} liked \"{}\"", identity.display_name, post.title),
                Some(post_link(post.id)),
            )
            .await;
        if let Err(e) = notified {
            tracing::warn!(error = %e, post_id = %post.id, "Like notification failed");
        }
    }

    Ok(HttpResponse::Ok().json(ApiResponse::ok(LikeResponse {
        liked: true,
        like_count: state.likes.count(post.id).await?,
    })))
}

/// DELETE /api/posts/{id}/like
pub async fn unlike(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .authorizer
        .require(&identity, Resource::Post, Action::Read)
        .await?;
    let post = load_post(&state, path.into_inner()).await?;

    state.likes.unlike(post.id, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(LikeResponse {
        liked: false,
        like_count: state.likes.count(post.id).await?,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{self, bearer, test_app};
    use actix_web::test;
    use fellowship_core::domain::Role;
    use fellowship_core::ports::NotificationRepository;
    use serde_json::{Value, json};

    fn create_req(token: &str, category: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(bearer(token))
            .set_json(json!({
                "category": category,
                "title": "Sunday lunch",
                "content": "Who is bringing kimchi?"
            }))
    }

    #[actix_web::test]
    async fn test_create_and_list() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, token) = testing::user(&state, "Ana", Role::Member).await;

        let res = test::call_service(&app, create_req(&token, "free").to_request()).await;
        assert_eq!(res.status(), 201);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["author_name"], "Ana");

        let res = test::call_service(&app, create_req(&token, "gossip").to_request()).await;
        assert_eq!(res.status(), 400);

        let req = test::TestRequest::get()
            .uri("/api/posts?category=free&limit=5")
            .insert_header(bearer(&token))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["has_more"], false);
    }

    #[actix_web::test]
    async fn test_notice_needs_moderator() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, member) = testing::user(&state, "Ana", Role::Member).await;
        let (_, leader) = testing::user(&state, "Lee", Role::Leader).await;

        let res = test::call_service(&app, create_req(&member, "notice").to_request()).await;
        assert_eq!(res.status(), 403);
        let res = test::call_service(&app, create_req(&leader, "notice").to_request()).await;
        assert_eq!(res.status(), 201);
    }

    #[actix_web::test]
    async fn test_views_are_counted_once_per_viewer() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, ana) = testing::user(&state, "Ana", Role::Member).await;
        let (_, ben) = testing::user(&state, "Ben", Role::Member).await;

        let created: Value =
            test::call_and_read_body_json(&app, create_req(&ana, "free").to_request()).await;
        let uri = format!("/api/posts/{}", created["data"]["id"].as_str().unwrap());

        for token in [&ana, &ana, &ben, &ana] {
            let req = test::TestRequest::get()
                .uri(&uri)
                .insert_header(bearer(token))
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), 200);
        }

        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header(bearer(&ben))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["view_count"], 2);
    }

    #[actix_web::test]
    async fn test_partial_update_and_ownership() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, ana) = testing::user(&state, "Ana", Role::Member).await;
        let (_, ben) = testing::user(&state, "Ben", Role::Member).await;
        let (_, lee) = testing::user(&state, "Lee", Role::Leader).await;

        let created: Value =
            test::call_and_read_body_json(&app, create_req(&ana, "free").to_request()).await;
        let uri = format!("/api/posts/{}", created["data"]["id"].as_str().unwrap());

        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&ana))
            .set_json(json!({ "title": "Sunday dinner" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["title"], "Sunday dinner");
        assert_eq!(body["data"]["content"], "Who is bringing kimchi?");

        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&ana))
            .set_json(json!({ "category": "notice" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&ben))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        let req = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&lee))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header(bearer(&ana))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn test_delete_removes_comments_and_likes() {
        let state = testing::state();
        let app = test_app!(state);
        let (_, ana) = testing::user(&state, "Ana", Role::Member).await;
        let (_, ben) = testing::user(&state, "Ben", Role::Member).await;

        let created: Value =
            test::call_and_read_body_json(&app, create_req(&ana, "free").to_request()).await;
        let id: Uuid = created["data"]["id"].as_str().unwrap().parse().unwrap();
        let uri = format!("/api/posts/{id}");

        let req = test::TestRequest::post()
            .uri(&format!("{uri}/comments"))
            .insert_header(bearer(&ben))
            .set_json(json!({ "content": "I will!" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
        let req = test::TestRequest::post()
            .uri(&format!("{uri}/like"))
            .insert_header(bearer(&ben))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&ana))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        assert_eq!(state.comments.count_by_post(id).await.unwrap(), 0);
        assert_eq!(state.likes.count(id).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn test_like_toggles_and_notifies_author() {
        let state = testing::state();
        let app = test_app!(state);
        let (author, ana) = testing::user(&state, "Ana", Role::Member).await;
        let (_, ben) = testing::user(&state, "Ben", Role::Member).await;

        let created: Value =
            test::call_and_read_body_json(&app, create_req(&ana, "prayer").to_request()).await;
        let uri = format!("/api/posts/{}/like", created["data"]["id"].as_str().unwrap());

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri(&uri)
                .insert_header(bearer(&ben))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["data"]["like_count"], 1);
        }
        assert_eq!(state.notifications.unread_count(author.id).await.unwrap(), 1);

        let req = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&ben))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["liked"], false);
        assert_eq!(body["data"]["like_count"], 0);
    }
}
