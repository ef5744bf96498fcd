//! Post operations, always scoped to the calling user.

use blog_core::AppResult;
use blog_proto::v1::{
    CreatePostRequest, CreatePostResponse, DeletePostRequest, DeletePostResponse, GetPostRequest,
    GetPostResponse, ListPostRequest, ListPostResponse, Post as PostReply, UpdatePostRequest,
    UpdatePostResponse,
};
use blog_store::{Page, Post, PostFilter, Store, UpdatePostParams};
use tracing::info;

use super::timestamp;
use crate::context::RequestContext;

fn reply(post: Post) -> PostReply {
    PostReply {
        post_id: post.post_id,
        user_id: post.user_id,
        title: post.title,
        content: post.content,
        created_at: timestamp(post.created_at),
        updated_at: timestamp(post.updated_at),
    }
}

#[derive(Debug, Clone)]
pub struct PostBiz {
    store: Store,
}

impl PostBiz {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, ctx: &RequestContext, req: CreatePostRequest) -> AppResult<CreatePostResponse> {
        let owner = ctx.require_principal()?;
        let post = self
            .store
            .posts
            .create_post(owner.as_str(), &req.title, &req.content)
            .await?;

        info!(post_id = %post.post_id, "Post created");
        Ok(CreatePostResponse {
            post_id: post.post_id,
        })
    }

    pub async fn update(&self, ctx: &RequestContext, req: UpdatePostRequest) -> AppResult<UpdatePostResponse> {
        let owner = ctx.require_principal()?;
        self.store
            .posts
            .update_post(
                &req.post_id,
                owned_by(owner.as_str()),
                UpdatePostParams {
                    title: req.title.as_deref(),
                    content: req.content.as_deref(),
                },
            )
            .await?;
        Ok(UpdatePostResponse {})
    }

    /// Delete the caller's posts among `post_ids`; other ids are ignored.
    pub async fn delete(&self, ctx: &RequestContext, req: DeletePostRequest) -> AppResult<DeletePostResponse> {
        let owner = ctx.require_principal()?;
        let removed = self
            .store
            .posts
            .delete_posts(&req.post_ids, owned_by(owner.as_str()))
            .await?;

        info!(removed, requested = req.post_ids.len(), "Posts deleted");
        Ok(DeletePostResponse {})
    }

    pub async fn get(&self, ctx: &RequestContext, req: GetPostRequest) -> AppResult<GetPostResponse> {
        let owner = ctx.require_principal()?;
        let post = self
            .store
            .posts
            .get_post(&req.post_id, owned_by(owner.as_str()))
            .await?;
        Ok(GetPostResponse {
            post: Some(reply(post)),
        })
    }

    pub async fn list(&self, ctx: &RequestContext, req: ListPostRequest) -> AppResult<ListPostResponse> {
        let owner = ctx.require_principal()?;
        let filter = PostFilter {
            owner: Some(owner.as_str()),
            title: req.title.as_deref().filter(|t| !t.is_empty()),
        };
        let (total_count, posts) = self
            .store
            .posts
            .list_posts(Page::new(req.offset, req.limit), filter)
            .await?;

        Ok(ListPostResponse {
            total_count,
            posts: posts.into_iter().map(reply).collect(),
        })
    }
}

fn owned_by(owner: &str) -> PostFilter<'_> {
    PostFilter {
        owner: Some(owner),
        title: None,
    }
}

#[cfg(test)]
mod tests {
    use blog_core::AppError;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::context::{Principal, RequestMetadata, TransportKind};
    use crate::middleware::RequestId;

    fn ctx(user_id: &str) -> RequestContext {
        RequestContext::new(
            RequestMetadata::new(RequestId::new(), TransportKind::Rpc),
            CancellationToken::new(),
        )
        .with_principal(Principal::new(user_id))
    }

    async fn create(biz: &PostBiz, user_id: &str, title: &str) -> String {
        biz.create(
            &ctx(user_id),
            CreatePostRequest {
                title: title.into(),
                content: "body".into(),
            },
        )
        .await
        .unwrap()
        .post_id
    }

    #[tokio::test]
    async fn posts_are_private_to_their_owner() {
        let biz = PostBiz::new(Store::new());
        let post_id = create(&biz, "user-a", "hello").await;

        let own = biz
            .get(&ctx("user-a"), GetPostRequest { post_id: post_id.clone() })
            .await
            .unwrap();
        assert_eq!(own.post.unwrap().title, "hello");

        let other = biz
            .get(&ctx("user-b"), GetPostRequest { post_id: post_id.clone() })
            .await;
        assert!(matches!(other, Err(AppError::NotFound(_))));

        let update = biz
            .update(
                &ctx("user-b"),
                UpdatePostRequest {
                    post_id,
                    title: Some("hijacked".into()),
                    content: None,
                },
            )
            .await;
        assert!(matches!(update, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_ignores_foreign_posts() {
        let biz = PostBiz::new(Store::new());
        let mine = create(&biz, "user-a", "mine").await;
        let theirs = create(&biz, "user-b", "theirs").await;

        biz.delete(
            &ctx("user-a"),
            DeletePostRequest {
                post_ids: vec![mine.clone(), theirs.clone()],
            },
        )
        .await
        .unwrap();

        assert!(biz.get(&ctx("user-a"), GetPostRequest { post_id: mine }).await.is_err());
        assert!(biz.get(&ctx("user-b"), GetPostRequest { post_id: theirs }).await.is_ok());
    }

    #[tokio::test]
    async fn list_filters_by_title_and_pages() {
        let biz = PostBiz::new(Store::new());
        for title in ["rust tips", "go tips", "rust news"] {
            create(&biz, "user-a", title).await;
        }
        create(&biz, "user-b", "rust elsewhere").await;

        let listed = biz
            .list(
                &ctx("user-a"),
                ListPostRequest {
                    offset: 0,
                    limit: 1,
                    title: Some("rust".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.total_count, 2);
        assert_eq!(listed.posts.len(), 1);
        assert_eq!(listed.posts[0].title, "rust tips");
    }
}
