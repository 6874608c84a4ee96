use async_trait::async_trait;
use chrono::Utc;
use domain::{CoreError, EntityKind, NewPost, Post};
use tracing::info;

use crate::{
    ids,
    models::SqlPost,
    traits::{PostQuery, PostRepository},
    Db,
};

const POST_COLUMNS: &str = r#"
    p.id, p.title, p.content,
    p.author_id, p.author_name, p.author_avatar,
    p.created_at, p.tags, p.language,
    p.likes, p.is_liked,
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count
"#;

// ?1 为空表示不过滤；标签逐个比较，不匹配 JSON 的引号和逗号
const SEARCH_CLAUSE: &str = r#"
    ?1 IS NULL
    OR lower(coalesce(p.title, '')) LIKE ?1 ESCAPE '\'
    OR lower(p.content) LIKE ?1 ESCAPE '\'
    OR EXISTS (
        SELECT 1 FROM json_each(p.tags) t WHERE lower(t.value) LIKE ?1 ESCAPE '\'
    )
"#;

/// `%term%` with the LIKE wildcards in `term` taken literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

impl Db {
    async fn fetch_post(&self, post_id: &str) -> Result<Option<Post>, CoreError> {
        let row = sqlx::query_as::<_, SqlPost>(&format!(
            "SELECT {} FROM posts p WHERE p.id = ?",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn insert_post(&self, post: &Post) -> Result<(), CoreError> {
        let tags = serde_json::to_string(&post.tags).map_err(|e| CoreError::Storage(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, title, content,
                author_id, author_name, author_avatar,
                created_at, tags, language, likes, is_liked
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.author.id)
        .bind(&post.author.name)
        .bind(&post.author.avatar)
        .bind(post.created_at)
        .bind(tags)
        .bind(&post.language)
        .bind(i64::from(post.likes))
        .bind(post.is_liked.unwrap_or(false))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl PostRepository for Db {
    async fn list_posts(&self, query: &PostQuery) -> Result<(Vec<Post>, u64), CoreError> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, SqlPost>(&format!(
            "SELECT {} FROM posts p WHERE {} ORDER BY p.created_at DESC LIMIT ?2 OFFSET ?3",
            POST_COLUMNS, SEARCH_CLAUSE
        ))
        .bind(&pattern)
        .bind(i64::from(query.page.page_size))
        .bind(query.page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM posts p WHERE {}",
            SEARCH_CLAUSE
        ))
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let posts = rows.into_iter().map(Into::into).collect();
        Ok((posts, count.max(0) as u64))
    }

    async fn get_post(&self, post_id: &str) -> Result<Post, CoreError> {
        self.fetch_post(post_id)
            .await?
            .ok_or_else(|| CoreError::not_found(EntityKind::Post, post_id))
    }

    async fn create_post(&self, draft: NewPost) -> Result<Post, CoreError> {
        let post = draft.into_post(ids::generate(), Utc::now());
        self.insert_post(&post).await?;
        info!("Post created: {}", post.id);
        Ok(post)
    }

    async fn toggle_post_like(&self, post_id: &str) -> Result<Post, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 先写后读：写锁在第一条语句拿到，并发切换按顺序排队
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET likes = CASE WHEN is_liked THEN MAX(likes - 1, 0) ELSE likes + 1 END,
                is_liked = NOT is_liked
            WHERE id = ?
            "#,
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(EntityKind::Post, post_id));
        }

        let row = sqlx::query_as::<_, SqlPost>(&format!(
            "SELECT {} FROM posts p WHERE p.id = ?",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(row.into())
    }

    async fn import_posts(&self, posts: Vec<Post>) -> Result<(), CoreError> {
        for post in &posts {
            self.insert_post(post).await?;
        }
        Ok(())
    }
}

pub(crate) fn db_err(e: sqlx::Error) -> CoreError {
    tracing::error!("Database error: {}", e);
    CoreError::Storage(e.to_string())
}
