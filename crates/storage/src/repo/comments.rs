use async_trait::async_trait;
use chrono::Utc;
use domain::{Comment, CoreError, EntityKind, NewComment};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::{debug, info};

use super::posts::db_err;
use crate::{
    comment_store::CommentStore,
    ids,
    models::SqlComment,
    traits::{CommentFilter, CommentRepository},
    Db,
};

const COMMENT_COLUMNS: &str = r#"
    id, post_id, parent_id, content,
    author_id, author_name, author_avatar,
    reply_to_id, reply_to_name, reply_to_avatar,
    created_at, likes, is_liked, is_deleted
"#;

impl Db {
    async fn fetch_comment(
        conn: &mut SqliteConnection,
        comment_id: &str,
    ) -> Result<Option<Comment>, CoreError> {
        let row = sqlx::query_as::<_, SqlComment>(&format!(
            "SELECT {} FROM comments WHERE id = ?",
            COMMENT_COLUMNS
        ))
        .bind(comment_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn insert_comment(conn: &mut SqliteConnection, c: &Comment) -> Result<(), CoreError> {
        let reply_to = c.reply_to_user.as_ref();
        sqlx::query(
            r#"
            INSERT INTO comments (
                id, post_id, parent_id, content,
                author_id, author_name, author_avatar,
                reply_to_id, reply_to_name, reply_to_avatar,
                created_at, likes, is_liked, is_deleted
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&c.id)
        .bind(&c.post_id)
        .bind(&c.parent_id)
        .bind(&c.content)
        .bind(&c.author.id)
        .bind(&c.author.name)
        .bind(&c.author.avatar)
        .bind(reply_to.map(|a| a.id.clone()))
        .bind(reply_to.map(|a| a.name.clone()))
        .bind(reply_to.and_then(|a| a.avatar.clone()))
        .bind(c.created_at)
        .bind(i64::from(c.likes))
        .bind(c.is_liked.unwrap_or(false))
        .bind(c.is_deleted)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CommentRepository for Db {
    async fn list_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>, CoreError> {
        let rows = sqlx::query_as::<_, SqlComment>(&format!(
            r#"
            SELECT {} FROM comments
            WHERE (?1 IS NULL OR post_id = ?1)
              AND (?2 IS NULL OR parent_id = ?2)
            ORDER BY created_at ASC
            "#,
            COMMENT_COLUMNS
        ))
        .bind(&filter.post_id)
        .bind(&filter.parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_comment(&self, draft: NewComment) -> Result<Comment, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let post_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM posts WHERE id = ?")
            .bind(&draft.post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if post_exists.is_none() {
            return Err(CoreError::not_found(EntityKind::Post, draft.post_id));
        }

        let mut comment = draft.into_comment(ids::generate(), Utc::now());

        // 回复子评论时归并到其主评论下
        if let Some(target_id) = comment.parent_id.take() {
            let target = Self::fetch_comment(&mut *tx, &target_id)
                .await?
                .filter(|t| t.post_id == comment.post_id)
                .ok_or_else(|| CoreError::not_found(EntityKind::Comment, &target_id))?;

            if comment.reply_to_user.is_none() {
                comment.reply_to_user = Some(target.author.clone());
            }
            comment.parent_id = Some(target.parent_id.unwrap_or(target.id));
        }

        Self::insert_comment(&mut *tx, &comment).await?;
        tx.commit().await.map_err(db_err)?;

        info!("Comment created: {} on post {}", comment.id, comment.post_id);
        Ok(comment)
    }

    async fn toggle_comment_like(&self, comment_id: &str) -> Result<Comment, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE comments
            SET likes = CASE WHEN is_liked THEN MAX(likes - 1, 0) ELSE likes + 1 END,
                is_liked = NOT is_liked
            WHERE id = ? AND is_deleted = FALSE
            "#,
        )
        .bind(comment_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(EntityKind::Comment, comment_id));
        }

        let comment = Self::fetch_comment(&mut *tx, comment_id)
            .await?
            .ok_or_else(|| CoreError::not_found(EntityKind::Comment, comment_id))?;

        tx.commit().await.map_err(db_err)?;
        Ok(comment)
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<bool, CoreError> {
        // 软删除：保留 ID 以维持评论树结构，但清空内容
        let result = sqlx::query(
            r#"
            UPDATE comments
            SET content = '', is_deleted = TRUE
            WHERE id = ? AND is_deleted = FALSE
            "#,
        )
        .bind(comment_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let deleted = result.rows_affected() > 0;
        if !deleted {
            debug!("Delete ignored for comment {}", comment_id);
        }
        Ok(deleted)
    }

    async fn import_comments(&self, comments: Vec<Comment>) -> Result<(), CoreError> {
        // 批内的回复链先折叠到主评论
        let mut comments = CommentStore::load(comments).all().to_vec();
        let batch: HashSet<String> = comments.iter().map(|c| c.id.clone()).collect();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 指向库内子评论的回复再归并一次
        for c in comments.iter_mut() {
            let Some(parent_id) = c.parent_id.clone() else {
                continue;
            };
            if batch.contains(&parent_id) {
                continue;
            }
            if let Some(root) = Self::fetch_comment(&mut *tx, &parent_id)
                .await?
                .and_then(|stored| stored.parent_id)
            {
                c.parent_id = Some(root);
            }
        }

        // 主评论先入库，满足外键约束
        comments.sort_by_key(|c| c.parent_id.is_some());
        for c in &comments {
            Self::insert_comment(&mut *tx, c).await?;
        }
        tx.commit().await.map_err(db_err)?;
        info!("Imported {} comments", comments.len());
        Ok(())
    }
}
