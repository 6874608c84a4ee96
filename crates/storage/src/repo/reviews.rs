use async_trait::async_trait;
use chrono::Utc;
use domain::{CoreError, CourseReview, EntityKind, NewReviewReply, ReviewReply};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::posts::db_err;
use crate::{
    ids,
    models::{SqlReview, SqlReviewReply},
    traits::ReviewRepository,
    Db,
};

const REVIEW_COLUMNS: &str = r#"
    r.id, r.subject_id,
    r.author_id, r.author_name, r.author_avatar,
    r.overall_rating, r.content, r.created_at,
    r.likes, r.is_liked,
    (SELECT COUNT(*) FROM review_replies rr WHERE rr.review_id = r.id) AS replies_count
"#;

const REPLY_COLUMNS: &str = r#"
    id, review_id, content,
    author_id, author_name, author_avatar,
    reply_to_id, reply_to_name, reply_to_avatar,
    created_at, likes, is_liked
"#;

impl Db {
    async fn review_exists(conn: &mut SqliteConnection, review_id: &str) -> Result<bool, CoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM course_reviews WHERE id = ?")
            .bind(review_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn insert_review(conn: &mut SqliteConnection, r: &CourseReview) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO course_reviews (
                id, subject_id,
                author_id, author_name, author_avatar,
                overall_rating, content, created_at, likes, is_liked
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&r.id)
        .bind(&r.subject_id)
        .bind(&r.author.id)
        .bind(&r.author.name)
        .bind(&r.author.avatar)
        .bind(f64::from(r.overall_rating))
        .bind(&r.content)
        .bind(r.created_at)
        .bind(i64::from(r.likes))
        .bind(r.is_liked.unwrap_or(false))
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_reply(conn: &mut SqliteConnection, r: &ReviewReply) -> Result<(), CoreError> {
        let reply_to = r.reply_to_user.as_ref();
        sqlx::query(
            r#"
            INSERT INTO review_replies (
                id, review_id, content,
                author_id, author_name, author_avatar,
                reply_to_id, reply_to_name, reply_to_avatar,
                created_at, likes, is_liked
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&r.id)
        .bind(&r.review_id)
        .bind(&r.content)
        .bind(&r.author.id)
        .bind(&r.author.name)
        .bind(&r.author.avatar)
        .bind(reply_to.map(|a| a.id.clone()))
        .bind(reply_to.map(|a| a.name.clone()))
        .bind(reply_to.and_then(|a| a.avatar.clone()))
        .bind(r.created_at)
        .bind(i64::from(r.likes))
        .bind(r.is_liked.unwrap_or(false))
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for Db {
    async fn list_reviews(
        &self,
        subject_id: Option<&str>,
    ) -> Result<Vec<CourseReview>, CoreError> {
        let rows = sqlx::query_as::<_, SqlReview>(&format!(
            "SELECT {} FROM course_reviews r WHERE ?1 IS NULL OR r.subject_id = ?1 ORDER BY r.created_at DESC",
            REVIEW_COLUMNS
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_replies(&self, review_id: Option<&str>) -> Result<Vec<ReviewReply>, CoreError> {
        let rows = sqlx::query_as::<_, SqlReviewReply>(&format!(
            "SELECT {} FROM review_replies WHERE ?1 IS NULL OR review_id = ?1 ORDER BY created_at ASC",
            REPLY_COLUMNS
        ))
        .bind(review_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_reply(&self, draft: NewReviewReply) -> Result<ReviewReply, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if !Self::review_exists(&mut *tx, &draft.review_id).await? {
            return Err(CoreError::not_found(EntityKind::Review, draft.review_id));
        }

        let reply = draft.into_reply(ids::generate(), Utc::now());
        Self::insert_reply(&mut *tx, &reply).await?;
        tx.commit().await.map_err(db_err)?;

        info!("Reply created: {} on review {}", reply.id, reply.review_id);
        Ok(reply)
    }

    async fn toggle_review_like(&self, review_id: &str) -> Result<CourseReview, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE course_reviews
            SET likes = CASE WHEN is_liked THEN MAX(likes - 1, 0) ELSE likes + 1 END,
                is_liked = NOT is_liked
            WHERE id = ?
            "#,
        )
        .bind(review_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(EntityKind::Review, review_id));
        }

        let row = sqlx::query_as::<_, SqlReview>(&format!(
            "SELECT {} FROM course_reviews r WHERE r.id = ?",
            REVIEW_COLUMNS
        ))
        .bind(review_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(row.into())
    }

    async fn toggle_reply_like(&self, reply_id: &str) -> Result<ReviewReply, CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"
            UPDATE review_replies
            SET likes = CASE WHEN is_liked THEN MAX(likes - 1, 0) ELSE likes + 1 END,
                is_liked = NOT is_liked
            WHERE id = ?
            "#,
        )
        .bind(reply_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(EntityKind::Reply, reply_id));
        }

        let row = sqlx::query_as::<_, SqlReviewReply>(&format!(
            "SELECT {} FROM review_replies WHERE id = ?",
            REPLY_COLUMNS
        ))
        .bind(reply_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(row.into())
    }

    async fn import_reviews(
        &self,
        reviews: Vec<CourseReview>,
        replies: Vec<ReviewReply>,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for review in &reviews {
            Self::insert_review(&mut *tx, review).await?;
        }
        for reply in &replies {
            if !Self::review_exists(&mut *tx, &reply.review_id).await? {
                debug!("Skipping reply {} to unknown review {}", reply.id, reply.review_id);
                continue;
            }
            Self::insert_reply(&mut *tx, reply).await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
