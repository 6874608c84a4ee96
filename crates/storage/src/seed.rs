//! Demo forum content so a fresh backend has something to page through.

use chrono::{DateTime, Duration, Utc};
use domain::{Author, Comment, CoreError, CourseReview, Post, ReviewReply};
use tracing::info;

use crate::{
    ids,
    traits::{CommentRepository, PostQuery, PostRepository, ReviewRepository},
};

const DEMO_POSTS: i64 = 100;
const DEMO_COMMENTS: i64 = 30;

fn demo_author() -> Author {
    Author::new("demo", "Demo User")
}

pub fn demo_posts(base_time: DateTime<Utc>) -> Vec<Post> {
    (1..=DEMO_POSTS)
        .map(|i| {
            let tags = if i % 2 == 0 {
                ["General", "Study"]
            } else {
                ["Project", "Help"]
            };
            let language = match i % 3 {
                0 => "English (Hong Kong)",
                1 => "简体中文（普通话）",
                _ => "繁体中文（粵語）",
            };
            Post {
                id: ids::generate(),
                title: Some(format!("Demo Post {}: Welcome to the forum", i)),
                content: format!("<p>This is demo post #{} coming from backend seed.</p>", i),
                author: demo_author(),
                created_at: base_time - Duration::hours(i),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                likes: ((i * 2) % 37) as u32,
                is_liked: Some(false),
                comments_count: 0,
                language: language.to_string(),
            }
        })
        .collect()
}

pub fn demo_comments(post_id: &str, base_time: DateTime<Utc>) -> Vec<Comment> {
    (1..=DEMO_COMMENTS)
        .map(|j| Comment {
            id: ids::generate(),
            content: format!("This is backend-seeded main comment #{} for demo.", j),
            author: demo_author(),
            created_at: base_time - Duration::minutes(j),
            likes: ((j * 7) % 29) as u32,
            is_liked: Some(false),
            parent_id: None,
            post_id: post_id.to_string(),
            is_deleted: false,
            reply_to_user: None,
        })
        .collect()
}

const DEMO_SUBJECTS: [(&str, f32); 3] = [("COMP1011", 8.5), ("COMP1011", 6.0), ("COMP2012", 7.5)];

pub fn demo_reviews(base_time: DateTime<Utc>) -> (Vec<CourseReview>, Vec<ReviewReply>) {
    let reviews: Vec<CourseReview> = DEMO_SUBJECTS
        .iter()
        .enumerate()
        .map(|(i, (subject, rating))| CourseReview {
            id: ids::generate(),
            subject_id: subject.to_string(),
            author: Author::new(format!("reviewer-{}", i + 1), format!("Reviewer {}", i + 1)),
            overall_rating: *rating,
            content: format!("<p>Backend-seeded review #{} of {}.</p>", i + 1, subject),
            likes: (i * 3) as u32,
            created_at: base_time - Duration::days(i as i64),
            is_liked: Some(false),
            replies_count: 0,
        })
        .collect();

    // 第一条评价带两条回复，第二条回复指向第一条的作者
    let first = &reviews[0];
    let replies = (1..=2)
        .map(|k| ReviewReply {
            id: ids::generate(),
            review_id: first.id.clone(),
            author: demo_author(),
            content: format!("<p>Demo reply #{} to the review.</p>", k),
            created_at: first.created_at + Duration::hours(k),
            likes: 0,
            is_liked: Some(false),
            reply_to_user: (k == 2).then(|| first.author.clone()),
        })
        .collect();

    (reviews, replies)
}

/// Returns `false` without touching anything when reviews already exist.
pub async fn seed_demo_reviews(reviews: &dyn ReviewRepository) -> Result<bool, CoreError> {
    let existing = reviews.list_reviews(None).await?.len();
    if existing > 0 {
        info!("Skipping review seed, {} reviews already present", existing);
        return Ok(false);
    }

    let (demo, replies) = demo_reviews(Utc::now());
    let count = demo.len();
    reviews.import_reviews(demo, replies).await?;

    info!("Seeded {} demo reviews", count);
    Ok(true)
}

/// Returns `false` without touching anything when posts already exist.
pub async fn seed_demo_data(
    posts: &dyn PostRepository,
    comments: &dyn CommentRepository,
) -> Result<bool, CoreError> {
    let (_, existing) = posts.list_posts(&PostQuery::page(1, 1)).await?;
    if existing > 0 {
        info!("Skipping demo seed, {} posts already present", existing);
        return Ok(false);
    }

    let base_time = Utc::now();
    let demo = demo_posts(base_time);
    // 最新的一篇带评论，用于演示分页
    let newest_id = demo[0].id.clone();

    posts.import_posts(demo).await?;
    comments
        .import_comments(demo_comments(&newest_id, base_time))
        .await?;

    info!("Seeded {} demo posts", DEMO_POSTS);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommentFilter, MemoryForum};

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let forum = MemoryForum::new();
        assert!(seed_demo_data(&forum, &forum).await.unwrap());
        assert!(!seed_demo_data(&forum, &forum).await.unwrap());

        let (page, total) = forum.list_posts(&PostQuery::page(1, 10)).await.unwrap();
        assert_eq!(total, DEMO_POSTS as u64);
        assert_eq!(page[0].comments_count, DEMO_COMMENTS as u32);

        let comments = forum
            .list_comments(&CommentFilter::for_post(&page[0].id))
            .await
            .unwrap();
        assert!(comments.iter().all(|c| c.parent_id.is_none()));
        assert!(comments.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn review_seed_is_idempotent() {
        let forum = MemoryForum::new();
        assert!(seed_demo_reviews(&forum).await.unwrap());
        assert!(!seed_demo_reviews(&forum).await.unwrap());

        let reviews = forum.list_reviews(Some("COMP1011")).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].replies_count, 2);

        let replies = forum.list_replies(Some(&reviews[0].id)).await.unwrap();
        assert_eq!(replies[1].reply_to_user.as_ref(), Some(&reviews[0].author));
    }
}
