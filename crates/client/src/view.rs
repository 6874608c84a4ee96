use chrono::{DateTime, Utc};
use domain::{reducer, Comment, CoreError, NewComment, Post};
use storage::{CommentFilter, CommentRepository, CommentStore, PostRepository};
use tracing::debug;

use crate::thread::{
    assemble, sort_main_comments, ListMode, Replies, ReplyVisibility, ThreadSettings, ThreadState,
    ThreadView,
};

#[derive(Debug, Clone)]
pub struct PostDetailView {
    post: Post,
    comments: CommentStore,
    thread: ThreadState,
}

impl PostDetailView {
    pub fn new(post: Post, comments: Vec<Comment>, settings: ThreadSettings) -> Self {
        let comments = comments
            .into_iter()
            .filter(|c| c.post_id == post.id)
            .collect();
        Self {
            post,
            comments: CommentStore::load(comments),
            thread: ThreadState::new(settings),
        }
    }

    pub async fn load(
        posts: &dyn PostRepository,
        comments: &dyn CommentRepository,
        post_id: &str,
        settings: ThreadSettings,
    ) -> Result<Self, CoreError> {
        let post = posts.get_post(post_id).await?;
        let comments = comments
            .list_comments(&CommentFilter::for_post(post_id))
            .await?;
        debug!("Loaded post {} with {} comments", post_id, comments.len());
        Ok(Self::new(post, comments, settings))
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn comments(&self) -> &[Comment] {
        self.comments.all()
    }

    pub fn view(&self) -> ThreadView {
        assemble(self.comments.all(), &self.thread)
    }

    pub fn list_main_comments(&self) -> Vec<Comment> {
        let separated = self.comments.separated_for_post(&self.post.id);
        sort_main_comments(separated.main_comments)
    }

    pub fn list_replies_for(&self, main_comment_id: &str) -> Replies {
        let separated = self.comments.separated_for_post(&self.post.id);
        let children = storage::children_of_main(main_comment_id, &separated.sub_comments);
        if children.is_empty() {
            return Replies::None;
        }
        match self.thread.visibility(main_comment_id) {
            ReplyVisibility::Collapsed => Replies::Collapsed {
                count: children.len(),
            },
            ReplyVisibility::Expanded => Replies::Expanded(children),
        }
    }

    pub fn total_comment_count(&self) -> usize {
        self.comments.separated_for_post(&self.post.id).total()
    }

    /// `None` for unknown or deleted comments.
    pub fn toggle_like(&mut self, comment_id: &str) -> Option<Comment> {
        match self.comments.toggle_like(comment_id) {
            Ok(comment) => Some(comment),
            Err(e) => {
                debug!("Like ignored: {}", e);
                None
            }
        }
    }

    pub fn delete(&mut self, comment_id: &str) -> bool {
        self.comments.delete(comment_id)
    }

    /// Local reply. The post's counter only moves when the store accepts it.
    pub fn reply(
        &mut self,
        mut draft: NewComment,
        id: String,
        created_at: DateTime<Utc>,
    ) -> Result<Comment, CoreError> {
        draft.post_id = self.post.id.clone();
        let comment = self.comments.add(draft.into_comment(id, created_at))?;
        reducer::apply_reply_delta(&mut self.post, 1);
        Ok(comment)
    }

    pub fn toggle_post_like(&mut self) -> &Post {
        reducer::apply_toggle_like(&mut self.post);
        &self.post
    }

    pub fn reconcile_comment(&mut self, server: Comment) -> bool {
        self.comments.reconcile(server)
    }

    pub fn reconcile_post(&mut self, server: Post) -> bool {
        if server.id != self.post.id {
            return false;
        }
        self.post = server;
        true
    }

    pub fn toggle_replies(&mut self, main_comment_id: &str) -> ReplyVisibility {
        self.thread.toggle_replies(main_comment_id)
    }

    pub fn toggle_show_all(&mut self) -> ListMode {
        self.thread.toggle_show_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use domain::{Author, EntityKind, NewPost};
    use storage::MemoryForum;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn post() -> Post {
        Post {
            id: "p1".into(),
            title: Some("Exam tips".into()),
            content: "<p>share yours</p>".into(),
            author: Author::new("u1", "Alex"),
            created_at: at(0),
            tags: ["Study".to_string()].into_iter().collect(),
            likes: 0,
            is_liked: None,
            comments_count: 3,
            language: "English".into(),
        }
    }

    fn comment(id: &str, parent: Option<&str>, likes: u32, minutes: i64) -> Comment {
        Comment {
            id: id.into(),
            content: format!("<p>{}</p>", id),
            author: Author::new(format!("a-{}", id), id.to_uppercase()),
            created_at: at(minutes),
            likes,
            is_liked: None,
            parent_id: parent.map(Into::into),
            post_id: "p1".into(),
            is_deleted: false,
            reply_to_user: None,
        }
    }

    fn view() -> PostDetailView {
        let mut elsewhere = comment("elsewhere", None, 0, 4);
        elsewhere.post_id = "p2".into();
        PostDetailView::new(
            post(),
            vec![
                comment("m1", None, 1, 1),
                comment("s2", Some("m1"), 0, 3),
                comment("s1", Some("m1"), 0, 2),
                elsewhere,
            ],
            ThreadSettings::default(),
        )
    }

    #[test]
    fn replies_are_gated_by_expand_state() {
        let mut view = view();
        assert_eq!(view.total_comment_count(), 3);
        assert_eq!(view.list_replies_for("m1"), Replies::Collapsed { count: 2 });

        view.toggle_replies("m1");
        match view.list_replies_for("m1") {
            Replies::Expanded(replies) => {
                let ids: Vec<_> = replies.iter().map(|c| c.id.as_str()).collect();
                assert_eq!(ids, ["s1", "s2"]);
            }
            other => panic!("expected expanded replies, got {:?}", other),
        }
        assert_eq!(view.list_replies_for("nobody"), Replies::None);
    }

    #[test]
    fn reply_to_sub_comment_lands_under_its_main() {
        let mut view = view();
        let draft = NewComment {
            post_id: String::new(),
            content: "<p>agreed</p>".into(),
            author: Author::new("u9", "Sam"),
            parent_id: Some("s1".into()),
            reply_to_user: None,
        };

        let reply = view.reply(draft, "r1".into(), at(10)).unwrap();
        assert_eq!(reply.parent_id.as_deref(), Some("m1"));
        assert_eq!(reply.post_id, "p1");
        assert_eq!(reply.reply_to_user.map(|a| a.name), Some("S1".to_string()));
        assert_eq!(view.post().comments_count, 4);
        assert_eq!(view.total_comment_count(), 4);
    }

    #[test]
    fn reply_to_unknown_comment_leaves_counters_alone() {
        let mut view = view();
        let draft = NewComment {
            post_id: "p1".into(),
            content: "x".into(),
            author: Author::new("u9", "Sam"),
            parent_id: Some("ghost".into()),
            reply_to_user: None,
        };
        assert!(view.reply(draft, "r1".into(), at(10)).unwrap_err().is_not_found());
        assert_eq!(view.post().comments_count, 3);
    }

    #[test]
    fn reply_reusing_an_id_leaves_counters_alone() {
        let mut view = view();
        let draft = NewComment {
            post_id: "p1".into(),
            content: "<p>again</p>".into(),
            author: Author::new("u9", "Sam"),
            parent_id: None,
            reply_to_user: None,
        };

        let err = view.reply(draft, "m1".into(), at(10)).unwrap_err();
        assert_eq!(err, CoreError::already_exists(EntityKind::Comment, "m1"));
        assert_eq!(view.post().comments_count, 3);
        assert_eq!(view.total_comment_count(), 3);
    }

    #[test]
    fn likes_deletes_and_reconcile() {
        let mut view = view();
        assert_eq!(view.toggle_like("m1").map(|c| c.likes), Some(2));
        assert_eq!(view.toggle_like("ghost"), None);

        assert!(view.delete("s1"));
        assert!(!view.delete("s1"));
        assert_eq!(view.toggle_like("s1"), None);
        assert_eq!(view.total_comment_count(), 3);

        let mut server = comment("m1", None, 40, 1);
        server.is_liked = Some(true);
        assert!(view.reconcile_comment(server));
        assert_eq!(view.list_main_comments()[0].likes, 40);

        let liked = view.toggle_post_like().clone();
        assert_eq!((liked.likes, liked.is_liked), (1, Some(true)));
        let mut other = post();
        other.id = "p2".into();
        assert!(!view.reconcile_post(other));
        assert!(view.reconcile_post(post()));
        assert_eq!(view.post().likes, 0);
    }

    #[test]
    fn show_all_widens_the_window() {
        let comments = (0..5)
            .map(|i| comment(&format!("m{}", i), None, i as u32, i))
            .collect();
        let mut view = PostDetailView::new(post(), comments, ThreadSettings::default());

        assert_eq!(view.view().groups.len(), 3);
        assert_eq!(view.list_main_comments().len(), 5);
        assert_eq!(view.toggle_show_all(), ListMode::Full);
        assert_eq!(view.view().groups.len(), 5);
    }

    #[tokio::test]
    async fn loads_from_repositories() {
        let forum = MemoryForum::new();
        let created = forum
            .create_post(NewPost {
                title: None,
                content: "hi".into(),
                author: Author::new("u1", "Alex"),
                tags: Default::default(),
                language: "English".into(),
            })
            .await
            .unwrap();
        forum
            .create_comment(NewComment {
                post_id: created.id.clone(),
                content: "first".into(),
                author: Author::new("u2", "Emma"),
                parent_id: None,
                reply_to_user: None,
            })
            .await
            .unwrap();

        let view = PostDetailView::load(&forum, &forum, &created.id, ThreadSettings::default())
            .await
            .unwrap();
        assert_eq!(view.total_comment_count(), 1);
        assert_eq!(view.post().comments_count, 1);

        let missing = PostDetailView::load(&forum, &forum, "ghost", ThreadSettings::default()).await;
        assert!(missing.unwrap_err().is_not_found());
    }
}
