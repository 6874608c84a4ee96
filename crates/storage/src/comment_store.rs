use domain::{reducer, Comment, CoreError, EntityKind};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Main comments and sub-comments of one thread, each ascending by `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Separated {
    pub main_comments: Vec<Comment>,
    pub sub_comments: Vec<Comment>,
}

impl Separated {
    pub fn total(&self) -> usize {
        self.main_comments.len() + self.sub_comments.len()
    }
}

/// Canonical flat comment storage for a post-detail view.
///
/// Every stored sub-comment's `parent_id` is the id of its main comment.
/// `load` and `add` are the only ways in and both enforce that.
#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    comments: Vec<Comment>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a server snapshot, collapsing reply chains so that each
    /// sub-comment points straight at its main comment.
    pub fn load(mut comments: Vec<Comment>) -> Self {
        let parents: HashMap<String, Option<String>> = comments
            .iter()
            .map(|c| (c.id.clone(), c.parent_id.clone()))
            .collect();

        for comment in comments.iter_mut() {
            let Some(start) = comment.parent_id.clone() else {
                continue;
            };
            match resolve_root(&parents, &start) {
                Some(root) => comment.parent_id = Some(root),
                None => warn!(
                    "Comment {} has an unresolvable parent chain starting at {}",
                    comment.id, start
                ),
            }
        }

        Self { comments }
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn all(&self) -> &[Comment] {
        &self.comments
    }

    pub fn get(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn comments_for_post(&self, post_id: &str) -> Vec<Comment> {
        self.comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect()
    }

    pub fn separated_for_post(&self, post_id: &str) -> Separated {
        separate(&self.comments_for_post(post_id))
    }

    pub fn toggle_like(&mut self, comment_id: &str) -> Result<Comment, CoreError> {
        let comment = self
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id && !c.is_deleted)
            .ok_or_else(|| CoreError::not_found(EntityKind::Comment, comment_id))?;

        reducer::apply_toggle_like(comment);
        Ok(comment.clone())
    }

    /// Soft delete. `false` when the id is unknown or already deleted.
    pub fn delete(&mut self, comment_id: &str) -> bool {
        let Some(idx) = self.position(comment_id) else {
            debug!("Delete ignored, unknown comment {}", comment_id);
            return false;
        };
        if self.comments[idx].is_deleted {
            return false;
        }

        let deleted = reducer::soft_delete(self.comments[idx].clone());
        self.comments[idx] = deleted;
        true
    }

    /// Appends a new comment. A reply aimed at a sub-comment is regrouped
    /// under that sub-comment's main comment, and `reply_to_user` defaults to
    /// the author being replied to. Ids already in the store are refused.
    pub fn add(&mut self, mut comment: Comment) -> Result<Comment, CoreError> {
        if self.position(&comment.id).is_some() {
            debug!("Comment {} already stored", comment.id);
            return Err(CoreError::already_exists(EntityKind::Comment, comment.id));
        }
        if let Some(target_id) = comment.parent_id.take() {
            let target = self
                .get(&target_id)
                .filter(|t| t.post_id == comment.post_id)
                .ok_or_else(|| CoreError::not_found(EntityKind::Comment, &target_id))?;

            let main_id = target.parent_id.clone().unwrap_or_else(|| target.id.clone());
            if comment.reply_to_user.is_none() {
                comment.reply_to_user = Some(target.author.clone());
            }
            comment.parent_id = Some(main_id);
        }

        self.comments.push(comment.clone());
        Ok(comment)
    }

    /// Replaces the local copy with the server's. `false` if the id is unknown.
    pub fn reconcile(&mut self, server: Comment) -> bool {
        match self.position(&server.id) {
            Some(idx) => {
                self.comments[idx] = server;
                true
            }
            None => false,
        }
    }

    fn position(&self, comment_id: &str) -> Option<usize> {
        self.comments.iter().position(|c| c.id == comment_id)
    }
}

fn resolve_root(parents: &HashMap<String, Option<String>>, start: &str) -> Option<String> {
    let mut current = start;
    // 防止环形引用
    for _ in 0..=parents.len() {
        match parents.get(current)? {
            Some(next) => current = next.as_str(),
            None => return Some(current.to_string()),
        }
    }
    None
}

/// Splits on `parent_id` and orders both halves by time. Stable: equal
/// timestamps keep their input order.
pub fn separate(comments: &[Comment]) -> Separated {
    let (mut main_comments, mut sub_comments): (Vec<Comment>, Vec<Comment>) =
        comments.iter().cloned().partition(Comment::is_main);

    main_comments.sort_by_key(|c| c.created_at);
    sub_comments.sort_by_key(|c| c.created_at);

    Separated {
        main_comments,
        sub_comments,
    }
}

pub fn children_of_main(main_comment_id: &str, sub_comments: &[Comment]) -> Vec<Comment> {
    sub_comments
        .iter()
        .filter(|c| c.parent_id.as_deref() == Some(main_comment_id))
        .cloned()
        .collect()
}

/// One pass over the sub-comments instead of a scan per main comment.
pub fn index_by_main(sub_comments: &[Comment]) -> HashMap<&str, Vec<&Comment>> {
    let mut index: HashMap<&str, Vec<&Comment>> = HashMap::new();
    for c in sub_comments {
        if let Some(parent) = c.parent_id.as_deref() {
            index.entry(parent).or_default().push(c);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use domain::Author;

    fn at(minutes: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn comment(id: &str, parent: Option<&str>, minutes: i64) -> Comment {
        Comment {
            id: id.into(),
            content: format!("<p>{}</p>", id),
            author: Author::new(format!("author-{}", id), id.to_uppercase()),
            created_at: at(minutes),
            likes: 0,
            is_liked: Some(false),
            parent_id: parent.map(Into::into),
            post_id: "p1".into(),
            is_deleted: false,
            reply_to_user: None,
        }
    }

    #[test]
    fn separate_is_a_complete_partition() {
        let input = vec![
            comment("s2", Some("m1"), 9),
            comment("m2", None, 5),
            comment("s1", Some("m1"), 3),
            comment("m1", None, 0),
            comment("s3", Some("m2"), 7),
        ];

        let out = separate(&input);
        assert_eq!(out.total(), input.len());

        for c in &input {
            let in_main = out.main_comments.iter().filter(|m| m.id == c.id).count();
            let in_sub = out.sub_comments.iter().filter(|s| s.id == c.id).count();
            assert_eq!(in_main + in_sub, 1, "{} must appear exactly once", c.id);
        }

        let mains: Vec<_> = out.main_comments.iter().map(|c| c.id.as_str()).collect();
        let subs: Vec<_> = out.sub_comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(mains, ["m1", "m2"]);
        assert_eq!(subs, ["s1", "s3", "s2"]);
        // input untouched
        assert_eq!(input[0].id, "s2");
    }

    #[test]
    fn reply_grouping_for_a_main_comment() {
        let store = CommentStore::load(vec![
            comment("s2", Some("m1"), 2),
            comment("m1", None, 0),
            comment("s1", Some("m1"), 1),
        ]);

        let separated = store.separated_for_post("p1");
        let children: Vec<_> = children_of_main("m1", &separated.sub_comments)
            .into_iter()
            .map(|c| c.id)
            .collect();

        assert_eq!(children, ["s1", "s2"]);
        assert_eq!(separated.total(), 3);
    }

    #[test]
    fn index_matches_linear_scan() {
        let subs = vec![
            comment("s1", Some("m1"), 1),
            comment("s2", Some("m2"), 2),
            comment("s3", Some("m1"), 3),
        ];
        let index = index_by_main(&subs);

        let indexed: Vec<_> = index["m1"].iter().map(|c| c.id.clone()).collect();
        let scanned: Vec<_> = children_of_main("m1", &subs).into_iter().map(|c| c.id).collect();
        assert_eq!(indexed, scanned);
        assert!(!index.contains_key("m3"));
    }

    #[test]
    fn comments_for_post_filters_other_posts() {
        let mut other = comment("x1", None, 0);
        other.post_id = "p2".into();
        let store = CommentStore::load(vec![comment("m1", None, 0), other]);

        assert_eq!(store.comments_for_post("p1").len(), 1);
        assert_eq!(store.comments_for_post("p2")[0].id, "x1");
        assert!(store.comments_for_post("p3").is_empty());
    }

    #[test]
    fn toggle_like_mutates_in_place() {
        let mut store = CommentStore::load(vec![comment("m1", None, 0)]);

        let snapshot = store.toggle_like("m1").unwrap();
        assert_eq!((snapshot.likes, snapshot.is_liked), (1, Some(true)));
        assert_eq!(store.get("m1").unwrap().likes, 1);

        let snapshot = store.toggle_like("m1").unwrap();
        assert_eq!((snapshot.likes, snapshot.is_liked), (0, Some(false)));
    }

    #[test]
    fn toggle_like_on_unknown_id_is_not_found() {
        let mut store = CommentStore::new();
        let err = store.toggle_like("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_is_soft_and_keeps_structure() {
        let mut store = CommentStore::load(vec![
            comment("m1", None, 0),
            comment("s1", Some("m1"), 1),
        ]);

        assert!(store.delete("m1"));
        assert!(!store.delete("m1"));
        assert!(!store.delete("ghost"));

        let m1 = store.get("m1").unwrap();
        assert!(m1.is_deleted);
        assert!(m1.content.is_empty());

        let separated = store.separated_for_post("p1");
        assert_eq!(children_of_main("m1", &separated.sub_comments).len(), 1);
        assert!(store.toggle_like("m1").unwrap_err().is_not_found());
    }

    #[test]
    fn reply_to_sub_comment_is_grouped_under_main() {
        let mut store = CommentStore::load(vec![
            comment("m1", None, 0),
            comment("s1", Some("m1"), 1),
        ]);

        let added = store.add(comment("s2", Some("s1"), 2)).unwrap();
        assert_eq!(added.parent_id.as_deref(), Some("m1"));
        assert_eq!(added.reply_to_user.as_ref().unwrap().name, "S1");
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn reply_keeps_explicit_reply_target() {
        let mut store = CommentStore::load(vec![comment("m1", None, 0)]);
        let mut reply = comment("s1", Some("m1"), 1);
        reply.reply_to_user = Some(Author::new("u9", "Someone Else"));

        let added = store.add(reply).unwrap();
        assert_eq!(added.reply_to_user.unwrap().id, "u9");
    }

    #[test]
    fn duplicate_id_is_refused_and_keeps_the_original() {
        let mut store = CommentStore::load(vec![comment("m1", None, 0)]);
        let mut again = comment("m1", None, 5);
        again.content = "<p>overwritten</p>".into();

        let err = store.add(again).unwrap_err();
        assert_eq!(err, CoreError::already_exists(EntityKind::Comment, "m1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("m1").unwrap().created_at, comment("m1", None, 0).created_at);
        assert_ne!(store.get("m1").unwrap().content, "<p>overwritten</p>");
    }

    #[test]
    fn reply_to_unknown_parent_fails() {
        let mut store = CommentStore::new();
        let err = store.add(comment("s1", Some("ghost"), 1)).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty());
    }

    #[test]
    fn load_collapses_deep_reply_chains() {
        let store = CommentStore::load(vec![
            comment("comment-1", None, 0),
            comment("comment-1-2", Some("comment-1"), 1),
            comment("comment-1-2-1", Some("comment-1-2"), 2),
        ]);

        let deep = store.get("comment-1-2-1").unwrap();
        assert_eq!(deep.parent_id.as_deref(), Some("comment-1"));
    }

    #[test]
    fn load_survives_parent_cycles() {
        let store = CommentStore::load(vec![
            comment("a", Some("b"), 0),
            comment("b", Some("a"), 1),
        ]);
        assert_eq!(store.get("a").unwrap().parent_id.as_deref(), Some("b"));
    }

    #[test]
    fn reconcile_replaces_optimistic_copy() {
        let mut store = CommentStore::load(vec![comment("m1", None, 0)]);
        store.toggle_like("m1").unwrap();

        let mut server = comment("m1", None, 0);
        server.likes = 41;
        server.is_liked = Some(true);
        assert!(store.reconcile(server));
        assert_eq!(store.get("m1").unwrap().likes, 41);

        assert!(!store.reconcile(comment("ghost", None, 0)));
    }
}
