use domain::Comment;
use std::collections::HashSet;
use storage::{index_by_main, separate};

pub const DEFAULT_VISIBLE_MAIN_COMMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSettings {
    pub visible_main_comments: usize,
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            visible_main_comments: DEFAULT_VISIBLE_MAIN_COMMENTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyVisibility {
    Collapsed,
    Expanded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Limited,
    Full,
}

/// UI state of one comment section. Holds ids only, never comment data.
#[derive(Debug, Clone)]
pub struct ThreadState {
    settings: ThreadSettings,
    expanded: HashSet<String>,
    mode: ListMode,
}

impl Default for ThreadState {
    fn default() -> Self {
        Self::new(ThreadSettings::default())
    }
}

impl ThreadState {
    pub fn new(settings: ThreadSettings) -> Self {
        Self {
            settings,
            expanded: HashSet::new(),
            mode: ListMode::Limited,
        }
    }

    pub fn visibility(&self, main_comment_id: &str) -> ReplyVisibility {
        if self.expanded.contains(main_comment_id) {
            ReplyVisibility::Expanded
        } else {
            ReplyVisibility::Collapsed
        }
    }

    pub fn toggle_replies(&mut self, main_comment_id: &str) -> ReplyVisibility {
        if !self.expanded.remove(main_comment_id) {
            self.expanded.insert(main_comment_id.to_string());
        }
        self.visibility(main_comment_id)
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn toggle_show_all(&mut self) -> ListMode {
        self.mode = match self.mode {
            ListMode::Limited => ListMode::Full,
            ListMode::Full => ListMode::Limited,
        };
        self.mode
    }

    fn window(&self, total: usize) -> usize {
        match self.mode {
            ListMode::Full => total,
            ListMode::Limited => total.min(self.settings.visible_main_comments),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replies {
    None,
    Collapsed { count: usize },
    Expanded(Vec<Comment>),
}

impl Replies {
    pub fn count(&self) -> usize {
        match self {
            Replies::None => 0,
            Replies::Collapsed { count } => *count,
            Replies::Expanded(replies) => replies.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadGroup {
    pub main: Comment,
    pub replies: Replies,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadView {
    pub groups: Vec<ThreadGroup>,
    pub total_count: usize,
    pub main_count: usize,
    pub hidden_main_count: usize,
    pub mode: ListMode,
}

pub fn sort_main_comments(mut main_comments: Vec<Comment>) -> Vec<Comment> {
    // 稳定排序：点赞数相同则保持时间顺序
    main_comments.sort_by(|a, b| b.likes.cmp(&a.likes));
    main_comments
}

pub fn assemble(comments: &[Comment], state: &ThreadState) -> ThreadView {
    let separated = separate(comments);
    let total_count = separated.total();

    let sorted = sort_main_comments(separated.main_comments);
    let main_count = sorted.len();
    let window = state.window(main_count);
    let children = index_by_main(&separated.sub_comments);

    let groups = sorted
        .into_iter()
        .take(window)
        .map(|main| {
            let kids = children.get(main.id.as_str());
            let replies = match (kids, state.visibility(&main.id)) {
                (None, _) => Replies::None,
                (Some(kids), ReplyVisibility::Collapsed) => Replies::Collapsed { count: kids.len() },
                (Some(kids), ReplyVisibility::Expanded) => {
                    Replies::Expanded(kids.iter().map(|c| (*c).clone()).collect())
                }
            };
            ThreadGroup { main, replies }
        })
        .collect();

    ThreadView {
        groups,
        total_count,
        main_count,
        hidden_main_count: main_count - window,
        mode: state.mode(),
    }
}
