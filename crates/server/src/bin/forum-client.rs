//! Walks the live post feed and prints the newest post's comment thread.

use adapter::{ApiClient, ApiConfig};
use client::{FetchOutcome, PaginationController, PostDetailView, Replies, ThreadSettings};
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const PAGE_SIZE: u32 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let base_url =
        std::env::var("CONSENSUS_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let search = std::env::args().nth(1);
    let api = Arc::new(ApiClient::new(ApiConfig::new(&base_url))?);
    println!("Reading forum at {}", base_url);

    println!("\n[1/2] Walking the post feed...");
    let feed = PaginationController::new(
        api.clone(),
        ApiClient::feed_start(PAGE_SIZE, search.as_deref()),
    );
    while feed.has_more() {
        match feed.fetch_next_page().await {
            FetchOutcome::Appended(n) => println!("   -> +{} posts ({} loaded)", n, feed.len()),
            FetchOutcome::Failed(e) => anyhow::bail!("Feed fetch failed: {}", e),
            FetchOutcome::Skipped(reason) => println!("   -> skipped: {:?}", reason),
        }
    }
    println!("   -> {} posts in total", feed.len());

    let Some(post) = feed.items().into_iter().next() else {
        println!("\nNo posts to show.");
        return Ok(());
    };

    println!("\n[2/2] Thread of {:?}", post.title.as_deref().unwrap_or("(untitled)"));
    let mut view =
        PostDetailView::load(api.as_ref(), api.as_ref(), &post.id, ThreadSettings::default())
            .await?;
    let main_ids: Vec<String> = view.list_main_comments().into_iter().map(|c| c.id).collect();
    for id in &main_ids {
        view.toggle_replies(id);
    }

    let rendered = view.view();
    println!(
        "   -> {} comments, showing {} of {} main comments",
        rendered.total_count,
        rendered.groups.len(),
        rendered.main_count
    );
    for group in &rendered.groups {
        println!(
            "      - [{} likes] {}: {}",
            group.main.likes, group.main.author.name, group.main.content
        );
        if let Replies::Expanded(replies) = &group.replies {
            for reply in replies {
                println!("          > {}: {}", reply.author.name, reply.content);
            }
        }
    }
    if rendered.hidden_main_count > 0 {
        println!("      ... {} more", rendered.hidden_main_count);
    }

    Ok(())
}
