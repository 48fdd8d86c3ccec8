//! Crawl statistics
//!
//! This module provides:
//! - `StatisticsBag`, the append-only multiset lanes record every extracted item in
//! - `StatisticsSnapshot`, the read side, only reachable once every writer is gone
//! - Printing of the persisted per-blog statistics

use crate::state::{BlogState, ContentItem, PostType};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Concurrent, append-only record of `(type, payload)` observations
///
/// Lanes share it behind an `Arc` and only `add`. Reading requires `seal`,
/// which succeeds once the last writer handle is dropped.
#[derive(Debug, Default)]
pub struct StatisticsBag {
    entries: Mutex<Vec<(PostType, String)>>,
}

impl StatisticsBag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records one observation
    pub fn add(&self, post_type: PostType, payload: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((post_type, payload.into()));
    }

    /// Records the dedup identity of an item
    pub fn add_item(&self, item: &ContentItem) {
        let (post_type, payload) = item.dedup_key();
        self.add(post_type, payload);
    }

    /// Closes the bag for reading
    ///
    /// # Returns
    ///
    /// * `Ok(StatisticsSnapshot)` - No other handle to the bag remains
    /// * `Err(Arc<Self>)` - Some writer still holds the bag; it is handed back
    pub fn seal(bag: Arc<Self>) -> Result<StatisticsSnapshot, Arc<Self>> {
        let bag = Arc::try_unwrap(bag)?;
        let entries = bag.entries.into_inner().unwrap_or_else(|e| e.into_inner());

        let mut occurrences: HashMap<(PostType, String), u64> = HashMap::new();
        for entry in entries {
            *occurrences.entry(entry).or_insert(0) += 1;
        }
        Ok(StatisticsSnapshot { occurrences })
    }
}

/// Read-only view of a sealed `StatisticsBag`
#[derive(Debug, Clone, Default)]
pub struct StatisticsSnapshot {
    occurrences: HashMap<(PostType, String), u64>,
}

impl StatisticsSnapshot {
    /// Number of observations of the given type, duplicates included
    pub fn count(&self, post_type: PostType) -> u64 {
        self.occurrences
            .iter()
            .filter(|((t, _), _)| *t == post_type)
            .map(|(_, n)| n)
            .sum()
    }

    /// Number of observations across all types
    pub fn total(&self) -> u64 {
        self.occurrences.values().sum()
    }

    /// Sum over repeated payloads of the given type of `n - 1`
    pub fn determine_duplicates(&self, post_type: PostType) -> u64 {
        self.occurrences
            .iter()
            .filter(|((t, _), _)| *t == post_type)
            .map(|(_, n)| n - 1)
            .sum()
    }

    /// Number of distinct `(type, payload)` pairs
    pub fn distinct(&self) -> u64 {
        self.occurrences.len() as u64
    }
}

/// Prints the persisted statistics of a blog to stdout
///
/// # Arguments
///
/// * `state` - The blog state to display
pub fn print_statistics(state: &BlogState) {
    println!("=== Blog Statistics: {} ===\n", state.name);

    println!("Overview:");
    println!("  Total posts: {}", state.total_count);
    println!("  Downloaded: {}", state.downloaded_total);
    println!("  Duplicates: {}", state.total_duplicates());
    match state.last_complete_crawl {
        Some(at) => println!("  Last complete crawl: {}", at.to_rfc3339()),
        None => println!("  Last complete crawl: never"),
    }
    println!("  Resume id: {}", state.last_id);
    println!();

    println!("Posts by Type:");
    for post_type in PostType::all_types() {
        let count = state.count(post_type);
        if count == 0 {
            continue;
        }
        let downloaded = state.downloaded(post_type);
        let percentage = (downloaded as f64 / count as f64) * 100.0;
        println!(
            "  {}: {} found, {} downloaded ({:.1}%)",
            post_type, count, downloaded, percentage
        );
    }
    println!();

    if let Some(photo) = &state.last_downloaded_photo {
        println!("Last photo: {}", photo);
    }
    if let Some(video) = &state.last_downloaded_video {
        println!("Last video: {}", video);
    }
}
