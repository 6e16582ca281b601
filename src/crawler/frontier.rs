//! Crawl frontier
//!
//! This module handles:
//! - Priority ordering of pending URLs (seed → investor relations → PDF → other)
//! - The global seen set that guarantees every URL is enqueued at most once
//! - The depth bound

use crate::url::is_pdf_url;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::LazyLock;

static IR_HINTS: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"(invest(or|ment)s?|ir|financial|reports?|press|news|media|del[aå]rs|arsredovisning|annual|interim|report)",
    )
    .case_insensitive(true)
    .build()
    .unwrap()
});

/// Priority tier of a queued URL (lower tiers are popped first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Explicit seeds: discovered IR hosts and well-known paths
    Seed = 0,
    /// URLs that look like investor-relations material
    InvestorRelations = 1,
    /// PDF documents
    Pdf = 2,
    /// Everything else
    Other = 3,
}

impl Tier {
    /// Classifies a discovered URL
    ///
    /// PDFs are never classified as investor relations, even when the path
    /// carries an IR hint.
    pub fn classify(url: &str) -> Self {
        if is_pdf_url(url) {
            Self::Pdf
        } else if IR_HINTS.is_match(url) {
            Self::InvestorRelations
        } else {
            Self::Other
        }
    }
}

/// A unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Canonical URL
    pub url: String,
    /// Link distance from the start URL
    pub depth: u32,
    /// Skip the include/exclude filters for this task
    pub bypass_filters: bool,
}

#[derive(Debug)]
struct QueuedTask {
    task: CrawlTask,
    tier: Tier,
    sequence: u64,
}

// BinaryHeap is a max-heap: reverse every comparison so the lowest
// (tier, depth, sequence) is popped first
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .tier
            .cmp(&self.tier)
            .then_with(|| other.task.depth.cmp(&self.task.depth))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

/// Priority frontier with a crawl-wide seen set
///
/// A URL is marked seen when it is enqueued, so it can never be queued (or
/// fetched) twice within one crawl.
#[derive(Debug)]
pub struct Frontier {
    queue: BinaryHeap<QueuedTask>,
    seen: HashSet<String>,
    max_depth: u32,
    next_sequence: u64,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Tasks deeper than this are refused
    pub fn new(max_depth: u32) -> Self {
        Self {
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            max_depth,
            next_sequence: 0,
        }
    }

    /// Marks a URL as seen without queueing it (used for the start URL)
    ///
    /// Returns false if it was already seen.
    pub fn mark_seen(&mut self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    /// Enqueues a task in an explicit tier
    ///
    /// # Returns
    ///
    /// * `true` - The task was queued
    /// * `false` - The URL was already seen or the depth exceeds the bound
    pub fn push(&mut self, task: CrawlTask, tier: Tier) -> bool {
        if task.depth > self.max_depth {
            tracing::trace!("Depth {} exceeds bound for {}", task.depth, task.url);
            return false;
        }
        if !self.seen.insert(task.url.clone()) {
            return false;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(QueuedTask {
            task,
            tier,
            sequence,
        });
        true
    }

    /// Enqueues explicit seeds ahead of all discovered links
    pub fn enqueue_seeds<I>(&mut self, urls: I, depth: u32, bypass_filters: bool) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        urls.into_iter()
            .filter(|url| {
                self.push(
                    CrawlTask {
                        url: url.clone(),
                        depth,
                        bypass_filters,
                    },
                    Tier::Seed,
                )
            })
            .count()
    }

    /// Enqueues a batch of discovered links at `depth`, tiered by URL
    ///
    /// Within a tier, first-discovery order is preserved.
    ///
    /// # Returns
    ///
    /// The number of newly queued URLs
    pub fn enqueue_discovered<I>(&mut self, urls: I, depth: u32) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        urls.into_iter()
            .filter(|url| {
                let tier = Tier::classify(url);
                self.push(
                    CrawlTask {
                        url: url.clone(),
                        depth,
                        bypass_filters: false,
                    },
                    tier,
                )
            })
            .count()
    }

    /// Removes and returns the highest priority task
    pub fn pop(&mut self) -> Option<CrawlTask> {
        self.queue.pop().map(|queued| queued.task)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of distinct URLs queued or fetched so far
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}
