// src/crawl/frontier.rs
// =============================================================================
// The crawl frontier: what still has to be fetched, and what already was.
//
// How it works:
// 1. Seeds go in at depth 0
// 2. next_level() hands out every queued task of the shallowest depth and
//    marks each one visited right away
// 3. The session fetches that level, then enqueues the children at depth + 1
// 4. Repeat until the queue is empty
//
// The frontier is plain data with a single owner (the session's coordinator
// loop). Workers never see it, so there is nothing to lock.
//
// Rust concepts:
// - HashSet: To track visited URLs (O(1) lookup)
// - VecDeque: Double-ended queue for breadth-first crawling
// =============================================================================

use std::collections::{HashSet, VecDeque};

use url::Url;

use crate::config::CrawlBudget;

/// One URL waiting to be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    // How many links away from the seed
    pub depth: usize,
    // Root URL of the site this task belongs to
    pub origin: String,
}

/// Why enqueue() did or did not accept a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    Duplicate,
    TooDeep,
    OverBudget,
}

#[derive(Debug)]
pub struct Frontier {
    budget: CrawlBudget,
    queue: VecDeque<CrawlTask>,
    queued: HashSet<Url>,
    visited: HashSet<Url>,
    dispatched: usize,
    budget_hit: bool,
}

impl Frontier {
    pub fn new(budget: CrawlBudget) -> Self {
        Self {
            budget,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            dispatched: 0,
            budget_hit: false,
        }
    }

    // Adds a task unless it was seen before or the budget forbids it.
    //
    // The page budget counts pages already dispatched plus tasks waiting in
    // the queue, so the queue can never promise more pages than allowed.
    pub fn enqueue(&mut self, url: Url, depth: usize, origin: &str) -> Enqueue {
        if self.visited.contains(&url) || self.queued.contains(&url) {
            return Enqueue::Duplicate;
        }
        if !self.budget.allows_depth(depth) {
            self.budget_hit = true;
            return Enqueue::TooDeep;
        }
        if !self.budget.allows_pages(self.dispatched + self.queue.len() + 1) {
            self.budget_hit = true;
            return Enqueue::OverBudget;
        }

        self.queued.insert(url.clone());
        self.queue.push_back(CrawlTask {
            url,
            depth,
            origin: origin.to_string(),
        });
        Enqueue::Queued
    }

    // Pops every task at the depth of the queue head. Depths in the queue
    // never decrease, so this is exactly one BFS level.
    pub fn next_level(&mut self) -> Vec<CrawlTask> {
        let Some(depth) = self.queue.front().map(|t| t.depth) else {
            return Vec::new();
        };

        let mut level = Vec::new();
        while self.queue.front().is_some_and(|t| t.depth == depth) {
            if let Some(task) = self.queue.pop_front() {
                self.queued.remove(&task.url);
                self.visited.insert(task.url.clone());
                self.dispatched += 1;
                level.push(task);
            }
        }
        level
    }

    // Records a URL reached without being dispatched (a redirect target).
    // A queued copy of it is dropped so it is not fetched a second time.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        if self.queued.remove(url) {
            self.queue.retain(|t| &t.url != url);
        }
        self.visited.insert(url.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    // True once a depth or page ceiling refused a task.
    pub fn budget_hit(&self) -> bool {
        self.budget_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://example.com/";

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    #[test]
    fn test_duplicates_refused() {
        let mut frontier = Frontier::new(CrawlBudget::default());
        assert_eq!(frontier.enqueue(url("/"), 0, ORIGIN), Enqueue::Queued);
        assert_eq!(frontier.enqueue(url("/"), 0, ORIGIN), Enqueue::Duplicate);

        let level = frontier.next_level();
        assert_eq!(level.len(), 1);
        // Visited URLs stay refused, and refusing them is not a budget event.
        assert_eq!(frontier.enqueue(url("/"), 1, ORIGIN), Enqueue::Duplicate);
        assert!(!frontier.budget_hit());
    }

    #[test]
    fn test_depth_limit() {
        let mut frontier = Frontier::new(CrawlBudget::new(None, Some(1)));
        assert_eq!(frontier.enqueue(url("/a"), 1, ORIGIN), Enqueue::Queued);
        assert_eq!(frontier.enqueue(url("/b"), 2, ORIGIN), Enqueue::TooDeep);
        assert!(frontier.budget_hit());
    }

    #[test]
    fn test_page_budget_counts_dispatched_and_queued() {
        let mut frontier = Frontier::new(CrawlBudget::new(Some(2), None));
        frontier.enqueue(url("/"), 0, ORIGIN);
        frontier.next_level();
        assert_eq!(frontier.enqueue(url("/a"), 1, ORIGIN), Enqueue::Queued);
        assert_eq!(frontier.enqueue(url("/b"), 1, ORIGIN), Enqueue::OverBudget);
        assert!(frontier.budget_hit());
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_next_level_returns_one_depth_in_order() {
        let mut frontier = Frontier::new(CrawlBudget::default());
        frontier.enqueue(url("/"), 0, ORIGIN);
        frontier.next_level();
        frontier.enqueue(url("/b"), 1, ORIGIN);
        frontier.enqueue(url("/a"), 1, ORIGIN);

        let level = frontier.next_level();
        let paths: Vec<&str> = level.iter().map(|t| t.url.path()).collect();
        assert_eq!(paths, vec!["/b", "/a"]);
        assert!(level.iter().all(|t| t.depth == 1));

        frontier.enqueue(url("/c"), 2, ORIGIN);
        let level = frontier.next_level();
        assert_eq!(level[0].depth, 2);
        assert!(frontier.is_empty());
        assert_eq!(frontier.dispatched(), 4);
    }

    #[test]
    fn test_redirect_target_drops_queued_copy() {
        let mut frontier = Frontier::new(CrawlBudget::default());
        frontier.enqueue(url("/docs/"), 1, ORIGIN);
        assert!(frontier.mark_visited(&url("/docs/")));
        assert!(frontier.is_empty());
        assert_eq!(frontier.enqueue(url("/docs/"), 1, ORIGIN), Enqueue::Duplicate);
        assert!(!frontier.mark_visited(&url("/docs/")));
    }
}
