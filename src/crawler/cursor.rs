//! Per-lane pagination state and resume settings
//!
//! A lane either strides through the page sequence (`0, w, 2w, ...` shifted by
//! its lane number) or walks its share of an explicit page list.

use crate::config::Config;
use crate::state::BlogState;
use crate::ConfigError;
use std::sync::Arc;

/// Largest number of pages an explicit page list may expand to
pub const MAX_LISTED_PAGES: u64 = 100_000;

/// Pagination position of one lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlCursor {
    /// Open-ended pagination advancing by `stride` pages
    Stride { page: u64, stride: u64 },

    /// Explicit page list; this lane visits `pages[position]`, `pages[position + stride]`, ...
    Listed {
        pages: Arc<[u64]>,
        position: usize,
        stride: usize,
    },
}

impl CrawlCursor {
    /// Builds the starting cursor for a lane
    ///
    /// # Arguments
    ///
    /// * `lane` - Lane number in `0..width`
    /// * `width` - Number of lanes (the stride)
    /// * `pages` - Explicit page list shared by all lanes, if the crawl is restricted to one
    ///
    /// # Returns
    ///
    /// `None` if an explicit list leaves nothing for this lane.
    pub fn for_lane(lane: u32, width: u32, pages: Option<&Arc<[u64]>>) -> Option<Self> {
        match pages {
            None => Some(Self::Stride {
                page: lane as u64,
                stride: width.max(1) as u64,
            }),
            Some(pages) => {
                let position = lane as usize;
                (position < pages.len()).then(|| Self::Listed {
                    pages: Arc::clone(pages),
                    position,
                    stride: width.max(1) as usize,
                })
            }
        }
    }

    /// The page index this cursor points at
    pub fn current(&self) -> u64 {
        match self {
            Self::Stride { page, .. } => *page,
            Self::Listed {
                pages, position, ..
            } => pages[*position],
        }
    }

    /// Moves to the lane's next page
    ///
    /// Returns `false` once an explicit page list is exhausted; stride cursors
    /// never run out on their own.
    pub fn advance(&mut self) -> bool {
        match self {
            Self::Stride { page, stride } => {
                *page += *stride;
                true
            }
            Self::Listed {
                pages,
                position,
                stride,
            } => {
                let next = *position + *stride;
                if next < pages.len() {
                    *position = next;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Parses a page list such as `"1,3,5-7"` into `[1, 3, 5, 6, 7]`
///
/// Whitespace around entries is ignored. Ranges are inclusive and must not be
/// descending. The expanded list may hold at most [`MAX_LISTED_PAGES`] pages.
///
/// # Examples
///
/// ```
/// use blog_sweep::crawler::parse_page_range;
///
/// assert_eq!(parse_page_range("1,3,5-7").unwrap(), vec![1, 3, 5, 6, 7]);
/// ```
pub fn parse_page_range(input: &str) -> Result<Vec<u64>, ConfigError> {
    let mut pages = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ConfigError::InvalidPageRange(format!(
                "empty entry in '{}'",
                input
            )));
        }

        let (start, end) = match part.split_once('-') {
            None => {
                let page = parse_page_number(part, input)?;
                (page, page)
            }
            Some((start, end)) => (
                parse_page_number(start.trim(), input)?,
                parse_page_number(end.trim(), input)?,
            ),
        };
        if start > end {
            return Err(ConfigError::InvalidPageRange(format!(
                "descending range '{}' in '{}'",
                part, input
            )));
        }

        let listed = pages.len() as u64;
        if end - start >= MAX_LISTED_PAGES - listed.min(MAX_LISTED_PAGES) {
            return Err(ConfigError::InvalidPageRange(format!(
                "'{}' lists more than {} pages",
                input, MAX_LISTED_PAGES
            )));
        }
        pages.extend(start..=end);
    }

    Ok(pages)
}

fn parse_page_number(value: &str, input: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| {
        ConfigError::InvalidPageRange(format!("'{}' is not a page number in '{}'", value, input))
    })
}

/// Resolves the post id below which pages count as already seen
///
/// Returns 0 (scan everything) when a rescan is forced or an explicit page
/// list is configured.
pub fn resume_id(config: &Config, state: &BlogState) -> u64 {
    if config.scan.force_rescan || config.scan.download_pages.is_some() {
        return 0;
    }
    state.last_id
}
