//! Slice windowing with navigation metadata.
//!
//! Tool providers hand large result sets to the model in bounded pages so a
//! single call cannot blow the context budget. Validation happens before any
//! provider work; windowing is uniform over the element type.

use opschat_core::{AgentError, Result};
use serde::{Deserialize, Serialize};

/// Page sizing passed into provider constructors. Replaces the old
/// environment-derived per-resource defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageLimits {
    #[serde(default = "default_count")]
    pub default_count: usize,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: default_max_count(),
        }
    }
}

fn default_count() -> usize {
    10
}

fn default_max_count() -> usize {
    50
}

/// Metadata describing one page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub total: usize,
    pub offset: usize,
    pub count: usize,
    pub requested_count: usize,
    pub has_more: bool,
}

/// One page of data plus its pagination envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
}

/// Validates raw pagination parameters, returning them unchanged on success.
/// Offsets arrive signed because callers pass through untrusted tool
/// arguments; a negative value must be representable to be rejected.
pub fn validate(count: i64, offset: i64, limits: &PageLimits) -> Result<(usize, usize)> {
    if count < 1 {
        return Err(AgentError::InvalidCount(format!(
            "count parameter ({}) must be at least 1",
            count
        )));
    }
    if count as usize > limits.max_count {
        return Err(AgentError::InvalidCount(format!(
            "count parameter ({}) exceeds maximum allowed value ({}). Please use count <= {} and paginate through results using the offset parameter",
            count, limits.max_count, limits.max_count
        )));
    }

    if offset < 0 {
        return Err(AgentError::InvalidOffset(format!(
            "offset parameter ({}) must be non-negative (>= 0)",
            offset
        )));
    }

    Ok((count as usize, offset as usize))
}

/// Windows `items[offset..offset+count]` and fills in the envelope. An offset
/// at or past the end yields an empty page with `has_more == false`.
pub fn paginate<T: Clone>(items: &[T], count: usize, offset: usize) -> Paginated<T> {
    let total = items.len();

    if offset >= total {
        return Paginated {
            data: Vec::new(),
            pagination: PaginationInfo {
                total,
                offset,
                count: 0,
                requested_count: count,
                has_more: false,
            },
        };
    }

    let end = (offset + count).min(total);
    let data: Vec<T> = items[offset..end].to_vec();

    Paginated {
        pagination: PaginationInfo {
            total,
            offset,
            count: data.len(),
            requested_count: count,
            has_more: end < total,
        },
        data,
    }
}
