// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::object_store::ObjectMeta;

/// Outcome of choosing the next batch of containers to aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A prefix of the listing whose total size lies within the window.
    Batch { objects: Vec<ObjectMeta>, size: u64 },
    /// Not enough data yet.
    Wait {
        /// Size of the prefix that was considered.
        size: u64,
        /// The object that didn't fit, if that is what stopped selection.
        blocked_by: Option<ObjectMeta>,
    },
}

/// Takes objects in listing order until their total size reaches `min_size`,
/// never letting it exceed `max_size`. Selection stops at the first object
/// that doesn't fit, and nothing is selected unless `min_size` was reached.
pub fn select_batch(
    listing: impl IntoIterator<Item = ObjectMeta>,
    min_size: u64,
    max_size: u64,
) -> Selection {
    let mut objects = vec![];
    let mut size = 0u64;
    for object in listing {
        let Some(next) = size.checked_add(object.size).filter(|&next| next <= max_size) else {
            return Selection::Wait {
                size,
                blocked_by: Some(object),
            };
        };
        size = next;
        objects.push(object);
        if size >= min_size {
            return Selection::Batch { objects, size };
        }
    }
    Selection::Wait {
        size,
        blocked_by: None,
    }
}
