use std::collections::BTreeSet;

use {
    postwatch_common::{Post, SubscriberId},
    postwatch_subscribers::{Snapshot, SubscriberConfig},
};

/// Subscribers that should receive `post`.
///
/// A subscriber matches when it is active, follows the post's channel
/// (exact `@handle`), and at least one of its keywords occurs in the body,
/// ignoring case. Posts without a body or without a public handle match
/// nobody. Blank keywords are ignored.
pub fn match_post(post: &Post, snapshot: &Snapshot) -> BTreeSet<SubscriberId> {
    let Some(handle) = post.channel_handle.as_deref() else {
        return BTreeSet::new();
    };
    if post.body_text.trim().is_empty() {
        return BTreeSet::new();
    }
    let body = post.body_text.to_lowercase();

    snapshot
        .iter()
        .filter(|(_, sub)| wants(sub, handle, &body))
        .map(|(id, _)| *id)
        .collect()
}

fn wants(sub: &SubscriberConfig, handle: &str, lowered_body: &str) -> bool {
    sub.active
        && sub.channels.contains(handle)
        && sub.keywords.iter().any(|kw| {
            let kw = kw.trim();
            !kw.is_empty() && lowered_body.contains(&kw.to_lowercase())
        })
}
