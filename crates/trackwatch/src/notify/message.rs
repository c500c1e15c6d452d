//! Telegram MarkdownV2 message composition.

use crate::model::{Item, Snapshot};

/// Characters escaped with a backslash. Anything else passes through.
const RESERVED: &[char] = &['_', '*', '[', '`', '-', '(', ')'];

/// Escape the reserved markup characters in `text`.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// First whitespace-separated token of a display name.
pub fn first_name(display_name: &str) -> Option<&str> {
    display_name.split_whitespace().next()
}

/// Build the announcement for a newly added item.
///
/// `added_by` is the resolved first name of whoever added the track.
pub fn compose(item: &Item, snapshot: &Snapshot, added_by: Option<&str>) -> String {
    let title = escape_markdown(&item.title);
    let artists = item
        .artist_names
        .iter()
        .map(|name| escape_markdown(name))
        .collect::<Vec<_>>()
        .join(", ");
    let playlist = escape_markdown(&snapshot.name);

    let mut message = format!(
        "New track 🥳\n\n\
         *{title}* 🎶  [track]({track_link})\n\n\
         By _{artists}_ 🎤\n\n\
         Added to the playlist: {playlist}  [playlist]({playlist_link})\n",
        track_link = item.external_link,
        playlist_link = snapshot.external_link,
    );

    if let Some(name) = added_by {
        message.push_str(&format!("\nAdded by: {}\n", escape_markdown(name)));
    }

    message
}
