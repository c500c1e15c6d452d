//! Snapshot differencing.

use std::collections::HashMap;

use crate::model::{Item, Snapshot};

/// Items present in `current` whose id does not appear in `previous`.
///
/// Each new id is reported once; with duplicate ids the last occurrence in
/// `current` wins. Order is unspecified.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<Item> {
    let known = index(previous);

    index(current)
        .into_iter()
        .filter(|(id, _)| !known.contains_key(id))
        .map(|(_, item)| item.clone())
        .collect()
}

fn index(snapshot: &Snapshot) -> HashMap<&str, &Item> {
    snapshot
        .tracks
        .iter()
        .map(|item| (item.item_id.as_str(), item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn item(id: &str) -> Item {
        Item {
            item_id: id.to_string(),
            title: format!("title {id}"),
            artist_names: vec!["artist".to_string()],
            external_link: format!("https://open.spotify.com/track/{id}"),
            added_by_id: None,
        }
    }

    fn snapshot(ids: &[&str]) -> Snapshot {
        Snapshot {
            id: "p".to_string(),
            name: "Mix".to_string(),
            external_link: "https://open.spotify.com/playlist/p".to_string(),
            tracks: ids.iter().map(|id| item(id)).collect(),
        }
    }

    fn ids(items: &[Item]) -> HashSet<String> {
        items.iter().map(|i| i.item_id.clone()).collect()
    }

    #[test]
    fn test_identical_snapshots_have_no_diff() {
        let s = snapshot(&["a", "b", "c"]);
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn test_new_ids_are_reported() {
        let previous = snapshot(&["a", "b"]);
        let current = snapshot(&["a", "b", "c", "d"]);

        let added = diff(&previous, &current);
        assert_eq!(ids(&added), HashSet::from(["c".to_string(), "d".to_string()]));
    }

    #[test]
    fn test_removed_ids_are_ignored() {
        let previous = snapshot(&["a", "b", "c"]);
        let current = snapshot(&["b"]);
        assert!(diff(&previous, &current).is_empty());
    }

    #[test]
    fn test_reordering_is_not_a_change() {
        let previous = snapshot(&["a", "b", "c"]);
        let current = snapshot(&["c", "a", "b"]);
        assert!(diff(&previous, &current).is_empty());
    }

    #[test]
    fn test_empty_previous_reports_everything() {
        let previous = snapshot(&[]);
        let current = snapshot(&["a", "b"]);
        assert_eq!(ids(&diff(&previous, &current)).len(), 2);
    }

    #[test]
    fn test_duplicates_reported_once_last_wins() {
        let previous = snapshot(&[]);
        let mut current = snapshot(&["a", "a"]);
        current.tracks[1].title = "second".to_string();

        let added = diff(&previous, &current);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].title, "second");
    }

    #[test]
    fn test_identity_is_by_id_only() {
        let previous = snapshot(&["a"]);
        let mut current = snapshot(&["a"]);
        current.tracks[0].title = "renamed".to_string();
        assert!(diff(&previous, &current).is_empty());
    }
}
