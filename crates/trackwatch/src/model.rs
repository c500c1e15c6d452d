//! Playlist snapshot model.

use serde::{Deserialize, Serialize};

/// A playlist as observed in one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub external_link: String,
    /// Items in playlist order. Duplicates are tolerated.
    pub tracks: Vec<Item>,
}

impl Snapshot {
    /// Storage key for this playlist: `"{name}.json"`.
    ///
    /// Renaming the playlist orphans the previous key.
    pub fn storage_key(&self) -> String {
        storage_key(&self.name)
    }
}

/// Storage key for a playlist name.
pub fn storage_key(name: &str) -> String {
    format!("{name}.json")
}

/// A track in a playlist. Identity is `item_id` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub title: String,
    pub artist_names: Vec<String>,
    pub external_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_uses_name() {
        let snapshot = Snapshot {
            id: "37i9dQZF1DXcBWIGoYBM5M".to_string(),
            name: "Today's Top Hits".to_string(),
            external_link: "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M".to_string(),
            tracks: Vec::new(),
        };
        assert_eq!(snapshot.storage_key(), "Today's Top Hits.json");
    }

    #[test]
    fn test_added_by_is_optional_on_disk() {
        let json = r#"{
            "item_id": "t1",
            "title": "Song",
            "artist_names": ["A", "B"],
            "external_link": "https://open.spotify.com/track/t1"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.added_by_id, None);
        assert_eq!(item.artist_names, vec!["A", "B"]);

        let encoded = serde_json::to_string(&item).unwrap();
        assert!(!encoded.contains("added_by_id"));
    }
}
