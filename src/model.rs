// Data model: announcements and the snapshot persisted between passes.
// Ids match the ones earlier deployments wrote to the same data file.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// One link from the notice board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub url: String,
    pub scraped_at: String,
    #[serde(default)]
    pub is_new: bool,
}

impl Announcement {
    pub fn new(title: String, url: String, scraped_at: String) -> Self {
        Announcement {
            id: announcement_id(&title, &url),
            title,
            url,
            scraped_at,
            is_new: true,
        }
    }
}

/// Stable identity of an announcement: the first 16 hex digits of
/// MD5 over `"{title}_{url}"`.
pub fn announcement_id(title: &str, url: &str) -> String {
    let digest = Md5::digest(format!("{title}_{url}").as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Contents of the data file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub announcements: Vec<Announcement>,
    pub last_check: String,
    pub total_count: usize,
}

impl Snapshot {
    /// Announcements from `current` whose id is not stored yet, in page order.
    pub fn unseen<'a>(&self, current: &'a [Announcement]) -> Vec<&'a Announcement> {
        let known: std::collections::HashSet<&str> =
            self.announcements.iter().map(|a| a.id.as_str()).collect();
        current
            .iter()
            .filter(|a| !known.contains(a.id.as_str()))
            .collect()
    }

    /// Append `fresh`, keep only the newest `max` entries and stamp the check time.
    pub fn merge(&mut self, fresh: Vec<Announcement>, max: usize, checked_at: String) {
        self.announcements.extend(fresh);
        if self.announcements.len() > max {
            let excess = self.announcements.len() - max;
            self.announcements.drain(..excess);
        }
        self.last_check = checked_at;
        self.total_count = self.announcements.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(title: &str) -> Announcement {
        Announcement::new(title.into(), format!("https://x/{title}"), "t".into())
    }

    #[test]
    fn id_is_sixteen_hex_digits_and_stable() {
        let a = announcement_id("关于职称评审的通知", "https://x/1.html");
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, announcement_id("关于职称评审的通知", "https://x/1.html"));
        assert_ne!(a, announcement_id("关于职称评审的通知", "https://x/2.html"));
    }

    #[test]
    fn id_matches_existing_data_files() {
        // hashlib.md5("关于职称评审的通知_https://x/1.html".encode()).hexdigest()[:16]
        assert_eq!(
            announcement_id("关于职称评审的通知", "https://x/1.html"),
            "9d2d7553121b6cb6"
        );
    }

    #[test]
    fn unseen_skips_known_ids() {
        let stored = Snapshot {
            announcements: vec![ann("a")],
            ..Snapshot::default()
        };
        let current = vec![ann("a"), ann("b")];
        let fresh = stored.unseen(&current);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].title, "b");
    }

    #[test]
    fn merge_keeps_newest_entries() {
        let mut snap = Snapshot {
            announcements: vec![ann("a"), ann("b")],
            ..Snapshot::default()
        };
        snap.merge(vec![ann("c"), ann("d")], 3, "now".into());
        let titles: Vec<_> = snap.announcements.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["b", "c", "d"]);
        assert_eq!(snap.total_count, 3);
        assert_eq!(snap.last_check, "now");
    }

    #[test]
    fn reads_file_without_is_new() {
        let json = r#"{"announcements":[{"id":"1","title":"t","url":"u","scraped_at":"s"}],"last_check":"x","total_count":1}"#;
        let snap: Snapshot = serde_json::from_str(json).unwrap();
        assert!(!snap.announcements[0].is_new);
    }
}
