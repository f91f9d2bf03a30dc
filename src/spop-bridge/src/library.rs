//! Write-once catalog cache filled from the startup `ls` exchange.

use crate::error::BridgeError;
use serde_json::{Map, Value};
use spop_core::LibraryEntry;
use std::sync::Arc;
use tokio::sync::watch;

type Slot = Option<Arc<Vec<LibraryEntry>>>;

/// Read side of the library. Readers wait until the cache has been filled.
#[derive(Debug, Clone)]
pub struct LibraryCache {
    slot: watch::Receiver<Slot>,
}

/// Write side; consumed by the single fill.
#[derive(Debug)]
pub struct LibraryWriter {
    slot: watch::Sender<Slot>,
}

pub fn library_slot() -> (LibraryWriter, LibraryCache) {
    let (tx, rx) = watch::channel(None);
    (LibraryWriter { slot: tx }, LibraryCache { slot: rx })
}

impl LibraryWriter {
    pub fn fill(self, entries: Vec<LibraryEntry>) {
        self.slot.send_replace(Some(Arc::new(entries)));
    }
}

impl LibraryCache {
    pub fn is_ready(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Snapshot of every entry, once the cache is filled. If the writer is
    /// dropped without filling, the library is empty.
    pub async fn entries(&self) -> Vec<LibraryEntry> {
        self.wait().await.map(|e| e.to_vec()).unwrap_or_default()
    }

    pub async fn get(&self, key: &str) -> Option<LibraryEntry> {
        self.wait()
            .await?
            .iter()
            .find(|entry| entry.key == key)
            .cloned()
    }

    async fn wait(&self) -> Option<Arc<Vec<LibraryEntry>>> {
        let mut slot = self.slot.clone();
        let filled = slot.wait_for(Option::is_some).await.ok()?;
        filled.clone()
    }
}

/// Flatten an `ls` response into entries.
///
/// spop answers with `{"playlists": [...]}`, where folders carry their own
/// nested `playlists`. Folders are descended into, not listed. Entries are
/// keyed by the daemon's `index` when present, else by their position in the
/// listing.
pub fn parse_listing(response: &str) -> Result<Vec<LibraryEntry>, BridgeError> {
    let value: Value =
        serde_json::from_str(response).map_err(|err| BridgeError::Listing(err.to_string()))?;
    let items = value
        .get("playlists")
        .and_then(Value::as_array)
        .ok_or_else(|| BridgeError::Listing("missing `playlists` array".into()))?;

    let mut entries = Vec::new();
    flatten_into(items, "", &mut entries);
    Ok(entries)
}

fn flatten_into(items: &[Value], prefix: &str, entries: &mut Vec<LibraryEntry>) {
    for (position, item) in items.iter().enumerate() {
        let Value::Object(record) = item else {
            continue;
        };
        if let Some(children) = record.get("playlists").and_then(Value::as_array) {
            flatten_into(children, &format!("{prefix}{position}/"), entries);
            continue;
        }
        entries.push(LibraryEntry::new(entry_key(record, prefix, position), record.clone()));
    }
}

fn entry_key(record: &Map<String, Value>, prefix: &str, position: usize) -> String {
    match record.get("index").and_then(Value::as_u64) {
        Some(index) => index.to_string(),
        None => format!("{prefix}{position}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const LISTING: &str = r#"{"playlists":[
        {"type":"playlist","index":0,"name":"Starred","tracks":40,"offline":false},
        {"type":"folder","name":"Moods","playlists":[
            {"type":"playlist","index":1,"name":"Calm","tracks":12,"offline":true},
            {"type":"playlist","name":"Loud","tracks":3}
        ]}
    ]}"#;

    #[test]
    fn listing_is_flattened() {
        let entries = parse_listing(LISTING).unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["0", "1", "1/1"]);
        assert_eq!(entries[1].name(), Some("Calm"));
        assert_eq!(entries[2].kind(), Some("playlist"));
    }

    #[test]
    fn listing_without_playlists_is_rejected() {
        assert!(matches!(
            parse_listing(r#"{"error":"not logged in"}"#),
            Err(BridgeError::Listing(_))
        ));
        assert!(parse_listing("garbage").is_err());
    }

    #[tokio::test]
    async fn readers_wait_for_fill() {
        let (writer, cache) = library_slot();
        assert!(!cache.is_ready());

        let reader = cache.clone();
        let pending = tokio::spawn(async move { reader.entries().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        writer.fill(parse_listing(LISTING).unwrap());
        assert_eq!(pending.await.unwrap().len(), 3);
        assert!(cache.is_ready());
        let starred = cache.get("0").await.unwrap();
        assert_eq!(starred.name(), Some("Starred"));
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn dropped_writer_means_empty_library() {
        let (writer, cache) = library_slot();
        drop(writer);
        assert!(cache.entries().await.is_empty());
    }
}
