//! Persistence for learned MIDI mappings
//!
//! The only state this application writes to disk: a flat key=label file
//! under the platform config directory. Keys are physical control
//! addresses, labels are target slot names; everything else (cues, BPM,
//! audio) is deliberately not persisted.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::mapping::{ControlKey, ControlTarget, LearnedBinding, MappingTable};

/// File-backed store of learned bindings.
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    /// Store at the platform default location.
    pub fn new() -> Self {
        Self::at(Self::default_path())
    }

    /// Store at an explicit path.
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location under the platform config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tandem")
            .join("mappings.txt")
    }

    /// Load all persisted bindings. Missing or unreadable files yield an
    /// empty map.
    pub fn load(&self) -> HashMap<String, String> {
        fs::read_to_string(&self.path)
            .map(|content| Self::parse(&content))
            .unwrap_or_default()
    }

    /// Persist the given bindings, replacing the file.
    pub fn save(&self, entries: &HashMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, Self::serialize(entries))
    }

    /// Record one freshly learned binding on top of what is stored.
    pub fn record(&self, binding: &LearnedBinding) -> io::Result<()> {
        let mut entries = self.load();
        entries.insert(
            binding.key.to_store_key(),
            binding.target.slot_name(),
        );
        self.save(&entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> HashMap<String, String> {
        let mut entries = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, label)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), label.trim().to_string());
            }
        }
        entries
    }

    fn serialize(entries: &HashMap<String, String>) -> String {
        let mut lines = vec!["# Tandem learned MIDI mappings".to_string()];
        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort();
        for (key, label) in sorted {
            lines.push(format!("{key}={label}"));
        }
        lines.join("\n")
    }
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-apply persisted bindings on top of a table. Entries that no longer
/// parse are skipped with a warning rather than failing startup.
pub fn apply_learned(table: &mut MappingTable, entries: &HashMap<String, String>) {
    for (key, label) in entries {
        match (
            ControlKey::from_store_key(key),
            ControlTarget::from_slot_name(label),
        ) {
            (Some(key), Some(target)) => table.apply(key, target),
            _ => tracing::warn!(%key, %label, "ignoring unparseable stored mapping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ControlAction;
    use crate::input::MidiEvent;
    use tandem_audio::DeckId;

    fn temp_store(name: &str) -> MappingStore {
        let path = std::env::temp_dir().join(format!(
            "tandem-mappings-{name}-{}.txt",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        MappingStore::at(path)
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let entries =
            MappingStore::parse("# header\n\nnote:0:11=deck_a.play\n  cc:1:19 = deck_b.volume ");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["note:0:11"], "deck_a.play");
        assert_eq!(entries["cc:1:19"], "deck_b.volume");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut entries = HashMap::new();
        entries.insert("note:2:32".to_string(), "deck_b.sync".to_string());
        entries.insert("bend:0".to_string(), "deck_a.tempo".to_string());

        let parsed = MappingStore::parse(&MappingStore::serialize(&entries));
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let store = temp_store("missing");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_record_and_reload() {
        let store = temp_store("record");
        let binding = LearnedBinding {
            key: ControlKey::Note {
                channel: 2,
                note: 0x21,
            },
            target: ControlTarget::Sync(DeckId::B),
        };
        store.record(&binding).unwrap();

        let entries = store.load();
        assert_eq!(entries["note:2:33"], "deck_b.sync");
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn test_apply_learned_rebinds_table() {
        let mut entries = HashMap::new();
        entries.insert("note:4:16".to_string(), "deck_a.play".to_string());
        entries.insert("garbage".to_string(), "nonsense".to_string());

        let mut table = MappingTable::reference_device();
        apply_learned(&mut table, &entries);

        assert_eq!(
            table.map_event(&MidiEvent::NoteOn {
                channel: 4,
                note: 16,
                velocity: 127
            }),
            Some(ControlAction::TogglePlayPause(DeckId::A))
        );
    }
}
