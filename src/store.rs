use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;

use crate::Result;
use crate::types::NormalizedHistory;

/// Pretty-prints `value` to `path`, replacing whatever was there.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

/// Reads a saved history. A missing file is not an error.
pub fn load_history(path: &Path) -> Result<Option<NormalizedHistory>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let history: NormalizedHistory = serde_json::from_reader(reader)?;
    Ok(Some(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionRecord, ElementDetails};

    #[test]
    fn history_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let history = NormalizedHistory {
            urls: vec!["https://example.test/login".to_string()],
            detailed_actions: vec![ActionRecord {
                name: "click_element".to_string(),
                sequence_index: 0,
                params: serde_json::json!({"index": 7}),
                element_details: Some(ElementDetails {
                    index: 7,
                    xpath: Some("//button".to_string()),
                }),
            }],
            element_xpaths: [(7, "//button".to_string())].into_iter().collect(),
            execution_date: "2026-10-17 09:30:00".to_string(),
            ..Default::default()
        };

        save_json(&path, &history).unwrap();
        assert_eq!(load_history(&path).unwrap(), Some(history));
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_history(&dir.path().join("absent.json")).unwrap(), None);
    }

    #[test]
    fn save_truncates_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent_history.json");
        save_json(&path, &vec!["a much longer first payload"; 8]).unwrap();
        save_json(&path, &vec!["b"]).unwrap();
        let back: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec!["b"]);
    }
}
