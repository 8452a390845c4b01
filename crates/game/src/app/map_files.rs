use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tileclient_engine::{MapError, MapStore};
use tracing::debug;

/// Map persistence backed by one JSON file. Saves are written to a sibling
/// temp file first, so a failed write leaves the previous map in place.
#[derive(Debug, Clone)]
pub(crate) struct JsonMapStore {
    path: PathBuf,
}

impl JsonMapStore {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl MapStore for JsonMapStore {
    fn load(&mut self) -> Result<String, MapError> {
        let raw = fs::read_to_string(&self.path).map_err(|error| store_error(&self.path, error))?;
        debug!(path = %self.path.display(), bytes = raw.len(), "map_file_read");
        Ok(raw)
    }

    fn save(&mut self, json: &str) -> Result<(), MapError> {
        write_text_atomic(&self.path, json).map_err(|error| store_error(&self.path, error))?;
        debug!(path = %self.path.display(), bytes = json.len(), "map_file_written");
        Ok(())
    }
}

fn store_error(path: &Path, error: io::Error) -> MapError {
    MapError::Store(Box::new(io::Error::new(
        error.kind(),
        format!("{}: {error}", path.display()),
    )))
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }
    }
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("map.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tileclient_engine::TileMap;

    #[test]
    fn saved_map_loads_back_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonMapStore::new(dir.path().join("maps").join("map.json"));
        let mut map = TileMap::filled(4, 2, 32, 0);
        map.set_tile(3, 1, 5);

        store.save(&map.to_json().expect("json")).expect("save");
        assert!(!temp_path_for(store.path()).exists());

        let mut restored = TileMap::filled(4, 2, 32, 9);
        restored
            .replace_from_json(&store.load().expect("load"))
            .expect("replace");
        assert_eq!(restored.tiles(), map.tiles());
    }

    #[test]
    fn save_overwrites_previous_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonMapStore::new(dir.path().join("map.json"));
        store.save("[1,2,3]").expect("first");
        store.save("[4,5,6]").expect("second");
        assert_eq!(store.load().expect("load"), "[4,5,6]");
    }

    #[test]
    fn missing_file_is_a_store_error_naming_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonMapStore::new(dir.path().join("absent.json"));
        let error = store.load().unwrap_err();
        assert!(matches!(error, MapError::Store(_)));
        assert!(error.to_string().contains("absent.json"));
    }
}
