// Reading and writing the state file.

use std::fs;
use std::path::Path;

use log::{debug, info};
use snafu::prelude::*;

use seat_apportionment::store::{ScenarioStore, StoreSnapshot};

use crate::sim::*;

/// Loads the store saved at `path`. A missing file is an empty store.
pub fn load_store(path: &str) -> SimResult<ScenarioStore> {
    if !Path::new(path).exists() {
        info!("load_store: no state file at {:?}, starting empty", path);
        return Ok(ScenarioStore::new());
    }
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let snapshot: StoreSnapshot =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!(
        "load_store: {:?} owners in {:?}",
        snapshot.owners.len(),
        path
    );
    ScenarioStore::restore(&snapshot).context(StoreSnafu {})
}

/// Saves the store. The file is replaced in one step.
pub fn save_store(path: &str, store: &ScenarioStore) -> SimResult<()> {
    let snapshot = store.snapshot();
    let js = serde_json::to_string_pretty(&snapshot).context(SerializingJsonSnafu {})?;
    let tmp_path = format!("{}.tmp", path);
    fs::write(&tmp_path, js).context(WritingStateSnafu { path: tmp_path.as_str() })?;
    fs::rename(&tmp_path, path).context(WritingStateSnafu { path })?;
    debug!("save_store: wrote {:?}", path);
    Ok(())
}
