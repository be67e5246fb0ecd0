use crate::*;
use anyhow::Result;
use config::EngineConfig;
use std::fs;
use std::path::Path;

/// Config with a large flush threshold and automatic compaction off.
pub fn quiet_config(dir: &Path) -> EngineConfig {
    EngineConfig::builder()
        .dir(dir)
        .flush_threshold(1024 * 1024)
        .compaction_trigger(0)
        .build()
        .unwrap()
}

pub fn open(dir: &Path) -> Result<Engine> {
    Engine::open(quiet_config(dir))
}

pub fn open_with(dir: &Path, flush_threshold: usize, compaction_trigger: usize) -> Result<Engine> {
    let config = EngineConfig::builder()
        .dir(dir)
        .flush_threshold(flush_threshold)
        .compaction_trigger(compaction_trigger)
        .build()?;
    Engine::open(config)
}

pub fn count_dat_files(dir: &Path) -> usize {
    count_with_extension(dir, "dat")
}

pub fn count_tmp_files(dir: &Path) -> usize {
    count_with_extension(dir, "tmp")
}

fn count_with_extension(dir: &Path, ext: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|x| x == ext)
                .unwrap_or(false)
        })
        .count()
}

pub fn scan_strings(engine: &Engine, from: &str) -> Result<Vec<(String, String)>> {
    Ok(engine
        .scan_all(from.as_bytes())?
        .into_iter()
        .map(|(k, v)| {
            (
                String::from_utf8(k).unwrap(),
                String::from_utf8(v).unwrap(),
            )
        })
        .collect())
}

pub fn expect(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn put(engine: &Engine, key: &str, value: &str) -> Result<()> {
    engine.put(key.as_bytes().to_vec(), value.as_bytes().to_vec())
}

pub fn del(engine: &Engine, key: &str) -> Result<()> {
    engine.delete(key.as_bytes().to_vec())
}
