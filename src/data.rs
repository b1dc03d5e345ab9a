use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::quiz::QuizResult;

/// Last score per character, as kept between runs.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Data {
    #[serde(default)]
    pub results: HashMap<String, u32>,
}

impl Data {
    pub fn record(&mut self, result: &QuizResult) {
        self.results.insert(result.character.clone(), result.score);
    }
}

pub fn data_path() -> anyhow::Result<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join("hanzidrill"));
    }
    let mut home = PathBuf::from(std::env::var("HOME")?);
    home.push(".local/share/hanzidrill");
    Ok(home)
}

pub fn open_data(dir: &Path) -> anyhow::Result<File> {
    std::fs::create_dir_all(dir)?;
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.join("results.json"))?)
}

pub fn load_data(file: &mut File) -> Data {
    serde_json::from_reader(file).unwrap_or_else(|_| Data::default())
}

pub fn save_data(file: &mut File, data: &Data) -> anyhow::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    serde_json::to_writer(&mut *file, data)?;
    file.sync_data()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn saving_and_loading() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = open_data(dir.path()).unwrap();
        assert_eq!(load_data(&mut file), Data::default());

        let mut data = Data::default();
        data.record(&QuizResult::completed("十", 1));
        data.record(&QuizResult::completed("大", 0));
        data.record(&QuizResult::cancelled("大", 10));
        save_data(&mut file, &data).unwrap();

        let mut file = open_data(dir.path()).unwrap();
        let loaded = load_data(&mut file);
        assert_eq!(loaded.results["十"], 95);
        assert_eq!(loaded.results["大"], 0);
    }

    #[test]
    pub fn shorter_save_leaves_no_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = open_data(dir.path()).unwrap();
        let mut data = Data::default();
        for c in ["一", "二", "三", "四"] {
            data.record(&QuizResult::completed(c, 0));
        }
        save_data(&mut file, &data).unwrap();
        save_data(&mut file, &Data::default()).unwrap();

        let mut file = open_data(dir.path()).unwrap();
        assert_eq!(load_data(&mut file), Data::default());
    }
}
