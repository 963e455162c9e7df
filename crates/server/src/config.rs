use std::{collections::HashMap, fs, path::PathBuf};

#[derive(Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub archive_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".into(),
            data_dir: PathBuf::from("./data"),
            archive_interval_secs: 60,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.bind_addr = v.clone();
            }
            if let Some(v) = file_cfg.get("data_dir") {
                settings.data_dir = PathBuf::from(v);
            }
            if let Some(v) = file_cfg.get("archive_interval_secs") {
                if let Ok(parsed) = v.parse::<u64>() {
                    settings.archive_interval_secs = parsed;
                }
            }
        }
    }

    if let Ok(v) = std::env::var("REVIEW_BIND") {
        settings.bind_addr = v;
    }
    if let Ok(v) = std::env::var("REVIEW_DATA_DIR") {
        settings.data_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("REVIEW_ARCHIVE_INTERVAL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.archive_interval_secs = parsed;
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
