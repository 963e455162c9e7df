use super::Settings;

use std::path::PathBuf;

#[test]
fn defaults_cover_every_setting() {
    let settings = Settings::default();
    assert_eq!(settings.bind_addr, "0.0.0.0:8081");
    assert_eq!(settings.data_dir, PathBuf::from("./data"));
    assert_eq!(settings.archive_interval_secs, 60);
}
