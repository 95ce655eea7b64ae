//! CSV file sink settings.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::settings::{ConfigError, Settings};

#[derive(Debug, Clone)]
pub struct CsvSettings {
    /// JSON file holding the ShapeDefinition this sink writes.
    pub shape_file: PathBuf,

    /// Output path; see [`out_path`](Self::out_path) for date suffixing.
    pub out: PathBuf,

    pub append_date_to_name: bool,
    pub column_separator: String,
    pub quote_character: Option<String>,
}

impl CsvSettings {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            shape_file: settings.require_str("shape_file")?.into(),
            out: settings.require_str("out")?.into(),
            append_date_to_name: settings.read_bool("append_date_to_name"),
            column_separator: settings
                .read_str("column_separator")
                .unwrap_or(",")
                .to_string(),
            quote_character: settings
                .read_str("quote_character")
                .map(Into::into),
        })
    }

    /// The effective output path. With `append_date_to_name`, a
    /// `YYYYMMDDhhmm` stamp is inserted before the extension.
    pub fn out_path(&self, now: DateTime<Local>) -> PathBuf {
        if !self.append_date_to_name {
            return self.out.clone();
        }
        dated_path(&self.out, now)
    }
}

fn dated_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d%H%M").to_string();
    let s = path.to_string_lossy();
    match s.rfind('.') {
        Some(dot) => PathBuf::from(format!("{}{stamp}{}", &s[..dot], &s[dot..])),
        None => PathBuf::from(format!("{s}{stamp}")),
    }
}
