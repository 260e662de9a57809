//! Run settings read from the environment.
//!
//! A `.env` file is loaded by the binary before [`AppConfig::from_env`] is
//! called. Every setting has a default except the FTP block, which is only
//! built when `FTP_HOST` is set.

use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::models::SourceKind;
use crate::parser::InputDelimiter;
use crate::transform::OutputOptions;

/// FTP endpoint of the mainframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Remote directory (dataset prefix) to change into after login
    pub remote_dir: Option<String>,
    pub passive: bool,
    pub timeout: Duration,
}

/// Where outputs are delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Copy into a mounted directory
    Directory(PathBuf),
    Ftp(FtpConfig),
    /// Nothing configured: only log
    DryRun,
}

/// Settings of a migration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub input_dir_xlsx: PathBuf,
    pub input_dir_csv: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub schemas_file: PathBuf,
    pub replacements_file: PathBuf,
    pub input_kind: SourceKind,
    #[serde(skip)]
    pub input_delimiter: InputDelimiter,
    pub output: OutputOptions,
    /// Keep source files after a successful run
    pub keep_input: bool,
    pub skip_upload: bool,
    pub upload_retries: u32,
    /// Deliver into this directory instead of FTP
    pub delivery_dir: Option<PathBuf>,
    pub ftp: Option<FtpConfig>,
}

impl AppConfig {
    /// Read settings from process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let path = |name: &str, default: &str| PathBuf::from(get(name).unwrap_or_else(|| default.to_string()));

        let input_kind = match get("INPUT_KIND") {
            Some(value) => SourceKind::from_setting(&value)
                .ok_or_else(|| invalid("INPUT_KIND", &value, "expected 'xlsx' or 'csv'"))?,
            None => SourceKind::Xlsx,
        };

        let input_delimiter = match get("INPUT_DELIMITER") {
            Some(value) => InputDelimiter::from_setting(&value).ok_or_else(|| {
                invalid("INPUT_DELIMITER", &value, "expected one ASCII character or 'auto'")
            })?,
            None => InputDelimiter::default(),
        };

        let output = OutputOptions {
            delimiter: match get("OUTPUT_DELIMITER") {
                Some(value) => parse_delimiter("OUTPUT_DELIMITER", &value)?,
                None => OutputOptions::default().delimiter,
            },
            decimal_separator: match get("DECIMAL_SEPARATOR") {
                Some(value) => parse_decimal_separator(&value)?,
                None => OutputOptions::default().decimal_separator,
            },
        };
        if char::from(output.delimiter) == output.decimal_separator {
            return Err(invalid(
                "DECIMAL_SEPARATOR",
                &output.decimal_separator.to_string(),
                "must differ from OUTPUT_DELIMITER",
            ));
        }

        let ftp = match get("FTP_HOST") {
            Some(host) => Some(FtpConfig {
                host,
                port: parse_number(&get, "FTP_PORT", 21)?,
                user: get("FTP_USER").unwrap_or_else(|| "anonymous".to_string()),
                password: get("FTP_PASSWORD").unwrap_or_default(),
                remote_dir: get("FTP_REMOTE_DIR"),
                passive: parse_bool(&get, "FTP_PASSIVE", true)?,
                timeout: Duration::from_secs(parse_number(&get, "FTP_TIMEOUT", 30)?),
            }),
            None => None,
        };

        Ok(Self {
            input_dir_xlsx: path("INPUT_DIR_XLSX", "input_xlsx"),
            input_dir_csv: path("INPUT_DIR_CSV", "input_csv"),
            output_dir: path("OUTPUT_DIR", "output"),
            log_dir: path("LOG_DIR", "logs"),
            schemas_file: path("SCHEMAS_FILE", "config/schemas.json"),
            replacements_file: path("REPLACEMENTS_FILE", "config/replacements.json"),
            input_kind,
            input_delimiter,
            output,
            keep_input: parse_bool(&get, "KEEP_INPUT", true)?,
            skip_upload: parse_bool(&get, "SKIP_UPLOAD", false)?,
            upload_retries: parse_number(&get, "UPLOAD_RETRIES", 3)?,
            delivery_dir: get("DELIVERY_DIR").map(PathBuf::from),
            ftp,
        })
    }

    /// Input directory of the selected mode.
    pub fn input_dir(&self) -> &PathBuf {
        match self.input_kind {
            SourceKind::Xlsx => &self.input_dir_xlsx,
            SourceKind::Csv => &self.input_dir_csv,
        }
    }

    /// Delivery target: a delivery directory wins over FTP.
    pub fn destination(&self) -> Destination {
        match (&self.delivery_dir, &self.ftp) {
            (Some(dir), _) => Destination::Directory(dir.clone()),
            (None, Some(ftp)) => Destination::Ftp(ftp.clone()),
            (None, None) => Destination::DryRun,
        }
    }
}

fn invalid(name: &str, value: &str, message: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name: name.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

/// A delimiter is one ASCII character; `\t` and `TAB` name a tab.
fn parse_delimiter(name: &str, value: &str) -> ConfigResult<u8> {
    match value {
        "\\t" | "TAB" | "tab" => return Ok(b'\t'),
        _ => {}
    }
    let bytes = value.as_bytes();
    if bytes.len() != 1 || !bytes[0].is_ascii() || matches!(bytes[0], b'"' | b'\n' | b'\r') {
        return Err(invalid(name, value, "expected a single ASCII character other than '\"'"));
    }
    Ok(bytes[0])
}

fn parse_decimal_separator(value: &str) -> ConfigResult<char> {
    match value {
        "." => Ok('.'),
        "," => Ok(','),
        _ => Err(invalid("DECIMAL_SEPARATOR", value, "expected '.' or ','")),
    }
}

fn parse_bool<G>(get: &G, name: &str, default: bool) -> ConfigResult<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "si" | "s" => Ok(true),
            "false" | "0" | "no" | "n" => Ok(false),
            _ => Err(invalid(name, &value, "expected true or false")),
        },
    }
}

fn parse_number<G, N>(get: &G, name: &str, default: N) -> ConfigResult<N>
where
    G: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| invalid(name, &value, "expected a non-negative number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ConfigResult<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.input_kind, SourceKind::Xlsx);
        assert_eq!(cfg.input_dir(), &PathBuf::from("input_xlsx"));
        assert_eq!(cfg.output.delimiter, b'|');
        assert_eq!(cfg.output.decimal_separator, '.');
        assert_eq!(cfg.input_delimiter, InputDelimiter::Fixed(b';'));
        assert!(cfg.keep_input);
        assert!(!cfg.skip_upload);
        assert_eq!(cfg.upload_retries, 3);
        assert!(cfg.ftp.is_none());
        assert_eq!(cfg.destination(), Destination::DryRun);
    }

    #[test]
    fn test_destination_selection() {
        let cfg = config(&[("FTP_HOST", "mainframe.local")]).unwrap();
        assert!(matches!(cfg.destination(), Destination::Ftp(ftp) if ftp.host == "mainframe.local"));

        let cfg = config(&[("FTP_HOST", "mainframe.local"), ("DELIVERY_DIR", "/mnt/mvs")]).unwrap();
        assert_eq!(cfg.destination(), Destination::Directory(PathBuf::from("/mnt/mvs")));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("INPUT_KIND", "CSV"),
            ("INPUT_DIR_CSV", "/data/in"),
            ("INPUT_DELIMITER", "auto"),
            ("OUTPUT_DELIMITER", ";"),
            ("DECIMAL_SEPARATOR", ","),
            ("KEEP_INPUT", "false"),
            ("FTP_HOST", "mainframe.local"),
            ("FTP_PORT", "2121"),
            ("FTP_USER", "cpq"),
            ("FTP_PASSIVE", "no"),
        ])
        .unwrap();
        assert_eq!(cfg.input_kind, SourceKind::Csv);
        assert_eq!(cfg.input_dir(), &PathBuf::from("/data/in"));
        assert_eq!(cfg.input_delimiter, InputDelimiter::Auto);
        assert_eq!(cfg.output.delimiter, b';');
        assert_eq!(cfg.output.decimal_separator, ',');
        assert!(!cfg.keep_input);

        let ftp = cfg.ftp.unwrap();
        assert_eq!(ftp.port, 2121);
        assert_eq!(ftp.user, "cpq");
        assert!(!ftp.passive);
        assert_eq!(ftp.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let cfg = config(&[("OUTPUT_DIR", "  "), ("FTP_HOST", "")]).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("output"));
        assert!(cfg.ftp.is_none());
    }

    #[test]
    fn test_invalid_settings() {
        for pairs in [
            vec![("OUTPUT_DELIMITER", "||")],
            vec![("INPUT_DELIMITER", "\"")],
            vec![("DECIMAL_SEPARATOR", ";")],
            vec![("OUTPUT_DELIMITER", ","), ("DECIMAL_SEPARATOR", ",")],
            vec![("INPUT_KIND", "pdf")],
            vec![("KEEP_INPUT", "maybe")],
            vec![("FTP_HOST", "h"), ("FTP_PORT", "http")],
        ] {
            let err = config(&pairs).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidSetting { .. }), "{:?}", pairs);
        }
    }

    #[test]
    fn test_tab_delimiter() {
        let cfg = config(&[("OUTPUT_DELIMITER", "\\t")]).unwrap();
        assert_eq!(cfg.output.delimiter, b'\t');
    }
}
