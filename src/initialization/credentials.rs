//! Credential loading.
//!
//! Secrets come from `--keys` (or the `KEY_GOVERNOR_KEYS` environment variable,
//! which clap folds into the same option) and from `--keys-file`. Both sources
//! are merged in that order; the pool drops duplicates.

use std::path::Path;

use crate::config::Config;
use crate::error_handling::InitializationError;

/// Splits a comma-separated credential list, dropping blanks.
pub fn parse_credential_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads one credential per line. Blank lines and lines starting with `#` are
/// skipped.
///
/// # Errors
///
/// Returns `InitializationError::CredentialFileError` if the file cannot be read.
pub fn parse_credential_file(path: &Path) -> Result<Vec<String>, InitializationError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Collects every configured credential, in configuration order.
///
/// An empty result is not an error here; the governor reports it when the
/// first request asks for a credential.
///
/// # Errors
///
/// Returns `InitializationError::CredentialFileError` if `--keys-file` is set
/// but cannot be read.
pub fn load_credentials(config: &Config) -> Result<Vec<String>, InitializationError> {
    let mut secrets = config
        .keys
        .as_deref()
        .map(parse_credential_list)
        .unwrap_or_default();

    if let Some(path) = &config.keys_file {
        let from_file = parse_credential_file(path)?;
        log::debug!(
            "Loaded {} credential(s) from {}",
            from_file.len(),
            path.display()
        );
        secrets.extend(from_file);
    }

    log::info!("Loaded {} credential(s)", secrets.len());
    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_credential_list() {
        assert_eq!(
            parse_credential_list(" key-a , ,key-b,"),
            vec!["key-a".to_string(), "key-b".to_string()]
        );
        assert!(parse_credential_list("").is_empty());
    }

    #[test]
    fn test_parse_credential_file_skips_comments() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "# production keys").unwrap();
        writeln!(file, "key-one").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  key-two  ").unwrap();

        let secrets = parse_credential_file(file.path()).unwrap();
        assert_eq!(secrets, vec!["key-one".to_string(), "key-two".to_string()]);
    }

    #[test]
    fn test_parse_credential_file_missing() {
        let result = parse_credential_file(Path::new("/definitely/not/here/keys.txt"));
        assert!(matches!(
            result,
            Err(InitializationError::CredentialFileError(_))
        ));
    }

    #[test]
    fn test_load_credentials_merges_sources() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "key-from-file").unwrap();

        let config = Config {
            keys: Some("key-a,key-b".to_string()),
            keys_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(
            load_credentials(&config).unwrap(),
            vec![
                "key-a".to_string(),
                "key-b".to_string(),
                "key-from-file".to_string()
            ]
        );
    }

    #[test]
    fn test_load_credentials_none_configured() {
        let config = Config::default();
        assert!(load_credentials(&config).unwrap().is_empty());
    }
}
