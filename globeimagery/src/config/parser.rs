//! INI parsing logic for converting `Ini` → `ConfigFile`.

use ini::Ini;

use super::file::{ConfigFile, ConfigFileError};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [provider] section
    if let Some(section) = ini.section(Some("provider")) {
        if let Some(v) = section.get("url") {
            let v = v.trim();
            if !v.is_empty() {
                config.provider.url = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("channel") {
            let v = v.trim();
            config.provider.channel = Some(v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "provider".to_string(),
                key: "channel".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer".to_string(),
            })?);
        }
        // An empty path is meaningful: the server has no path segment.
        if let Some(v) = section.get("path") {
            config.provider.path = Some(v.trim().to_string());
        }
        if let Some(v) = section.get("proxy") {
            let v = v.trim();
            if !v.is_empty() {
                config.provider.proxy = Some(v.to_string());
            }
        }
    }

    // [http] section
    if let Some(section) = ini.section(Some("http")) {
        if let Some(v) = section.get("timeout") {
            let v = v.trim();
            config.http.timeout = match v.parse() {
                Ok(timeout) if timeout > 0 => timeout,
                _ => {
                    return Err(ConfigFileError::InvalidValue {
                        section: "http".to_string(),
                        key: "timeout".to_string(),
                        value: v.to_string(),
                        reason: "must be a positive integer (seconds)".to_string(),
                    });
                }
            };
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ConfigFile, ConfigFileError> {
        parse_ini(&Ini::load_from_str(text).unwrap())
    }

    #[test]
    fn test_parses_all_keys() {
        let config = parse(
            "[provider]\nurl = http://example.invalid\nchannel = 1234\npath = /maps\nproxy = /proxy/\n\n[http]\ntimeout = 10\n",
        )
        .unwrap();

        assert_eq!(config.provider.url.as_deref(), Some("http://example.invalid"));
        assert_eq!(config.provider.channel, Some(1234));
        assert_eq!(config.provider.path.as_deref(), Some("/maps"));
        assert_eq!(config.provider.proxy.as_deref(), Some("/proxy/"));
        assert_eq!(config.http.timeout, 10);
    }

    #[test]
    fn test_empty_path_is_kept() {
        let config = parse("[provider]\npath =\n").unwrap();
        assert_eq!(config.provider.path.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_url_is_unset() {
        let config = parse("[provider]\nurl =\n").unwrap();
        assert!(config.provider.url.is_none());
    }

    #[test]
    fn test_invalid_channel() {
        let err = parse("[provider]\nchannel = imagery\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "channel"
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse("[http]\ntimeout = 0\n").unwrap_err();
        assert!(err.to_string().contains("http.timeout"));
    }

    #[test]
    fn test_unknown_sections_ignored() {
        let config = parse("[other]\nkey = value\n").unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}
