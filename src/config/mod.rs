//! Proxy settings from the `.omcshrc` file
//!
//! Line-oriented `KEY=value` assignments, the keys the proxy consumes:
//! - OMC_LOCALE (passed to the compiler's +locale flag)
//! - OMC_TMPDIR (session temp directory, transcripts and handle files)
//! - OMC_FORCE_DEFAULT_LIBRARIES (prepend Modelica/ModelicaReference)
//! - OMC_LIBRARY_<Name>="version" (libraries loaded at startup)

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Read-only startup inputs for the supervisor and facade
#[derive(Debug, Clone)]
pub struct Settings {
    /// Locale handed to the compiler process
    pub locale: String,
    /// Session temp directory (handle file, transcripts, process output)
    pub temp_dir: PathBuf,
    /// Libraries to load at startup, `(name, version)` sorted by name
    pub libraries: Vec<(String, String)>,
    /// Prepend the default libraries when they are not configured
    pub force_default_libraries: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: "C".to_string(),
            temp_dir: std::env::temp_dir().join("omcproxy"),
            libraries: Vec::new(),
            force_default_libraries: true,
        }
    }
}

impl Settings {
    /// Load settings from `~/.omcshrc`, falling back to defaults
    pub fn from_rc() -> Self {
        Self::from_file(&Self::rc_path()).unwrap_or_default()
    }

    /// Get the path to .omcshrc
    pub fn rc_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".omcshrc")
    }

    /// Parse settings from a specific file
    pub fn from_file(path: &PathBuf) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        Some(Self::parse(&content))
    }

    /// Parse settings from content string
    pub fn parse(content: &str) -> Self {
        let mut settings = Settings::default();
        let mut libraries: HashMap<String, String> = HashMap::new();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);

            if let Some((key, value)) = parse_assignment(line) {
                let value = unquote(&value);

                match key.as_str() {
                    "OMC_LOCALE" => {
                        settings.locale = value;
                    }
                    "OMC_TMPDIR" => {
                        settings.temp_dir = PathBuf::from(value);
                    }
                    "OMC_FORCE_DEFAULT_LIBRARIES" => {
                        settings.force_default_libraries =
                            matches!(value.to_lowercase().as_str(), "true" | "1" | "yes");
                    }
                    _ if key.starts_with("OMC_LIBRARY_") => {
                        let name = key["OMC_LIBRARY_".len()..].to_string();
                        if !name.is_empty() {
                            libraries.insert(name, value);
                        }
                    }
                    _ => {}
                }
            }
        }

        settings.libraries = libraries.into_iter().collect();
        settings.libraries.sort_by(|a, b| a.0.cmp(&b.0));
        settings
    }

    /// Startup library list with default libraries applied
    ///
    /// When forcing defaults, `Modelica` and `ModelicaReference` are
    /// prepended (version `default`) unless the user configured them.
    pub fn startup_libraries(&self) -> Vec<(String, String)> {
        let mut libraries = self.libraries.clone();
        if self.force_default_libraries {
            for name in ["ModelicaReference", "Modelica"] {
                if !libraries.iter().any(|(lib, _)| lib == name) {
                    libraries.insert(0, (name.to_string(), "default".to_string()));
                }
            }
        }
        libraries
    }
}

/// Parse a shell variable assignment (KEY=value or KEY="value")
fn parse_assignment(line: &str) -> Option<(String, String)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim().to_string();
    let value = line[eq_pos + 1..].trim().to_string();

    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    Some((key, value))
}

/// Remove surrounding quotes from a value
fn unquote(s: &str) -> String {
    let s = s.trim();

    if s.starts_with('"') && s.ends_with('"') && s.len() >= 2 {
        return s[1..s.len() - 1].to_string();
    }

    if s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2 {
        return s[1..s.len() - 1].to_string();
    }

    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let settings = Settings::parse("");
        assert_eq!(settings.locale, "C");
        assert!(settings.libraries.is_empty());
        assert!(settings.force_default_libraries);
    }

    #[test]
    fn test_parse_settings() {
        let content = r#"
# session settings
OMC_LOCALE="de_DE"
OMC_TMPDIR="/var/tmp/omc"
OMC_FORCE_DEFAULT_LIBRARIES=false
OMC_LIBRARY_Modelica="3.2.1"
export OMC_LIBRARY_Buildings="9.0.0"
"#;
        let settings = Settings::parse(content);
        assert_eq!(settings.locale, "de_DE");
        assert_eq!(settings.temp_dir, PathBuf::from("/var/tmp/omc"));
        assert!(!settings.force_default_libraries);
        assert_eq!(
            settings.libraries,
            vec![
                ("Buildings".to_string(), "9.0.0".to_string()),
                ("Modelica".to_string(), "3.2.1".to_string()),
            ]
        );
    }

    #[test]
    fn test_startup_libraries_forces_defaults() {
        let settings = Settings::parse("OMC_LIBRARY_Buildings=\"9.0.0\"");
        let libraries = settings.startup_libraries();
        assert_eq!(libraries[0].0, "Modelica");
        assert_eq!(libraries[0].1, "default");
        assert_eq!(libraries[1].0, "ModelicaReference");
        assert!(libraries.iter().any(|(name, _)| name == "Buildings"));
    }

    #[test]
    fn test_startup_libraries_respects_configured_version() {
        let settings = Settings::parse("OMC_LIBRARY_Modelica=\"3.2.1\"");
        let libraries = settings.startup_libraries();
        let modelica: Vec<_> = libraries.iter().filter(|(name, _)| name == "Modelica").collect();
        assert_eq!(modelica.len(), 1);
        assert_eq!(modelica[0].1, "3.2.1");
    }

    #[test]
    fn test_startup_libraries_without_forcing() {
        let settings = Settings::parse("OMC_FORCE_DEFAULT_LIBRARIES=no");
        assert!(settings.startup_libraries().is_empty());
    }
}
