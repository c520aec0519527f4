//! Source-annotated display for `config show`.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// A resolved configuration together with source annotations.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Dotted field path → which layer set the value.
    pub field_sources: FieldSources,
    /// Config file paths that were loaded (in precedence order).
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with inline comments showing source.
    Toml,
    /// JSON (for programmatic consumption).
    Json,
}

impl ResolvedConfig {
    /// Format the resolved config, optionally limited to one section.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or `section` does not exist.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(section),
            ShowFormat::Json => self.show_json(section),
        }
    }

    fn section_value(&self, section: &str) -> Result<toml::Value, fmt::Error> {
        let val = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
        val.as_table()
            .and_then(|table| table.get(section))
            .cloned()
            .ok_or(fmt::Error)
    }

    fn show_toml(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        let toml_str = if let Some(section_name) = section {
            toml::to_string_pretty(&self.section_value(section_name)?).map_err(|_| fmt::Error)?
        } else {
            toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?
        };

        let mut output = String::new();
        output.push_str("# Resolved modhost configuration\n");
        output.push_str("# Source annotations: [defaults] [user] [workspace] [env]\n");

        if !self.loaded_files.is_empty() {
            output.push_str("#\n# Loaded files (in precedence order):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                writeln!(output, "#   {}. {path}", i.saturating_add(1))?;
            }
        }
        output.push('\n');

        let mut table = section.unwrap_or("").to_owned();
        for line in toml_str.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                table = match section {
                    Some(s) => format!("{s}.{header}"),
                    None => header.to_owned(),
                };
            }
            if let Some(annotation) = self.annotate_line(trimmed, &table) {
                writeln!(output, "{line}  # {annotation}")?;
            } else {
                writeln!(output, "{line}")?;
            }
        }

        Ok(output)
    }

    fn show_json(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        if let Some(section_name) = section {
            serde_json::to_string_pretty(&self.section_value(section_name)?).map_err(|_| fmt::Error)
        } else {
            serde_json::to_string_pretty(&self.config).map_err(|_| fmt::Error)
        }
    }

    fn annotate_line(&self, trimmed: &str, table: &str) -> Option<String> {
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let key = trimmed.split('=').next()?.trim();
        let field_path = if table.is_empty() {
            key.to_owned()
        } else {
            format!("{table}.{key}")
        };
        self.field_sources
            .get(&field_path)
            .map(|layer| format!("[{layer}]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigLayer;

    fn resolved() -> ResolvedConfig {
        let mut field_sources = FieldSources::new();
        field_sources.insert("storage.verifier".to_owned(), ConfigLayer::User);
        field_sources.insert("host.locale".to_owned(), ConfigLayer::Environment);
        ResolvedConfig {
            config: Config::default(),
            field_sources,
            loaded_files: vec!["/home/u/.modhost/config.toml".to_owned()],
        }
    }

    #[test]
    fn toml_output_is_annotated() {
        let out = resolved().show(ShowFormat::Toml, None).unwrap();
        assert!(out.contains("1. /home/u/.modhost/config.toml"));
        assert!(out.contains("verifier = \"size\"  # [user]"));
        assert!(out.contains("locale = \"en-US\"  # [env]"));
    }

    #[test]
    fn single_section() {
        let out = resolved().show(ShowFormat::Toml, Some("host")).unwrap();
        assert!(out.contains("locale = \"en-US\"  # [env]"));
        assert!(!out.contains("verifier"));

        let json = resolved().show(ShowFormat::Json, Some("wasm")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["timeout_secs"], 30);
    }

    #[test]
    fn unknown_section_fails() {
        assert!(resolved().show(ShowFormat::Json, Some("nope")).is_err());
    }
}
