//! Bundle resources resolved against the host's display configuration.
//!
//! Value resources live in `res/values[-<qualifiers>]/*.toml`. Each file maps
//! resource types to tables of named values:
//!
//! ```toml
//! [string]
//! app_name = "Notes"
//!
//! [integer]
//! columns = 2
//! ```
//!
//! giving the ids `string/app_name` and `integer/columns`. Qualifiers are
//! dash-separated, in any order: a language (`fr`), a region (`rCA`), an
//! orientation (`port`, `land`) and a density (`hdpi`, `320dpi`, ...).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::archive::BundleArchive;

const VALUES_DIR: &str = "values";
const ASSETS_PREFIX: &str = "assets/";

/// Baseline density in dots per inch.
pub const DENSITY_DEFAULT: u32 = 160;

/// Physical properties of the host display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    /// Screen density in dots per inch.
    pub density_dpi: u32,
    /// Width in pixels.
    pub width_px: u32,
    /// Height in pixels.
    pub height_px: u32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self {
            density_dpi: DENSITY_DEFAULT,
            width_px: 1080,
            height_px: 1920,
        }
    }
}

/// Screen orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Taller than wide.
    #[default]
    Portrait,
    /// Wider than tall.
    Landscape,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" | "port" => Ok(Self::Portrait),
            "landscape" | "land" => Ok(Self::Landscape),
            other => Err(format!("unknown orientation {other:?}")),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Portrait => f.write_str("portrait"),
            Self::Landscape => f.write_str("landscape"),
        }
    }
}

/// Host configuration that selects between resource variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// BCP-47 style locale, e.g. `en-US`.
    pub locale: String,
    /// Current orientation.
    pub orientation: Orientation,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            orientation: Orientation::Portrait,
        }
    }
}

impl Configuration {
    fn language(&self) -> &str {
        self.locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
    }

    fn region(&self) -> Option<&str> {
        self.locale.split(['-', '_']).nth(1)
    }
}

/// Qualifiers of one resource directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Qualifiers {
    language: Option<String>,
    region: Option<String>,
    orientation: Option<Orientation>,
    density: Option<u32>,
}

impl Qualifiers {
    /// Parse a dash-separated qualifier list such as `fr-rCA-land-hdpi`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first unrecognized qualifier.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut qualifiers = Self::default();
        for part in text.split('-').filter(|p| !p.is_empty()) {
            if let Some(density) = parse_density(part) {
                qualifiers.density = Some(density);
            } else if part == "port" || part == "land" {
                qualifiers.orientation = part.parse().ok();
            } else if is_region(part) {
                qualifiers.region = Some(part[1..].to_string());
            } else if is_language(part) {
                qualifiers.language = Some(part.to_string());
            } else {
                return Err(format!("unknown resource qualifier {part:?}"));
            }
        }
        Ok(qualifiers)
    }

    fn matches(&self, config: &Configuration) -> bool {
        let language_ok = self
            .language
            .as_deref()
            .is_none_or(|l| l.eq_ignore_ascii_case(config.language()));
        let region_ok = self.region.as_deref().is_none_or(|r| {
            config
                .region()
                .is_some_and(|cr| r.eq_ignore_ascii_case(cr))
        });
        let orientation_ok = self.orientation.is_none_or(|o| o == config.orientation);
        language_ok && region_ok && orientation_ok
    }

    /// Ranking key; larger is a better match. Only meaningful for variants
    /// that [`matches`](Self::matches) the configuration.
    fn rank(&self, device_density: u32) -> (u8, u8, (u8, u32)) {
        let locale = u8::from(self.language.is_some()).saturating_add(u8::from(self.region.is_some()));
        let orientation = u8::from(self.orientation.is_some());
        let density = match self.density {
            None => (0, 0),
            Some(d) if d >= device_density => (2, u32::MAX.saturating_sub(d)),
            Some(d) => (1, d),
        };
        (locale, orientation, density)
    }
}

fn parse_density(part: &str) -> Option<u32> {
    match part {
        "ldpi" => Some(120),
        "mdpi" => Some(160),
        "tvdpi" => Some(213),
        "hdpi" => Some(240),
        "xhdpi" => Some(320),
        "xxhdpi" => Some(480),
        "xxxhdpi" => Some(640),
        other => other.strip_suffix("dpi").and_then(|n| n.parse().ok()),
    }
}

fn is_language(part: &str) -> bool {
    (2..=3).contains(&part.len()) && part.chars().all(|c| c.is_ascii_lowercase())
}

fn is_region(part: &str) -> bool {
    part.len() == 3
        && part.starts_with('r')
        && part[1..].chars().all(|c| c.is_ascii_uppercase())
}

/// A single resource value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceValue {
    /// Text.
    String(String),
    /// Whole number.
    Integer(i64),
    /// Flag.
    Bool(bool),
    /// Floating point number (dimensions, fractions).
    Float(f64),
}

impl TryFrom<toml::Value> for ResourceValue {
    type Error = String;

    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        match value {
            toml::Value::String(s) => Ok(Self::String(s)),
            toml::Value::Integer(i) => Ok(Self::Integer(i)),
            toml::Value::Boolean(b) => Ok(Self::Bool(b)),
            toml::Value::Float(f) => Ok(Self::Float(f)),
            other => Err(format!("unsupported resource value type {}", other.type_str())),
        }
    }
}

/// All value resources of a bundle with their qualified variants.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    entries: HashMap<String, Vec<(Qualifiers, ResourceValue)>>,
}

impl ResourceTable {
    /// Collect `res/values*/*.toml` from `archive`.
    ///
    /// # Errors
    ///
    /// Returns a message for unparseable files or unknown qualifiers.
    pub fn from_archive(archive: &BundleArchive) -> Result<Self, String> {
        let mut table = Self::default();
        for (name, data) in archive.entries_under("res/") {
            let mut parts = name.split('/').skip(1);
            let (Some(dir), Some(file), None) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };
            let Some(qualifier_text) = dir.strip_prefix(VALUES_DIR) else {
                continue;
            };
            if !file.ends_with(".toml") {
                continue;
            }
            if !(qualifier_text.is_empty() || qualifier_text.starts_with('-')) {
                continue;
            }
            let qualifiers = Qualifiers::parse(qualifier_text).map_err(|e| format!("{name}: {e}"))?;
            let text = std::str::from_utf8(data).map_err(|e| format!("{name}: {e}"))?;
            let parsed: toml::Table = toml::from_str(text).map_err(|e| format!("{name}: {e}"))?;

            for (kind, values) in parsed {
                let toml::Value::Table(values) = values else {
                    return Err(format!("{name}: [{kind}] must be a table"));
                };
                for (key, value) in values {
                    let value = ResourceValue::try_from(value)
                        .map_err(|e| format!("{name}: {kind}/{key}: {e}"))?;
                    table.insert(format!("{kind}/{key}"), qualifiers.clone(), value);
                }
            }
        }
        Ok(table)
    }

    /// Add a variant of resource `id`.
    pub fn insert(&mut self, id: impl Into<String>, qualifiers: Qualifiers, value: ResourceValue) {
        self.entries
            .entry(id.into())
            .or_default()
            .push((qualifiers, value));
    }

    /// Pick the best variant of `id` for the given host view.
    #[must_use]
    pub fn resolve(
        &self,
        id: &str,
        config: &Configuration,
        metrics: &DisplayMetrics,
    ) -> Option<&ResourceValue> {
        self.entries
            .get(id)?
            .iter()
            .filter(|(q, _)| q.matches(config))
            .max_by_key(|(q, _)| q.rank(metrics.density_dpi))
            .map(|(_, value)| value)
    }

    /// All resource ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of distinct resource ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A resource view bound to one display configuration.
#[derive(Debug, Clone)]
pub struct Resources {
    table: ResourceTable,
    archive: Option<Arc<BundleArchive>>,
    metrics: DisplayMetrics,
    configuration: Configuration,
}

impl Resources {
    /// A view over a bundle's table and assets.
    #[must_use]
    pub fn new(
        table: ResourceTable,
        archive: Option<Arc<BundleArchive>>,
        metrics: DisplayMetrics,
        configuration: Configuration,
    ) -> Self {
        Self {
            table,
            archive,
            metrics,
            configuration,
        }
    }

    /// The host's own view: no bundle resources, only its configuration.
    #[must_use]
    pub fn host(metrics: DisplayMetrics, configuration: Configuration) -> Self {
        Self::new(ResourceTable::default(), None, metrics, configuration)
    }

    /// Display metrics this view resolves against.
    #[must_use]
    pub fn metrics(&self) -> &DisplayMetrics {
        &self.metrics
    }

    /// Configuration this view resolves against.
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// The underlying table.
    #[must_use]
    pub fn table(&self) -> &ResourceTable {
        &self.table
    }

    /// Best-matching value of `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ResourceValue> {
        self.table.resolve(id, &self.configuration, &self.metrics)
    }

    /// `string/<name>`.
    #[must_use]
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(&format!("string/{name}"))? {
            ResourceValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// `integer/<name>`.
    #[must_use]
    pub fn get_integer(&self, name: &str) -> Option<i64> {
        match self.get(&format!("integer/{name}"))? {
            ResourceValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// `bool/<name>`.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(&format!("bool/{name}"))? {
            ResourceValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Raw bytes of `assets/<name>`.
    #[must_use]
    pub fn open_asset(&self, name: &str) -> Option<&[u8]> {
        self.archive
            .as_ref()?
            .entry(&format!("{ASSETS_PREFIX}{name}"))
    }

    /// Asset names relative to `assets/`.
    #[must_use]
    pub fn asset_names(&self) -> Vec<&str> {
        self.archive
            .as_deref()
            .map(|archive| {
                archive
                    .entries_under(ASSETS_PREFIX)
                    .filter_map(|(name, _)| name.strip_prefix(ASSETS_PREFIX))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> BundleArchive {
        BundleArchive::from_entries(
            "mem",
            [
                (
                    "res/values/strings.toml".to_string(),
                    b"[string]\ntitle = \"Notes\"\ngreeting = \"Hello\"\n[integer]\ncolumns = 2\n"
                        .to_vec(),
                ),
                (
                    "res/values-fr/strings.toml".to_string(),
                    b"[string]\ngreeting = \"Bonjour\"\n".to_vec(),
                ),
                (
                    "res/values-fr-rCA/strings.toml".to_string(),
                    b"[string]\ngreeting = \"Allo\"\n".to_vec(),
                ),
                (
                    "res/values-land/dims.toml".to_string(),
                    b"[integer]\ncolumns = 4\n".to_vec(),
                ),
                (
                    "res/values-hdpi/dims.toml".to_string(),
                    b"[float]\nmargin = 12.0\n".to_vec(),
                ),
                (
                    "res/values-xxhdpi/dims.toml".to_string(),
                    b"[float]\nmargin = 24.0\n".to_vec(),
                ),
                ("assets/readme.txt".to_string(), b"read me".to_vec()),
            ],
        )
    }

    fn view(locale: &str, orientation: Orientation, density_dpi: u32) -> Resources {
        let archive = Arc::new(archive());
        let table = ResourceTable::from_archive(&archive).unwrap();
        Resources::new(
            table,
            Some(archive),
            DisplayMetrics {
                density_dpi,
                ..DisplayMetrics::default()
            },
            Configuration {
                locale: locale.to_string(),
                orientation,
            },
        )
    }

    #[test]
    fn parses_qualifiers() {
        let q = Qualifiers::parse("-fr-rCA-land-xhdpi").unwrap();
        assert_eq!(q.language.as_deref(), Some("fr"));
        assert_eq!(q.region.as_deref(), Some("CA"));
        assert_eq!(q.orientation, Some(Orientation::Landscape));
        assert_eq!(q.density, Some(320));
        assert_eq!(Qualifiers::parse("").unwrap(), Qualifiers::default());
        assert!(Qualifiers::parse("-bogus!").is_err());
    }

    #[test]
    fn locale_specificity_wins() {
        assert_eq!(
            view("en-US", Orientation::Portrait, 160).get_string("greeting"),
            Some("Hello")
        );
        assert_eq!(
            view("fr-FR", Orientation::Portrait, 160).get_string("greeting"),
            Some("Bonjour")
        );
        assert_eq!(
            view("fr-CA", Orientation::Portrait, 160).get_string("greeting"),
            Some("Allo")
        );
        assert_eq!(
            view("fr-CA", Orientation::Portrait, 160).get_string("title"),
            Some("Notes")
        );
    }

    #[test]
    fn orientation_selects_variant() {
        assert_eq!(
            view("en-US", Orientation::Portrait, 160).get_integer("columns"),
            Some(2)
        );
        assert_eq!(
            view("en-US", Orientation::Landscape, 160).get_integer("columns"),
            Some(4)
        );
    }

    #[test]
    fn density_prefers_nearest_at_or_above() {
        let medium = view("en-US", Orientation::Portrait, 160);
        assert_eq!(medium.get("float/margin"), Some(&ResourceValue::Float(12.0)));
        let high = view("en-US", Orientation::Portrait, 320);
        assert_eq!(high.get("float/margin"), Some(&ResourceValue::Float(24.0)));
        let huge = view("en-US", Orientation::Portrait, 640);
        assert_eq!(huge.get("float/margin"), Some(&ResourceValue::Float(24.0)));
    }

    #[test]
    fn assets_are_readable() {
        let resources = view("en-US", Orientation::Portrait, 160);
        assert_eq!(resources.open_asset("readme.txt"), Some(&b"read me"[..]));
        assert_eq!(resources.asset_names(), vec!["readme.txt"]);
        assert!(resources.open_asset("missing").is_none());
    }

    #[test]
    fn host_view_is_empty() {
        let host = Resources::host(DisplayMetrics::default(), Configuration::default());
        assert!(host.table().is_empty());
        assert!(host.get_string("title").is_none());
        assert!(host.asset_names().is_empty());
    }

    #[test]
    fn rejects_nested_tables() {
        let archive = BundleArchive::from_entries(
            "mem",
            [(
                "res/values/bad.toml".to_string(),
                b"[string.nested]\nx = 1\n".to_vec(),
            )],
        );
        assert!(ResourceTable::from_archive(&archive).is_err());
    }
}
