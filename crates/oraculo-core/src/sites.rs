use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::offers::DEFAULT_CURRENCY;
use crate::ConfigError;

/// Upper bound on pages crawled per site per pass, whatever the file says.
pub const MAX_PAGES_CEILING: usize = 15;

const DEFAULT_MAX_PAGES: usize = 5;

/// Which fetch adapter implementation serves a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Fantasia,
    Pixelatoy,
    Frikiverso,
    Electropolis,
    Actiontoys,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Fantasia => write!(f, "fantasia"),
            AdapterKind::Pixelatoy => write!(f, "pixelatoy"),
            AdapterKind::Frikiverso => write!(f, "frikiverso"),
            AdapterKind::Electropolis => write!(f, "electropolis"),
            AdapterKind::Actiontoys => write!(f, "actiontoys"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Shop name recorded on offers and execution logs.
    pub name: String,
    pub adapter: AdapterKind,
    pub seed_url: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Listings must name at least one of these (case-insensitive) to be
    /// kept. Empty keeps everything.
    #[serde(default)]
    pub relevance_keywords: Vec<String>,
}

impl SiteConfig {
    /// Whether a listing title passes this site's keyword filter.
    #[must_use]
    pub fn is_relevant(&self, title: &str) -> bool {
        if self.relevance_keywords.is_empty() {
            return true;
        }
        let title = title.to_lowercase();
        self.relevance_keywords
            .iter()
            .any(|keyword| title.contains(&keyword.to_lowercase()))
    }
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

fn default_enabled() -> bool {
    true
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Deserialize)]
pub struct SitesFile {
    pub sites: Vec<SiteConfig>,
}

impl SitesFile {
    pub fn enabled(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.iter().filter(|site| site.enabled)
    }
}

/// Load and validate the site registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sites(path: &Path) -> Result<SitesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SitesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_sites(&content)
}

/// Parse and validate site registry YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML does not parse or fails validation.
pub fn parse_sites(content: &str) -> Result<SitesFile, ConfigError> {
    let sites_file: SitesFile = serde_yaml::from_str(content)?;
    validate_sites(&sites_file)?;
    Ok(sites_file)
}

fn validate_sites(sites_file: &SitesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for site in &sites_file.sites {
        if site.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(site.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site name: '{}'",
                site.name
            )));
        }

        if !(site.seed_url.starts_with("https://") || site.seed_url.starts_with("http://")) {
            return Err(ConfigError::Validation(format!(
                "site '{}' has a non-http seed_url '{}'",
                site.name, site.seed_url
            )));
        }

        if site.max_pages == 0 || site.max_pages > MAX_PAGES_CEILING {
            return Err(ConfigError::Validation(format!(
                "site '{}' has max_pages {}; must be between 1 and {MAX_PAGES_CEILING}",
                site.name, site.max_pages
            )));
        }

        if site.relevance_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "site '{}' has a blank relevance keyword",
                site.name
            )));
        }

        if site.currency.len() != 3 {
            return Err(ConfigError::Validation(format!(
                "site '{}' has invalid currency '{}'",
                site.name, site.currency
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r"
sites:
  - name: fantasia
    adapter: fantasia
    seed_url: https://fantasiapersonajes.es/busqueda?controller=search&s=masters
  - name: actiontoys
    adapter: actiontoys
    seed_url: https://actiontoys.es/wp-json/wc/store/products?search=masters
    max_pages: 3
    enabled: false
    relevance_keywords: [masters, origins]
";

    #[test]
    fn parse_sites_applies_defaults() {
        let file = parse_sites(VALID).unwrap();
        assert_eq!(file.sites.len(), 2);
        let fantasia = &file.sites[0];
        assert_eq!(fantasia.adapter, AdapterKind::Fantasia);
        assert_eq!(fantasia.max_pages, 5);
        assert!(fantasia.enabled);
        assert_eq!(fantasia.currency, "EUR");
        assert_eq!(file.sites[1].max_pages, 3);
    }

    #[test]
    fn relevance_keywords_filter_titles() {
        let file = parse_sites(VALID).unwrap();
        let fantasia = &file.sites[0];
        assert!(fantasia.relevance_keywords.is_empty());
        assert!(fantasia.is_relevant("Funko Pop Batman"));

        let actiontoys = &file.sites[1];
        assert!(actiontoys.is_relevant("He-Man MASTERS of the Universe"));
        assert!(actiontoys.is_relevant("Skeletor Origins Deluxe"));
        assert!(!actiontoys.is_relevant("Funko Pop Batman"));
    }

    #[test]
    fn rejects_blank_relevance_keyword() {
        let yaml = r"
sites:
  - name: actiontoys
    adapter: actiontoys
    seed_url: https://a.example
    relevance_keywords: ['  ']
";
        let err = parse_sites(yaml).unwrap_err();
        assert!(err.to_string().contains("blank relevance keyword"), "{err}");
    }

    #[test]
    fn enabled_skips_disabled_sites() {
        let file = parse_sites(VALID).unwrap();
        let names: Vec<&str> = file.enabled().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["fantasia"]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let yaml = r"
sites:
  - name: Fantasia
    adapter: fantasia
    seed_url: https://a.example
  - name: fantasia
    adapter: pixelatoy
    seed_url: https://b.example
";
        let err = parse_sites(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate site name"), "{err}");
    }

    #[test]
    fn rejects_page_cap_above_ceiling() {
        let yaml = r"
sites:
  - name: fantasia
    adapter: fantasia
    seed_url: https://a.example
    max_pages: 40
";
        assert!(matches!(
            parse_sites(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_unknown_adapter() {
        let yaml = r"
sites:
  - name: other
    adapter: shopify
    seed_url: https://a.example
";
        assert!(matches!(
            parse_sites(yaml),
            Err(ConfigError::SitesFileParse(_))
        ));
    }

    #[test]
    fn bundled_sites_file_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(Path::parent)
            .map(|root| root.join("config/sites.yaml"))
            .unwrap();
        let file = load_sites(&path).unwrap();
        assert_eq!(file.sites.len(), 5);
    }
}
