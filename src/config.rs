use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::graphql::DomainRegistration;
use crate::search::{
    DateRangeBucket, FacetDefinition, FilterStrategy, RangeFilter, SearchDomainConfig,
    SearchResult, SortClause, SortOption, SortOrder, TermFilter, ValueTagFilter,
    DEFAULT_FACET_SIZE, DEFAULT_TAG_FIELD,
};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const DEFAULT_DOMAINS: &str = include_str!("../config/domains.toml");

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Search engine connection
    pub engine: EngineConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Search domains served through GraphQL
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

/// Only the domains list, for the embedded fallback file
#[derive(Debug, Deserialize)]
struct DomainsFile {
    #[serde(default)]
    domains: Vec<DomainConfig>,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment (prefix `FACET_GATEWAY`, separator `__`)
    ///
    /// `path` wins over `CONFIG_PATH`; a missing file is not an error.
    /// When no source declares domains the two reference domains apply.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let config_path = match path {
            Some(path) => path.to_string_lossy().into_owned(),
            None => std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string()),
        };

        let mut config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: FACET_GATEWAY_)
            .add_source(
                config::Environment::with_prefix("FACET_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if config.domains.is_empty() {
            config.domains = Self::default_domains()?;
        }

        Ok(config)
    }

    /// The reference domains shipped with the gateway
    pub fn default_domains() -> Result<Vec<DomainConfig>, config::ConfigError> {
        let file: DomainsFile = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_DOMAINS, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(file.domains)
    }

    /// Validate every domain and pair it with its GraphQL names
    pub fn registrations(&self) -> SearchResult<Vec<DomainRegistration>> {
        self.domains.iter().map(DomainConfig::registration).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the Elasticsearch-compatible engine
    #[serde(default = "default_engine_host")]
    pub host: String,

    /// Budget for one engine call, in milliseconds
    #[serde(default = "default_engine_timeout_ms")]
    pub timeout_ms: u64,
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Serve Prometheus metrics on /metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

/// One search domain as declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// GraphQL result type, e.g. `ResultSet`
    pub type_name: String,

    /// GraphQL hit type, e.g. `ResultHit`
    pub hit_type_name: String,

    /// Root query field; defaults to the lowerCamel type name
    #[serde(default)]
    pub query_field: Option<String>,

    /// Engine index
    pub index: String,

    #[serde(default)]
    pub returned_fields: Vec<String>,

    #[serde(default)]
    pub relevance_fields: Vec<String>,

    #[serde(default)]
    pub sort_options: Vec<SortOptionConfig>,

    #[serde(default)]
    pub filters: Vec<FilterConfig>,

    #[serde(default)]
    pub facets: Vec<FacetConfig>,
}

impl DomainConfig {
    /// Build the validated domain
    pub fn build(&self) -> SearchResult<SearchDomainConfig> {
        let mut builder = SearchDomainConfig::builder(&self.index)
            .returned_fields(self.returned_fields.iter().cloned())
            .relevance_fields(self.relevance_fields.iter().cloned());

        for option in &self.sort_options {
            builder = builder.sort_option(option.to_sort_option());
        }
        for filter in &self.filters {
            builder = builder.filter(filter.to_strategy());
        }
        for facet in &self.facets {
            builder = builder.facet(facet.to_definition());
        }

        builder.build()
    }

    pub fn registration(&self) -> SearchResult<DomainRegistration> {
        let mut registration =
            DomainRegistration::new(self.build()?, &self.type_name, &self.hit_type_name);
        if let Some(field) = &self.query_field {
            registration = registration.with_query_field(field);
        }
        Ok(registration)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortOptionConfig {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub default: bool,
    pub fields: Vec<SortFieldConfig>,
}

impl SortOptionConfig {
    fn to_sort_option(&self) -> SortOption {
        let clauses = self
            .fields
            .iter()
            .map(|f| SortClause::new(&f.field, f.order))
            .collect();
        let option = SortOption::new(&self.id, &self.label, clauses);
        if self.default {
            option.as_default()
        } else {
            option
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortFieldConfig {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Filter declaration, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    ValueTag {
        #[serde(default = "default_tag_field")]
        field: String,
    },
    Term {
        identifier: String,
        field: String,
        label: String,
        #[serde(default)]
        multiple_select: bool,
        #[serde(default)]
        exclude_own_filters: bool,
    },
    NumericRange {
        identifier: String,
        field: String,
        label: String,
        #[serde(default)]
        exclude_own_filters: bool,
    },
    DateRange {
        identifier: String,
        field: String,
        label: String,
        #[serde(default)]
        exclude_own_filters: bool,
    },
}

impl FilterConfig {
    fn to_strategy(&self) -> FilterStrategy {
        match self {
            FilterConfig::ValueTag { field } => {
                FilterStrategy::ValueTag(ValueTagFilter { field: field.clone() })
            }
            FilterConfig::Term {
                identifier,
                field,
                label,
                multiple_select,
                exclude_own_filters,
            } => FilterStrategy::Term(
                TermFilter::new(identifier, field, label)
                    .multiple_select(*multiple_select)
                    .exclude_own_filters(*exclude_own_filters),
            ),
            FilterConfig::NumericRange {
                identifier,
                field,
                label,
                exclude_own_filters,
            } => FilterStrategy::NumericRange(
                RangeFilter::new(identifier, field, label).exclude_own_filters(*exclude_own_filters),
            ),
            FilterConfig::DateRange {
                identifier,
                field,
                label,
                exclude_own_filters,
            } => FilterStrategy::DateRange(
                RangeFilter::new(identifier, field, label).exclude_own_filters(*exclude_own_filters),
            ),
        }
    }
}

/// Facet declaration, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FacetConfig {
    RefinementSelect {
        identifier: String,
        field: String,
        label: String,
        #[serde(default)]
        multiple_select: bool,
        #[serde(default)]
        filter: Option<String>,
        #[serde(default = "default_facet_size")]
        size: usize,
    },
    Range {
        identifier: String,
        field: String,
        label: String,
        interval: f64,
        min: f64,
        max: f64,
        #[serde(default)]
        filter: Option<String>,
    },
    DateRange {
        identifier: String,
        field: String,
        label: String,
        ranges: Vec<DateRangeBucket>,
        #[serde(default)]
        filter: Option<String>,
    },
}

impl FacetConfig {
    fn to_definition(&self) -> FacetDefinition {
        let (definition, filter) = match self {
            FacetConfig::RefinementSelect {
                identifier,
                field,
                label,
                multiple_select,
                filter,
                size,
            } => (
                FacetDefinition::refinement(identifier, field, label)
                    .with_multiple_select(*multiple_select)
                    .with_size(*size),
                filter,
            ),
            FacetConfig::Range {
                identifier,
                field,
                label,
                interval,
                min,
                max,
                filter,
            } => (
                FacetDefinition::range(identifier, field, label, *interval, *min, *max),
                filter,
            ),
            FacetConfig::DateRange {
                identifier,
                field,
                label,
                ranges,
                filter,
            } => (
                FacetDefinition::date_range(identifier, field, label, ranges.clone()),
                filter,
            ),
        };
        match filter {
            Some(filter) => definition.with_filter(filter),
            None => definition,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_engine_host() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_engine_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "facet_gateway=info,tower_http=info".to_string()
}

fn default_service_name() -> String {
    "facet-gateway".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tag_field() -> String {
    DEFAULT_TAG_FIELD.to_string()
}

fn default_facet_size() -> usize {
    DEFAULT_FACET_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::FacetKind;
    use std::io::Write;

    #[test]
    fn test_default_domains_build() {
        let domains = Config::default_domains().unwrap();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].type_name, "ResultSet");
        assert_eq!(domains[1].type_name, "JobResultSet");

        for domain in &domains {
            assert!(domain.registration().is_ok(), "{} should build", domain.type_name);
        }
    }

    #[test]
    fn test_reference_job_domain() {
        let domains = Config::default_domains().unwrap();
        let jobs = domains[1].build().unwrap();

        assert_eq!(jobs.index(), "freelancers");
        assert_eq!(jobs.default_sort().id, "relevance");
        assert!(jobs.filter("CustomFilter").is_some());
        assert!(!jobs.filter("total_earning").unwrap().exclude_own_filters());
        assert_eq!(jobs.facets().len(), 5);

        let country = jobs.facet("country").unwrap();
        assert_eq!(country.field, "country.keyword");
        assert_eq!(country.label, "Location");
        assert!(matches!(country.kind, FacetKind::RefinementSelect { .. }));
        assert_eq!(country.filter.as_deref(), Some("country"));
        assert!(jobs.filter("country").is_some());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
http_port = 9090

[engine]
host = "http://search:9200"
timeout_ms = 1500

[observability]
json_logs = true

[[domains]]
type_name = "ArticleSet"
hit_type_name = "ArticleHit"
index = "articles"
returned_fields = ["title"]

[[domains.sort_options]]
id = "recent"
label = "Most recent"
default = true
fields = [{{ field = "published", order = "desc" }}]

[[domains.filters]]
type = "date_range"
identifier = "published"
field = "published"
label = "Published"

[[domains.facets]]
type = "date_range"
identifier = "published_facet"
field = "published"
label = "Published"
filter = "published"
ranges = [{{ label = "Since 2026", from = "2026-01-01" }}]
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.http_port, 9090);
        assert_eq!(config.engine.host, "http://search:9200");
        assert_eq!(config.engine.timeout(), Duration::from_millis(1500));
        assert!(config.observability.json_logs);
        assert_eq!(config.domains.len(), 1);

        let registrations = config.registrations().unwrap();
        assert_eq!(registrations[0].query_field(), "articleSet");
        let facet = registrations[0].domain.facet("published_facet").unwrap();
        assert_eq!(facet.filter.as_deref(), Some("published"));
    }

    #[test]
    fn test_invalid_domain_reports_configuration_error() {
        let domain = DomainConfig {
            type_name: "ResultSet".to_string(),
            hit_type_name: "ResultHit".to_string(),
            query_field: None,
            index: "freelancers".to_string(),
            returned_fields: vec![],
            relevance_fields: vec![],
            sort_options: vec![],
            filters: vec![],
            facets: vec![],
        };

        let err = domain.build().unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }
}
