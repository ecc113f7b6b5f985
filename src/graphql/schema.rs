//! Schema composition
//!
//! Merges any number of search domains into one GraphQL schema. Every
//! domain contributes a root query field plus four generated types:
//!
//! ```text
//! Query.{queryField}: {TypeName}!
//! {TypeName}          summary, hits, facets, appliedFilters, sortedBy
//! {TypeName}HitResults  items, page
//! {HitTypeName}       id, score, fields
//! {HitTypeName}Fields one JSON field per returned document field
//! ```
//!
//! Names are claimed in a [`TypeRegistry`] first; any collision aborts
//! composition before a schema exists.

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, Object, ResolverContext, Schema, SchemaBuilder,
    TypeRef,
};
use async_graphql::{ErrorExtensions, Value};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::context::GraphQLContext;
use super::metrics::MetricsExtension;
use super::types::*;
use crate::search::{
    SearchDomainConfig, SearchError, SearchHit, SearchRequest, SearchResult, SearchResults,
    SearchService,
};

/// Upper bound on selection nesting; leaves room for introspection
pub const MAX_QUERY_DEPTH: usize = 20;

/// Owner recorded for names held by the shared types
const SHARED_OWNER: &str = "<shared>";

lazy_static! {
    static ref GRAPHQL_NAME: Regex =
        Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("valid GraphQL name pattern");
}

/// Executable composed schema
pub type GraphQLSchema = Schema;

/// One search domain as exposed through GraphQL
#[derive(Clone)]
pub struct DomainRegistration {
    /// Result type name, e.g. `ResultSet`
    pub type_name: String,
    /// Hit type name, e.g. `ResultHit`
    pub hit_type_name: String,
    /// Root field override; defaults to the lowerCamel type name
    pub query_field: Option<String>,
    pub domain: Arc<SearchDomainConfig>,
}

impl DomainRegistration {
    pub fn new(
        domain: SearchDomainConfig,
        type_name: impl Into<String>,
        hit_type_name: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            hit_type_name: hit_type_name.into(),
            query_field: None,
            domain: Arc::new(domain),
        }
    }

    pub fn with_query_field(mut self, field: impl Into<String>) -> Self {
        self.query_field = Some(field.into());
        self
    }

    /// Root query field serving this domain
    pub fn query_field(&self) -> String {
        self.query_field
            .clone()
            .unwrap_or_else(|| lower_camel(&self.type_name))
    }

    pub fn hit_results_type(&self) -> String {
        format!("{}HitResults", self.type_name)
    }

    pub fn hit_fields_type(&self) -> String {
        format!("{}Fields", self.hit_type_name)
    }
}

/// Claimed GraphQL names and the domain owning each
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, String>,
    query_fields: BTreeMap<String, String>,
}

impl TypeRegistry {
    /// Registry pre-seeded with the shared type names
    pub fn new() -> Self {
        let mut registry = Self::default();
        for name in RESERVED_TYPE_NAMES {
            registry
                .types
                .insert((*name).to_string(), SHARED_OWNER.to_string());
        }
        registry
    }

    pub fn claim_type(&mut self, name: &str, owner: &str) -> SearchResult<()> {
        check_name(name)?;
        claim(&mut self.types, name, owner)
    }

    pub fn claim_query_field(&mut self, name: &str, owner: &str) -> SearchResult<()> {
        check_name(name)?;
        claim(&mut self.query_fields, name, owner)
    }

    /// Domain owning a type name, if claimed
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

fn claim(names: &mut BTreeMap<String, String>, name: &str, owner: &str) -> SearchResult<()> {
    if let Some(first) = names.get(name) {
        return Err(SearchError::DuplicateTypeName {
            name: name.to_string(),
            first: first.clone(),
            second: owner.to_string(),
        });
    }
    names.insert(name.to_string(), owner.to_string());
    Ok(())
}

fn check_name(name: &str) -> SearchResult<()> {
    if name.starts_with("__") || !GRAPHQL_NAME.is_match(name) {
        return Err(SearchError::InvalidConfiguration(format!(
            "'{}' is not a valid GraphQL name",
            name
        )));
    }
    Ok(())
}

/// Composed schema plus the names it serves
#[derive(Clone)]
pub struct ComposedSchema {
    pub schema: GraphQLSchema,
    pub registry: TypeRegistry,
    /// Root field name to result type name, in registration order
    pub query_fields: IndexMap<String, String>,
}

impl ComposedSchema {
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }
}

/// Builder merging search domains into one schema
#[derive(Default)]
pub struct SchemaComposer {
    registrations: Vec<DomainRegistration>,
}

impl SchemaComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(mut self, registration: DomainRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn domains(mut self, registrations: impl IntoIterator<Item = DomainRegistration>) -> Self {
        self.registrations.extend(registrations);
        self
    }

    /// Claim every generated name, failing on the first collision
    pub fn validate(&self) -> SearchResult<TypeRegistry> {
        if self.registrations.is_empty() {
            return Err(SearchError::InvalidConfiguration(
                "at least one search domain must be registered".to_string(),
            ));
        }

        let mut registry = TypeRegistry::new();
        for registration in &self.registrations {
            let owner = registration.type_name.as_str();
            registry.claim_type(&registration.type_name, owner)?;
            registry.claim_type(&registration.hit_type_name, owner)?;
            registry.claim_type(&registration.hit_results_type(), owner)?;
            if !registration.domain.returned_fields().is_empty() {
                registry.claim_type(&registration.hit_fields_type(), owner)?;
            }
            registry.claim_query_field(&registration.query_field(), owner)?;
            field_names(registration)?;
        }
        Ok(registry)
    }

    /// Build the executable schema; the service answers every domain
    pub fn compose(self, service: Arc<SearchService>) -> SearchResult<ComposedSchema> {
        let registry = self.validate()?;

        let mut query = Object::new(QUERY_TYPE);
        let mut query_fields = IndexMap::new();
        for registration in &self.registrations {
            query = query.field(root_field(registration));
            query_fields.insert(registration.query_field(), registration.type_name.clone());
        }

        let mut builder = shared_types(Schema::build(QUERY_TYPE, None, None))
            .register(query)
            .data(GraphQLContext::new(service))
            .extension(MetricsExtension)
            .limit_depth(MAX_QUERY_DEPTH);

        for registration in &self.registrations {
            builder = builder
                .register(result_type(registration))
                .register(hit_results_type(registration))
                .register(hit_type(registration));
            let fields = field_names(registration)?;
            if !fields.is_empty() {
                builder = builder.register(hit_fields_type(registration, fields));
            }
            debug!(
                type_name = %registration.type_name,
                query_field = %registration.query_field(),
                index = %registration.domain.index(),
                "Registered search domain"
            );
        }

        let schema = builder
            .finish()
            .map_err(|e| SearchError::InvalidConfiguration(format!("schema build failed: {}", e)))?;

        info!(domains = self.registrations.len(), "Composed GraphQL schema");

        Ok(ComposedSchema {
            schema,
            registry,
            query_fields,
        })
    }
}

/// `ResultSet` becomes `resultSet`
pub fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Document field path as a GraphQL field name
pub fn sanitize_field_name(field: &str) -> String {
    let mut name: String = field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Sanitized GraphQL name to document field path
fn field_names(registration: &DomainRegistration) -> SearchResult<IndexMap<String, String>> {
    let mut names = IndexMap::new();
    for field in registration.domain.returned_fields() {
        let name = sanitize_field_name(field);
        if let Some(existing) = names.insert(name.clone(), field.clone()) {
            return Err(SearchError::InvalidConfiguration(format!(
                "returned fields '{}' and '{}' of {} both map to GraphQL field '{}'",
                existing, field, registration.hit_type_name, name
            )));
        }
    }
    Ok(names)
}

fn shared_types(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .register(json_scalar())
        .register(summary_type())
        .register(sort_option_type())
        .register(page_info_type())
        .register(facet_set_type())
        .register(facet_option_type())
        .register(applied_filter_type())
        .register(filter_input_type())
        .register(page_input_type())
}

fn root_field(registration: &DomainRegistration) -> Field {
    let domain = Arc::clone(&registration.domain);
    let type_name = registration.type_name.clone();

    Field::new(
        registration.query_field(),
        TypeRef::named_nn(&registration.type_name),
        move |ctx| {
            let domain = Arc::clone(&domain);
            let type_name = type_name.clone();
            FieldFuture::new(async move {
                let context = ctx.data::<GraphQLContext>()?;
                let request = parse_request(&ctx)?;
                let results = context
                    .service
                    .search(&type_name, &domain, &request)
                    .await
                    .map_err(into_graphql_error)?;
                Ok(Some(FieldValue::owned_any(results)))
            })
        },
    )
    .description(format!("Search the {} index", registration.domain.index()))
    .argument(InputValue::new("query", TypeRef::named(TypeRef::STRING)))
    .argument(InputValue::new("filters", TypeRef::named_nn_list(FILTER_INPUT_TYPE)))
    .argument(InputValue::new("page", TypeRef::named(PAGE_INPUT_TYPE)))
    .argument(InputValue::new("sortBy", TypeRef::named(TypeRef::STRING)))
}

/// Read root field arguments into a search request
fn parse_request(ctx: &ResolverContext<'_>) -> async_graphql::Result<SearchRequest> {
    let mut request = SearchRequest::new();

    if let Some(query) = ctx.args.get("query").filter(|v| !v.is_null()) {
        request.query = Some(query.string()?.to_string());
    }

    if let Some(filters) = ctx.args.get("filters").filter(|v| !v.is_null()) {
        for filter in filters.list()?.iter() {
            let filter = filter.object()?;
            let identifier = filter.try_get("identifier")?.string()?.to_string();
            let value = filter.try_get("value")?.string()?.to_string();
            request.select(identifier, value);
        }
    }

    if let Some(page) = ctx.args.get("page").filter(|v| !v.is_null()) {
        let page = page.object()?;
        if let Some(from) = page.get("from").filter(|v| !v.is_null()) {
            request.page.from = page_number(from.i64()?, "from")?;
        }
        if let Some(size) = page.get("size").filter(|v| !v.is_null()) {
            request.page.size = page_number(size.i64()?, "size")?;
        }
    }

    if let Some(sort_by) = ctx.args.get("sortBy").filter(|v| !v.is_null()) {
        request.sort_by = Some(sort_by.string()?.to_string());
    }

    Ok(request)
}

fn page_number(value: i64, name: &str) -> async_graphql::Result<usize> {
    usize::try_from(value).map_err(|_| {
        into_graphql_error(SearchError::InvalidPage(format!(
            "page.{} must not be negative, got {}",
            name, value
        )))
    })
}

/// GraphQL error carrying the error code under `extensions.code`
pub fn into_graphql_error(err: SearchError) -> async_graphql::Error {
    let code = err.code();
    async_graphql::Error::new(err.to_string()).extend_with(|_, e| e.set("code", code))
}

fn result_type(registration: &DomainRegistration) -> Object {
    Object::new(&registration.type_name)
        .description(format!("Search results from the {} index", registration.domain.index()))
        .field(parent_field(
            "summary",
            TypeRef::named_nn(SUMMARY_TYPE),
            |results: &SearchResults| Ok(FieldValue::borrowed_any(&results.summary)),
        ))
        .field(parent_field(
            "hits",
            TypeRef::named_nn(registration.hit_results_type()),
            |results: &SearchResults| Ok(FieldValue::borrowed_any(results)),
        ))
        .field(parent_field(
            "facets",
            TypeRef::named_nn_list_nn(FACET_SET_TYPE),
            |results: &SearchResults| {
                Ok(FieldValue::list(
                    results.facets.iter().map(|facet| FieldValue::borrowed_any(facet)),
                ))
            },
        ))
        .field(parent_field(
            "appliedFilters",
            TypeRef::named_nn_list_nn(APPLIED_FILTER_TYPE),
            |results: &SearchResults| {
                Ok(FieldValue::list(
                    results
                        .applied_filters
                        .iter()
                        .map(|filter| FieldValue::borrowed_any(filter)),
                ))
            },
        ))
        .field(parent_field(
            "sortedBy",
            TypeRef::named_nn(TypeRef::STRING),
            |results: &SearchResults| string_value(&results.sorted_by),
        ))
}

fn hit_results_type(registration: &DomainRegistration) -> Object {
    Object::new(registration.hit_results_type())
        .field(parent_field(
            "items",
            TypeRef::named_nn_list_nn(&registration.hit_type_name),
            |results: &SearchResults| {
                Ok(FieldValue::list(
                    results.hits.iter().map(|hit| FieldValue::borrowed_any(hit)),
                ))
            },
        ))
        .field(parent_field(
            "page",
            TypeRef::named_nn(PAGE_INFO_TYPE),
            |results: &SearchResults| Ok(FieldValue::borrowed_any(&results.page)),
        ))
}

fn hit_type(registration: &DomainRegistration) -> Object {
    let mut hit = Object::new(&registration.hit_type_name)
        .field(parent_field(
            "id",
            TypeRef::named_nn(TypeRef::ID),
            |hit: &SearchHit| string_value(&hit.id),
        ))
        .field(parent_field(
            "score",
            TypeRef::named(TypeRef::FLOAT),
            |hit: &SearchHit| {
                Ok(FieldValue::value(
                    hit.score.map(Value::from).unwrap_or(Value::Null),
                ))
            },
        ));

    if !registration.domain.returned_fields().is_empty() {
        hit = hit.field(parent_field(
            "fields",
            TypeRef::named_nn(registration.hit_fields_type()),
            |hit: &SearchHit| Ok(FieldValue::borrowed_any(hit)),
        ));
    }
    hit
}

fn hit_fields_type(registration: &DomainRegistration, fields: IndexMap<String, String>) -> Object {
    let mut object = Object::new(registration.hit_fields_type());
    for (name, path) in fields {
        object = object.field(parent_field(
            name,
            TypeRef::named(JSON_SCALAR),
            move |hit: &SearchHit| {
                let value = match hit.fields.get(&path) {
                    Some(value) => Value::from_json(value.clone())?,
                    None => Value::Null,
                };
                Ok(FieldValue::value(value))
            },
        ));
    }
    object
}
