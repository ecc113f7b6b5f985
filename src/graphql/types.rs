//! GraphQL type definitions shared by every search domain
//!
//! Object fields resolve by downcasting their parent to the matching
//! `search` result struct.

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputObject, InputValue, Object, Scalar, TypeRef,
};
use async_graphql::Value;
use std::any::Any;

use crate::search::{
    AppliedFilter, FacetOption, FacetResult, PageInfo, SearchSummary, SortOptionSummary,
};

pub const QUERY_TYPE: &str = "Query";
pub const JSON_SCALAR: &str = "JSON";
pub const SUMMARY_TYPE: &str = "SearchSummary";
pub const SORT_OPTION_TYPE: &str = "SortOption";
pub const PAGE_INFO_TYPE: &str = "PageInfo";
pub const FACET_SET_TYPE: &str = "FacetSet";
pub const FACET_OPTION_TYPE: &str = "FacetOption";
pub const APPLIED_FILTER_TYPE: &str = "AppliedFilter";
pub const FILTER_INPUT_TYPE: &str = "FilterInput";
pub const PAGE_INPUT_TYPE: &str = "PageInput";

/// Names owned by the shared types; no domain may claim them
pub const RESERVED_TYPE_NAMES: &[&str] = &[
    QUERY_TYPE,
    JSON_SCALAR,
    SUMMARY_TYPE,
    SORT_OPTION_TYPE,
    PAGE_INFO_TYPE,
    FACET_SET_TYPE,
    FACET_OPTION_TYPE,
    APPLIED_FILTER_TYPE,
    FILTER_INPUT_TYPE,
    PAGE_INPUT_TYPE,
];

/// Field resolved synchronously from a parent of type `T`
pub(crate) fn parent_field<T, F>(name: impl Into<String>, ty: TypeRef, resolve: F) -> Field
where
    T: Any + Send + Sync,
    F: for<'a> Fn(&'a T) -> async_graphql::Result<FieldValue<'a>> + Send + Sync + 'static,
{
    Field::new(name, ty, move |ctx| {
        let resolved = ctx
            .parent_value
            .try_downcast_ref::<T>()
            .and_then(|parent| resolve(parent));
        FieldFuture::new(async move { resolved.map(Some) })
    })
}

pub(crate) fn string_value(value: &str) -> async_graphql::Result<FieldValue<'static>> {
    Ok(FieldValue::value(Value::from(value)))
}

pub(crate) fn count_value<N: Into<Value>>(value: N) -> async_graphql::Result<FieldValue<'static>> {
    Ok(FieldValue::value(value.into()))
}

pub(crate) fn json_scalar() -> Scalar {
    Scalar::new(JSON_SCALAR).description("Arbitrary JSON value of a returned document field")
}

pub(crate) fn summary_type() -> Object {
    Object::new(SUMMARY_TYPE)
        .field(parent_field(
            "total",
            TypeRef::named_nn(TypeRef::INT),
            |summary: &SearchSummary| count_value(summary.total),
        ))
        .field(parent_field(
            "query",
            TypeRef::named_nn(TypeRef::STRING),
            |summary: &SearchSummary| string_value(&summary.query),
        ))
        .field(parent_field(
            "sortOptions",
            TypeRef::named_nn_list_nn(SORT_OPTION_TYPE),
            |summary: &SearchSummary| {
                Ok(FieldValue::list(
                    summary
                        .sort_options
                        .iter()
                        .map(|option| FieldValue::borrowed_any(option)),
                ))
            },
        ))
}

pub(crate) fn sort_option_type() -> Object {
    Object::new(SORT_OPTION_TYPE)
        .field(parent_field(
            "id",
            TypeRef::named_nn(TypeRef::STRING),
            |option: &SortOptionSummary| string_value(&option.id),
        ))
        .field(parent_field(
            "label",
            TypeRef::named_nn(TypeRef::STRING),
            |option: &SortOptionSummary| string_value(&option.label),
        ))
}

pub(crate) fn page_info_type() -> Object {
    Object::new(PAGE_INFO_TYPE)
        .field(parent_field(
            "from",
            TypeRef::named_nn(TypeRef::INT),
            |page: &PageInfo| count_value(page.from),
        ))
        .field(parent_field(
            "size",
            TypeRef::named_nn(TypeRef::INT),
            |page: &PageInfo| count_value(page.size),
        ))
        .field(parent_field(
            "total",
            TypeRef::named_nn(TypeRef::INT),
            |page: &PageInfo| count_value(page.total),
        ))
        .field(parent_field(
            "totalPages",
            TypeRef::named_nn(TypeRef::INT),
            |page: &PageInfo| count_value(page.total_pages),
        ))
        .field(parent_field(
            "pageNumber",
            TypeRef::named_nn(TypeRef::INT),
            |page: &PageInfo| count_value(page.page_number),
        ))
}

pub(crate) fn facet_set_type() -> Object {
    Object::new(FACET_SET_TYPE)
        .field(parent_field(
            "identifier",
            TypeRef::named_nn(TypeRef::STRING),
            |facet: &FacetResult| string_value(&facet.identifier),
        ))
        .field(parent_field(
            "label",
            TypeRef::named_nn(TypeRef::STRING),
            |facet: &FacetResult| string_value(&facet.label),
        ))
        .field(parent_field(
            "display",
            TypeRef::named_nn(TypeRef::STRING),
            |facet: &FacetResult| string_value(&facet.display),
        ))
        .field(parent_field(
            "multipleSelect",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |facet: &FacetResult| Ok(FieldValue::value(Value::from(facet.multiple_select))),
        ))
        .field(parent_field(
            "options",
            TypeRef::named_nn_list_nn(FACET_OPTION_TYPE),
            |facet: &FacetResult| {
                Ok(FieldValue::list(
                    facet
                        .options
                        .iter()
                        .map(|option| FieldValue::borrowed_any(option)),
                ))
            },
        ))
}

pub(crate) fn facet_option_type() -> Object {
    Object::new(FACET_OPTION_TYPE)
        .field(parent_field(
            "value",
            TypeRef::named_nn(TypeRef::STRING),
            |option: &FacetOption| string_value(&option.value),
        ))
        .field(parent_field(
            "label",
            TypeRef::named_nn(TypeRef::STRING),
            |option: &FacetOption| string_value(&option.label),
        ))
        .field(parent_field(
            "count",
            TypeRef::named_nn(TypeRef::INT),
            |option: &FacetOption| count_value(option.count),
        ))
        .field(parent_field(
            "selected",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |option: &FacetOption| Ok(FieldValue::value(Value::from(option.selected))),
        ))
}

pub(crate) fn applied_filter_type() -> Object {
    Object::new(APPLIED_FILTER_TYPE)
        .field(parent_field(
            "type",
            TypeRef::named_nn(TypeRef::STRING),
            |filter: &AppliedFilter| string_value(filter.kind.as_str()),
        ))
        .field(parent_field(
            "id",
            TypeRef::named_nn(TypeRef::ID),
            |filter: &AppliedFilter| string_value(&filter.id),
        ))
        .field(parent_field(
            "identifier",
            TypeRef::named_nn(TypeRef::STRING),
            |filter: &AppliedFilter| string_value(&filter.identifier),
        ))
        .field(parent_field(
            "label",
            TypeRef::named_nn(TypeRef::STRING),
            |filter: &AppliedFilter| string_value(&filter.label),
        ))
        .field(parent_field(
            "value",
            TypeRef::named_nn(TypeRef::STRING),
            |filter: &AppliedFilter| string_value(&filter.value),
        ))
        .field(parent_field(
            "display",
            TypeRef::named_nn(TypeRef::STRING),
            |filter: &AppliedFilter| string_value(&filter.display),
        ))
}

pub(crate) fn filter_input_type() -> InputObject {
    InputObject::new(FILTER_INPUT_TYPE)
        .description("One selected value of a filter")
        .field(InputValue::new("identifier", TypeRef::named_nn(TypeRef::STRING)))
        .field(InputValue::new("value", TypeRef::named_nn(TypeRef::STRING)))
}

pub(crate) fn page_input_type() -> InputObject {
    InputObject::new(PAGE_INPUT_TYPE)
        .description("Pagination window")
        .field(InputValue::new("from", TypeRef::named(TypeRef::INT)))
        .field(InputValue::new("size", TypeRef::named(TypeRef::INT)))
}
