//! Sort parameters
//!
//! An endpoint declares the closed set of fields it can sort by. Requests
//! choose one with `?sort_by=` and a direction with `?sort_order=asc|desc`;
//! anything outside the declared set is rejected as a validation failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use api_scaffold::envelope::Envelope;
//! use api_scaffold::sorting::{Sort, SortFields};
//!
//! struct UserSort;
//!
//! impl SortFields for UserSort {
//!     const FIELDS: &'static [&'static str] = &["name", "age"];
//! }
//!
//! async fn list_users(sort: Sort<UserSort>) -> Envelope<String> {
//!     // `sort_by` defaults to "name", `sort_order` to desc
//!     Envelope::wrap(sort.order_by_clause().unwrap_or_default())
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::pipeline::ApiError;
use crate::validation::{self, LocItem, ValidationErrorRecord, ValidationFailure};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    const VARIANTS: [&'static str; 2] = ["asc", "desc"];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// SQL `ORDER BY` direction keyword
    ///
    /// ```rust
    /// use api_scaffold::sorting::SortOrder;
    ///
    /// assert_eq!(SortOrder::Asc.as_sql(), "ASC");
    /// assert_eq!(SortOrder::Desc.as_sql(), "DESC");
    /// ```
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parse the exact query values `asc` and `desc`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated sort request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    /// Field to sort by; absent only when the endpoint declares no fields
    /// and no default
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl SortSpec {
    pub fn field(&self) -> Option<&str> {
        self.sort_by.as_deref()
    }

    pub fn is_ascending(&self) -> bool {
        self.sort_order == SortOrder::Asc
    }

    /// `"<field> ASC|DESC"`, or `None` when there is no field
    ///
    /// The field always comes from the endpoint's declared set, never from
    /// raw request text.
    pub fn order_by_clause(&self) -> Option<String> {
        self.sort_by
            .as_ref()
            .map(|field| format!("{field} {}", self.sort_order.as_sql()))
    }
}

/// The sort fields an endpoint accepts, plus its default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortParamsSpec {
    fields: Vec<String>,
    default: Option<String>,
}

impl SortParamsSpec {
    /// Declare the accepted sort fields
    ///
    /// The default is `default` when given, otherwise the first field. A
    /// `default` outside a non-empty field set is rejected.
    ///
    /// ```rust
    /// use api_scaffold::sorting::SortParamsSpec;
    ///
    /// let spec = SortParamsSpec::build(["name", "age"], None).unwrap();
    /// assert_eq!(spec.default_field(), Some("name"));
    ///
    /// assert!(SortParamsSpec::build(["name", "age"], Some("height")).is_err());
    /// ```
    pub fn build<I, F>(allowed: I, default: Option<&str>) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        let mut fields: Vec<String> = Vec::new();
        for field in allowed {
            let field = field.into();
            if !fields.contains(&field) {
                fields.push(field);
            }
        }

        let default = match default {
            Some(default) if !fields.is_empty() && !fields.iter().any(|f| f == default) => {
                return Err(Error::InvalidSortDefault {
                    default: default.to_string(),
                    allowed: fields,
                });
            }
            Some(default) => Some(default.to_string()),
            None => fields.first().cloned(),
        };

        Ok(Self { fields, default })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn default_field(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Validate raw `sort_by` and `sort_order` query values
    ///
    /// Both parameters are checked; a failure lists every invalid one.
    pub fn parse(
        &self,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> std::result::Result<SortSpec, ApiError> {
        parse_against(self.fields.as_slice(), self.default.as_deref(), sort_by, sort_order)
    }
}

fn parse_against<S: AsRef<str>>(
    fields: &[S],
    default: Option<&str>,
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> std::result::Result<SortSpec, ApiError> {
    let mut errors = Vec::new();

    let sort_by = match sort_by {
        None => default.map(str::to_string),
        Some(field) if fields.iter().any(|f| f.as_ref() == field) => Some(field.to_string()),
        Some(field) => {
            let expected = if fields.is_empty() {
                "absent".to_string()
            } else {
                expected_list(fields.iter().map(|f| f.as_ref()))
            };
            errors.push(enum_error("sort_by", field, expected));
            None
        }
    };

    let sort_order = match sort_order {
        None => SortOrder::default(),
        Some(raw) => SortOrder::parse(raw).unwrap_or_else(|| {
            errors.push(enum_error(
                "sort_order",
                raw,
                expected_list(SortOrder::VARIANTS.iter().copied()),
            ));
            SortOrder::default()
        }),
    };

    if !errors.is_empty() {
        return Err(ValidationFailure::new(errors)?.into());
    }

    Ok(SortSpec {
        sort_by,
        sort_order,
    })
}

/// `'a'`, `'a' or 'b'`, `'a', 'b' or 'c'`
fn expected_list<'a>(options: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = options.map(|o| format!("'{o}'")).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
    }
}

fn enum_error(param: &str, input: &str, expected: String) -> ValidationErrorRecord {
    ValidationErrorRecord::new(
        "enum",
        vec![LocItem::from("query"), LocItem::from(param)],
        "Input should be {expected}",
        Value::String(input.to_string()),
    )
    .with_ctx("expected", Value::String(expected))
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Whether `default` is acceptable for `fields`
///
/// Same rule as [`SortParamsSpec::build`]: an explicit default must be one of
/// a non-empty field set.
pub const fn declaration_is_valid(fields: &[&str], default: Option<&str>) -> bool {
    let default = match default {
        Some(default) => default,
        None => return true,
    };
    if fields.is_empty() {
        return true;
    }
    let mut i = 0;
    while i < fields.len() {
        if str_eq(fields[i], default) {
            return true;
        }
        i += 1;
    }
    false
}

/// Compile-time sort field declaration for the [`Sort`] extractor
///
/// The declaration is checked when the crate is built: using `Sort<F>` with
/// a `DEFAULT` outside `FIELDS` is a compile error.
///
/// ```rust,compile_fail
/// use api_scaffold::sorting::SortFields;
///
/// struct BrokenSort;
///
/// impl SortFields for BrokenSort {
///     const FIELDS: &'static [&'static str] = &["name"];
///     const DEFAULT: Option<&'static str> = Some("height");
/// }
///
/// const _: () = BrokenSort::DECLARATION_CHECK;
/// ```
pub trait SortFields: Send + Sync + 'static {
    /// Accepted values of `sort_by`
    const FIELDS: &'static [&'static str];

    /// Default field; the first of [`SortFields::FIELDS`] when `None`
    const DEFAULT: Option<&'static str> = None;

    #[doc(hidden)]
    const DECLARATION_CHECK: () = assert!(
        declaration_is_valid(Self::FIELDS, Self::DEFAULT),
        "SortFields::DEFAULT must be one of SortFields::FIELDS"
    );
}

#[derive(Debug, Default, Deserialize)]
struct RawSortQuery {
    sort_by: Option<String>,
    sort_order: Option<String>,
}

/// Extractor for `?sort_by=&sort_order=` constrained by `F`
pub struct Sort<F> {
    spec: SortSpec,
    _fields: PhantomData<fn() -> F>,
}

impl<F> Sort<F> {
    pub fn into_inner(self) -> SortSpec {
        self.spec
    }
}

impl<F> fmt::Debug for Sort<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sort").field(&self.spec).finish()
    }
}

impl<F> std::ops::Deref for Sort<F> {
    type Target = SortSpec;

    fn deref(&self) -> &Self::Target {
        &self.spec
    }
}

impl<F, S> FromRequestParts<S> for Sort<F>
where
    F: SortFields,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let () = F::DECLARATION_CHECK;
        let Query(raw) = Query::<RawSortQuery>::try_from_uri(&parts.uri)
            .map_err(validation::query_rejection)?;

        let default = F::DEFAULT.or(F::FIELDS.first().copied());
        let spec = parse_against(
            F::FIELDS,
            default,
            raw.sort_by.as_deref(),
            raw.sort_order.as_deref(),
        )?;
        Ok(Sort {
            spec,
            _fields: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn name_age() -> SortParamsSpec {
        SortParamsSpec::build(["name", "age"], None).unwrap()
    }

    fn errors(err: ApiError) -> Vec<crate::validation::TranslatedErrorRecord> {
        match err {
            ApiError::Validation(failure) => failure.into_errors(),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_default_is_first_field_desc() {
        let spec = name_age().parse(None, None).unwrap();
        assert_eq!(spec.field(), Some("name"));
        assert_eq!(spec.sort_order, SortOrder::Desc);
        assert_eq!(spec.order_by_clause().as_deref(), Some("name DESC"));
    }

    #[test]
    fn test_explicit_default() {
        let spec = SortParamsSpec::build(["name", "age"], Some("age")).unwrap();
        assert_eq!(spec.parse(None, Some("asc")).unwrap().field(), Some("age"));
    }

    #[test]
    fn test_invalid_default_rejected_at_build() {
        let err = SortParamsSpec::build(["name", "age"], Some("height")).unwrap_err();
        assert!(matches!(err, Error::InvalidSortDefault { .. }));
    }

    #[test]
    fn test_accepts_declared_field() {
        let spec = name_age().parse(Some("age"), Some("asc")).unwrap();
        assert_eq!(spec.field(), Some("age"));
        assert!(spec.is_ascending());
    }

    #[test]
    fn test_rejects_undeclared_field() {
        let errors = errors(name_age().parse(Some("height"), None).unwrap_err());
        assert_eq!(errors.len(), 1);
        let error = &errors[0];
        assert_eq!(error.error_type, "enum");
        assert_eq!(error.msg, "Input should be 'name' or 'age'");
        assert_eq!(
            serde_json::to_value(&error.loc).unwrap(),
            json!(["query", "sort_by"])
        );
        assert_eq!(error.input, json!("height"));
        assert_eq!(
            error.ctx.as_ref().unwrap()["expected"],
            json!("'name' or 'age'")
        );
    }

    #[test]
    fn test_rejects_bad_order_and_field_together() {
        let errors = errors(name_age().parse(Some("height"), Some("up")).unwrap_err());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].msg, "Input should be 'asc' or 'desc'");
    }

    #[test]
    fn test_order_is_case_sensitive() {
        assert!(name_age().parse(None, Some("ASC")).is_err());
    }

    #[test]
    fn test_no_fields_no_default() {
        let spec = SortParamsSpec::build(Vec::<String>::new(), None).unwrap();
        let parsed = spec.parse(None, None).unwrap();
        assert_eq!(parsed.sort_by, None);
        assert_eq!(parsed.order_by_clause(), None);
        assert!(spec.parse(Some("name"), None).is_err());
    }

    #[test]
    fn test_no_fields_with_default() {
        let spec = SortParamsSpec::build(Vec::<String>::new(), Some("created_at")).unwrap();
        assert_eq!(spec.parse(None, None).unwrap().field(), Some("created_at"));
    }

    #[test]
    fn test_independent_specs() {
        let a = SortParamsSpec::build(["name"], None).unwrap();
        let b = SortParamsSpec::build(["age"], None).unwrap();
        assert!(a.parse(Some("age"), None).is_err());
        assert!(b.parse(Some("age"), None).is_ok());
    }

    #[test]
    fn test_expected_list_formats() {
        assert_eq!(expected_list(["a"].into_iter()), "'a'");
        assert_eq!(expected_list(["a", "b"].into_iter()), "'a' or 'b'");
        assert_eq!(expected_list(["a", "b", "c"].into_iter()), "'a', 'b' or 'c'");
    }

    struct UserSort;

    impl SortFields for UserSort {
        const FIELDS: &'static [&'static str] = &["name", "age"];
    }

    struct AgeFirstSort;

    impl SortFields for AgeFirstSort {
        const FIELDS: &'static [&'static str] = &["name", "age"];
        const DEFAULT: Option<&'static str> = Some("age");
    }

    const _: () = UserSort::DECLARATION_CHECK;
    const _: () = AgeFirstSort::DECLARATION_CHECK;

    async fn extract<F: SortFields>(uri: &str) -> std::result::Result<Sort<F>, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Sort::<F>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extractor_reads_query() {
        let sort = extract::<UserSort>("/users?sort_by=age&sort_order=asc")
            .await
            .unwrap();
        assert_eq!(sort.field(), Some("age"));
        assert_eq!(sort.sort_order, SortOrder::Asc);
    }

    #[tokio::test]
    async fn test_extractor_rejects_unknown_field() {
        let err = extract::<UserSort>("/users?sort_by=height").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_extractor_uses_declared_default() {
        let sort = extract::<AgeFirstSort>("/users").await.unwrap();
        assert_eq!(sort.field(), Some("age"));
        assert_eq!(sort.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_declaration_check() {
        assert!(declaration_is_valid(&["name", "age"], None));
        assert!(declaration_is_valid(&["name", "age"], Some("age")));
        assert!(declaration_is_valid(&[], Some("created_at")));
        assert!(!declaration_is_valid(&["name"], Some("height")));
        assert!(!declaration_is_valid(&["name"], Some("nam")));
        assert!(!declaration_is_valid(&["name"], Some("names")));
    }
}
