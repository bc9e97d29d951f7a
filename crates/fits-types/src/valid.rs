//! Query parameter validation.
//!
//! Every parameter name the HTTP API recognizes maps to exactly one
//! [`Param`], and every [`Param`] has exactly one validator. Routes declare
//! a [`Schema`] of required and optional names; [`Query::parse`] checks an
//! incoming query string against it and returns the typed values.
//!
//! A schema name with no validator is a server bug and is reported as
//! [`ValidationError::Internal`]. Everything else the client can get wrong
//! is [`ValidationError::BadRequest`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::bbox::Bbox;

/// Largest accepted `days` value.
pub const MAX_DAYS: u32 = 365_000;

/// Default width in pixels for site maps.
pub const DEFAULT_MAP_WIDTH: u32 = 130;

/// Errors produced while validating query parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The client sent something that cannot be accepted.
    #[error("{0}")]
    BadRequest(String),

    /// The server asked for a parameter it has no validator for.
    #[error("{0}")]
    Internal(String),
}

fn bad(msg: impl Into<String>) -> ValidationError {
    ValidationError::BadRequest(msg.into())
}

// ---------------------------------------------------------------------------
// Parsed value types
// ---------------------------------------------------------------------------

/// Plot drawing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotType {
    /// Points joined by a line with an error band.
    #[default]
    Line,
    /// Unjoined points with error bars.
    Scatter,
}

/// Sparkline label style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Label {
    /// First, last, min and max values.
    #[default]
    All,
    /// Latest value only.
    Latest,
    /// No labels.
    None,
}

/// Plot colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// Colours for screens.
    #[default]
    Web,
    /// High contrast colours for projectors.
    Projector,
}

/// Requested y-axis range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YRange {
    /// Fixed bounds.
    Fixed {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Half-height about the middle of the data.
    Symmetric(f64),
}

/// A spatial reference system, e.g. `EPSG:4326`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Srs {
    /// Authority name, e.g. `EPSG`.
    pub auth: String,
    /// Numeric id within the authority.
    pub id: i32,
}

impl Default for Srs {
    fn default() -> Self {
        Self {
            auth: "EPSG".to_owned(),
            id: 4326,
        }
    }
}

impl fmt::Display for Srs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.auth, self.id)
    }
}

/// A validated parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Identifier-like text.
    Text(String),
    /// A list of identifiers.
    List(Vec<String>),
    /// A non-negative count.
    Count(u32),
    /// An instant.
    Time(DateTime<Utc>),
    /// A y-axis range.
    YRange(YRange),
    /// A plot style.
    PlotType(PlotType),
    /// A sparkline label style.
    Label(Label),
    /// A colour scheme.
    Scheme(Scheme),
    /// A boolean flag.
    Flag(bool),
    /// A bounding box.
    Bbox(Bbox),
    /// A spatial reference system.
    Srs(Srs),
}

// ---------------------------------------------------------------------------
// Parameter table
// ---------------------------------------------------------------------------

/// Every query parameter the API recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Param {
    /// `siteID`
    SiteId,
    /// `typeID`
    TypeId,
    /// `methodID`
    MethodId,
    /// `networkID`, accepted and ignored.
    NetworkId,
    /// `sites`
    Sites,
    /// `days`
    Days,
    /// `start`
    Start,
    /// `yrange`
    YRange,
    /// `type` (plot type)
    PlotType,
    /// `label`
    Label,
    /// `stddev`
    Stddev,
    /// `showMethod`
    ShowMethod,
    /// `scheme`
    Scheme,
    /// `bbox`
    Bbox,
    /// `insetBbox`
    InsetBbox,
    /// `within`
    Within,
    /// `srsName`
    SrsName,
    /// `width`
    Width,
    /// `aggregate`
    Aggregate,
    /// `latest`
    Latest,
    /// `fields`
    Fields,
}

impl Param {
    /// All parameters.
    pub const ALL: [Self; 21] = [
        Self::SiteId,
        Self::TypeId,
        Self::MethodId,
        Self::NetworkId,
        Self::Sites,
        Self::Days,
        Self::Start,
        Self::YRange,
        Self::PlotType,
        Self::Label,
        Self::Stddev,
        Self::ShowMethod,
        Self::Scheme,
        Self::Bbox,
        Self::InsetBbox,
        Self::Within,
        Self::SrsName,
        Self::Width,
        Self::Aggregate,
        Self::Latest,
        Self::Fields,
    ];

    /// Query string name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::SiteId => "siteID",
            Self::TypeId => "typeID",
            Self::MethodId => "methodID",
            Self::NetworkId => "networkID",
            Self::Sites => "sites",
            Self::Days => "days",
            Self::Start => "start",
            Self::YRange => "yrange",
            Self::PlotType => "type",
            Self::Label => "label",
            Self::Stddev => "stddev",
            Self::ShowMethod => "showMethod",
            Self::Scheme => "scheme",
            Self::Bbox => "bbox",
            Self::InsetBbox => "insetBbox",
            Self::Within => "within",
            Self::SrsName => "srsName",
            Self::Width => "width",
            Self::Aggregate => "aggregate",
            Self::Latest => "latest",
            Self::Fields => "fields",
        }
    }

    /// Look up the parameter for a query string name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Validate and parse one raw (already URL-decoded) value.
    pub fn validate(self, raw: &str) -> Result<Value, ValidationError> {
        if raw.is_empty() {
            return Err(bad(format!("empty value for {}", self.name())));
        }

        match self {
            Self::SiteId | Self::TypeId | Self::MethodId | Self::NetworkId | Self::Aggregate => {
                text(raw).map(|t| Value::Text(t.to_owned()))
            }
            Self::Sites => sites(raw).map(Value::List),
            Self::Fields => raw
                .split(',')
                .map(|f| text(f).map(str::to_owned))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Self::Days => days(raw).map(Value::Count),
            Self::Latest => raw
                .parse::<u32>()
                .map(Value::Count)
                .map_err(|e| bad(format!("invalid latest {raw}: {e}"))),
            Self::Width => match raw.parse::<u32>() {
                Ok(w) if w > 0 => Ok(Value::Count(w)),
                _ => Err(bad(format!("invalid width: {raw}"))),
            },
            Self::Start => DateTime::parse_from_rfc3339(raw)
                .map(|t| Value::Time(t.with_timezone(&Utc)))
                .map_err(|e| bad(format!("invalid start {raw}: {e}"))),
            Self::YRange => yrange(raw).map(Value::YRange),
            Self::PlotType => match raw {
                "line" => Ok(Value::PlotType(PlotType::Line)),
                "scatter" => Ok(Value::PlotType(PlotType::Scatter)),
                _ => Err(bad(format!("invalid type: {raw}"))),
            },
            Self::Label => match raw {
                "all" => Ok(Value::Label(Label::All)),
                "latest" => Ok(Value::Label(Label::Latest)),
                "none" => Ok(Value::Label(Label::None)),
                _ => Err(bad(format!("invalid label: {raw}"))),
            },
            Self::Stddev => match raw {
                "pop" => Ok(Value::Flag(true)),
                _ => Err(bad(format!("invalid stddev: {raw}"))),
            },
            Self::ShowMethod => match raw {
                "true" => Ok(Value::Flag(true)),
                "false" => Ok(Value::Flag(false)),
                _ => Err(bad(format!("invalid showMethod: {raw}"))),
            },
            Self::Scheme => match raw {
                "web" => Ok(Value::Scheme(Scheme::Web)),
                "projector" => Ok(Value::Scheme(Scheme::Projector)),
                _ => Err(bad(format!("invalid scheme: {raw}"))),
            },
            Self::Bbox | Self::InsetBbox => raw.parse::<Bbox>().map(Value::Bbox),
            Self::Within => within(raw).map(Value::Text),
            Self::SrsName => srs(raw).map(Value::Srs),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_text_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ',' | '.' | '-')
}

fn text(raw: &str) -> Result<&str, ValidationError> {
    if !raw.is_empty() && raw.chars().all(is_text_char) {
        Ok(raw)
    } else {
        Err(bad(format!("invalid string: {raw}")))
    }
}

/// Split a `sites` list, dropping any `NET.` prefix from each element.
fn sites(raw: &str) -> Result<Vec<String>, ValidationError> {
    text(raw)?
        .split(',')
        .map(|s| match s.split('.').collect::<Vec<_>>().as_slice() {
            [site] if !site.is_empty() => Ok((*site).to_owned()),
            [_, site] if !site.is_empty() => Ok((*site).to_owned()),
            _ => Err(bad(format!("invalid site in sites: {s}"))),
        })
        .collect()
}

fn days(raw: &str) -> Result<u32, ValidationError> {
    match raw.parse::<u32>() {
        Ok(d) if d <= MAX_DAYS => Ok(d),
        _ => Err(bad(format!("invalid days query param: {raw}"))),
    }
}

fn yrange(raw: &str) -> Result<YRange, ValidationError> {
    let invalid = || bad(format!("invalid yrange query param: {raw}"));
    let parse = |s: &str| s.trim().parse::<f64>().ok().filter(|v| v.is_finite());

    match raw.split(',').collect::<Vec<_>>().as_slice() {
        [r] => parse(r)
            .filter(|r| *r > 0.0)
            .map(YRange::Symmetric)
            .ok_or_else(invalid),
        [lo, hi] => match (parse(lo), parse(hi)) {
            (Some(min), Some(max)) if min < max => Ok(YRange::Fixed { min, max }),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

fn within(raw: &str) -> Result<String, ValidationError> {
    let poly = raw.replace('+', " ");
    let body = poly
        .strip_prefix("POLYGON((")
        .and_then(|s| s.strip_suffix("))"))
        .filter(|b| !b.is_empty())
        .ok_or_else(|| bad(format!("invalid within: {raw}")))?;

    if body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | ',' | ' ' | '.'))
    {
        Ok(poly)
    } else {
        Err(bad(format!("invalid within: {raw}")))
    }
}

fn srs(raw: &str) -> Result<Srs, ValidationError> {
    let invalid = || bad(format!("invalid srsName: {raw}"));
    let (auth, id) = raw.split_once(':').ok_or_else(invalid)?;
    if auth.is_empty() || !auth.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let id = id.parse::<i32>().map_err(|e| bad(format!("invalid srsName {raw}: {e}")))?;
    Ok(Srs {
        auth: auth.to_owned(),
        id,
    })
}

// ---------------------------------------------------------------------------
// Route schemas
// ---------------------------------------------------------------------------

/// The parameter names a route accepts.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Names that must be present.
    pub required: &'static [&'static str],
    /// Names that may be present.
    pub optional: &'static [&'static str],
}

impl Schema {
    /// Create a schema.
    pub const fn new(required: &'static [&'static str], optional: &'static [&'static str]) -> Self {
        Self { required, optional }
    }

    fn accepts(&self, name: &str) -> bool {
        self.required.iter().chain(self.optional).any(|n| *n == name)
    }

    /// Resolve every declared name to its [`Param`].
    pub fn params(&self) -> Result<Vec<Param>, ValidationError> {
        self.required
            .iter()
            .chain(self.optional)
            .map(|n| {
                Param::from_name(n)
                    .ok_or_else(|| ValidationError::Internal(format!("no validator for {n}")))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Validated query parameters for one request.
#[derive(Debug, Clone, Default)]
pub struct Query {
    present: BTreeSet<Param>,
    site_id: Option<String>,
    type_id: Option<String>,
    method_id: Option<String>,
    sites: Vec<String>,
    days: u32,
    start: Option<DateTime<Utc>>,
    yrange: Option<YRange>,
    plot_type: PlotType,
    label: Label,
    stddev: bool,
    show_method: bool,
    scheme: Scheme,
    bbox: Option<Bbox>,
    inset_bbox: Option<Bbox>,
    within: Option<String>,
    srs: Option<Srs>,
    width: Option<u32>,
    aggregate: Option<String>,
    latest: Option<u32>,
    fields: Vec<String>,
}

impl Query {
    /// Decode a raw `application/x-www-form-urlencoded` query string and
    /// validate it against `schema`.
    pub fn from_query_string(schema: &Schema, raw: Option<&str>) -> Result<Self, ValidationError> {
        let pairs = url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()));
        Self::parse(schema, pairs)
    }

    /// Validate decoded key/value pairs against `schema`.
    pub fn parse<I>(schema: &Schema, pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        schema.params()?;

        let mut seen: Vec<(String, String)> = Vec::new();
        for (k, v) in pairs {
            if seen.iter().any(|(s, _)| *s == k) {
                return Err(bad(format!("expected 1 value for {k}")));
            }
            seen.push((k, v));
        }

        if let Some((k, _)) = seen.iter().find(|(k, _)| !schema.accepts(k)) {
            return Err(bad(format!("unexpected query parameter {k}")));
        }

        if let Some(missing) = schema
            .required
            .iter()
            .find(|r| !seen.iter().any(|(k, _)| k.as_str() == **r))
        {
            return Err(bad(format!("missing required query parameter {missing}")));
        }

        let mut typed: Vec<(Param, &str)> = seen
            .iter()
            .map(|(k, v)| {
                Param::from_name(k)
                    .map(|p| (p, v.as_str()))
                    .ok_or_else(|| ValidationError::Internal(format!("no validator for {k}")))
            })
            .collect::<Result<_, _>>()?;
        typed.sort_by_key(|(p, _)| *p);

        let mut q = Self::default();
        for (p, raw) in typed {
            let value = p.validate(raw)?;
            q.set(p, value);
        }
        Ok(q)
    }

    fn set(&mut self, p: Param, v: Value) {
        self.present.insert(p);
        match (p, v) {
            (Param::SiteId, Value::Text(t)) => self.site_id = Some(t),
            (Param::TypeId, Value::Text(t)) => self.type_id = Some(t),
            (Param::MethodId, Value::Text(t)) => self.method_id = Some(t),
            (Param::Aggregate, Value::Text(t)) => self.aggregate = Some(t),
            (Param::Within, Value::Text(t)) => self.within = Some(t),
            (Param::Sites, Value::List(l)) => self.sites = l,
            (Param::Fields, Value::List(l)) => self.fields = l,
            (Param::Days, Value::Count(d)) => self.days = d,
            (Param::Width, Value::Count(w)) => self.width = Some(w),
            (Param::Latest, Value::Count(n)) => self.latest = Some(n),
            (Param::Start, Value::Time(t)) => self.start = Some(t),
            (Param::YRange, Value::YRange(y)) => self.yrange = Some(y),
            (Param::PlotType, Value::PlotType(t)) => self.plot_type = t,
            (Param::Label, Value::Label(l)) => self.label = l,
            (Param::Scheme, Value::Scheme(s)) => self.scheme = s,
            (Param::Stddev, Value::Flag(f)) => self.stddev = f,
            (Param::ShowMethod, Value::Flag(f)) => self.show_method = f,
            (Param::Bbox, Value::Bbox(b)) => self.bbox = Some(b),
            (Param::InsetBbox, Value::Bbox(b)) => self.inset_bbox = Some(b),
            (Param::SrsName, Value::Srs(s)) => self.srs = Some(s),
            // networkID is accepted for compatibility and otherwise ignored.
            _ => {}
        }
    }

    /// True when `p` was present in the query.
    pub fn has(&self, p: Param) -> bool {
        self.present.contains(&p)
    }

    /// `siteID`
    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref()
    }

    /// `typeID`
    pub fn type_id(&self) -> Option<&str> {
        self.type_id.as_deref()
    }

    /// `methodID`
    pub fn method_id(&self) -> Option<&str> {
        self.method_id.as_deref()
    }

    /// `sites`, with any network prefix removed.
    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// `days`; 0 when absent.
    pub const fn days(&self) -> u32 {
        self.days
    }

    /// `start`
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// `yrange`
    pub const fn yrange(&self) -> Option<YRange> {
        self.yrange
    }

    /// `type`; line when absent.
    pub const fn plot_type(&self) -> PlotType {
        self.plot_type
    }

    /// `label`; all when absent.
    pub const fn label(&self) -> Label {
        self.label
    }

    /// `stddev=pop`
    pub const fn stddev(&self) -> bool {
        self.stddev
    }

    /// `showMethod`
    pub const fn show_method(&self) -> bool {
        self.show_method
    }

    /// `scheme`; web when absent.
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// `bbox`
    pub const fn bbox(&self) -> Option<Bbox> {
        self.bbox
    }

    /// `insetBbox`
    pub const fn inset_bbox(&self) -> Option<Bbox> {
        self.inset_bbox
    }

    /// `within`, with `+` read as a space.
    pub fn within(&self) -> Option<&str> {
        self.within.as_deref()
    }

    /// `srsName`; `EPSG:4326` when absent.
    pub fn srs(&self) -> Srs {
        self.srs.clone().unwrap_or_default()
    }

    /// `width`; [`DEFAULT_MAP_WIDTH`] when absent.
    pub fn width(&self) -> u32 {
        self.width.unwrap_or(DEFAULT_MAP_WIDTH)
    }

    /// `aggregate`
    pub fn aggregate(&self) -> Option<&str> {
        self.aggregate.as_deref()
    }

    /// `latest`
    pub const fn latest(&self) -> Option<u32> {
        self.latest
    }

    /// `fields`
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}
