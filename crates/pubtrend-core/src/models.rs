//! Domain models shared by the harvester, the counts store and the API.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// =============================================================================
// Year / Month
// =============================================================================

/// A calendar month, the unit of temporal bucketing.
///
/// Ordered chronologically. Serialized as the `"YYYY:MM"` key used in
/// checkpoint files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Creates a month, returning `None` when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of this month.
    pub fn first_day(&self) -> NaiveDate {
        // year/month are validated on construction, day 1 always exists
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Checkpoint key form, e.g. `"2024:01"`.
    pub fn to_key(&self) -> String {
        format!("{:04}:{:02}", self.year, self.month)
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Error type for parsing a `"YYYY:MM"` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseYearMonthError(String);

impl std::fmt::Display for ParseYearMonthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid year/month key: {}", self.0)
    }
}

impl std::error::Error for ParseYearMonthError {}

impl std::str::FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseYearMonthError(s.to_string());
        let (year, month) = s.split_once(':').ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ParseYearMonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_key()
    }
}

// =============================================================================
// OAI-PMH protocol types
// =============================================================================

/// Error codes an OAI-PMH repository can embed in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OaiErrorCode {
    /// The request matched nothing. Treated as an empty, successful page.
    NoRecordsMatch,
    BadArgument,
    BadResumptionToken,
    BadVerb,
    CannotDisseminateFormat,
    IdDoesNotExist,
    NoMetadataFormats,
    NoSetHierarchy,
    /// Any code outside the protocol's fixed vocabulary.
    Other(String),
}

impl OaiErrorCode {
    /// Classifies the `code` attribute of an `<error>` element.
    pub fn from_code(code: &str) -> Self {
        match code {
            "noRecordsMatch" => Self::NoRecordsMatch,
            "badArgument" => Self::BadArgument,
            "badResumptionToken" => Self::BadResumptionToken,
            "badVerb" => Self::BadVerb,
            "cannotDisseminateFormat" => Self::CannotDisseminateFormat,
            "idDoesNotExist" => Self::IdDoesNotExist,
            "noMetadataFormats" => Self::NoMetadataFormats,
            "noSetHierarchy" => Self::NoSetHierarchy,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NoRecordsMatch => "noRecordsMatch",
            Self::BadArgument => "badArgument",
            Self::BadResumptionToken => "badResumptionToken",
            Self::BadVerb => "badVerb",
            Self::CannotDisseminateFormat => "cannotDisseminateFormat",
            Self::IdDoesNotExist => "idDoesNotExist",
            Self::NoMetadataFormats => "noMetadataFormats",
            Self::NoSetHierarchy => "noSetHierarchy",
            Self::Other(code) => code,
        }
    }
}

impl std::fmt::Display for OaiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `<header>` of a `ListIdentifiers` response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderRecord {
    /// External identifier, e.g. `oai:arXiv.org:2401.12345`.
    pub identifier: String,
    /// Server datestamp. Kept for diagnostics only; it reflects the last
    /// metadata update, not the submission date.
    pub datestamp: Option<String>,
    /// `status="deleted"` on the header.
    pub deleted: bool,
    /// Every `<setSpec>` the record belongs to.
    pub set_specs: Vec<String>,
}

/// One parsed page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageResult {
    pub records: Vec<HeaderRecord>,
    /// Token for the next page. `None` means the listing is exhausted.
    pub resumption_token: Option<String>,
}

impl PageResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Parameters of a single listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub verb: String,
    pub metadata_prefix: String,
    pub set: Option<String>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub resumption_token: Option<String>,
}

impl ListRequest {
    /// A first-page `ListIdentifiers` request for `set`.
    pub fn list_identifiers(metadata_prefix: &str, set: Option<&str>) -> Self {
        Self {
            verb: "ListIdentifiers".to_string(),
            metadata_prefix: metadata_prefix.to_string(),
            set: set.map(str::to_string),
            from: None,
            until: None,
            resumption_token: None,
        }
    }

    pub fn with_from(mut self, from: NaiveDate) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_until(mut self, until: NaiveDate) -> Self {
        self.until = Some(until);
        self
    }

    /// The follow-up request for `token`.
    ///
    /// The original selectors are kept on the struct for logging but are
    /// not sent (see [`ListRequest::query_pairs`]).
    pub fn resume(&self, token: &str) -> Self {
        Self {
            resumption_token: Some(token.to_string()),
            ..self.clone()
        }
    }

    /// Query parameters to send.
    ///
    /// With a resumption token the protocol forbids every other argument,
    /// so only `verb` and `resumptionToken` are emitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        if let Some(token) = &self.resumption_token {
            return vec![
                ("verb", self.verb.clone()),
                ("resumptionToken", token.clone()),
            ];
        }

        let mut pairs = vec![
            ("verb", self.verb.clone()),
            ("metadataPrefix", self.metadata_prefix.clone()),
        ];
        if let Some(set) = &self.set {
            pairs.push(("set", set.clone()));
        }
        if let Some(from) = self.from {
            pairs.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(until) = self.until {
            pairs.push(("until", until.format("%Y-%m-%d").to_string()));
        }
        pairs
    }

    /// Human label for logs and errors.
    pub fn set_label(&self) -> &str {
        self.set.as_deref().unwrap_or("*")
    }
}

// =============================================================================
// Persisted rows
// =============================================================================

/// One `(category, year, month) → count` row of the counts store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRow {
    pub category_id: String,
    pub year: i32,
    pub month: u32,
    pub count: u64,
}

/// A category as seeded into the store and listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: String,
    pub name: String,
    /// `None` for top-level groups.
    pub parent_category: Option<String>,
}
