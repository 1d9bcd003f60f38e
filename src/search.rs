//! Fuzzy company / job title matching.
//!
//! A record matches a query when any one of the match channels fires. There is
//! no scoring: results keep the order the records have in the store.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Record;

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\t\r]").expect("valid regex"));
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[!@#$%^&*()_+=\[\]{}|;':"<>?,./\\-]"#).expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static LEGAL_SUFFIXES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:corporation|corp|company|co|incorporated|inc|limited|ltd|llc|cooperation)\b",
    )
    .expect("valid regex")
});

/// Remove line breaks and punctuation, collapse whitespace, trim.
pub fn clean(text: &str) -> String {
    let text = LINE_BREAKS.replace_all(text, " ");
    let text = PUNCTUATION.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Company name with legal-entity suffixes removed, case preserved.
///
/// A name made only of suffixes ("Company Inc") is kept as-is rather than
/// collapsing to an empty key that would match everything.
fn strip_legal_suffixes(name: &str) -> String {
    let stripped = clean(&LEGAL_SUFFIXES.replace_all(name, ""));
    if stripped.is_empty() {
        clean(name)
    } else {
        stripped
    }
}

/// Canonical company key used for exact and prefix matching.
pub fn normalize_company(name: &str) -> String {
    strip_legal_suffixes(name).to_lowercase()
}

/// Lower-cased, cleaned job title.
pub fn normalize_title(title: &str) -> String {
    clean(title).to_lowercase()
}

/// Initials of a company name: "Old Mission Capital" -> "OMC",
/// "GlaxoSmithKline" -> "GSK". All-caps words count whole ("IBM Research" -> "IBMR").
pub fn abbreviation(name: &str) -> String {
    let mut abbr = String::new();
    for word in strip_legal_suffixes(name).split_whitespace() {
        for token in camel_tokens(word) {
            let is_acronym = token.chars().count() > 1
                && token.chars().any(char::is_uppercase)
                && !token.chars().any(char::is_lowercase);
            if is_acronym {
                abbr.push_str(token);
            } else if let Some(first) = token.chars().next() {
                abbr.extend(first.to_uppercase());
            }
        }
    }
    abbr.to_uppercase()
}

/// Split a word at camel-case boundaries: "GlaxoSmithKline" -> Glaxo, Smith, Kline;
/// "XMLHttp" -> XML, Http.
fn camel_tokens(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut tokens = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (pos, c) = chars[i];
        let prev = chars[i - 1].1;
        let next_is_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());
        let boundary =
            c.is_uppercase() && (prev.is_lowercase() || (prev.is_uppercase() && next_is_lower));
        if boundary {
            tokens.push(&word[start..pos]);
            start = pos;
        }
    }
    tokens.push(&word[start..]);
    tokens
}

/// Derived per-record match keys, rebuilt whenever the cache loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKeys {
    pub company: String,
    pub abbreviation: String,
    pub title: String,
}

impl SearchKeys {
    pub fn for_record(record: &Record) -> Self {
        Self {
            company: normalize_company(&record.company),
            abbreviation: abbreviation(&record.company),
            title: normalize_title(&record.job_title),
        }
    }
}

/// Which match channels fired for one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Channels {
    pub exact: bool,
    pub prefix: bool,
    pub target_abbreviation: bool,
    pub keyword_abbreviation: bool,
    pub job_title: bool,
}

impl Channels {
    pub fn any(&self) -> bool {
        self.exact
            || self.prefix
            || self.target_abbreviation
            || self.keyword_abbreviation
            || self.job_title
    }
}

/// A query prepared once and evaluated against many records.
#[derive(Debug, Clone)]
pub struct Query {
    company: String,
    company_upper: String,
    abbreviation: String,
    title: Option<Regex>,
}

impl Query {
    pub fn new(text: &str) -> Self {
        let company = normalize_company(text);
        let title_term = normalize_title(text);
        let title = if title_term.is_empty() {
            None
        } else {
            Regex::new(&format!(r"\b{}\b", regex::escape(&title_term))).ok()
        };

        Self {
            company_upper: company.to_uppercase(),
            company,
            abbreviation: abbreviation(text),
            title,
        }
    }

    pub fn channels(&self, keys: &SearchKeys) -> Channels {
        Channels {
            exact: keys.company == self.company,
            prefix: keys.company.starts_with(&self.company),
            target_abbreviation: keys.abbreviation == self.company_upper,
            // a one-letter abbreviation would match every company sharing an initial
            keyword_abbreviation: self.abbreviation.chars().count() > 1
                && keys.abbreviation == self.abbreviation,
            job_title: self
                .title
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(&keys.title)),
        }
    }

    pub fn matches(&self, keys: &SearchKeys) -> bool {
        self.channels(keys).any()
    }
}

/// Indices of matching records, in store order.
pub fn search(keys: &[SearchKeys], query: &str) -> Vec<usize> {
    let query = Query::new(query);
    keys.iter()
        .enumerate()
        .filter(|(_, k)| query.matches(k))
        .map(|(i, _)| i)
        .collect()
}

/// Key under which two records count as the same application.
pub fn duplicate_key(company: &str, job_title: &str) -> (String, String) {
    (normalize_company(company), normalize_title(job_title))
}
