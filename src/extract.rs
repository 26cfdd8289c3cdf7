//! Pulls the top row out of the "oldest living people" table.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use url::Url;

use crate::{ExtractionError, RawCandidate};

const USER_AGENT: &str = concat!("oldest-watch/", env!("CARGO_PKG_VERSION"));

static TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<table\b[^>]*\bclass\s*=\s*"[^"]*\bwikitable\b[^"]*"[^>]*>(.*?)</table>"#)
        .expect("table regex")
});
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("row regex"));
static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(th|td)\b([^>]*)>(.*?)</t[hd]>").expect("cell regex")
});
static COLSPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)colspan\s*=\s*"?(\d+)"#).expect("colspan regex"));
static HIDDEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span\b[^>]*style\s*=\s*"[^"]*display\s*:\s*none[^"]*"[^>]*>.*?</span>"#)
        .expect("hidden span regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity regex"));
static WIKI_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"href\s*=\s*"(/wiki/[^"#]+)""##).expect("href regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("space regex"));

/// Where candidates come from. The default reads the live source page.
pub(crate) trait CandidateSource {
    fn fetch_candidate(&self) -> Result<RawCandidate, ExtractionError>;
}

pub(crate) struct WikipediaSource {
    agent: ureq::Agent,
    url: String,
}

impl WikipediaSource {
    pub(crate) fn new(url: String, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent, url }
    }

    fn fetch_page(&self) -> Result<String, ExtractionError> {
        match self.agent.get(&self.url).call() {
            Ok(resp) => resp.into_string().map_err(|e| ExtractionError::Transport {
                url: self.url.clone(),
                reason: format!("read body: {e}"),
            }),
            Err(ureq::Error::Status(status, _)) => Err(ExtractionError::Status {
                url: self.url.clone(),
                status,
            }),
            Err(ureq::Error::Transport(err)) => Err(ExtractionError::Transport {
                url: self.url.clone(),
                reason: err.to_string(),
            }),
        }
    }
}

impl CandidateSource for WikipediaSource {
    fn fetch_candidate(&self) -> Result<RawCandidate, ExtractionError> {
        let html = self.fetch_page()?;
        tracing::debug!(url = %self.url, bytes = html.len(), "fetched source page");
        let candidate = extract_candidate(&html, &self.url)?;
        tracing::info!(
            name = %candidate.name,
            birth_date = %candidate.birth_date_raw,
            "extracted top candidate"
        );
        Ok(candidate)
    }
}

// ── HTML helpers ─────────────────────────────────────────────────────────

struct Cell<'a> {
    header: bool,
    html: &'a str,
}

fn decode_entity(caps: &Captures) -> String {
    let entity = &caps[1];
    let decoded = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        match entity {
            "nbsp" => Some(' '),
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "ndash" => Some('–'),
            "mdash" => Some('—'),
            _ => None,
        }
    };
    match decoded {
        Some('\u{a0}') => " ".to_string(),
        Some(ch) => ch.to_string(),
        None => caps[0].to_string(),
    }
}

/// Visible text of an HTML fragment with whitespace collapsed.
pub(crate) fn cell_text(html: &str) -> String {
    let visible = HIDDEN_RE.replace_all(html, "");
    let untagged = TAG_RE.replace_all(&visible, "");
    let decoded = ENTITY_RE.replace_all(&untagged, decode_entity);
    let spaced = decoded.replace('\u{a0}', " ");
    SPACE_RE.replace_all(&spaced, " ").trim().to_string()
}

fn row_cells(row_html: &str) -> Vec<Cell<'_>> {
    let mut cells = Vec::new();
    for caps in CELL_RE.captures_iter(row_html) {
        let header = caps[1].eq_ignore_ascii_case("th");
        let span = COLSPAN_RE
            .captures(&caps[2])
            .and_then(|c| c[1].parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, 32);
        let html = caps.get(3).map_or("", |m| m.as_str());
        for _ in 0..span {
            cells.push(Cell { header, html });
        }
    }
    cells
}

fn header_key(text: &str) -> String {
    crate::clean_person_name(text).to_ascii_lowercase()
}

fn find_column(headers: &[String], names: &[&str], label: &'static str) -> Result<usize, ExtractionError> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
        .ok_or(ExtractionError::MissingColumn(label))
}

/// First `/wiki/` link in the name cell, made absolute; `None` when there is
/// none or it points at a place rather than a person.
fn profile_link(name_html: &str, base: &str) -> Option<String> {
    let href = WIKI_HREF_RE.captures(name_html)?.get(1)?.as_str();
    if href.ends_with("Prefecture") {
        return None;
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Extract the first data row of the first `wikitable` on the page.
pub(crate) fn extract_candidate(html: &str, base_url: &str) -> Result<RawCandidate, ExtractionError> {
    let table = TABLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or(ExtractionError::MissingTable)?
        .as_str();

    let rows: Vec<Vec<Cell>> = ROW_RE
        .captures_iter(table)
        .filter_map(|c| c.get(1))
        .map(|m| row_cells(m.as_str()))
        .filter(|cells| !cells.is_empty())
        .collect();

    let header_idx = rows
        .iter()
        .position(|cells| cells.iter().all(|c| c.header))
        .ok_or(ExtractionError::MissingColumn("Name"))?;
    let headers: Vec<String> = rows[header_idx]
        .iter()
        .map(|c| header_key(&cell_text(c.html)))
        .collect();

    let name_col = find_column(&headers, &["name"], "Name")?;
    let country_col = find_column(
        &headers,
        &["country of residence", "country", "residence"],
        "Country of residence",
    )?;
    let birth_col = find_column(&headers, &["birth date", "date of birth", "born"], "Birth date")?;

    let data = rows[header_idx + 1..]
        .iter()
        .find(|cells| cells.iter().any(|c| !c.header))
        .ok_or(ExtractionError::EmptyTable)?;
    let cell = |idx: usize| data.get(idx).map(|c| c.html).unwrap_or("");

    let name = cell_text(cell(name_col));
    if name.is_empty() {
        return Err(ExtractionError::EmptyTable);
    }
    Ok(RawCandidate {
        name,
        country: cell_text(cell(country_col)),
        birth_date_raw: cell_text(cell(birth_col)),
        profile_link: profile_link(cell(name_col), base_url),
    })
}
