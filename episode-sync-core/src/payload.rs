//! Column catalogue and payload assembly for episode records.
//!
//! Every logical column maps a set of header aliases (already folded by
//! [`normalize_header`](crate::delimited::normalize_header)) to one remote
//! field name. A column that is missing from the header set never reaches the
//! payload; a present but blank column usually becomes an explicit null.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::delimited::RawRecord;
use crate::normalize::{
    parse_bool, parse_date, parse_enum, parse_int, parse_json, parse_list, parse_text, slugify,
    to_blocks, Field,
};

/// A logical input column and the remote field it feeds.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

impl Column {
    const fn new(field: &'static str, aliases: &'static [&'static str]) -> Self {
        Column { field, aliases }
    }

    /// The cell for this column, or `None` when no alias is in the header set.
    pub fn read<'r>(&self, record: &'r RawRecord) -> Option<&'r str> {
        record.first_of(self.aliases)
    }
}

pub const TITLE: Column = Column::new("title", &["title", "name"]);
pub const SLUG: Column = Column::new("slug", &["slug"]);
pub const PUBLISHED_DATE: Column = Column::new("publishedDate", &["publisheddate", "date"]);
pub const EPISODE_NUMBER: Column = Column::new("episodeNumber", &["episodenumber", "episode"]);
pub const DESCRIPTION: Column = Column::new("description", &["description", "summary"]);
pub const NATIVE_PLAYER: Column =
    Column::new("useNativePlayer", &["usenativeplayer", "nativeplayer"]);
pub const TAGS: Column = Column::new("tags", &["tags"]);
pub const COMPANIES: Column = Column::new("companies", &["companies", "company"]);
pub const PLATFORM_LINKS: Column = Column::new("platformLinks", &["platformlinks"]);
pub const TRANSCRIPT_SEGMENTS: Column =
    Column::new("transcriptSegments", &["transcriptsegments"]);

/// Columns passed through as trimmed text.
pub const TEXT_COLUMNS: &[Column] = &[
    Column::new("duration", &["duration"]),
    Column::new("audioUrl", &["audiourl"]),
    Column::new("buzzsproutEpisodeId", &["buzzsproutepisodeid"]),
    Column::new("buzzsproutEmbedCode", &["buzzsproutembedcode"]),
    Column::new("transcriptStatus", &["transcriptstatus"]),
    Column::new("transcriptSource", &["transcriptsource"]),
    Column::new("transcriptGeneratedAt", &["transcriptgeneratedat"]),
    Column::new("transcriptSrt", &["transcriptsrt"]),
    Column::new("transcriptVtt", &["transcriptvtt"]),
];

/// Platforms accepted in platform links.
pub const PLATFORMS: &[&str] = &["apple", "spotify", "youtube", "substack", "twitter"];

/// Discrete URL columns merged into platform links, in merge order.
pub const PLATFORM_URL_COLUMNS: &[(&str, Column)] = &[
    ("apple", Column::new("appleUrl", &["appleurl"])),
    ("spotify", Column::new("spotifyUrl", &["spotifyurl"])),
    ("youtube", Column::new("youtubeUrl", &["youtubeurl"])),
    ("substack", Column::new("substackUrl", &["substackurl"])),
    ("twitter", Column::new("twitterUrl", &["twitterurl"])),
];

/// An enumerated column with its allowed values and the value a new record
/// gets when the cell is present but not recognized.
#[derive(Debug, Clone, Copy)]
pub struct EnumColumn {
    pub column: Column,
    pub allowed: &'static [&'static str],
    pub default: &'static str,
}

pub const STATUS: EnumColumn = EnumColumn {
    column: Column::new("podcastStatus", &["podcaststatus", "status"]),
    allowed: &["published", "draft"],
    default: "draft",
};

pub const EPISODE_TYPE: EnumColumn = EnumColumn {
    column: Column::new("podcastType", &["podcasttype", "type"]),
    allowed: &["internal", "external"],
    default: "internal",
};

pub const ENUM_COLUMNS: &[EnumColumn] = &[STATUS, EPISODE_TYPE];

/// How an enumerated cell read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumCell {
    Missing,
    Recognized(&'static str),
    Unrecognized,
}

impl EnumColumn {
    pub fn read(&self, record: &RawRecord) -> EnumCell {
        match self.column.read(record) {
            None => EnumCell::Missing,
            Some(raw) => match parse_enum(raw, self.allowed) {
                Some(value) => EnumCell::Recognized(value),
                None => EnumCell::Unrecognized,
            },
        }
    }
}

/// Every recognized logical column, for header checks and help output.
pub fn recognized_columns() -> Vec<Column> {
    let mut columns = vec![
        TITLE,
        SLUG,
        PUBLISHED_DATE,
        STATUS.column,
        EPISODE_TYPE.column,
        EPISODE_NUMBER,
        DESCRIPTION,
        NATIVE_PLAYER,
        TAGS,
        COMPANIES,
        PLATFORM_LINKS,
        TRANSCRIPT_SEGMENTS,
    ];
    columns.extend_from_slice(TEXT_COLUMNS);
    columns.extend(PLATFORM_URL_COLUMNS.iter().map(|(_, c)| *c));
    columns
}

/// Normalized headers that no logical column reads.
pub fn unrecognized_headers(headers: &[String]) -> Vec<&str> {
    let known = recognized_columns();
    headers
        .iter()
        .filter(|h| !h.is_empty())
        .filter(|h| !known.iter().any(|c| c.aliases.contains(&h.as_str())))
        .map(String::as_str)
        .collect()
}

/// Title through its aliases; blank counts as missing.
pub fn episode_title(record: &RawRecord) -> Option<String> {
    TITLE.read(record).and_then(parse_text)
}

/// Slug from the explicit column, else derived from the title. Both go
/// through [`slugify`]; an empty result means no usable slug.
pub fn episode_slug(record: &RawRecord, title: &str) -> Option<String> {
    let explicit = SLUG.read(record).map(slugify).unwrap_or_default();
    let slug = if explicit.is_empty() {
        slugify(title)
    } else {
        explicit
    };
    (!slug.is_empty()).then_some(slug)
}

/// Names listed in a relation column; `None` when the column is absent.
pub fn relation_names(record: &RawRecord, column: &Column) -> Option<Vec<String>> {
    column.read(record).map(parse_list)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformLink {
    pub platform: String,
    pub url: String,
}

impl From<PlatformLink> for Value {
    fn from(link: PlatformLink) -> Self {
        json!({ "platform": link.platform, "url": link.url })
    }
}

/// Merges the `platformLinks` JSON cell with the discrete URL columns.
///
/// JSON entries come first, then the discrete columns in
/// [`PLATFORM_URL_COLUMNS`] order; duplicate `(platform, url)` pairs are
/// dropped. Absent only when none of the source columns is present.
pub fn platform_links(record: &RawRecord) -> Field<Vec<PlatformLink>> {
    let json_cell = PLATFORM_LINKS.read(record);
    let any_url_column = PLATFORM_URL_COLUMNS
        .iter()
        .any(|(_, c)| c.read(record).is_some());
    if json_cell.is_none() && !any_url_column {
        return Field::Absent;
    }

    let mut links: Vec<PlatformLink> = Vec::new();
    let mut push = |platform: &str, url: &str| {
        let platform = platform.trim().to_lowercase();
        let url = url.trim();
        if url.is_empty() || !PLATFORMS.contains(&platform.as_str()) {
            return;
        }
        let link = PlatformLink {
            platform,
            url: url.to_string(),
        };
        if !links.contains(&link) {
            links.push(link);
        }
    };

    if let Some(Value::Array(entries)) = json_cell.and_then(parse_json) {
        for entry in &entries {
            if let (Some(platform), Some(url)) = (
                entry.get("platform").and_then(Value::as_str),
                entry.get("url").and_then(Value::as_str),
            ) {
                push(platform, url);
            }
        }
    }
    for (platform, column) in PLATFORM_URL_COLUMNS.iter().copied() {
        if let Some(url) = column.read(record) {
            push(platform, url);
        }
    }

    Field::Value(links)
}

/// Whether any recognized column besides title and slug carries non-blank
/// text. Rows without such a cell are never written, even though their blank
/// cells would otherwise clear remote fields.
pub fn has_populated_fields(record: &RawRecord) -> bool {
    recognized_columns()
        .iter()
        .filter(|c| !IDENTITY_FIELDS.contains(&c.field))
        .filter_map(|c| c.read(record))
        .any(|cell| !cell.trim().is_empty())
}

/// Remote field names that only identify a record.
pub const IDENTITY_FIELDS: &[&str] = &["title", "slug"];

/// Fields to write for one record. Absent fields are never stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    pub fn new(title: &str, slug: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(TITLE.field.into(), Value::String(title.to_string()));
        fields.insert(SLUG.field.into(), Value::String(slug.to_string()));
        Payload { fields }
    }

    /// Stores a field unless it is [`Field::Absent`].
    pub fn set<T: Into<Value>>(&mut self, name: &str, value: Field<T>) {
        if let Some(json) = value.into_json() {
            self.fields.insert(name.to_string(), json);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Whether anything beyond the identity fields is set.
    pub fn has_content(&self) -> bool {
        self.fields
            .keys()
            .any(|k| !IDENTITY_FIELDS.contains(&k.as_str()))
    }

    /// Whether the status field asks for the record to go live.
    pub fn publish_requested(&self) -> bool {
        self.get(STATUS.column.field).and_then(Value::as_str) == Some("published")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Adds every non-relation field that the record carries. Enumerated columns
/// only contribute recognized values here; defaults are applied separately.
pub fn fill_scalar_fields(record: &RawRecord, payload: &mut Payload) {
    let cell = |column: &Column| column.read(record).map_or(Field::Absent, Field::Value);

    payload.set(PUBLISHED_DATE.field, cell(&PUBLISHED_DATE).normalize(parse_date));
    payload.set(EPISODE_NUMBER.field, cell(&EPISODE_NUMBER).normalize(parse_int));
    payload.set(DESCRIPTION.field, cell(&DESCRIPTION).normalize(to_blocks));
    payload.set(NATIVE_PLAYER.field, cell(&NATIVE_PLAYER).normalize(parse_bool));
    payload.set(
        TRANSCRIPT_SEGMENTS.field,
        cell(&TRANSCRIPT_SEGMENTS).normalize(parse_json),
    );
    for column in TEXT_COLUMNS {
        payload.set(column.field, cell(column).normalize(parse_text));
    }
    for column in ENUM_COLUMNS {
        if let EnumCell::Recognized(value) = column.read(record) {
            payload.set(column.column.field, Field::Value(value));
        }
    }
    payload.set(PLATFORM_LINKS.field, platform_links(record));
}

/// Fills in defaults for enumerated cells that are present but unrecognized.
/// Only meaningful for records that do not exist remotely yet.
pub fn apply_enum_defaults(record: &RawRecord, payload: &mut Payload) {
    for column in ENUM_COLUMNS {
        if column.read(record) == EnumCell::Unrecognized {
            payload.set(column.column.field, Field::Value(column.default));
        }
    }
}
