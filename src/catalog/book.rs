//! The internal book view and one mapping function per upstream shape.

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/128x196";
const UNTITLED: &str = "Untitled";
const UNKNOWN_AUTHOR: &str = "Unknown Author";
const UNKNOWN_PUBLISHER: &str = "Unknown Publisher";
const NO_DESCRIPTION: &str = "No description available";
const NOT_AVAILABLE: &str = "N/A";
const GOOGLE_DEFAULT_PRICE: Decimal = Decimal::from_parts(999, 0, 0, false, 2);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    OpenLibrary,
    GoogleBooks,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Cosmetic; not an inventory count.
    pub in_stock: Option<u32>,
    pub image_url: String,
    pub description: String,
    pub isbn: String,
    pub publisher: String,
    pub published_date: String,
    pub pages: u32,
    pub categories: Vec<String>,
    pub rating: Option<f64>,
    pub language: String,
    pub source: CatalogSource,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl BookView {
    /// Stand-in returned when the catalog cannot be reached.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: UNTITLED.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            price: Decimal::ZERO,
            in_stock: None,
            image_url: PLACEHOLDER_IMAGE.to_string(),
            description: NO_DESCRIPTION.to_string(),
            isbn: NOT_AVAILABLE.to_string(),
            publisher: UNKNOWN_PUBLISHER.to_string(),
            published_date: NOT_AVAILABLE.to_string(),
            pages: 0,
            categories: vec![],
            rating: None,
            language: "en".to_string(),
            source: CatalogSource::OpenLibrary,
            degraded: true,
        }
    }

    /// Leading year of `published_date`, 0 when there is none.
    pub fn published_year(&self) -> i32 {
        let digits: String = self.published_date.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().unwrap_or(0)
    }
}

// =============================================================================
// Upstream shapes
// =============================================================================

/// Free text that Open Library returns as a string, a list, or `{value}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum LooseText {
    Plain(String),
    List(Vec<String>),
    Typed { value: String },
}

impl LooseText {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Plain(s) | Self::Typed { value: s } => Some(s),
            Self::List(v) => v.into_iter().next(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum DocType {
    Keyed { key: String },
    Named(String),
}

impl DocType {
    fn is(&self, kind: &str) -> bool {
        match self {
            Self::Keyed { key } => key.strip_prefix("/type/") == Some(kind),
            Self::Named(name) => name == kind,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NamedRef {
    pub name: Option<String>,
    pub key: Option<String>,
}

/// A search or subject-listing entry from Open Library.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpenLibraryDoc {
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<DocType>,
    pub title: Option<String>,
    pub author_name: Option<Vec<String>>,
    pub authors: Option<Vec<NamedRef>>,
    pub cover_i: Option<i64>,
    pub cover_id: Option<i64>,
    pub first_sentence: Option<LooseText>,
    pub isbn: Option<Vec<String>>,
    pub publisher: Option<Vec<String>>,
    pub first_publish_year: Option<i64>,
    pub number_of_pages_median: Option<u32>,
    pub subject: Option<Vec<String>>,
    pub language: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthorLink {
    pub author: Option<KeyRef>,
    pub key: Option<String>,
}

impl AuthorLink {
    pub fn author_key(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.key.as_str()).or(self.key.as_deref())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct KeyRef {
    pub key: String,
}

/// A work or edition record from Open Library.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpenLibraryRecord {
    pub title: Option<String>,
    pub authors: Option<Vec<AuthorLink>>,
    pub description: Option<LooseText>,
    pub covers: Option<Vec<i64>>,
    pub isbn: Option<Vec<String>>,
    pub isbn_13: Option<Vec<String>>,
    pub isbn_10: Option<Vec<String>>,
    pub publishers: Option<Vec<String>>,
    pub first_publish_date: Option<String>,
    pub publish_date: Option<String>,
    pub number_of_pages: Option<u32>,
    pub subjects: Option<Vec<String>>,
    pub languages: Option<Vec<KeyRef>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleVolume {
    pub id: Option<String>,
    pub volume_info: Option<GoogleVolumeInfo>,
    pub sale_info: Option<GoogleSaleInfo>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleVolumeInfo {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub description: Option<String>,
    pub image_links: Option<GoogleImageLinks>,
    pub industry_identifiers: Option<Vec<GoogleIdentifier>>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<u32>,
    pub categories: Option<Vec<String>>,
    pub average_rating: Option<f64>,
    pub language: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GoogleImageLinks {
    pub thumbnail: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GoogleIdentifier {
    pub identifier: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleSaleInfo {
    pub list_price: Option<GooglePrice>,
    pub retail_price: Option<GooglePrice>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GooglePrice {
    pub amount: Option<f64>,
}

// =============================================================================
// Mappers
// =============================================================================

/// Open Library listing entries carry no price or stock, so both are made up.
pub fn from_open_library_doc(doc: OpenLibraryDoc, rng: &mut impl Rng) -> BookView {
    let author = doc
        .author_name
        .filter(|names| !names.is_empty())
        .map(|names| names.join(", "))
        .or_else(|| {
            let names: Vec<String> = doc.authors.unwrap_or_default().into_iter().filter_map(|a| a.name).collect();
            (!names.is_empty()).then(|| names.join(", "))
        })
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    BookView {
        id: qualify_doc_key(doc.key.unwrap_or_default(), doc.kind.as_ref()),
        title: doc.title.unwrap_or_else(|| UNTITLED.to_string()),
        author,
        price: synthetic_price(rng),
        in_stock: Some(rng.gen_range(0..=20)),
        image_url: cover_url(doc.cover_i.or(doc.cover_id)),
        description: doc.first_sentence.and_then(LooseText::into_text).unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        isbn: first(doc.isbn).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        publisher: first(doc.publisher).unwrap_or_else(|| UNKNOWN_PUBLISHER.to_string()),
        published_date: doc.first_publish_year.map_or_else(|| NOT_AVAILABLE.to_string(), |y| y.to_string()),
        pages: doc.number_of_pages_median.unwrap_or(0),
        categories: doc.subject.unwrap_or_default().into_iter().take(3).collect(),
        rating: None,
        language: first(doc.language).unwrap_or_else(|| "en".to_string()),
        source: CatalogSource::OpenLibrary,
        degraded: false,
    }
}

/// `key` is the qualified path (`/works/OL1W`); `author` is resolved by the
/// caller because it needs a second request.
pub fn from_open_library_record(key: &str, record: OpenLibraryRecord, author: Option<String>, rng: &mut impl Rng) -> BookView {
    let isbn = first(record.isbn).or_else(|| first(record.isbn_13)).or_else(|| first(record.isbn_10));
    let language = record
        .languages
        .and_then(|langs| langs.into_iter().next())
        .map(|l| l.key.trim_start_matches("/languages/").to_string());

    BookView {
        id: key.to_string(),
        title: record.title.unwrap_or_else(|| UNTITLED.to_string()),
        author: author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        price: synthetic_price(rng),
        in_stock: Some(rng.gen_range(0..=20)),
        image_url: cover_url(record.covers.and_then(|c| c.into_iter().next())),
        description: record.description.and_then(LooseText::into_text).unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        isbn: isbn.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        publisher: first(record.publishers).unwrap_or_else(|| UNKNOWN_PUBLISHER.to_string()),
        published_date: record.first_publish_date.or(record.publish_date).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        pages: record.number_of_pages.unwrap_or(0),
        categories: record.subjects.unwrap_or_default().into_iter().take(3).collect(),
        rating: None,
        language: language.unwrap_or_else(|| "en".to_string()),
        source: CatalogSource::OpenLibrary,
        degraded: false,
    }
}

/// `None` for entries without `volumeInfo`.
pub fn from_google_volume(volume: GoogleVolume) -> Option<BookView> {
    let info = volume.volume_info?;
    let price = volume
        .sale_info
        .and_then(|s| s.list_price.and_then(|p| p.amount).or_else(|| s.retail_price.and_then(|p| p.amount)))
        .and_then(Decimal::from_f64)
        .map_or(GOOGLE_DEFAULT_PRICE, |p| p.round_dp(2));
    let image_url = info
        .image_links
        .and_then(|l| l.thumbnail)
        .map_or_else(|| PLACEHOLDER_IMAGE.to_string(), |t| t.replacen("http:", "https:", 1));

    Some(BookView {
        id: volume.id.unwrap_or_default(),
        title: info.title.unwrap_or_else(|| UNTITLED.to_string()),
        author: info
            .authors
            .filter(|a| !a.is_empty())
            .map_or_else(|| UNKNOWN_AUTHOR.to_string(), |a| a.join(", ")),
        price,
        in_stock: None,
        image_url,
        description: info.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        isbn: info
            .industry_identifiers
            .and_then(|ids| ids.into_iter().next())
            .map_or_else(|| NOT_AVAILABLE.to_string(), |i| i.identifier),
        publisher: info.publisher.unwrap_or_else(|| UNKNOWN_PUBLISHER.to_string()),
        published_date: info.published_date.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        pages: info.page_count.unwrap_or(0),
        categories: info.categories.filter(|c| !c.is_empty()).unwrap_or_else(|| vec!["Fiction".to_string()]),
        rating: Some(info.average_rating.unwrap_or(0.0)),
        language: info.language.unwrap_or_else(|| "en".to_string()),
        source: CatalogSource::GoogleBooks,
        degraded: false,
    })
}

/// Bare keys get a `/works/` or `/books/` prefix from the doc type.
fn qualify_doc_key(key: String, kind: Option<&DocType>) -> String {
    if key.is_empty() || key.starts_with("/works/") || key.starts_with("/books/") {
        return key;
    }
    let bare = key.trim_start_matches('/');
    match kind {
        Some(k) if k.is("work") => format!("/works/{bare}"),
        Some(k) if k.is("edition") => format!("/books/{bare}"),
        _ => key,
    }
}

fn cover_url(cover: Option<i64>) -> String {
    cover.map_or_else(|| PLACEHOLDER_IMAGE.to_string(), |id| format!("https://covers.openlibrary.org/b/id/{id}-L.jpg"))
}

/// Uniform in [5.00, 50.00].
fn synthetic_price(rng: &mut impl Rng) -> Decimal {
    Decimal::new(rng.gen_range(500..=5000), 2)
}

fn first(values: Option<Vec<String>>) -> Option<String> {
    values.and_then(|v| v.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn rng() -> StdRng { StdRng::seed_from_u64(7) }

    #[test]
    fn test_open_library_doc_mapping() {
        let doc: OpenLibraryDoc = serde_json::from_value(json!({
            "key": "/works/OL45883W",
            "title": "Dune",
            "author_name": ["Frank Herbert"],
            "cover_i": 42,
            "first_sentence": ["In the week before their departure"],
            "isbn": ["9780441013593"],
            "first_publish_year": 1965,
            "subject": ["a", "b", "c", "d"]
        })).unwrap();
        let book = from_open_library_doc(doc, &mut rng());
        assert_eq!(book.id, "/works/OL45883W");
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.image_url, "https://covers.openlibrary.org/b/id/42-L.jpg");
        assert_eq!(book.description, "In the week before their departure");
        assert_eq!(book.published_date, "1965");
        assert_eq!(book.categories.len(), 3);
        assert!(book.price >= Decimal::new(5, 0) && book.price <= Decimal::new(50, 0));
        assert!(book.in_stock.unwrap() <= 20);
    }

    #[test]
    fn test_open_library_doc_defaults_and_key_qualification() {
        let doc: OpenLibraryDoc = serde_json::from_value(json!({ "key": "OL1W", "type": { "key": "/type/work" } })).unwrap();
        let book = from_open_library_doc(doc, &mut rng());
        assert_eq!(book.id, "/works/OL1W");
        assert_eq!(book.title, "Untitled");
        assert_eq!(book.author, "Unknown Author");
        assert_eq!(book.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(book.isbn, "N/A");
        assert_eq!(book.publisher, "Unknown Publisher");

        let edition: OpenLibraryDoc = serde_json::from_value(json!({ "key": "OL2M", "type": "edition" })).unwrap();
        assert_eq!(from_open_library_doc(edition, &mut rng()).id, "/books/OL2M");
    }

    #[test]
    fn test_subject_work_uses_author_refs() {
        let doc: OpenLibraryDoc = serde_json::from_value(json!({
            "key": "/works/OL3W", "title": "Emma", "authors": [{ "name": "Jane Austen", "key": "/authors/OL1A" }], "cover_id": 7
        })).unwrap();
        let book = from_open_library_doc(doc, &mut rng());
        assert_eq!(book.author, "Jane Austen");
        assert_eq!(book.image_url, "https://covers.openlibrary.org/b/id/7-L.jpg");
    }

    #[test]
    fn test_open_library_record_mapping() {
        let record: OpenLibraryRecord = serde_json::from_value(json!({
            "title": "Dune",
            "description": { "type": "/type/text", "value": "Spice." },
            "covers": [11, 12],
            "publishers": ["Chilton"],
            "publish_date": "1965",
            "languages": [{ "key": "/languages/eng" }],
            "authors": [{ "author": { "key": "/authors/OL79034A" } }]
        })).unwrap();
        assert_eq!(record.authors.as_ref().unwrap()[0].author_key(), Some("/authors/OL79034A"));
        let book = from_open_library_record("/works/OL1W", record, Some("Frank Herbert".into()), &mut rng());
        assert_eq!(book.description, "Spice.");
        assert_eq!(book.image_url, "https://covers.openlibrary.org/b/id/11-L.jpg");
        assert_eq!(book.language, "eng");
        assert_eq!(book.published_year(), 1965);
    }

    #[test]
    fn test_google_volume_mapping() {
        let volume: GoogleVolume = serde_json::from_value(json!({
            "id": "zyTCAlFPjgYC",
            "volumeInfo": {
                "title": "The Google Story",
                "authors": ["David A. Vise", "Mark Malseed"],
                "imageLinks": { "thumbnail": "http://books.google.com/x.jpg" },
                "industryIdentifiers": [{ "type": "ISBN_10", "identifier": "055380457X" }]
            },
            "saleInfo": { "retailPrice": { "amount": 11.99 } }
        })).unwrap();
        let book = from_google_volume(volume).unwrap();
        assert_eq!(book.author, "David A. Vise, Mark Malseed");
        assert_eq!(book.image_url, "https://books.google.com/x.jpg");
        assert_eq!(book.price, Decimal::new(1199, 2));
        assert_eq!(book.isbn, "055380457X");
        assert_eq!(book.categories, vec!["Fiction".to_string()]);
        assert_eq!(book.source, CatalogSource::GoogleBooks);
    }

    #[test]
    fn test_google_volume_defaults() {
        assert!(from_google_volume(GoogleVolume::default()).is_none());
        let volume: GoogleVolume = serde_json::from_value(json!({ "id": "x", "volumeInfo": {} })).unwrap();
        let book = from_google_volume(volume).unwrap();
        assert_eq!(book.price, Decimal::new(999, 2));
        assert_eq!(book.title, "Untitled");
    }

    #[test]
    fn test_placeholder_serializes_degraded_flag() {
        let json = serde_json::to_value(BookView::placeholder("/works/OL1W")).unwrap();
        assert_eq!(json["_id"], "/works/OL1W");
        assert_eq!(json["degraded"], true);
        let mut ok = BookView::placeholder("x");
        ok.degraded = false;
        assert!(serde_json::to_value(ok).unwrap().get("degraded").is_none());
    }
}
