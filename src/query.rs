//! Series, movie and episode lookups against the Mind service.
//!
//! [`MindSearch`] wraps anything implementing [`MindRpc`] and turns the raw
//! `collectionSearch` / `contentSearch` / `offerSearch` requests into the
//! lookups metadata writers need. Results are returned as the JSON objects
//! the service sent, filtered client side where the service has no matching
//! filter of its own (description language, partner id prefix, release year).
//!
//! Every paginated loop stops when the service reports `isBottom`, when a
//! page comes back empty, or after a fixed number of pages, whichever comes
//! first.
use std::fmt;

use log::{debug, info, warn};
use serde_json::{Map, Value, json};

use crate::{
    MindConfig,
    protocol::{Request, RequestKind, Response},
    session::{MindError, MindRpc, retry_unavailable},
};

pub type Record = Map<String, Value>;

pub const SERIES_PAGE_SIZE: u64 = 25;
pub const MOVIE_PAGE_SIZE: u64 = 10;
pub const CONTENT_PAGE_SIZE: u64 = 25;
pub const OFFER_PAGE_SIZE: u64 = 25;

/// Pages scanned looking for an episode by air date.
pub const MAX_AIRDATE_PAGES: u64 = 40;
/// Pages scanned looking for a movie that survives filtering.
pub const MAX_MOVIE_PAGES: u64 = 20;

/// Partner collection ids usable for cross referencing start with this.
pub const EPG_PROVIDER_PREFIX: &str = "epgProvider:";

const SERIES_FIELDS: &[&str] = &[
    "category",
    "collectionId",
    "credit",
    "title",
    "partnerCollectionId",
    "description",
    "descriptionLanguage",
    "episodic",
    "internalRating",
    "rating",
    "tvRating",
];

const MOVIE_FIELDS: &[&str] = &[
    "category",
    "collectionId",
    "credit",
    "title",
    "partnerCollectionId",
    "description",
    "descriptionLanguage",
    "internalRating",
    "movieYear",
    "mpaaRating",
    "rating",
    "starRating",
    "tvRating",
];

const MOVIE_CONTENT_FIELDS: &[&str] = &[
    "movieYear",
    "description",
    "partnerCollectionId",
    "partnerContentId",
    "title",
];

const CATEGORY_FIELDS: &[&str] = &["categoryId", "displayRank", "label", "topLevel"];
const CREDIT_FIELDS: &[&str] = &[
    "personId",
    "role",
    "last",
    "first",
    "characterName",
    "fullName",
];

fn template(type_name: &str, fields: &[&str]) -> Value {
    json!({
        "type": "responseTemplate",
        "fieldName": fields,
        "typeName": type_name,
    })
}

fn collection_template(list_fields: &[&str], fields: &[&str]) -> Value {
    json!([
        template("collectionList", list_fields),
        template("collection", fields),
        template("category", CATEGORY_FIELDS),
        template("credit", CREDIT_FIELDS),
    ])
}

fn content_template(list_fields: &[&str], fields: &[&str]) -> Value {
    json!([
        template("contentList", list_fields),
        template("content", fields),
    ])
}

/// Search flags shared by every `collectionSearch`.
fn collection_search() -> Request {
    Request::new(RequestKind::CollectionSearch)
        .field("filterUnavailable", "false")
        .field("includeBroadcast", "true")
        .field("includeFree", "true")
        .field("includePaid", "false")
        .field("includeVod", "false")
        .field("mergeOverridingCollections", "true")
        .field("orderBy", "strippedTitle")
}

/// Calendar date an episode first aired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl fmt::Display for AirDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// How to identify one episode within a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeKey {
    SeasonEpisode { season: u32, episode: u32 },
    AirDate(AirDate),
}

/// Whether an item's `descriptionLanguage` is acceptable.
///
/// Matching is by containment so `English` accepts `English GB`. An empty
/// `language` accepts everything; `allow_missing` decides items without the
/// field.
pub fn language_matches(item: &Record, language: &str, allow_missing: bool) -> bool {
    if language.is_empty() {
        return true;
    }
    match item.get("descriptionLanguage").and_then(Value::as_str) {
        Some(lang) => lang.contains(language),
        None => allow_missing,
    }
}

/// Keeps series described in `language` that carry a partner collection id.
pub fn filter_series(collections: Vec<Record>, language: &str) -> Vec<Record> {
    debug!("series candidates: {}", collections.len());

    let collections: Vec<Record> = collections
        .into_iter()
        .filter(|c| language_matches(c, language, false))
        .collect();
    debug!("after language filtering: {}", collections.len());

    let collections: Vec<Record> = collections
        .into_iter()
        .filter(|c| c.contains_key("partnerCollectionId"))
        .collect();
    debug!("after partnerCollectionId filtering: {}", collections.len());

    collections
}

/// Narrows movie candidates by language, partner id provider and year.
///
/// Items without a description language are kept. When no candidate has
/// exactly `year`, candidates within a year either side are kept instead.
pub fn filter_movies(collections: Vec<Record>, language: &str, year: Option<i64>) -> Vec<Record> {
    debug!("movie candidates: {}", collections.len());

    let collections: Vec<Record> = collections
        .into_iter()
        .filter(|c| language_matches(c, language, true))
        .collect();
    debug!("after language filtering: {}", collections.len());

    let collections: Vec<Record> = collections
        .into_iter()
        .filter(|c| {
            c.get("partnerCollectionId")
                .and_then(Value::as_str)
                .is_some_and(|id| id.starts_with(EPG_PROVIDER_PREFIX))
        })
        .collect();
    debug!("after {EPG_PROVIDER_PREFIX} filtering: {}", collections.len());

    let Some(year) = year else {
        return collections;
    };

    let movie_year = |c: &Record| c.get("movieYear").and_then(Value::as_i64).unwrap_or(0);
    let exact: Vec<Record> = collections
        .iter()
        .filter(|c| movie_year(c) == year)
        .cloned()
        .collect();
    if !exact.is_empty() {
        debug!("after year filtering: {}", exact.len());
        return exact;
    }

    let (low, high) = (year.saturating_sub(1), year.saturating_add(1));
    debug!("no exact match for {year}, trying {low} to {high}");
    let near: Vec<Record> = collections
        .into_iter()
        .filter(|c| (low..=high).contains(&movie_year(c)))
        .collect();
    debug!("after year filtering: {}", near.len());
    near
}

fn records(resp: &Response, field: &str) -> Vec<Record> {
    resp.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// A missing flag counts as the last page.
fn is_bottom(resp: &Response) -> bool {
    resp.get("isBottom").and_then(Value::as_bool).unwrap_or(true)
}

fn string_field(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Higher level lookups over a [`MindRpc`].
pub struct MindSearch<R: MindRpc> {
    rpc: R,
    language: String,
    retry_attempts: usize,
}

impl<R: MindRpc> MindSearch<R> {
    pub fn new(rpc: R, config: &MindConfig) -> Self {
        Self {
            rpc,
            language: config.language.clone(),
            retry_attempts: config.retry_attempts,
        }
    }

    pub fn into_inner(self) -> R {
        self.rpc
    }

    pub fn rpc(&mut self) -> &mut R {
        &mut self.rpc
    }

    /// Sends `request`, retrying while the service reports itself unavailable.
    pub fn call(&mut self, request: Request) -> Result<Response, MindError> {
        let rpc = &mut self.rpc;
        retry_unavailable(self.retry_attempts, || rpc.call(request.clone()))
    }

    /// Series whose title matches `title_keywords`, each annotated with the
    /// `firstAired` date of its first episode.
    pub fn search_series(&mut self, title_keywords: &str) -> Result<Vec<Record>, MindError> {
        let resp = self.call(
            collection_search()
                .field("titleKeyword", title_keywords)
                .field("collectionType", "series")
                .field("count", SERIES_PAGE_SIZE)
                .field(
                    "responseTemplate",
                    collection_template(&["collection", "isTop", "isBottom"], SERIES_FIELDS),
                ),
        )?;

        let mut series = filter_series(records(&resp, "collection"), &self.language);
        for collection in series.iter_mut() {
            let Some(id) = string_field(collection, "collectionId") else {
                continue;
            };
            let first = self.get_first_aired(&id)?;
            let aired = first
                .get("originalAirdate")
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            collection.insert("firstAired".to_string(), aired);
        }

        info!("{} series matched {title_keywords:?}", series.len());
        Ok(series)
    }

    /// Air date fields of season 1 episode 1 of a series.
    pub fn get_first_aired(&mut self, collection_id: &str) -> Result<Record, MindError> {
        let resp = self.call(
            Request::new(RequestKind::ContentSearch)
                .field("collectionId", collection_id)
                .field("seasonNumber", 1)
                .field("episodeNum", 1)
                .field("count", 1)
                .field(
                    "responseTemplate",
                    content_template(
                        &["content"],
                        &["originalAirdate", "originalAirYear", "releaseDate"],
                    ),
                ),
        )?;

        let mut first = Record::new();
        if let Some(content) = records(&resp, "content").into_iter().next() {
            for key in ["originalAirdate", "originalAirYear", "releaseDate"] {
                if let Some(value) = content.get(key) {
                    first.insert(key.to_string(), value.clone());
                }
            }
        }
        Ok(first)
    }

    /// Full collection record for a series id.
    pub fn get_series_info(&mut self, collection_id: &str) -> Result<Record, MindError> {
        let resp = self.call(
            collection_search()
                .field("collectionId", collection_id)
                .field("count", 1)
                .field(
                    "responseTemplate",
                    collection_template(&["collection"], SERIES_FIELDS),
                ),
        )?;

        records(&resp, "collection")
            .into_iter()
            .next()
            .ok_or_else(|| MindError::Protocol(format!("no collection for {collection_id}")))
    }

    /// Best movie match for `title_keywords`, merged with its content fields.
    ///
    /// Returns an empty record when nothing survives filtering.
    pub fn search_movie(
        &mut self,
        title_keywords: &str,
        year: Option<i64>,
    ) -> Result<Record, MindError> {
        let mut candidates = Vec::new();
        let mut page = 0;
        let mut bottom = false;

        while candidates.is_empty() && !bottom && page < MAX_MOVIE_PAGES {
            debug!("searching movie {title_keywords:?}, page {page}");
            let resp = self.call(
                collection_search()
                    .field("titleKeyword", title_keywords)
                    .field("collectionType", "movie")
                    .field("count", MOVIE_PAGE_SIZE)
                    .field("offset", MOVIE_PAGE_SIZE * page)
                    .field(
                        "responseTemplate",
                        collection_template(&["collection", "isTop", "isBottom"], MOVIE_FIELDS),
                    ),
            )?;

            let found = records(&resp, "collection");
            bottom = is_bottom(&resp) || found.is_empty();
            candidates = filter_movies(found, &self.language, year);
            page += 1;
        }

        if candidates.len() > 1 {
            debug!("{} candidates after filtering, taking the first", candidates.len());
        }
        let Some(mut movie) = candidates.into_iter().next() else {
            info!("no suitable movie for {title_keywords:?}");
            return Ok(Record::new());
        };

        if let Some(id) = string_field(&movie, "collectionId") {
            let content = self.search_movie_content(&id)?;
            movie.extend(content);
        }
        Ok(movie)
    }

    /// Content record (partner content id and friends) for a movie collection.
    pub fn search_movie_content(&mut self, collection_id: &str) -> Result<Record, MindError> {
        let resp = self.call(
            Request::new(RequestKind::ContentSearch)
                .field("collectionId", collection_id)
                .field("count", CONTENT_PAGE_SIZE)
                .field(
                    "responseTemplate",
                    content_template(&["content", "isTop", "isBottom"], MOVIE_CONTENT_FIELDS),
                ),
        )?;

        let mut content = records(&resp, "content").into_iter();
        let first = content.next().unwrap_or_default();
        if content.next().is_some() {
            warn!("{collection_id} has more than one content record, using the first");
        }
        Ok(first)
    }

    /// Partner content id of one episode of a series.
    pub fn get_program_id(
        &mut self,
        collection_id: &str,
        key: EpisodeKey,
    ) -> Result<Option<String>, MindError> {
        match key {
            EpisodeKey::SeasonEpisode { season, episode } => {
                debug!("program id by season {season} episode {episode}");
                let resp = self.call(
                    Request::new(RequestKind::ContentSearch)
                        .field("collectionId", collection_id)
                        .field("seasonNumber", season)
                        .field("episodeNum", episode)
                        .field("count", 1)
                        .field(
                            "responseTemplate",
                            content_template(&["content"], &["partnerContentId"]),
                        ),
                )?;
                Ok(records(&resp, "content")
                    .first()
                    .and_then(|c| string_field(c, "partnerContentId")))
            }
            EpisodeKey::AirDate(date) => {
                debug!("program id by air date {date}");
                let episode = self.get_program_id_airdate(collection_id, date)?;
                Ok(string_field(&episode, "partnerContentId"))
            }
        }
    }

    /// Scans a series' episodes for one first aired on `date`.
    ///
    /// Returns an empty record if none matches.
    pub fn get_program_id_airdate(
        &mut self,
        collection_id: &str,
        date: AirDate,
    ) -> Result<Record, MindError> {
        let air_date = date.to_string();

        for page in 0..MAX_AIRDATE_PAGES {
            let resp = self.call(
                Request::new(RequestKind::ContentSearch)
                    .field("collectionId", collection_id)
                    .field("count", CONTENT_PAGE_SIZE)
                    .field("offset", CONTENT_PAGE_SIZE * page)
                    .field(
                        "responseTemplate",
                        content_template(
                            &["content", "isTop", "isBottom"],
                            &[
                                "seasonNumber",
                                "episodeNum",
                                "originalAirdate",
                                "partnerContentId",
                            ],
                        ),
                    ),
            )?;

            let content = records(&resp, "content");
            if let Some(episode) = content.iter().find(|c| {
                c.get("originalAirdate").and_then(Value::as_str) == Some(air_date.as_str())
            }) {
                return Ok(episode.clone());
            }
            if is_bottom(&resp) || content.is_empty() {
                debug!("no episode aired {air_date} in {collection_id}");
                return Ok(Record::new());
            }
        }

        warn!("gave up looking for {air_date} in {collection_id} after {MAX_AIRDATE_PAGES} pages");
        Ok(Record::new())
    }

    /// Linear (broadcast) offers for a title on the receiver `body_id`.
    pub fn search_offers(
        &mut self,
        title: &str,
        subtitle: Option<&str>,
        body_id: &str,
    ) -> Result<Vec<Record>, MindError> {
        let mut request = Request::new(RequestKind::OfferSearch)
            .field("count", OFFER_PAGE_SIZE)
            .field("bodyId", body_id)
            .field("title", title);
        if let Some(subtitle) = subtitle {
            request = request.field("subtitle", subtitle);
        }

        let resp = self.call(request)?;
        Ok(records(&resp, "offer"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Answers each request with the closure's body and remembers requests.
    struct MockMind<F> {
        answer: F,
        requests: Vec<Request>,
    }

    impl<F> MockMind<F>
    where
        F: FnMut(&Request, usize) -> Result<Value, MindError>,
    {
        fn new(answer: F) -> Self {
            Self {
                answer,
                requests: Vec::new(),
            }
        }
    }

    impl<F> MindRpc for MockMind<F>
    where
        F: FnMut(&Request, usize) -> Result<Value, MindError>,
    {
        fn call(&mut self, request: Request) -> Result<Response, MindError> {
            let n = self.requests.len();
            let body = (self.answer)(&request, n);
            self.requests.push(request);
            match body? {
                Value::Object(map) => Ok(Response::new(n as u64, map)),
                other => panic!("mock must answer objects, got {other}"),
            }
        }
    }

    fn search<F>(answer: F) -> MindSearch<MockMind<F>>
    where
        F: FnMut(&Request, usize) -> Result<Value, MindError>,
    {
        MindSearch::new(MockMind::new(answer), &MindConfig::default())
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn kind(request: &Request) -> &str {
        request.kind().as_str()
    }

    #[test]
    fn movie_filter_keeps_english_epg_year() {
        let candidates = vec![
            record(json!({"collectionId": "tivo:cl.1", "descriptionLanguage": "French",
                "partnerCollectionId": "epgProvider:cl.A", "movieYear": 2001})),
            record(json!({"collectionId": "tivo:cl.2", "descriptionLanguage": "English",
                "movieYear": 2001})),
            record(json!({"collectionId": "tivo:cl.3", "descriptionLanguage": "English",
                "partnerCollectionId": "epgProvider:cl.X", "movieYear": 2001})),
        ];

        let kept = filter_movies(candidates, "English", Some(2001));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["collectionId"], json!("tivo:cl.3"));
    }

    #[test]
    fn movie_filter_widens_year() {
        let candidates = vec![
            record(json!({"partnerCollectionId": "epgProvider:cl.A", "movieYear": 1999})),
            record(json!({"partnerCollectionId": "epgProvider:cl.B", "movieYear": 2002})),
            record(json!({"partnerCollectionId": "epgProvider:cl.C", "movieYear": 2005})),
        ];

        let kept = filter_movies(candidates, "English", Some(2001));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["partnerCollectionId"], json!("epgProvider:cl.B"));
    }

    #[test]
    fn movie_filter_extreme_years() {
        let candidates = vec![
            record(json!({"partnerCollectionId": "epgProvider:cl.A", "movieYear": i64::MAX})),
            record(json!({"partnerCollectionId": "epgProvider:cl.B", "movieYear": 2001})),
        ];

        let kept = filter_movies(candidates.clone(), "English", Some(i64::MAX - 1));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["partnerCollectionId"], json!("epgProvider:cl.A"));

        assert!(filter_movies(candidates.clone(), "English", Some(i64::MIN)).is_empty());
        assert_eq!(filter_movies(candidates, "English", Some(i64::MAX)).len(), 1);
    }

    #[test]
    fn movie_filter_rejects_other_providers() {
        let candidates = vec![record(json!({"partnerCollectionId": "tivo:cl.A"}))];
        assert!(filter_movies(candidates, "English", None).is_empty());
    }

    #[test]
    fn series_filter_is_strict_about_language() {
        let candidates = vec![
            record(json!({"title": "a", "partnerCollectionId": "epgProvider:cl.1"})),
            record(json!({"title": "b", "descriptionLanguage": "English GB",
                "partnerCollectionId": "epgProvider:cl.2"})),
            record(json!({"title": "c", "descriptionLanguage": "English"})),
        ];

        let kept = filter_series(candidates, "English");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["title"], json!("b"));
    }

    #[test]
    fn empty_language_accepts_all() {
        let item = record(json!({"descriptionLanguage": "Spanish"}));
        assert!(language_matches(&item, "", false));
        assert!(!language_matches(&item, "English", true));
        assert!(language_matches(&Record::new(), "English", true));
    }

    #[test]
    fn search_movie_returns_filtered_candidate() {
        let mut search = search(|request, _| {
            Ok(match kind(request) {
                "collectionSearch" => json!({
                    "type": "collectionList",
                    "isBottom": true,
                    "collection": [
                        {"collectionId": "tivo:cl.1", "descriptionLanguage": "French",
                            "partnerCollectionId": "epgProvider:cl.A", "movieYear": 2001},
                        {"collectionId": "tivo:cl.2", "descriptionLanguage": "English",
                            "movieYear": 2001},
                        {"collectionId": "tivo:cl.3", "descriptionLanguage": "English",
                            "partnerCollectionId": "epgProvider:cl.X", "movieYear": 2001},
                    ],
                }),
                _ => json!({
                    "type": "contentList",
                    "content": [{"partnerContentId": "epgProvider:ct.Y", "movieYear": 2001}],
                }),
            })
        });

        let movie = search.search_movie("Title", Some(2001)).unwrap();
        assert_eq!(movie["collectionId"], json!("tivo:cl.3"));
        assert_eq!(movie["partnerContentId"], json!("epgProvider:ct.Y"));

        let requests = &search.rpc().requests;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].fields()["collectionType"], json!("movie"));
        assert_eq!(requests[1].fields()["collectionId"], json!("tivo:cl.3"));
    }

    #[test]
    fn search_movie_pages_until_match() {
        let mut search = search(|request, n| {
            if kind(request) == "contentSearch" {
                return Ok(json!({"content": [{"partnerContentId": "epgProvider:ct.9"}]}));
            }
            Ok(match n {
                0 => json!({"isBottom": false, "collection": [
                    {"collectionId": "tivo:cl.1", "partnerCollectionId": "tivo:cl.1"}
                ]}),
                _ => json!({"isBottom": false, "collection": [
                    {"collectionId": "tivo:cl.2", "partnerCollectionId": "epgProvider:cl.2"}
                ]}),
            })
        });

        let movie = search.search_movie("Title", None).unwrap();
        assert_eq!(movie["collectionId"], json!("tivo:cl.2"));

        let requests = &search.rpc().requests;
        assert_eq!(requests[0].fields()["offset"], json!(0));
        assert_eq!(requests[1].fields()["offset"], json!(MOVIE_PAGE_SIZE));
        assert_eq!(kind(&requests[2]), "contentSearch");
    }

    #[test]
    fn search_movie_nothing_survives() {
        let mut search = search(|_, _| {
            Ok(json!({"isBottom": true, "collection": [
                {"collectionId": "tivo:cl.1", "descriptionLanguage": "German",
                    "partnerCollectionId": "epgProvider:cl.1"}
            ]}))
        });

        assert!(search.search_movie("Title", None).unwrap().is_empty());
        assert_eq!(search.rpc().requests.len(), 1);
    }

    #[test]
    fn search_movie_page_bound() {
        let mut search = search(|_, _| {
            Ok(json!({"isBottom": false, "collection": [{"collectionId": "tivo:cl.1"}]}))
        });

        assert!(search.search_movie("Title", None).unwrap().is_empty());
        assert_eq!(search.rpc().requests.len() as u64, MAX_MOVIE_PAGES);
    }

    #[test]
    fn search_movie_internal_error() {
        let mut search = search(|_, _| Err(MindError::MindInternal("x".into())));

        assert!(matches!(
            search.search_movie("Title", None),
            Err(MindError::MindInternal(_))
        ));
        assert_eq!(search.rpc().requests.len(), 1);
    }

    #[test]
    fn search_series_adds_first_aired() {
        let mut search = search(|request, _| {
            Ok(match kind(request) {
                "collectionSearch" => json!({"collection": [
                    {"collectionId": "tivo:cl.10", "title": "Show",
                        "descriptionLanguage": "English",
                        "partnerCollectionId": "epgProvider:cl.10"},
                    {"collectionId": "tivo:cl.11", "title": "Show",
                        "descriptionLanguage": "English"},
                ]}),
                _ => json!({"content": [{"originalAirdate": "2004-09-22",
                    "originalAirYear": 2004, "releaseDate": "2004-09-22"}]}),
            })
        });

        let series = search.search_series("Show").unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0]["firstAired"], json!("2004-09-22"));

        let requests = &search.rpc().requests;
        assert_eq!(requests[0].fields()["collectionType"], json!("series"));
        assert_eq!(requests[0].fields()["count"], json!(SERIES_PAGE_SIZE));
        assert_eq!(requests[1].fields()["seasonNumber"], json!(1));
        assert_eq!(requests[1].fields()["episodeNum"], json!(1));
    }

    #[test]
    fn search_series_without_results() {
        let mut search = search(|_, _| Ok(json!({"type": "collectionList"})));
        assert!(search.search_series("Nothing").unwrap().is_empty());
    }

    #[test]
    fn series_info_missing_is_protocol_error() {
        let mut search = search(|_, _| Ok(json!({"type": "collectionList"})));
        assert!(matches!(
            search.get_series_info("tivo:cl.1"),
            Err(MindError::Protocol(_))
        ));
    }

    #[test]
    fn program_id_by_season_episode() {
        let mut search = search(|_, _| {
            Ok(json!({"content": [{"partnerContentId": "epgProvider:ct.77"}]}))
        });

        let id = search
            .get_program_id(
                "tivo:cl.1",
                EpisodeKey::SeasonEpisode {
                    season: 2,
                    episode: 5,
                },
            )
            .unwrap();
        assert_eq!(id.as_deref(), Some("epgProvider:ct.77"));

        let request = &search.rpc().requests[0];
        assert_eq!(request.fields()["seasonNumber"], json!(2));
        assert_eq!(request.fields()["episodeNum"], json!(5));
    }

    #[test]
    fn program_id_by_air_date() {
        let mut search = search(|_, n| {
            Ok(match n {
                0 => json!({"isBottom": false, "content": [
                    {"originalAirdate": "2010-01-01", "partnerContentId": "epgProvider:ct.1"}
                ]}),
                _ => json!({"isBottom": true, "content": [
                    {"originalAirdate": "2010-03-07", "partnerContentId": "epgProvider:ct.2"}
                ]}),
            })
        });

        let date = AirDate {
            year: 2010,
            month: 3,
            day: 7,
        };
        let id = search
            .get_program_id("tivo:cl.1", EpisodeKey::AirDate(date))
            .unwrap();
        assert_eq!(id.as_deref(), Some("epgProvider:ct.2"));
        assert_eq!(
            search.rpc().requests[1].fields()["offset"],
            json!(CONTENT_PAGE_SIZE)
        );
    }

    #[test]
    fn air_date_scan_stops_at_bottom() {
        let mut search = search(|_, _| {
            Ok(json!({"isBottom": true, "content": [{"originalAirdate": "1999-01-01"}]}))
        });

        let date = AirDate {
            year: 2010,
            month: 3,
            day: 7,
        };
        assert_eq!(
            search
                .get_program_id("tivo:cl.1", EpisodeKey::AirDate(date))
                .unwrap(),
            None
        );
        assert_eq!(search.rpc().requests.len(), 1);
    }

    #[test]
    fn air_date_scan_terminates_against_endless_service() {
        let mut search = search(|_, _| {
            Ok(json!({"isBottom": false, "content": [{"originalAirdate": "1999-01-01"}]}))
        });

        let date = AirDate {
            year: 2010,
            month: 3,
            day: 7,
        };
        let found = search.get_program_id_airdate("tivo:cl.1", date).unwrap();

        assert!(found.is_empty());
        assert_eq!(search.rpc().requests.len() as u64, MAX_AIRDATE_PAGES);
    }

    #[test]
    fn call_retries_unavailable() {
        let mut search = search(|_, n| {
            if n < 2 {
                Err(MindError::MindTimeout)
            } else {
                Ok(json!({"content": [{"partnerContentId": "epgProvider:ct.5"}]}))
            }
        });

        let id = search
            .get_program_id(
                "tivo:cl.1",
                EpisodeKey::SeasonEpisode {
                    season: 1,
                    episode: 1,
                },
            )
            .unwrap();
        assert_eq!(id.as_deref(), Some("epgProvider:ct.5"));
        assert_eq!(search.rpc().requests.len(), 3);
    }

    #[test]
    fn call_retry_is_bounded() {
        let mut search = search(|_, _| Err(MindError::MindTimeout));

        assert!(matches!(
            search.search_series("Show"),
            Err(MindError::MindTimeout)
        ));
        assert_eq!(search.rpc().requests.len(), 3);
    }

    #[test]
    fn offers_carry_body_id() {
        let mut search = search(|_, _| {
            Ok(json!({"offer": [{"partnerContentId": "epgProvider:ct.3",
                "partnerCollectionId": "epgProvider:cl.3"}]}))
        });

        let offers = search
            .search_offers("Show", Some("Pilot"), "tsn:ABC")
            .unwrap();
        assert_eq!(offers.len(), 1);

        let request = &search.rpc().requests[0];
        assert_eq!(kind(request), "offerSearch");
        assert_eq!(request.fields()["bodyId"], json!("tsn:ABC"));
        assert_eq!(request.fields()["subtitle"], json!("Pilot"));
    }

    #[test]
    fn air_date_format() {
        let date = AirDate {
            year: 2010,
            month: 3,
            day: 7,
        };
        assert_eq!(date.to_string(), "2010-03-07");
    }
}
