//! Page extraction
//!
//! This module turns one fetched page into content items:
//! - JSON API pages are decoded into posts and dispatched per post type
//! - HTML blog pages are scanned for media URLs and paging signals
//! - Tag, reblog, type and skip-gif filters are applied here, never downstream
//!
//! Extraction is pure: the same payload and settings always yield the same
//! `(type, payload)` pairs.

use crate::config::{Config, DownloadConfig, PageSource};
use crate::state::{ContentItem, PostType};
use crate::url::{image_size_token, resize_image_url};
use crate::ExtractError;
use regex::Regex;
use scraper::{Html, Selector};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::sync::OnceLock;

/// Everything the extractor needs to know about the crawl configuration
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub source: PageSource,
    pub toggles: DownloadConfig,
    /// Lowercased tag filter; empty means no filtering
    pub tags: Vec<String>,
    pub download_reblogged: bool,
    pub image_size: String,
    pub video_size: u32,
}

impl ExtractSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source: config.blog.source,
            toggles: config.download.clone(),
            tags: config
                .tag_filter()
                .into_iter()
                .map(|tag| tag.to_lowercase())
                .collect(),
            download_reblogged: config.scan.download_reblogged,
            image_size: config.media.image_size.clone(),
            video_size: config.media.video_size,
        }
    }
}

/// Result of extracting a single page
#[derive(Debug, Clone, Default)]
pub struct PageExtract {
    /// Items in page order
    pub items: Vec<ContentItem>,

    /// Highest numeric post id on the page, 0 when the page has none
    pub highest_post_id: u64,

    /// The page signals there is nothing after it
    pub end_of_results: bool,

    /// The page is a login wall instead of content
    pub login_required: bool,
}

/// Source type discriminator and the item kinds each post of that type yields
const HANDLERS: &[(&str, &[PostType])] = &[
    ("photo", &[PostType::Photo, PostType::PhotoMeta]),
    ("video", &[PostType::Video, PostType::VideoMeta]),
    ("audio", &[PostType::Audio, PostType::AudioMeta]),
    ("text", &[PostType::Text]),
    ("quote", &[PostType::Quote]),
    ("link", &[PostType::Link]),
    ("chat", &[PostType::Conversation]),
    ("answer", &[PostType::Answer]),
];

fn handlers_for(discriminator: &str) -> &'static [PostType] {
    HANDLERS
        .iter()
        .find(|(name, _)| *name == discriminator)
        .map(|(_, types)| *types)
        .unwrap_or(&[])
}

/// Maps page payloads to content items
#[derive(Debug, Clone)]
pub struct PostExtractor {
    settings: ExtractSettings,
}

impl PostExtractor {
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ExtractSettings::from_config(config))
    }

    pub fn settings(&self) -> &ExtractSettings {
        &self.settings
    }

    /// Extracts the items of one page
    ///
    /// # Arguments
    ///
    /// * `body` - The raw page payload
    /// * `page` - Zero-based page index the payload was fetched for
    ///
    /// # Returns
    ///
    /// * `Ok(PageExtract)` - Items and paging signals
    /// * `Err(ExtractError)` - The API envelope could not be decoded
    pub fn extract(&self, body: &[u8], page: u64) -> Result<PageExtract, ExtractError> {
        match self.settings.source {
            PageSource::Api => self.extract_api(body),
            PageSource::Html => Ok(self.extract_html(&String::from_utf8_lossy(body), page)),
        }
    }

    fn extract_api(&self, body: &[u8]) -> Result<PageExtract, ExtractError> {
        let envelope: ApiEnvelope = serde_json::from_slice(body)?;
        let response = envelope.response.ok_or(ExtractError::MissingResponse)?;

        let mut extract = PageExtract {
            end_of_results: response.posts.is_empty(),
            ..PageExtract::default()
        };

        for post in &response.posts {
            if let Ok(id) = post.id.parse::<u64>() {
                extract.highest_post_id = extract.highest_post_id.max(id);
            }

            if !self.passes_tag_filter(post) || !self.passes_reblog_filter(post) {
                continue;
            }

            for &post_type in handlers_for(&post.post_type) {
                if self.settings.toggles.enabled(post_type) {
                    self.build_items(post_type, post, &mut extract.items);
                }
            }
        }

        Ok(extract)
    }

    fn passes_tag_filter(&self, post: &ApiPost) -> bool {
        self.settings.tags.is_empty()
            || post
                .tags
                .iter()
                .any(|tag| self.settings.tags.contains(&tag.to_lowercase()))
    }

    fn passes_reblog_filter(&self, post: &ApiPost) -> bool {
        self.settings.download_reblogged || post.reblogged_from_url.is_empty()
    }

    fn build_items(&self, post_type: PostType, post: &ApiPost, out: &mut Vec<ContentItem>) {
        let timestamp = (!post.timestamp.is_empty()).then(|| post.timestamp.clone());
        let media = |payload: String| {
            ContentItem::new(post_type, payload, post.id.as_str(), timestamp.clone())
        };
        let record = |lines: Vec<String>| {
            ContentItem::new(post_type, format_record(post, &lines), post.id.as_str(), None)
        };
        let text = |lines: Vec<String>| {
            ContentItem::new(post_type, format_record(post, &lines), post.id.as_str(), timestamp.clone())
        };

        match post_type {
            PostType::Photo => {
                for photo in &post.photos {
                    if let Some(url) = self.select_photo_url(photo) {
                        out.push(media(url));
                    }
                }
            }
            PostType::Video => {
                if let Some(url) = self.normalize_video_url(&post.video_url) {
                    out.push(media(url));
                }
            }
            PostType::Audio => {
                if !post.audio_url.is_empty() {
                    let mut url = post.audio_url.clone();
                    if !url.ends_with(".mp3") {
                        url.push_str(".mp3");
                    }
                    out.push(media(url));
                }
            }
            PostType::Text => out.push(text(vec![
                format!("Title: {}", post.title),
                post.body.clone(),
            ])),
            PostType::Quote => out.push(text(vec![
                format!("Quote: {}", post.text),
                post.source.clone(),
            ])),
            PostType::Link => {
                let url = if post.link_url.is_empty() {
                    &post.url
                } else {
                    &post.link_url
                };
                out.push(text(vec![
                    format!("Link: {}", url),
                    post.description.clone(),
                ]))
            }
            PostType::Conversation => out.push(text(
                post.dialogue
                    .iter()
                    .map(|line| format!("{} {}", line.label, line.phrase))
                    .collect(),
            )),
            PostType::Answer => out.push(text(vec![post.question.clone(), post.answer.clone()])),
            PostType::PhotoMeta => {
                let first = post.photos.first();
                out.push(record(vec![
                    format!(
                        "Photo url: {}",
                        first.map(|p| p.original_size.url.as_str()).unwrap_or("")
                    ),
                    format!(
                        "Photo caption: {}",
                        first.map(|p| p.caption.as_str()).unwrap_or("")
                    ),
                ]))
            }
            PostType::VideoMeta => out.push(record(vec![
                format!("Video url: {}", post.video_url),
                format!("Video caption: {}", post.caption),
            ])),
            PostType::AudioMeta => out.push(record(vec![
                format!("Audio caption: {}", post.caption),
                format!("Id3 artist: {}", post.artist),
                format!("Id3 title: {}", post.id3_title()),
                format!("Id3 track: {}", post.track),
                format!("Id3 album: {}", post.album),
                format!("Id3 year: {}", post.year),
            ])),
        }
    }

    /// Picks the alt size matching the target width, then the first alt size,
    /// then the original
    fn select_photo_url(&self, photo: &ApiPhoto) -> Option<String> {
        let target = image_size_token(&self.settings.image_size);
        let url = photo
            .alt_sizes
            .iter()
            .find(|size| size.width.to_string() == target && !size.url.is_empty())
            .or_else(|| photo.alt_sizes.iter().find(|size| !size.url.is_empty()))
            .map(|size| size.url.as_str())
            .or_else(|| Some(photo.original_size.url.as_str()).filter(|url| !url.is_empty()))?;

        if self.settings.toggles.skip_gif && url.ends_with(".gif") {
            return None;
        }
        Some(url.to_string())
    }

    fn normalize_video_url(&self, url: &str) -> Option<String> {
        if url.is_empty() {
            return None;
        }
        if self.settings.video_size == 480 && !url.contains("_480") {
            return Some(url.replace(".mp4", "_480.mp4"));
        }
        Some(url.to_string())
    }

    fn extract_html(&self, document: &str, page: u64) -> PageExtract {
        let html = Html::parse_document(document);
        let login_required = html.select(login_wall_selector()).next().is_some();
        let no_posts = html.select(no_posts_selector()).next().is_some();

        // Pages are addressed 1-based, so the page after index `page` is `page + 2`
        let next_suffix = format!("/page/{}", page + 2);
        let has_next = html.select(anchor_selector()).any(|a| {
            a.value()
                .attr("href")
                .map(|href| href.trim_end_matches('/').ends_with(&next_suffix))
                .unwrap_or(false)
        });

        let mut items = Vec::new();
        if !login_required {
            if self.settings.toggles.photo {
                self.html_photos(document, &mut items);
            }
            if self.settings.toggles.video {
                self.html_videos(document, &mut items);
            }
        }

        PageExtract {
            items,
            highest_post_id: 0,
            end_of_results: no_posts || !has_next,
            login_required,
        }
    }

    fn html_photos(&self, document: &str, out: &mut Vec<ContentItem>) {
        for capture in html_photo_pattern().captures_iter(document) {
            let url = &capture[1];
            if url.contains("avatar") || url.contains("previews") {
                continue;
            }
            if self.settings.toggles.skip_gif && url.ends_with(".gif") {
                continue;
            }
            out.push(ContentItem::new(
                PostType::Photo,
                resize_image_url(url, &self.settings.image_size),
                random_post_id(),
                None,
            ));
        }
    }

    fn html_videos(&self, document: &str, out: &mut Vec<ContentItem>) {
        for capture in html_video_pattern().captures_iter(document) {
            let stripped = capture[1].replace("/480", "");
            let id = stripped.rsplit('/').next().unwrap_or_default();
            if id.is_empty() {
                continue;
            }
            let url = if self.settings.video_size == 480 {
                format!("https://vt.tumblr.com/{}_480.mp4", id)
            } else {
                format!("https://vt.tumblr.com/{}.mp4", id)
            };
            out.push(ContentItem::new(PostType::Video, url, random_post_id(), None));
        }
    }
}

/// Renders a text record: the attribution header, `lines`, then the tags
///
/// Every line, including the last, ends in `\n`.
fn format_record(post: &ApiPost, lines: &[String]) -> String {
    let mut record = format!(
        "Post ID: {}, Date: {}\nSlug: {}\nReblog key: {}\nReblog url: {}\nReblog name: {}\n",
        post.id,
        post.date,
        post.slug,
        post.reblog_key,
        post.reblogged_from_url,
        post.reblogged_from_name
    );
    for line in lines {
        record.push_str(line);
        record.push('\n');
    }
    record.push_str("Tags: ");
    record.push_str(&post.tags.join(", "));
    record.push('\n');
    record
}

/// HTML items have no source id
fn random_post_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn html_photo_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(http[^"\s]*media\.tumblr\.com[^"\s]*(?:jpg|png|gif))""#)
            .expect("photo pattern is valid")
    })
}

fn html_video_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(http[^"\s]*\.com/video_file/[^"\s]*)""#).expect("video pattern is valid")
    })
}

fn login_wall_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("div.signup_view.account.login").expect("valid selector"))
}

fn no_posts_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("div.no_posts_found").expect("valid selector"))
}

fn anchor_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a[href]").expect("valid selector"))
}

// API wire types. Every field tolerates absence and null.

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    response: Option<ApiResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    posts: Vec<ApiPost>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiPost {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    post_type: String,
    #[serde(deserialize_with = "lenient_string")]
    timestamp: String,
    #[serde(deserialize_with = "lenient_string")]
    date: String,
    #[serde(deserialize_with = "lenient_string")]
    slug: String,
    #[serde(deserialize_with = "lenient_string")]
    reblog_key: String,
    #[serde(deserialize_with = "lenient_string")]
    reblogged_from_url: String,
    #[serde(deserialize_with = "lenient_string")]
    reblogged_from_name: String,
    #[serde(deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    body: String,
    #[serde(deserialize_with = "null_as_default")]
    photos: Vec<ApiPhoto>,
    #[serde(deserialize_with = "lenient_string")]
    caption: String,
    #[serde(deserialize_with = "lenient_string")]
    video_url: String,
    #[serde(deserialize_with = "lenient_string")]
    audio_url: String,
    #[serde(deserialize_with = "lenient_string")]
    text: String,
    #[serde(deserialize_with = "lenient_string")]
    source: String,
    #[serde(deserialize_with = "lenient_string")]
    url: String,
    #[serde(deserialize_with = "lenient_string")]
    link_url: String,
    #[serde(deserialize_with = "lenient_string")]
    description: String,
    #[serde(deserialize_with = "null_as_default")]
    dialogue: Vec<ApiDialogue>,
    #[serde(deserialize_with = "lenient_string")]
    question: String,
    #[serde(deserialize_with = "lenient_string")]
    answer: String,
    #[serde(deserialize_with = "lenient_string")]
    artist: String,
    #[serde(deserialize_with = "lenient_string")]
    track_name: String,
    #[serde(deserialize_with = "lenient_string")]
    track: String,
    #[serde(deserialize_with = "lenient_string")]
    album: String,
    #[serde(deserialize_with = "lenient_string")]
    year: String,
}

impl ApiPost {
    /// Audio posts name the track in `track_name`; older payloads only have `title`
    fn id3_title(&self) -> &str {
        if self.track_name.is_empty() {
            &self.title
        } else {
            &self.track_name
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiPhoto {
    #[serde(deserialize_with = "lenient_string")]
    caption: String,
    #[serde(deserialize_with = "null_as_default")]
    original_size: ApiPhotoSize,
    #[serde(deserialize_with = "null_as_default")]
    alt_sizes: Vec<ApiPhotoSize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiPhotoSize {
    #[serde(deserialize_with = "null_as_default")]
    width: u32,
    #[serde(deserialize_with = "lenient_string")]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiDialogue {
    #[serde(deserialize_with = "lenient_string")]
    label: String,
    #[serde(deserialize_with = "lenient_string")]
    phrase: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts strings, numbers and booleans; anything else becomes empty
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_settings() -> ExtractSettings {
        ExtractSettings {
            source: PageSource::Api,
            toggles: DownloadConfig::default(),
            tags: Vec::new(),
            download_reblogged: true,
            image_size: "500".to_string(),
            video_size: 1080,
        }
    }

    fn page(posts: serde_json::Value) -> Vec<u8> {
        json!({"meta": {"status": 200}, "response": {"posts": posts}})
            .to_string()
            .into_bytes()
    }

    fn photo_post(id: u64, tags: &[&str]) -> serde_json::Value {
        json!({
            "id": id.to_string(),
            "type": "photo",
            "timestamp": 1500000000u64 + id,
            "tags": tags,
            "photos": [{
                "caption": "cap",
                "original_size": {"width": 1280, "url": format!("https://64.media.tumblr.com/x/tumblr_{}_1280.jpg", id)},
                "alt_sizes": [
                    {"width": 1280, "url": format!("https://64.media.tumblr.com/x/tumblr_{}_1280.jpg", id)},
                    {"width": 500, "url": format!("https://64.media.tumblr.com/x/tumblr_{}_500.jpg", id)}
                ]
            }]
        })
    }

    fn pairs(extract: &PageExtract) -> Vec<(PostType, String)> {
        let mut pairs: Vec<_> = extract
            .items
            .iter()
            .map(|item| (item.post_type(), item.payload().to_string()))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_handler_table() {
        assert_eq!(handlers_for("photo"), &[PostType::Photo, PostType::PhotoMeta]);
        assert_eq!(handlers_for("chat"), &[PostType::Conversation]);
        assert!(handlers_for("unknown").is_empty());
    }

    #[test]
    fn test_photo_selects_target_width() {
        let extractor = PostExtractor::new(create_test_settings());
        let extract = extractor.extract(&page(json!([photo_post(7, &[])])), 0).unwrap();

        assert_eq!(extract.items.len(), 1);
        let item = &extract.items[0];
        assert_eq!(item.post_type(), PostType::Photo);
        assert_eq!(item.payload(), "https://64.media.tumblr.com/x/tumblr_7_500.jpg");
        assert_eq!(item.post_id(), "7");
        assert_eq!(item.timestamp(), Some("1500000007"));
        assert_eq!(extract.highest_post_id, 7);
        assert!(!extract.end_of_results);
    }

    #[test]
    fn test_photo_falls_back_to_first_alt_size() {
        let mut settings = create_test_settings();
        settings.image_size = "400".to_string();
        let extractor = PostExtractor::new(settings);
        let extract = extractor.extract(&page(json!([photo_post(7, &[])])), 0).unwrap();
        assert_eq!(extract.items[0].payload(), "https://64.media.tumblr.com/x/tumblr_7_1280.jpg");
    }

    #[test]
    fn test_raw_size_selects_largest_width() {
        let mut settings = create_test_settings();
        settings.image_size = "raw".to_string();
        let extractor = PostExtractor::new(settings);
        let extract = extractor.extract(&page(json!([photo_post(7, &[])])), 0).unwrap();
        assert_eq!(extract.items[0].payload(), "https://64.media.tumblr.com/x/tumblr_7_1280.jpg");
    }

    #[test]
    fn test_skip_gif() {
        let mut settings = create_test_settings();
        settings.toggles.skip_gif = true;
        let extractor = PostExtractor::new(settings);
        let posts = json!([{
            "id": 1, "type": "photo",
            "photos": [{"alt_sizes": [{"width": 500, "url": "https://64.media.tumblr.com/a_500.gif"}]}]
        }]);
        let extract = extractor.extract(&page(posts), 0).unwrap();
        assert!(extract.items.is_empty());
    }

    #[test]
    fn test_tag_filter_is_case_insensitive() {
        let mut settings = create_test_settings();
        settings.tags = vec!["art".to_string()];
        let extractor = PostExtractor::new(settings);
        let posts = json!([photo_post(1, &["Art", "misc"]), photo_post(2, &["misc"])]);
        let extract = extractor.extract(&page(posts), 0).unwrap();

        assert_eq!(extract.items.len(), 1);
        assert_eq!(extract.items[0].post_id(), "1");
        // Filtered posts still count toward the page's highest id
        assert_eq!(extract.highest_post_id, 2);
    }

    #[test]
    fn test_reblog_filter() {
        let mut settings = create_test_settings();
        settings.download_reblogged = false;
        let extractor = PostExtractor::new(settings);

        let mut reblog = photo_post(1, &[]);
        reblog["reblogged_from_url"] = json!("https://other.tumblr.com/post/9");
        let mut own = photo_post(2, &[]);
        own["reblogged_from_url"] = json!(null);

        let extract = extractor.extract(&page(json!([reblog, own])), 0).unwrap();
        assert_eq!(extract.items.len(), 1);
        assert_eq!(extract.items[0].post_id(), "2");
    }

    #[test]
    fn test_video_480_rewrite() {
        let mut settings = create_test_settings();
        settings.video_size = 480;
        let extractor = PostExtractor::new(settings);
        let posts = json!([
            {"id": 1, "type": "video", "video_url": "https://vt.tumblr.com/tumblr_abc.mp4"},
            {"id": 2, "type": "video", "video_url": "https://vt.tumblr.com/tumblr_def_480.mp4"},
            {"id": 3, "type": "video", "video_url": null}
        ]);
        let extract = extractor.extract(&page(posts), 0).unwrap();
        let urls: Vec<_> = extract.items.iter().map(|i| i.payload()).collect();
        assert_eq!(
            urls,
            vec![
                "https://vt.tumblr.com/tumblr_abc_480.mp4",
                "https://vt.tumblr.com/tumblr_def_480.mp4"
            ]
        );
    }

    #[test]
    fn test_audio_gets_mp3_extension() {
        let extractor = PostExtractor::new(create_test_settings());
        let posts = json!([
            {"id": 1, "type": "audio", "audio_url": "https://a.tumblr.com/tumblr_x"},
            {"id": 2, "type": "audio", "audio_url": "https://a.tumblr.com/tumblr_y.mp3"}
        ]);
        let extract = extractor.extract(&page(posts), 0).unwrap();
        assert_eq!(extract.items[0].payload(), "https://a.tumblr.com/tumblr_x.mp3");
        assert_eq!(extract.items[1].payload(), "https://a.tumblr.com/tumblr_y.mp3");
    }

    #[test]
    fn test_text_record_format() {
        let extractor = PostExtractor::new(create_test_settings());
        let posts = json!([{
            "id": 42, "type": "text", "timestamp": "1600000000",
            "date": "2020-09-13 12:26:40 GMT", "slug": "hello",
            "reblog_key": "rk", "reblogged_from_url": "", "reblogged_from_name": null,
            "title": "Hello", "body": "<p>World</p>", "tags": ["a", "b"]
        }]);
        let extract = extractor.extract(&page(posts), 0).unwrap();

        assert_eq!(
            extract.items[0].payload(),
            "Post ID: 42, Date: 2020-09-13 12:26:40 GMT\n\
             Slug: hello\n\
             Reblog key: rk\n\
             Reblog url: \n\
             Reblog name: \n\
             Title: Hello\n\
             <p>World</p>\n\
             Tags: a, b\n"
        );
        assert_eq!(extract.items[0].timestamp(), Some("1600000000"));
    }

    #[test]
    fn test_conversation_and_answer_records() {
        let extractor = PostExtractor::new(create_test_settings());
        let posts = json!([
            {"id": 1, "type": "chat", "dialogue": [
                {"label": "A:", "phrase": "hi"}, {"label": "B:", "phrase": "yo"}
            ]},
            {"id": 2, "type": "answer", "question": "Why?", "answer": "Because."}
        ]);
        let extract = extractor.extract(&page(posts), 0).unwrap();

        let chat = extract.items[0].payload();
        assert!(chat.ends_with("Reblog name: \nA: hi\nB: yo\nTags: \n"));
        let answer = extract.items[1].payload();
        assert!(answer.ends_with("Reblog name: \nWhy?\nBecause.\nTags: \n"));
    }

    #[test]
    fn test_meta_records_are_gated_separately() {
        let mut settings = create_test_settings();
        settings.toggles.photo = false;
        settings.toggles.photo_meta = true;
        settings.toggles.audio_meta = true;
        let extractor = PostExtractor::new(settings);
        let posts = json!([
            photo_post(3, &[]),
            {"id": 4, "type": "audio", "audio_url": "https://a/x.mp3", "caption": "c",
             "artist": "Band", "track_name": "Song", "track": 2, "album": "LP", "year": 1999}
        ]);
        let extract = extractor.extract(&page(posts), 0).unwrap();

        let types: Vec<_> = extract.items.iter().map(|i| i.post_type()).collect();
        assert_eq!(types, vec![PostType::PhotoMeta, PostType::Audio, PostType::AudioMeta]);

        let photo_meta = extract.items[0].payload();
        assert!(photo_meta.contains("Photo url: https://64.media.tumblr.com/x/tumblr_3_1280.jpg\n"));
        assert!(photo_meta.contains("Photo caption: cap\n"));
        assert_eq!(extract.items[0].timestamp(), None);

        let audio_meta = extract.items[2].payload();
        assert!(audio_meta.contains(
            "Audio caption: c\nId3 artist: Band\nId3 title: Song\nId3 track: 2\nId3 album: LP\nId3 year: 1999\n"
        ));
    }

    #[test]
    fn test_missing_fields_do_not_fail() {
        let extractor = PostExtractor::new(create_test_settings());
        let posts = json!([
            {"type": "photo", "photos": null},
            {"type": "quote"},
            {"id": null, "type": "link", "link_url": "https://example.com"}
        ]);
        let extract = extractor.extract(&page(posts), 0).unwrap();
        assert_eq!(extract.items.len(), 2);
        assert!(extract.items[0].payload().contains("Quote: \n\n"));
        assert!(extract.items[1].payload().contains("Link: https://example.com\n"));
    }

    #[test]
    fn test_empty_page_is_end_of_results() {
        let extractor = PostExtractor::new(create_test_settings());
        let extract = extractor.extract(&page(json!([])), 3).unwrap();
        assert!(extract.end_of_results);
        assert!(extract.items.is_empty());
    }

    #[test]
    fn test_malformed_envelope_is_error() {
        let extractor = PostExtractor::new(create_test_settings());
        assert!(matches!(
            extractor.extract(b"not json", 0),
            Err(ExtractError::Json(_))
        ));
        assert!(matches!(
            extractor.extract(br#"{"meta": {"status": 404}}"#, 0),
            Err(ExtractError::MissingResponse)
        ));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = PostExtractor::new(create_test_settings());
        let body = page(json!([
            photo_post(1, &["x"]),
            {"id": 2, "type": "text", "title": "t", "body": "b"},
            {"id": 3, "type": "video", "video_url": "https://vt.tumblr.com/v.mp4"}
        ]));
        let first = extractor.extract(&body, 0).unwrap();
        let second = extractor.extract(&body, 0).unwrap();
        assert_eq!(pairs(&first), pairs(&second));
        assert_eq!(first.items.len(), 3);
    }

    fn html_settings() -> ExtractSettings {
        ExtractSettings {
            source: PageSource::Html,
            image_size: "250".to_string(),
            ..create_test_settings()
        }
    }

    #[test]
    fn test_html_media_and_paging() {
        let extractor = PostExtractor::new(html_settings());
        let document = r#"<html><body>
            <img src="https://64.media.tumblr.com/x/tumblr_a_500.jpg">
            <img src="https://64.media.tumblr.com/avatar_b_64.png">
            <img src="https://64.media.tumblr.com/previews/c_500.jpg">
            <source src="https://blog.tumblr.com/video_file/t:abc/123/tumblr_vid/480" type="video/mp4">
            <a href="/page/2">Next</a>
        </body></html>"#;

        let extract = extractor.extract(document.as_bytes(), 0).unwrap();
        let payloads: Vec<_> = extract.items.iter().map(|i| i.payload()).collect();
        assert_eq!(
            payloads,
            vec![
                "https://64.media.tumblr.com/x/tumblr_a_250.jpg",
                "https://vt.tumblr.com/tumblr_vid.mp4"
            ]
        );
        assert!(!extract.end_of_results);
        assert!(!extract.login_required);
        assert_eq!(extract.highest_post_id, 0);
        assert_eq!(extract.items[0].post_id().len(), 32);
    }

    #[test]
    fn test_html_end_and_login_signals() {
        let extractor = PostExtractor::new(html_settings());

        let last = extractor
            .extract(b"<html><body><a href=\"/page/1\">Prev</a></body></html>", 1)
            .unwrap();
        assert!(last.end_of_results);

        let empty = extractor
            .extract(b"<div class=\"no_posts_found\"></div><a href=\"/page/3\">", 1)
            .unwrap();
        assert!(empty.end_of_results);

        let wall = extractor
            .extract(
                b"<div class=\"signup_view account login\">\"https://64.media.tumblr.com/a_500.jpg\"</div>",
                0,
            )
            .unwrap();
        assert!(wall.login_required);
        assert!(wall.items.is_empty());
    }

    #[test]
    fn test_html_extraction_is_idempotent_modulo_ids() {
        let extractor = PostExtractor::new(html_settings());
        let document = br#"<img src="https://64.media.tumblr.com/x/tumblr_a_500.jpg"><a href="/page/2">"#;
        let first = extractor.extract(document, 0).unwrap();
        let second = extractor.extract(document, 0).unwrap();
        assert_eq!(pairs(&first), pairs(&second));
        assert_ne!(first.items[0].post_id(), second.items[0].post_id());
    }
}
