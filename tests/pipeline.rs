use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use feed_archivist::ai::{BackfillEngine, Scorer};
use feed_archivist::app::App;
use feed_archivist::config::Config;
use feed_archivist::error::{AppError, Result};
use feed_archivist::models::{FeedEntry, FeedSource, ItemKey, Sentiment};
use feed_archivist::store::{ArchiveCompactor, ItemStore};

const PUB_DATE: &str = "Sun, 15 Jun 2025 16:52:25 +0000";

/// Answers by looking up the item title in the prompt.
struct ScriptedScorer {
    answers: HashMap<&'static str, &'static str>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedScorer {
    fn new(answers: &[(&'static str, &'static str)]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Scorer for ScriptedScorer {
    async fn score(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .iter()
            .find(|(title, _)| prompt.contains(&format!("Title: {title}\n")))
            .map(|(_, answer)| answer.to_string())
            .ok_or_else(|| AppError::InferenceApi("no scripted answer".into()))
    }
}

fn entry(title: &str, description: &str) -> FeedEntry {
    FeedEntry {
        title: Some(title.to_string()),
        pub_date: Some(PUB_DATE.to_string()),
        link: Some(format!("https://example.com/{}", title.replace(' ', "-"))),
        description: Some(description.to_string()),
        raw_xml: format!(
            "<item><title>{title}</title><link>https://example.com/x</link>\
             <pubDate>{PUB_DATE}</pubDate><description>{description}</description></item>"
        ),
    }
}

async fn store_with(entries: &[FeedEntry]) -> (TempDir, ItemStore) {
    let dir = TempDir::new().unwrap();
    let store = ItemStore::open(dir.path().join("index.sqlite"), dir.path().join("raw"))
        .await
        .unwrap();
    for e in entries {
        store.ingest("wire", e).await.unwrap();
    }
    (dir, store)
}

fn key(title: &str) -> ItemKey {
    ItemKey::new("wire", PUB_DATE, title)
}

#[tokio::test]
async fn malformed_answer_does_not_stop_the_pass() {
    let (_dir, store) = store_with(&[
        entry("alpha", "Markets rally."),
        entry("bravo", "Storm warning."),
        entry("charlie", "Cat rescued."),
    ])
    .await;
    let scorer = ScriptedScorer::new(&[
        ("alpha", "1 Good news for savers"),
        ("bravo", "It is hard to say."),
        ("charlie", "1 Heartwarming"),
    ]);

    let report = BackfillEngine::new(&store, &scorer).run().await.unwrap();

    assert_eq!(report.scored, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, key("bravo"));
    assert_eq!(scorer.calls(), 3);

    let repo = store.repository();
    let alpha = repo.get_sentiment(key("alpha")).await.unwrap().unwrap();
    assert_eq!(alpha.sentiment, Sentiment::Positive);
    assert_eq!(alpha.explanation, "Good news for savers");
    assert!(repo.get_sentiment(key("bravo")).await.unwrap().is_none());
    assert!(repo.get_sentiment(key("charlie")).await.unwrap().is_some());

    assert_eq!(store.list_unscored().await.unwrap(), vec![key("bravo")]);
}

#[tokio::test]
async fn second_pass_only_retries_leftovers() {
    let (_dir, store) = store_with(&[entry("alpha", "Markets rally."), entry("bravo", "Storm.")]).await;

    let first = ScriptedScorer::new(&[("alpha", "1 fine"), ("bravo", "2 out of range")]);
    BackfillEngine::new(&store, &first).run().await.unwrap();

    let second = ScriptedScorer::new(&[("alpha", "1 fine"), ("bravo", "-1 Stormy")]);
    let report = BackfillEngine::new(&store, &second).run().await.unwrap();

    assert_eq!(report.scored, 1);
    assert_eq!(second.calls(), 1);
    assert!(store.list_unscored().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_raw_file_and_empty_text_are_per_item_failures() {
    let (_dir, store) = store_with(&[
        entry("alpha", "Markets rally."),
        entry("bravo", "Storm warning."),
        entry("charlie", "   "),
    ])
    .await;
    std::fs::remove_file(store.raw_path(&key("alpha")).unwrap()).unwrap();

    let scorer = ScriptedScorer::new(&[
        ("alpha", "1 unused"),
        ("bravo", "-1 Batten down"),
        ("charlie", "0 unused"),
    ]);
    let report = BackfillEngine::new(&store, &scorer).run().await.unwrap();

    assert_eq!(report.scored, 1);
    let mut failed: Vec<_> = report.failed.iter().map(|(k, _)| k.title.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["alpha", "charlie"]);
    // Neither failure reached the scorer.
    assert_eq!(scorer.calls(), 1);
}

fn age(path: &Path, by: Duration) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - by)
        .unwrap();
}

#[tokio::test]
async fn ingested_items_end_up_in_monthly_bundles() {
    let mut june = entry("june item", "x");
    june.pub_date = Some("Sun, 15 Jun 2025 16:52:25 +0000".into());
    let mut july = entry("july item", "y");
    july.pub_date = Some("Tue, 01 Jul 2025 09:00:00 +0000".into());
    let mut recent = entry("recent item", "z");
    recent.pub_date = Some("Wed, 02 Jul 2025 09:00:00 +0000".into());

    let (dir, store) = store_with(&[june.clone(), july.clone(), recent.clone()]).await;
    let month = Duration::from_secs(40 * 24 * 60 * 60);
    for e in [&june, &july] {
        let k = ItemKey::new("wire", e.pub_date.clone().unwrap(), e.title.clone().unwrap());
        age(&store.raw_path(&k).unwrap(), month);
    }

    let compactor = ArchiveCompactor::with_days(dir.path().join("raw"), 30);
    let summary = compactor.compact("wire").unwrap();
    assert_eq!(summary.archived_files, 2);

    let june_bundle = std::fs::read_to_string(compactor.bundle_path("wire", "2025_06")).unwrap();
    let july_bundle = std::fs::read_to_string(compactor.bundle_path("wire", "2025_07")).unwrap();
    assert!(june_bundle.contains("<title>june item</title>"));
    assert!(july_bundle.contains("<title>july item</title>"));
    assert!(!july_bundle.contains("recent item"));

    let remaining: Vec<_> = std::fs::read_dir(store.source_dir("wire"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].starts_with("2025_07_02_"));

    // Index rows survive archival.
    assert_eq!(store.list_unscored().await.unwrap().len(), 3);
}

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Wire</title>
<item><title>Man bites dog</title><link>https://example.com/a</link>
<pubDate>Sun, 15 Jun 2025 16:52:25 +0000</pubDate><description>Odd.</description></item>
<item><title>No date</title><link>https://example.com/b</link></item>
</channel></rss>"#;

async fn serve(body: &'static str) -> String {
    serve_bytes("application/rss+xml", body.as_bytes().to_vec()).await
}

async fn serve_bytes(content_type: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                content_type,
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
        }
    });
    format!("http://{addr}/feed.xml")
}

#[tokio::test]
async fn refresh_is_idempotent_and_isolates_bad_feeds() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let app = App::new(
        &config,
        &dir.path().join("index.sqlite"),
        &dir.path().join("raw"),
    )
    .await
    .unwrap();

    let good = FeedSource {
        name: "wire".into(),
        url: serve(RSS).await,
    };
    let bad = FeedSource {
        name: "broken".into(),
        url: "http://127.0.0.1:1/unreachable.xml".into(),
    };

    let failed = app.refresh_all(&[bad.clone(), good.clone()]).await;
    assert_eq!(failed, 1);
    let failed = app.refresh_all(&[good]).await;
    assert_eq!(failed, 0);

    assert_eq!(
        app.store().list_unscored().await.unwrap(),
        vec![ItemKey::new("wire", PUB_DATE, "Man bites dog")]
    );
    let files = std::fs::read_dir(app.store().source_dir("wire")).unwrap().count();
    assert_eq!(files, 1);

    let raw = app
        .store()
        .load_raw(&ItemKey::new("wire", PUB_DATE, "Man bites dog"))
        .unwrap();
    assert!(raw.contains("<description>Odd.</description>"));
}

#[tokio::test]
async fn latin1_namespaced_feed_is_stored_as_standalone_utf8_items() {
    use quick_xml::events::Event;
    use quick_xml::name::{Namespace, ResolveResult};
    use quick_xml::NsReader;

    let mut body = b"<rss version=\"2.0\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
<channel><item><title>Caf"
        .to_vec();
    body.push(0xE9);
    body.extend_from_slice(
        b" opens</title><dc:creator>Ann</dc:creator>\
<link>https://example.com/cafe</link>\
<pubDate>Sun, 15 Jun 2025 16:52:25 +0000</pubDate></item></channel></rss>",
    );

    let dir = TempDir::new().unwrap();
    let app = App::new(
        &Config::default(),
        &dir.path().join("index.sqlite"),
        &dir.path().join("raw"),
    )
    .await
    .unwrap();
    let feed = FeedSource {
        name: "cafe".into(),
        url: serve_bytes("application/rss+xml; charset=ISO-8859-1", body).await,
    };
    assert_eq!(app.refresh_all(&[feed]).await, 0);

    let key = ItemKey::new("cafe", PUB_DATE, "Caf\u{e9} opens");
    assert_eq!(app.store().list_unscored().await.unwrap(), vec![key.clone()]);
    let raw = app.store().load_raw(&key).unwrap();
    assert!(raw.starts_with("<?xml version='1.0' encoding='utf-8'?>"));

    let mut reader = NsReader::from_str(&raw);
    let creator_ns = loop {
        match reader.read_resolved_event().unwrap() {
            (ResolveResult::Bound(Namespace(uri)), Event::Start(e))
                if e.local_name().as_ref() == b"creator" =>
            {
                break uri.to_vec()
            }
            (_, Event::Eof) => panic!("no bound creator element in {raw}"),
            _ => {}
        }
    };
    assert_eq!(creator_ns, b"http://purl.org/dc/elements/1.1/");
}
