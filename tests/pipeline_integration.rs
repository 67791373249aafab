//! End-to-end pipeline tests: job building, resolution, transfer, retry and
//! reporting against wiremock servers and temporary output trees.

mod support;

use std::path::PathBuf;

use festival_fetch::download::partial_path_for;
use festival_fetch::{
    AssetKind, FailureKind, JobBuilder, JobOutcome, OutcomeStatus, RunSummary, Strategy,
    write_report,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{ScriptedExtractor, quick_config, row, scheduler, scheduler_with_drive};

const DRIVE_ID: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz";

async fn mount_direct_file(server: &MockServer, file_path: &str, body: &[u8]) {
    Mock::given(method("HEAD"))
        .and(path(file_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("accept-ranges", "bytes")
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

async fn mount_drive_file(server: &MockServer, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", DRIVE_ID))
        .and(header("range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", format!("bytes 0-0/{}", body.len()).as_str())
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(body[..1].to_vec()),
        )
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", DRIVE_ID))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

fn by_kind(outcomes: &[JobOutcome], kind: AssetKind) -> &JobOutcome {
    outcomes
        .iter()
        .find(|o| o.kind == kind)
        .expect("outcome for asset kind")
}

#[tokio::test]
async fn test_three_row_submission_downloads_two_and_reports_unsupported_poster() {
    let server = MockServer::start().await;
    let trailer_bytes = b"trailer: 24 frames of countdown leader".to_vec();
    let film_bytes = vec![42u8; 4096];
    mount_direct_file(&server, "/night-swim/trailer.mp4", &trailer_bytes).await;
    mount_drive_file(&server, &film_bytes).await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = quick_config(&dir);
    config.filter.include_poster = true;
    config.stub_unobtainable = true;

    let trailer_url = format!("{}/night-swim/trailer.mp4", server.uri());
    let film_url = format!("https://drive.google.com/uc?id={DRIVE_ID}&export=download");
    let rows = vec![
        row("Night Swim", &[(AssetKind::Trailer, trailer_url.as_str())]),
        row("Low Tide", &[(AssetKind::Film, film_url.as_str())]),
        row(
            "Paper Moon",
            &[(AssetKind::Poster, "ftp://press.example/paper-moon/poster.jpg")],
        ),
    ];

    let build = JobBuilder::new(&config).build(&rows);
    assert_eq!(build.jobs.len(), 3);
    let outcomes = scheduler_with_drive(&config, &server.uri(), ScriptedExtractor::failing(0))
        .run(build)
        .await;

    assert_eq!(outcomes.len(), 3);
    let seqs: Vec<usize> = outcomes.iter().map(|o| o.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);

    let trailer = by_kind(&outcomes, AssetKind::Trailer);
    assert_eq!(trailer.status, OutcomeStatus::Downloaded);
    assert_eq!(trailer.strategy, Strategy::DirectHttp);
    let trailer_path = trailer.final_path.clone().expect("trailer path");
    assert!(trailer_path.ends_with("Night Swim/Trailer/Night_Swim_trailer.mp4"));
    assert_eq!(std::fs::read(&trailer_path).expect("trailer file"), trailer_bytes);

    let film = by_kind(&outcomes, AssetKind::Film);
    assert_eq!(film.status, OutcomeStatus::Downloaded);
    assert_eq!(film.strategy, Strategy::GoogleDrive);
    let film_path = film.final_path.clone().expect("film path");
    assert!(film_path.starts_with(dir.path().join("Low Tide").join("Film")));
    assert_eq!(
        film_path.extension().and_then(|e| e.to_str()),
        Some("mp4")
    );
    assert_eq!(std::fs::read(&film_path).expect("film file"), film_bytes);

    let poster = by_kind(&outcomes, AssetKind::Poster);
    assert_eq!(poster.status, OutcomeStatus::Failed);
    assert_eq!(poster.attempts, 1);
    assert_eq!(
        poster.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::UnsupportedHost)
    );

    let summary = RunSummary::from_outcomes(&outcomes);
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.exit_outcome().code(), 2);

    let report_path = write_report(&config.report_path(), &outcomes)
        .await
        .expect("report should be written");
    let report = std::fs::read_to_string(report_path).expect("report readable");
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[3].contains("unsupported-host"));
    assert_eq!(report.matches(",downloaded,").count(), 2);
    assert_eq!(
        film.resolved_url.as_deref(),
        Some(format!("{}/uc?export=download&id={DRIVE_ID}", server.uri()).as_str())
    );
    assert!(lines[2].contains(&format!(
        "{film_url},{}/uc?export=download&id={DRIVE_ID},",
        server.uri()
    )));

    // A second pass over the same tree schedules nothing.
    let rebuilt = JobBuilder::new(&config).build(&rows);
    assert!(rebuilt.jobs.is_empty());
    let statuses: Vec<OutcomeStatus> = rebuilt.skipped.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::SkippedExisting,
            OutcomeStatus::SkippedExisting,
            OutcomeStatus::SkippedStub,
        ]
    );
}

#[tokio::test]
async fn test_second_pass_skips_small_downloads_under_default_threshold() {
    let server = MockServer::start().await;
    let body = vec![9u8; 200 * 1024];
    Mock::given(method("HEAD"))
        .and(path("/harbor/trailer.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("accept-ranges", "bytes")
                .set_body_bytes(body.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/harbor/trailer.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let config = quick_config(&dir);
    assert!(config.min_existing_bytes > body.len() as u64);
    let url = format!("{}/harbor/trailer.mp4", server.uri());
    let rows = vec![row("Harbor", &[(AssetKind::Trailer, url.as_str())])];

    let outcomes = scheduler(&config, ScriptedExtractor::failing(0))
        .run(JobBuilder::new(&config).build(&rows))
        .await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Downloaded);
    let first_path = outcomes[0].final_path.clone().expect("trailer path");

    let rebuilt = JobBuilder::new(&config).build(&rows);
    assert!(rebuilt.jobs.is_empty());
    assert_eq!(rebuilt.skipped[0].status, OutcomeStatus::SkippedExisting);
    assert_eq!(rebuilt.skipped[0].final_path.as_ref(), Some(&first_path));

    // A stranger's small file with the same stem is still refetched.
    std::fs::remove_file(first_path.with_file_name(festival_fetch::job::FETCH_LEDGER))
        .expect("remove ledger");
    let untrusted = JobBuilder::new(&config).build(&rows);
    assert_eq!(untrusted.jobs.len(), 1);
}

#[tokio::test]
async fn test_interrupted_transfer_resumes_to_identical_file() {
    let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let split = 3_000;

    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/reel.mov"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("accept-ranges", "bytes")
                .set_body_bytes(body.clone()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reel.mov"))
        .and(header("range", format!("bytes={split}-").as_str()))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "content-range",
                    format!("bytes {split}-{}/{}", body.len() - 1, body.len()).as_str(),
                )
                .set_body_bytes(body[split..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let config = quick_config(&dir);
    let url = format!("{}/reel.mov", server.uri());
    let build = JobBuilder::new(&config).build(&[row("Reel", &[(AssetKind::Film, url.as_str())])]);
    let stem = build.jobs[0].dest_stem.clone();
    std::fs::create_dir_all(stem.parent().expect("stem parent")).expect("film folder");
    std::fs::write(partial_path_for(&stem), &body[..split]).expect("seed partial file");

    let outcomes = scheduler(&config, ScriptedExtractor::failing(0)).run(build).await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Downloaded);
    let final_path = outcomes[0].final_path.clone().expect("final path");
    assert_eq!(std::fs::read(final_path).expect("final file"), body);
    assert!(!partial_path_for(&stem).exists());
}

#[tokio::test]
async fn test_access_denied_is_attempted_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/private.mp4"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private.mp4"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = quick_config(&dir);
    config.max_retries = 5;
    let url = format!("{}/private.mp4", server.uri());
    let build =
        JobBuilder::new(&config).build(&[row("Closed", &[(AssetKind::Film, url.as_str())])]);

    let outcomes = scheduler(&config, ScriptedExtractor::failing(0)).run(build).await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(
        outcomes[0].failure.as_ref().map(|f| f.kind),
        Some(FailureKind::AccessDenied)
    );
    assert_eq!(RunSummary::from_outcomes(&outcomes).exit_outcome().code(), 1);
}

#[tokio::test]
async fn test_drive_quota_page_is_retried_and_never_stubbed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", DRIVE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><title>Google Drive - Quota exceeded</title>\
             <p>Too many users have viewed or downloaded this file recently.</p></html>",
            "text/html; charset=utf-8",
        ))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = quick_config(&dir);
    config.stub_unobtainable = true;
    config.max_retries = 2;
    let film_url = format!("https://drive.google.com/file/d/{DRIVE_ID}/view");
    let rows = vec![row("Busy Reel", &[(AssetKind::Film, film_url.as_str())])];
    let build = JobBuilder::new(&config).build(&rows);
    let stem = build.jobs[0].dest_stem.clone();

    let outcomes = scheduler_with_drive(&config, &server.uri(), ScriptedExtractor::failing(0))
        .run(build)
        .await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(outcomes[0].attempts, 3);
    assert_eq!(
        outcomes[0].failure.as_ref().map(|f| f.kind),
        Some(FailureKind::Network)
    );

    let mut stub = stem.into_os_string();
    stub.push(".stub");
    assert!(!PathBuf::from(stub).exists());
    assert_eq!(JobBuilder::new(&config).build(&rows).jobs.len(), 1);
}

#[tokio::test]
async fn test_server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/trailer.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abcdef".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trailer.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trailer.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abcdef".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let config = quick_config(&dir);
    let url = format!("{}/trailer.mp4", server.uri());
    let build =
        JobBuilder::new(&config).build(&[row("Retry", &[(AssetKind::Trailer, url.as_str())])]);

    let outcomes = scheduler(&config, ScriptedExtractor::failing(0)).run(build).await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Downloaded);
    assert_eq!(outcomes[0].attempts, 2);
}

#[tokio::test]
async fn test_streaming_links_go_through_extractor_with_retries() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = quick_config(&dir);
    let extractor = ScriptedExtractor::failing(1);
    let build = JobBuilder::new(&config)
        .build(&[row("Vimeo Cut", &[(AssetKind::Film, "https://vimeo.com/76979871")])]);

    let outcomes = scheduler(&config, extractor.clone()).run(build).await;
    assert_eq!(outcomes[0].status, OutcomeStatus::Downloaded);
    assert_eq!(outcomes[0].strategy, Strategy::StreamingExtractor);
    assert_eq!(outcomes[0].attempts, 2);
    assert_eq!(extractor.calls(), 2);
}

fn comparable(outcomes: &[JobOutcome], root: &std::path::Path) -> Vec<(usize, String, OutcomeStatus, Option<PathBuf>)> {
    outcomes
        .iter()
        .map(|o| {
            (
                o.seq,
                o.id.clone(),
                o.status,
                o.final_path
                    .as_ref()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(std::path::Path::to_path_buf),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_one_and_eight_workers_produce_identical_outcomes() {
    let server = MockServer::start().await;
    let films = ["Aurora", "Ballast", "Cinder", "Driftwood"];
    for (index, film) in films.iter().enumerate() {
        let body = vec![u8::try_from(index).expect("small index"); 512 + index * 100];
        mount_direct_file(&server, &format!("/{film}/film.mp4"), &body).await;
        mount_direct_file(&server, &format!("/{film}/trailer.mp4"), &body[..256]).await;
    }
    let urls: Vec<(String, String, String)> = films
        .iter()
        .map(|film| {
            (
                (*film).to_string(),
                format!("{}/{film}/film.mp4", server.uri()),
                format!("{}/{film}/trailer.mp4", server.uri()),
            )
        })
        .collect();
    let rows: Vec<_> = urls
        .iter()
        .map(|(film, film_url, trailer_url)| {
            row(
                film,
                &[
                    (AssetKind::Film, film_url.as_str()),
                    (AssetKind::Trailer, trailer_url.as_str()),
                ],
            )
        })
        .collect();

    let mut results = Vec::new();
    for workers in [1, 8] {
        let dir = TempDir::new().expect("failed to create temp dir");
        let mut config = quick_config(&dir);
        config.workers = workers;
        let build = JobBuilder::new(&config).build(&rows);
        let outcomes = scheduler(&config, ScriptedExtractor::failing(0)).run(build).await;
        assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Downloaded));

        let mut paths: Vec<_> = outcomes.iter().filter_map(|o| o.final_path.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), outcomes.len(), "destinations must be unique");

        results.push(comparable(&outcomes, dir.path()));
    }
    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn test_dry_run_plans_every_job_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let mut config = quick_config(&dir);
    config.dry_run = true;
    let url = format!("{}/film.mp4", server.uri());
    let build = JobBuilder::new(&config).build(&[row(
        "Planned",
        &[
            (AssetKind::Film, url.as_str()),
            (AssetKind::Trailer, "https://youtu.be/dQw4w9WgXcQ"),
        ],
    )]);

    let outcomes = scheduler(&config, ScriptedExtractor::failing(0)).run(build).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Planned));
    assert!(!dir.path().join("Planned").exists());
}
