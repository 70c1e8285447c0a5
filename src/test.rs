#![cfg(test)]
use crate::{
    api::{ApiResponse, Article, ArticleClient, ArticleSource, FailureKind, RowOutcome, SkipReason, interpret},
    cli::Cli,
    config::{Config, USER_AGENT, error_reference_url},
    error::EnrichError,
    pipeline::{process_rows, run, run_with},
    report::{ErrorEntry, Report},
    sheet::{Columns, EnrichSheet, IdRow},
};
use anyhow::Result;
use clap::Parser;
use reqwest::{Url, blocking::Client};
use rust_core::{
    CellValue, XlsxEditor,
    fixture::{FixtureCell as C, FixtureSheet, write_workbook},
};
use std::{
    cell::RefCell,
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use tempfile::TempDir;

/* ------------------------------- helpers -------------------------------- */

fn workbook(sheets: &[FixtureSheet]) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("articles.xlsx");
    write_workbook(&path, sheets)?;
    Ok((dir, path))
}

fn ids_sheet(rows: Vec<Vec<C>>) -> FixtureSheet {
    let mut all = vec![vec![C::shared("ID"), C::shared("Name")]];
    all.extend(rows);
    FixtureSheet::new("ids", all)
}

fn config(path: &Path) -> Result<Config> {
    let mut config = Config::new(path, Url::parse("http://api.test/article")?);
    config.retry_backoff = Duration::from_millis(1);
    Ok(config)
}

fn text(editor: &XlsxEditor, coord: &str) -> Result<String> {
    Ok(editor.cell(coord)?.to_text())
}

fn updated(title: &str, body: &str) -> RowOutcome {
    RowOutcome::Updated(Article {
        title: title.into(),
        body: body.into(),
    })
}

fn response(status: u16, content_type: Option<&str>, body: &str) -> ApiResponse {
    ApiResponse {
        url: "http://api.test/article?questionId=500".into(),
        status,
        content_type: content_type.map(str::to_owned),
        body: body.as_bytes().to_vec(),
    }
}

struct Reply {
    status: u16,
    content_type: &'static str,
    body: String,
}

fn reply(status: u16, content_type: &'static str, body: &str) -> Reply {
    Reply {
        status,
        content_type,
        body: body.to_owned(),
    }
}

/// Answers one connection per reply, in order, and hands back the raw
/// request heads it saw.
fn serve(replies: Vec<Reply>) -> Result<(Url, thread::JoinHandle<Vec<String>>)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = Url::parse(&format!("http://{}/api/article", listener.local_addr()?))?;
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for r in replies {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            requests.push(read_head(&mut stream));
            let head = format!(
                "HTTP/1.1 {} Test\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                r.status,
                r.content_type,
                r.body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(r.body.as_bytes());
        }
        requests
    });
    Ok((url, handle))
}

fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn local_client(config: &Config) -> Result<ArticleClient> {
    Ok(ArticleClient::with_builder(config, Client::builder().no_proxy())?)
}

/* ------------------------------ workbook -------------------------------- */

#[test]
fn open_reports_each_fatal_case() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let missing = dir.path().join("missing.xlsx");
    assert!(matches!(
        EnrichSheet::open(&missing, "ids"),
        Err(EnrichError::FileNotFound(p)) if p == missing
    ));

    let not_zip = dir.path().join("notes.xlsx");
    std::fs::write(&not_zip, "just text")?;
    assert!(matches!(
        EnrichSheet::open(&not_zip, "ids"),
        Err(EnrichError::InvalidFormat { .. })
    ));

    let (_d, path) = workbook(&[ids_sheet(vec![])])?;
    assert!(matches!(
        EnrichSheet::open(&path, "IDS"),
        Err(EnrichError::MissingSheet(s)) if s == "IDS"
    ));

    let (_d, path) = workbook(&[FixtureSheet::new("ids", vec![vec![C::shared("Id"), C::shared("Name")]])])?;
    assert!(matches!(
        EnrichSheet::open(&path, "ids"),
        Err(EnrichError::MissingIdColumn(s)) if s == "ids"
    ));
    Ok(())
}

#[test]
fn output_columns_are_added_once_and_bold() -> Result<()> {
    let (_dir, path) = workbook(&[ids_sheet(vec![vec![C::Number(500.0), C::shared("a")]])])?;

    let mut sheet = EnrichSheet::open(&path, "ids")?;
    assert_eq!(
        sheet.columns(),
        Columns {
            id: 1,
            title: 3,
            body: 4,
            error: 5
        }
    );
    assert!(sheet.is_dirty());
    sheet.save()?;

    let editor = XlsxEditor::open(&path, "ids")?;
    let header: Vec<String> = ["A1", "B1", "C1", "D1", "E1"]
        .iter()
        .map(|c| text(&editor, c))
        .collect::<Result<_>>()?;
    assert_eq!(header, ["ID", "Name", "Title", "Body", "Error"]);
    for c in ["A1", "B1", "C1", "D1", "E1"] {
        assert!(editor.is_bold(c)?, "{c} should be bold");
    }
    assert!(!editor.is_bold("A2")?);

    let again = EnrichSheet::open(&path, "ids")?;
    assert_eq!(again.columns(), sheet.columns());
    assert!(!again.is_dirty());
    assert_eq!(again.editor().max_column()?, 5);
    Ok(())
}

#[test]
fn missing_columns_go_after_the_widest_row() -> Result<()> {
    let (_dir, path) = workbook(&[FixtureSheet::new(
        "ids",
        vec![
            vec![C::shared("Title"), C::shared("ID")],
            vec![C::Blank, C::Number(500.0), C::Blank, C::Blank, C::shared("note")],
        ],
    )])?;
    let sheet = EnrichSheet::open(&path, "ids")?;
    assert_eq!(
        sheet.columns(),
        Columns {
            id: 2,
            title: 1,
            body: 6,
            error: 7
        }
    );
    assert_eq!(text(sheet.editor(), "E2")?, "note");
    Ok(())
}

#[test]
fn collect_ids_keeps_valid_integers_in_row_order() -> Result<()> {
    let (_dir, path) = workbook(&[ids_sheet(vec![
        vec![C::Number(500.0)],
        vec![C::shared(" 700 ")],
        vec![C::Number(99.0)],
        vec![C::Number(100_001.0)],
        vec![C::shared("abc")],
        vec![C::inline("100")],
        vec![C::Number(100_000.0)],
        vec![C::Number(250.9)],
        vec![C::Blank, C::shared("no id")],
        vec![C::Number(-5.0)],
        vec![],
        vec![C::shared("12.5")],
    ])])?;
    let sheet = EnrichSheet::open(&path, "ids")?;
    let ids: Vec<(i64, u32)> = sheet
        .collect_ids()?
        .into_iter()
        .map(|r| (r.id, r.row))
        .collect();
    assert_eq!(ids, vec![(500, 2), (700, 3), (100, 7), (100_000, 8), (250, 9)]);
    Ok(())
}

/* ------------------------------ pipeline -------------------------------- */

fn fake_source(id: i64) -> RowOutcome {
    match id {
        500 | 700 => updated(&format!("T{id}"), &format!("B{id}")),
        600 => RowOutcome::Failed {
            kind: FailureKind::Status(500),
            request_url: format!("http://api.test/article?questionId={id}"),
        },
        _ => RowOutcome::Skipped(SkipReason::NonJson {
            content_type: "text/html".into(),
        }),
    }
}

#[test]
fn batch_writes_each_outcome_into_its_row() -> Result<()> {
    let (dir, path) = workbook(&[ids_sheet(vec![
        vec![C::Number(500.0), C::shared("a")],
        vec![C::Number(99.0), C::shared("b")],
        vec![C::Number(600.0), C::shared("c")],
        vec![C::Number(700.0), C::shared("d")],
        vec![C::Number(800.0), C::shared("e")],
    ])])?;
    let mut config = config(&path)?;
    config.report_path = Some(dir.path().join("failed.json"));

    let mut sheet = EnrichSheet::open(&path, "ids")?;
    let rows = sheet.collect_ids()?;
    assert_eq!(rows.len(), 4);
    let report = run_with(&mut sheet, &fake_source, &rows, &config)?;

    assert_eq!(report.updated, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        report.errors,
        vec![ErrorEntry {
            id: 600,
            row: 4,
            url: "http://api.test/article?questionId=600".into(),
            reason: "HTTP status 500".into(),
        }]
    );

    let editor = XlsxEditor::open(&path, "ids")?;
    assert_eq!(text(&editor, "C2")?, "T500");
    assert_eq!(text(&editor, "D2")?, "B500");
    assert_eq!(editor.cell("E2")?, CellValue::Empty);

    // out of range: never fetched, never touched
    assert_eq!(text(&editor, "B3")?, "b");
    for c in ["C3", "D3", "E3"] {
        assert_eq!(editor.cell(c)?, CellValue::Empty);
    }

    assert_eq!(text(&editor, "E4")?, "http://api.test/article?id=600");
    assert_eq!(editor.cell("C4")?, CellValue::Empty);
    assert_eq!(text(&editor, "C5")?, "T700");

    // non-JSON: skipped without a trace
    for c in ["C6", "D6", "E6"] {
        assert_eq!(editor.cell(c)?, CellValue::Empty);
    }

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.path().join("failed.json"))?)?;
    assert_eq!(json[0]["id"], 600);
    assert_eq!(json[0]["row"], 4);
    assert_eq!(json[0]["url"], "http://api.test/article?questionId=600");
    Ok(())
}

#[test]
fn outcomes_replace_stale_cells_from_an_earlier_run() -> Result<()> {
    let (_dir, path) = workbook(&[FixtureSheet::new(
        "ids",
        vec![
            vec![C::shared("ID"), C::shared("Title"), C::shared("Body"), C::shared("Error")],
            vec![C::Number(500.0), C::shared("old"), C::shared("old"), C::shared("old error")],
            vec![C::Number(600.0), C::shared("old"), C::shared("old")],
        ],
    )])?;
    let config = config(&path)?;

    let mut sheet = EnrichSheet::open(&path, "ids")?;
    assert!(!sheet.is_dirty());
    let rows = sheet.collect_ids()?;
    process_rows(&mut sheet, &fake_source, &rows, &config)?;

    let editor = XlsxEditor::open(&path, "ids")?;
    assert_eq!(text(&editor, "B2")?, "T500");
    assert_eq!(text(&editor, "C2")?, "B500");
    assert_eq!(editor.cell("D2")?, CellValue::Empty);
    assert_eq!(editor.cell("B3")?, CellValue::Empty);
    assert_eq!(editor.cell("C3")?, CellValue::Empty);
    assert_eq!(text(&editor, "D3")?, "http://api.test/article?id=600");
    // headers already there: left as they were
    assert!(!editor.is_bold("A1")?);
    Ok(())
}

#[test]
fn each_row_is_on_disk_before_the_next_fetch() -> Result<()> {
    let (_dir, path) = workbook(&[ids_sheet(vec![
        vec![C::Number(500.0)],
        vec![C::Number(600.0)],
        vec![C::Number(700.0)],
    ])])?;
    let config = config(&path)?;

    let seen = RefCell::new(Vec::new());
    let source = |id: i64| {
        let on_disk = XlsxEditor::open(&path, "ids")
            .and_then(|e| Ok((e.cell("C2")?.to_text(), e.cell("E3")?.to_text())))
            .unwrap_or_default();
        seen.borrow_mut().push(on_disk);
        if id == 600 {
            RowOutcome::Failed {
                kind: FailureKind::Transport("connection reset".into()),
                request_url: "http://api.test/article".into(),
            }
        } else {
            updated(&format!("T{id}"), "")
        }
    };

    let mut sheet = EnrichSheet::open(&path, "ids")?;
    let rows = sheet.collect_ids()?;
    let results = process_rows(&mut sheet, &source, &rows, &config)?;
    assert_eq!(results.len(), 3);
    assert_eq!(
        results[1].outcome,
        RowOutcome::Failed {
            kind: FailureKind::Transport("connection reset".into()),
            request_url: "http://api.test/article".into(),
        }
    );

    let error_url = "http://api.test/article?id=600".to_owned();
    assert_eq!(
        seen.into_inner(),
        vec![
            (String::new(), String::new()),
            ("T500".to_owned(), String::new()),
            ("T500".to_owned(), error_url),
        ]
    );
    assert!(!sheet.is_dirty());
    Ok(())
}

#[test]
fn run_without_valid_ids_leaves_the_file_alone() -> Result<()> {
    let (_dir, path) = workbook(&[ids_sheet(vec![vec![C::shared("abc")], vec![C::Number(42.0)]])])?;
    let before = std::fs::read(&path)?;
    assert_eq!(run(&config(&path)?)?, None);
    assert_eq!(std::fs::read(&path)?, before);

    let mut missing = config(&path)?;
    missing.excel_path = path.with_file_name("gone.xlsx");
    assert!(matches!(run(&missing), Err(EnrichError::FileNotFound(_))));
    Ok(())
}

/* ----------------------------- responses -------------------------------- */

#[test]
fn interpret_maps_responses_to_outcomes() {
    let json = Some("Application/JSON; charset=utf-8");

    assert_eq!(
        interpret(&response(200, json, r#"[{"title":"T","body":"B"}]"#), "title", "body"),
        updated("T", "B")
    );
    assert_eq!(
        interpret(
            &response(200, json, "\u{feff}[{\"title\":\"T\",\"body\":\"B\"}]"),
            "title",
            "body"
        ),
        updated("T", "B")
    );
    assert_eq!(
        interpret(
            &response(200, json, r#"[{"title":"first","body":"1"},{"title":"second","body":"2"}]"#),
            "title",
            "body"
        ),
        updated("first", "1")
    );
    assert_eq!(
        interpret(
            &response(200, json, r#"[{"name":"T","text":{"p":1},"body":null}]"#),
            "name",
            "text"
        ),
        updated("T", r#"{"p":1}"#)
    );
    assert_eq!(
        interpret(&response(200, json, r#"[{"title":42}]"#), "title", "body"),
        updated("42", "")
    );

    assert_eq!(
        interpret(&response(200, Some("text/html"), "<html/>"), "title", "body"),
        RowOutcome::Skipped(SkipReason::NonJson {
            content_type: "text/html".into()
        })
    );
    assert_eq!(
        interpret(&response(200, None, "[]"), "title", "body"),
        RowOutcome::Skipped(SkipReason::NonJson {
            content_type: String::new()
        })
    );

    let kind = |r: RowOutcome| match r {
        RowOutcome::Failed { kind, request_url } => {
            assert_eq!(request_url, "http://api.test/article?questionId=500");
            Some(kind)
        }
        _ => None,
    };
    assert_eq!(
        kind(interpret(&response(404, json, "[]"), "title", "body")),
        Some(FailureKind::Status(404))
    );
    assert_eq!(
        kind(interpret(&response(204, json, ""), "title", "body")),
        Some(FailureKind::Status(204))
    );
    assert!(matches!(
        kind(interpret(&response(200, json, "[{"), "title", "body")),
        Some(FailureKind::InvalidJson(_))
    ));
    for payload in ["{}", "[]", "[1]", "\"x\""] {
        assert!(
            matches!(
                kind(interpret(&response(200, json, payload), "title", "body")),
                Some(FailureKind::UnexpectedPayload(_))
            ),
            "{payload}"
        );
    }
}

#[test]
fn retryable_failures() {
    assert!(FailureKind::Transport("timed out".into()).is_retryable());
    assert!(FailureKind::Status(503).is_retryable());
    assert!(FailureKind::Status(429).is_retryable());
    assert!(!FailureKind::Status(404).is_retryable());
    assert!(!FailureKind::InvalidJson("eof".into()).is_retryable());
}

/* ------------------------------- client --------------------------------- */

#[test]
fn client_sends_parameters_in_order_with_browser_agent() -> Result<()> {
    let (endpoint, server) = serve(vec![reply(
        200,
        "application/json",
        r#"[{"title":"Hello","body":"World"}]"#,
    )])?;
    let mut config = config(Path::new("unused.xlsx"))?;
    config.endpoint = endpoint;
    config.type_id = 7;
    config.retries = 0;

    let outcome = local_client(&config)?.fetch(500);
    let requests = server.join().expect("server thread");

    assert_eq!(outcome, updated("Hello", "World"));
    assert_eq!(requests.len(), 1);
    let line = requests[0].lines().next().unwrap_or_default();
    let prefix = "GET /api/article?questionId=500&typeId=7&id=500&interfaceId=3&_=";
    assert!(line.starts_with(prefix), "{line}");
    let buster = line[prefix.len()..].split(' ').next().unwrap_or_default();
    assert!(buster.parse::<i64>()? > 0);
    assert!(
        requests[0]
            .to_ascii_lowercase()
            .contains(&format!("user-agent: {}", USER_AGENT.to_ascii_lowercase()))
    );
    Ok(())
}

#[test]
fn request_url_keeps_existing_query() -> Result<()> {
    let mut config = config(Path::new("unused.xlsx"))?;
    config.endpoint = Url::parse("https://api.test/v1/article?lang=en")?;
    let client = local_client(&config)?;
    assert_eq!(
        client.request_url(150, 1_700_000_000_000).as_str(),
        "https://api.test/v1/article?lang=en&questionId=150&typeId=0&id=150&interfaceId=3&_=1700000000000"
    );
    Ok(())
}

#[test]
fn client_retries_server_errors_then_succeeds() -> Result<()> {
    let (endpoint, server) = serve(vec![
        reply(503, "text/plain", "busy"),
        reply(200, "application/json", r#"[{"title":"T","body":"B"}]"#),
    ])?;
    let mut config = config(Path::new("unused.xlsx"))?;
    config.endpoint = endpoint;
    config.retries = 2;

    assert_eq!(local_client(&config)?.fetch(500), updated("T", "B"));
    assert_eq!(server.join().expect("server thread").len(), 2);
    Ok(())
}

#[test]
fn client_gives_up_after_the_last_retry() -> Result<()> {
    let (endpoint, server) = serve(vec![
        reply(500, "text/plain", "down"),
        reply(500, "text/plain", "down"),
        reply(500, "text/plain", "down"),
    ])?;
    let mut config = config(Path::new("unused.xlsx"))?;
    config.endpoint = endpoint.clone();
    config.retries = 2;

    match local_client(&config)?.fetch(600) {
        RowOutcome::Failed { kind, request_url } => {
            assert_eq!(kind, FailureKind::Status(500));
            assert!(request_url.starts_with(&format!("{endpoint}?questionId=600&")));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(server.join().expect("server thread").len(), 3);
    Ok(())
}

#[test]
fn client_does_not_retry_client_errors() -> Result<()> {
    let (endpoint, server) = serve(vec![reply(404, "text/plain", "nope")])?;
    let mut config = config(Path::new("unused.xlsx"))?;
    config.endpoint = endpoint;
    config.retries = 3;

    assert!(matches!(
        local_client(&config)?.fetch(600),
        RowOutcome::Failed {
            kind: FailureKind::Status(404),
            ..
        }
    ));
    assert_eq!(server.join().expect("server thread").len(), 1);
    Ok(())
}

#[test]
fn unreachable_endpoint_is_a_transport_failure() -> Result<()> {
    let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let mut config = config(Path::new("unused.xlsx"))?;
    config.endpoint = Url::parse(&format!("http://127.0.0.1:{port}/api"))?;
    config.retries = 1;
    config.timeout = Some(Duration::from_secs(5));

    match local_client(&config)?.fetch(500) {
        RowOutcome::Failed {
            kind: FailureKind::Transport(msg),
            request_url,
        } => {
            assert!(!msg.is_empty());
            assert!(request_url.starts_with(&format!("http://127.0.0.1:{port}/api?questionId=500&")));
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn batch_against_a_live_server() -> Result<()> {
    let (endpoint, server) = serve(vec![
        reply(200, "application/json", r#"[{"title":"A","body":"a"},{"title":"Z","body":"z"}]"#),
        reply(500, "application/json", "[]"),
        reply(200, "text/html; charset=utf-8", "<p>maintenance</p>"),
    ])?;
    let (_dir, path) = workbook(&[ids_sheet(vec![
        vec![C::Number(500.0)],
        vec![C::Number(600.0)],
        vec![C::Number(700.0)],
    ])])?;
    let mut config = config(&path)?;
    config.endpoint = endpoint;
    config.error_page = Url::parse("https://help.test/missing")?;
    config.retries = 0;

    let mut sheet = EnrichSheet::open(&path, "ids")?;
    let rows = sheet.collect_ids()?;
    assert_eq!(rows[1], IdRow { id: 600, row: 3 });
    let report = run_with(&mut sheet, &local_client(&config)?, &rows, &config)?;
    server.join().expect("server thread");

    assert_eq!((report.updated, report.skipped, report.errors.len()), (1, 1, 1));
    let editor = XlsxEditor::open(&path, "ids")?;
    assert_eq!(text(&editor, "C2")?, "A");
    assert_eq!(text(&editor, "D2")?, "a");
    assert_eq!(text(&editor, "E3")?, "https://help.test/missing?id=600");
    assert_eq!(editor.cell("C4")?, CellValue::Empty);
    Ok(())
}

/* ------------------------------- report --------------------------------- */

#[test]
fn report_lines_name_reference_row_endpoint_and_reason() -> Result<()> {
    let report = Report {
        updated: 3,
        skipped: 0,
        errors: vec![ErrorEntry {
            id: 600,
            row: 4,
            url: "http://api.test/article?questionId=600".into(),
            reason: "HTTP status 500".into(),
        }],
    };
    let page = Url::parse("https://help.test/err")?;
    assert_eq!(
        report.lines(&page),
        vec![
            "Invalid URL https://help.test/err?id=600 \n\tExcel row: 4 \n\tEndpoint: http://api.test/article?questionId=600 \n\tReason: HTTP status 500"
        ]
    );
    Ok(())
}

#[test]
fn error_reference_url_appends_id() -> Result<()> {
    assert_eq!(
        error_reference_url(&Url::parse("https://help.test/err?lang=en")?, 7),
        "https://help.test/err?lang=en&id=7"
    );
    Ok(())
}

/* --------------------------------- cli ---------------------------------- */

#[test]
fn cli_defaults_and_overrides() -> Result<()> {
    let config = Cli::try_parse_from(["xlsx-enrich", "book.xlsx", "--endpoint", "http://api.test/article"])?
        .into_config()?;
    assert_eq!(config.excel_path, PathBuf::from("book.xlsx"));
    assert_eq!(config.sheet_name, "ids");
    assert_eq!((config.type_id, config.interface_id), (0, 3));
    assert_eq!((config.title_key.as_str(), config.body_key.as_str()), ("title", "body"));
    assert_eq!(config.error_page, config.endpoint);
    assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.retries, 2);
    assert_eq!(config.retry_backoff, Duration::from_millis(500));
    assert_eq!(config.report_path, None);

    let config = Cli::try_parse_from([
        "xlsx-enrich",
        "book.xlsx",
        "--endpoint",
        "http://api.test/article",
        "--error-page",
        "https://help.test/err",
        "--type-id",
        "-1",
        "--sheet-name",
        "Sheet 2",
        "--timeout-secs",
        "0",
    ])?
    .into_config()?;
    assert_eq!(config.type_id, -1);
    assert_eq!(config.sheet_name, "Sheet 2");
    assert_eq!(config.error_page.as_str(), "https://help.test/err");
    assert_eq!(config.timeout, None);

    let bad = Cli::try_parse_from(["xlsx-enrich", "book.xlsx", "--endpoint", "ftp://api.test"])?.into_config();
    assert!(matches!(bad, Err(EnrichError::InvalidEndpoint { what: "endpoint", .. })));
    let bad = Cli::try_parse_from(["xlsx-enrich", "book.xlsx", "--endpoint", "not a url"])?.into_config();
    assert!(matches!(bad, Err(EnrichError::InvalidEndpoint { .. })));
    Ok(())
}
