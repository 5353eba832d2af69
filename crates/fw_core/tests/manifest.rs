use std::fs;

use fw_core::ingest::manifest::{parse_manifest, read_manifest, select_filings, ManifestSelection};
use pretty_assertions::assert_eq;

const MANIFEST: &str = "\
Ticker,Company Name,Form Type,Filed At,Filing URL
BKH,Black Hills Corp,10-K,2009-03-02T16:05:33-05:00,https://www.sec.gov/a.htm
BKH,Black Hills Corp,8-K,2009-03-05T09:00:00-05:00,https://www.sec.gov/b.htm
BKH,Black Hills Corp,10-Q,2009-05-01T10:00:00-04:00,https://www.sec.gov/c.htm
BKH,Black Hills Corp,10-Q,2009-08-01T10:00:00-04:00,https://www.sec.gov/d.htm
,Nameless,10-K,2009-01-01,https://www.sec.gov/e.htm
AAPL,Apple Inc,10-K,2009-10-27T16:00:00-04:00,https://www.sec.gov/f.htm
MSFT,Microsoft,10-Q,,https://www.sec.gov/g.htm
IBM,IBM,10-K,2009-02-24,https://www.sec.gov/h.htm
";

#[test]
fn parses_rows_and_skips_incomplete_ones() {
    let entries = parse_manifest(MANIFEST).expect("parse");
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[0].ticker, "BKH");
    assert_eq!(entries[0].form_type, "10-K");
    assert_eq!(entries[0].filing_url, "https://www.sec.gov/a.htm");
    assert_eq!(entries[0].filed_at.as_deref(), Some("2009-03-02T16:05:33-05:00"));

    let msft = entries.iter().find(|e| e.ticker == "MSFT").expect("msft");
    assert_eq!(msft.filed_at, None);
}

#[test]
fn selection_limits_forms_companies_and_filings() {
    let entries = parse_manifest(MANIFEST).expect("parse");
    let selected = select_filings(&entries, &ManifestSelection::default());

    let urls = selected.iter().map(|e| e.filing_url.as_str()).collect::<Vec<_>>();
    assert_eq!(
        urls,
        vec![
            "https://www.sec.gov/a.htm",
            "https://www.sec.gov/c.htm",
            "https://www.sec.gov/f.htm",
            "https://www.sec.gov/g.htm",
        ]
    );
}

#[test]
fn empty_form_filter_allows_everything() {
    let entries = parse_manifest(MANIFEST).expect("parse");
    let selected = select_filings(
        &entries,
        &ManifestSelection {
            form_types: vec![],
            max_companies: 1,
            max_filings_per_company: 10,
        },
    );
    assert_eq!(selected.len(), 4);
    assert!(selected.iter().all(|e| e.ticker == "BKH"));
}

#[test]
fn missing_required_columns_is_rejected() {
    let err = parse_manifest("Ticker,Form Type\nBKH,10-K\n").expect_err("should fail");
    assert_eq!(err.code, "MANIFEST_HEADERS_INVALID");
}

#[test]
fn missing_manifest_file_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = read_manifest(&dir.path().join("sec_filings.csv")).expect_err("should fail");
    assert_eq!(err.code, "MANIFEST_NOT_FOUND");
}

#[test]
fn reads_manifest_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sec_filings.csv");
    fs::write(&path, MANIFEST).expect("write");
    let entries = read_manifest(&path).expect("read");
    assert_eq!(entries.len(), 7);
}
