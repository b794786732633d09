//!
//! src/builder.rs
//!
//! Turns one resolved release into the payload the media catalog expects.
//! Pure, no I/O: same release + image path + author always gives the same
//! request.
//!

use crate::extract;
use crate::types::{ReleaseDetail, Request};

pub const PLACEHOLDER_DATE: &str = "1900-01-01";
pub const PLACEHOLDER_DESCRIPTION: &str = "No description available.";
pub const PLACEHOLDER_IMAGE_URL: &str = "placeHolder";

/// Release year as `YYYY-01-01`. Upstream reports unknown years as 0, so
/// only 1..=9999 counts as a year
pub fn release_date(release: &ReleaseDetail) -> String {
    match extract::opt_number(release.doc(), &["year"]) {
        Some(year) if year >= 1.0 && year < 10_000.0 => {
            format!("{}-01-01", year.trunc() as i64)
        }
        _ => PLACEHOLDER_DATE.to_string(),
    }
}

pub fn genre(release: &ReleaseDetail) -> String {
    extract::first_str(release.doc(), &["genres"])
        .unwrap_or("")
        .to_string()
}

/// Track titles in upstream order, one per line
pub fn additional(release: &ReleaseDetail) -> String {
    extract::strings_of(release.doc(), &["tracklist"], "title").join("\n")
}

pub fn description(release: &ReleaseDetail) -> String {
    extract::str_or(release.doc(), &["notes"], PLACEHOLDER_DESCRIPTION)
}

pub fn build_request(release: &ReleaseDetail, image: &str, author_id: u64) -> Request {
    Request {
        title: extract::str_or_empty(release.doc(), &["title"]),
        genre: genre(release),
        additional: additional(release),
        description: description(release),
        release_date: release_date(release),
        image_url: PLACEHOLDER_IMAGE_URL.to_string(),
        author_id,
        image: image.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn release(v: Value) -> ReleaseDetail {
        ReleaseDetail(v)
    }

    #[test]
    fn daydream_nation_builds_the_expected_request() {
        let detail = release(json!({
            "title": "Daydream Nation",
            "year": 1988,
            "genres": ["Alternative Rock"],
            "tracklist": [{ "title": "Teen Age Riot" }, { "title": "Silver Rocket" }],
            "notes": "Classic."
        }));

        let request = build_request(&detail, "images/Sonic Youth - Daydream Nation.jpeg", 12);

        assert_eq!(request, Request {
            title: "Daydream Nation".to_string(),
            genre: "Alternative Rock".to_string(),
            additional: "Teen Age Riot\nSilver Rocket".to_string(),
            description: "Classic.".to_string(),
            release_date: "1988-01-01".to_string(),
            image_url: "placeHolder".to_string(),
            author_id: 12,
            image: "images/Sonic Youth - Daydream Nation.jpeg".to_string(),
        });
    }

    #[test]
    fn missing_year_uses_placeholder_date() {
        assert_eq!(release_date(&release(json!({ "title": "x" }))), "1900-01-01");
        assert_eq!(release_date(&release(json!({ "year": null }))), "1900-01-01");
        assert_eq!(release_date(&release(json!({ "year": "1988" }))), "1900-01-01");
        assert_eq!(release_date(&release(json!({ "year": 0 }))), "1900-01-01");
        assert_eq!(release_date(&release(json!([1988]))), "1900-01-01");
    }

    #[test]
    fn numeric_year_formats_as_first_of_january() {
        assert_eq!(release_date(&release(json!({ "year": 1988.0 }))), "1988-01-01");
        assert_eq!(release_date(&release(json!({ "year": 1988 }))), "1988-01-01");
        assert_eq!(release_date(&release(json!({ "year": 2003.7 }))), "2003-01-01");
    }

    #[test]
    fn tracklist_length_controls_separators() {
        assert_eq!(additional(&release(json!({ "tracklist": [] }))), "");
        assert_eq!(additional(&release(json!({}))), "");

        for n in 1..6 {
            let tracks: Vec<Value> = (0..n)
                .map(|i| json!({ "title": format!("Track {i}") }))
                .collect();
            let out = additional(&release(json!({ "tracklist": tracks })));
            assert_eq!(out.matches('\n').count(), n - 1);
        }
    }

    #[test]
    fn genre_takes_only_the_first_entry() {
        let detail = release(json!({ "genres": ["Rock", "Electronic"] }));
        assert_eq!(genre(&detail), "Rock");
        assert_eq!(genre(&release(json!({ "genres": [] }))), "");
        assert_eq!(genre(&release(json!({}))), "");
    }

    #[test]
    fn notes_fall_back_to_placeholder_sentence() {
        assert_eq!(description(&release(json!({}))), "No description available.");
        assert_eq!(description(&release(json!({ "notes": 5 }))), "No description available.");
        assert_eq!(description(&release(json!({ "notes": "" }))), "");
    }

    #[test]
    fn empty_document_still_yields_a_complete_request() {
        let request = build_request(&release(json!(null)), "", 0);
        assert_eq!(request.title, "");
        assert_eq!(request.genre, "");
        assert_eq!(request.additional, "");
        assert_eq!(request.description, PLACEHOLDER_DESCRIPTION);
        assert_eq!(request.release_date, PLACEHOLDER_DATE);
        assert_eq!(request.image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(request.image, "");
    }

    #[test]
    fn building_twice_is_identical() {
        let detail = release(json!({
            "title": "Goo",
            "year": 1990,
            "genres": ["Rock"],
            "tracklist": [{ "title": "Dirty Boots" }]
        }));
        assert_eq!(
            build_request(&detail, "images/Goo.jpeg", 3),
            build_request(&detail, "images/Goo.jpeg", 3)
        );
    }
}
