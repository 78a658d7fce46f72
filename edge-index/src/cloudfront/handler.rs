use crate::error::HandlerError;
use crate::rewrite::normalizer::IndexNormalizer;
use crate::rewrite::outcome::RewriteOutcome;
use crate::rewrite::sink::DiagnosticSink;

use super::event::{CloudFrontEvent, CloudFrontRequest};

/// Rewrites the request of the first record and hands it back.
///
/// A bad `uri` does not produce an error. The request comes back unchanged and the outcome
/// is `PassThrough`.
pub fn handle_event(
    event: CloudFrontEvent,
    normalizer: &IndexNormalizer,
    sink: &dyn DiagnosticSink,
) -> Result<(CloudFrontRequest, RewriteOutcome), HandlerError> {
    let record = event
        .records
        .into_iter()
        .next()
        .ok_or(HandlerError::NoRecords)?;

    let mut request = record.cf.request;
    let outcome = normalizer.rewrite_request(&mut request, sink);
    if let Some(error) = outcome.error() {
        tracing::warn!(reason = error.kind_str(), "cloudfront request passed through: {}", error);
    }
    Ok((request, outcome))
}

/// JSON in, JSON out.
pub fn handle_json(
    input: &str,
    normalizer: &IndexNormalizer,
    sink: &dyn DiagnosticSink,
) -> Result<String, HandlerError> {
    let event: CloudFrontEvent = serde_json::from_str(input)?;
    let (request, _) = handle_event(event, normalizer, sink)?;
    Ok(serde_json::to_string(&request)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RewriteError;
    use crate::rewrite::sink::MemorySink;
    use rstest::rstest;
    use serde_json::{json, Value};

    fn event_with_uri(uri: Value) -> String {
        json!({
            "Records": [{
                "cf": {
                    "config": { "eventType": "origin-request" },
                    "request": {
                        "method": "GET",
                        "querystring": "lang=en",
                        "uri": uri,
                        "origin": { "s3": { "domainName": "bucket.s3.amazonaws.com" } }
                    }
                }
            }]
        })
        .to_string()
    }

    fn run(input: &str) -> (Value, Vec<String>) {
        let sink = MemorySink::default();
        let out = handle_json(input, &IndexNormalizer::default(), &sink).unwrap();
        (serde_json::from_str(&out).unwrap(), sink.lines())
    }

    #[rstest]
    #[case::root("/", "/index.html")]
    #[case::subdirectory("/about/", "/about/index.html")]
    #[case::file("/about/team.html", "/about/team.html")]
    #[case::no_trailing_separator("/a/b", "/a/b")]
    fn rewrites_the_first_record(#[case] uri: &str, #[case] expected: &str) {
        let (req, lines) = run(&event_with_uri(json!(uri)));

        assert_eq!(req["uri"], expected);
        assert_eq!(req["querystring"], "lang=en");
        assert_eq!(req["origin"]["s3"]["domainName"], "bucket.s3.amazonaws.com");
        assert_eq!(lines, vec![format!("Old URI: {uri}"), format!("New URI: {expected}")]);
    }

    #[rstest]
    #[case::empty(json!(""))]
    #[case::number(json!(7))]
    #[case::object(json!({ "path": "/" }))]
    fn malformed_uri_fails_open(#[case] uri: Value) {
        let (req, lines) = run(&event_with_uri(uri.clone()));

        assert_eq!(req["uri"], uri);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn missing_uri_fails_open() {
        let input = json!({ "Records": [{ "cf": { "request": { "method": "GET" } } }] }).to_string();
        let event: CloudFrontEvent = serde_json::from_str(&input).unwrap();

        let (req, outcome) = handle_event(event, &IndexNormalizer::default(), &MemorySink::default()).unwrap();
        assert!(req.uri().is_none());
        assert_eq!(outcome.error(), Some(&RewriteError::MissingPath));
    }

    #[test]
    fn malformed_unrelated_fields_do_not_fail_the_event() {
        let input = json!({
            "Records": [{
                "cf": {
                    "config": 12,
                    "request": {
                        "uri": "/about/",
                        "method": 7,
                        "querystring": null,
                        "headers": {
                            "host": [{ "key": "Host" }],
                            "x-custom": [{ "value": "v", "extra": 1 }]
                        }
                    }
                }
            }]
        })
        .to_string();

        let (req, _) = run(&input);
        assert_eq!(req["uri"], "/about/index.html");
        assert_eq!(req["method"], 7);
        assert!(req.as_object().unwrap().contains_key("querystring"));
        assert!(req["querystring"].is_null());
        assert_eq!(req["headers"]["host"], json!([{ "key": "Host" }]));
        assert_eq!(req["headers"]["x-custom"], json!([{ "value": "v", "extra": 1 }]));
    }

    #[test]
    fn only_the_first_record_is_used() {
        let input = json!({
            "Records": [
                { "cf": { "request": { "uri": "/first/" } } },
                { "cf": { "request": { "uri": "/second/" } } }
            ]
        })
        .to_string();

        let (req, _) = run(&input);
        assert_eq!(req["uri"], "/first/index.html");
    }

    #[test]
    fn custom_default_document_is_used() {
        let sink = MemorySink::default();
        let n = IndexNormalizer::new("default.htm").unwrap();
        let out = handle_json(&event_with_uri(json!("/docs/")), &n, &sink).unwrap();
        let req: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(req["uri"], "/docs/default.htm");
    }

    #[test]
    fn event_without_records_is_an_error() {
        let err = handle_json(r#"{"Records":[]}"#, &IndexNormalizer::default(), &MemorySink::default()).unwrap_err();
        assert!(matches!(err, HandlerError::NoRecords));
    }

    #[test]
    fn undecodable_event_is_an_error() {
        let err = handle_json("not json", &IndexNormalizer::default(), &MemorySink::default()).unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }
}
