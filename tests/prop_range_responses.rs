// Property tests for range responses over in-memory resources.

use std::io::Cursor;

use axum::http::{HeaderValue, StatusCode};
use proptest::prelude::*;
use range_response::{mime, parse_range_header, KnownSize, RangeError, Ranged, RangedResponse};

type Body = KnownSize<Cursor<Vec<u8>>>;

fn resource(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn respond(header: Option<String>, content: &[u8]) -> Result<RangedResponse<Body>, RangeError> {
    let body = KnownSize::sized(Cursor::new(content.to_vec()), content.len() as u64);
    let header = header.map(|h| HeaderValue::from_str(&h).unwrap());
    Ranged::new(header, body, mime::APPLICATION_OCTET_STREAM)
        .boundary_generator(|| "prop-boundary".to_string())
        .try_respond()
}

fn read_all(response: RangedResponse<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let (status, headers, body) = response.into_parts();
    let bytes = runtime.block_on(axum::body::to_bytes(body, usize::MAX)).unwrap();
    (status, headers, bytes.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_full_body(len in 0usize..4096) {
        let content = resource(len);
        let (status, headers, body) = read_all(respond(None, &content).unwrap());
        prop_assert_eq!(StatusCode::OK, status);
        prop_assert_eq!(len.to_string(), headers["content-length"].to_str().unwrap());
        prop_assert_eq!("bytes", headers["accept-ranges"].to_str().unwrap());
        prop_assert_eq!(content, body);
    }

    #[test]
    fn prop_single_closed_range(len in 1usize..4096, a in any::<prop::sample::Index>(), b in any::<prop::sample::Index>()) {
        let content = resource(len);
        let (a, b) = (a.index(len), b.index(len));
        let (a, b) = (a.min(b), a.max(b));

        let (status, headers, body) = read_all(respond(Some(format!("bytes={a}-{b}")), &content).unwrap());
        prop_assert_eq!(StatusCode::PARTIAL_CONTENT, status);
        prop_assert_eq!((b - a + 1).to_string(), headers["content-length"].to_str().unwrap());
        prop_assert_eq!(format!("bytes {a}-{b}/{len}"), headers["content-range"].to_str().unwrap());
        prop_assert_eq!(&content[a..=b], &body[..]);
    }

    #[test]
    fn prop_open_ended_range(len in 1usize..4096, a in any::<prop::sample::Index>()) {
        let content = resource(len);
        let a = a.index(len);

        let (status, headers, body) = read_all(respond(Some(format!("bytes={a}-")), &content).unwrap());
        prop_assert_eq!(StatusCode::PARTIAL_CONTENT, status);
        prop_assert_eq!(format!("bytes {a}-{}/{len}", len - 1), headers["content-range"].to_str().unwrap());
        prop_assert_eq!(&content[a..], &body[..]);
    }

    #[test]
    fn prop_range_beyond_resource(len in 0usize..4096, past in 0u64..1_000_000, extra in 0u64..1000) {
        let start = len as u64 + past;
        let content = resource(len);
        let err = respond(Some(format!("bytes={start}-{}", start + extra)), &content).unwrap_err();
        prop_assert!(matches!(err, RangeError::Unsatisfiable { .. }), "expected 416, got {:?}", err);
        prop_assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, err.status());
        let headers = err.headers();
        prop_assert_eq!(format!("bytes */{len}"), headers["content-range"].to_str().unwrap());
        prop_assert_eq!("bytes", headers["accept-ranges"].to_str().unwrap());
    }

    #[test]
    fn prop_multipart_parts_and_length(
        len in 1usize..2048,
        picks in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 2..6),
    ) {
        let content = resource(len);
        let ranges: Vec<(usize, usize)> = picks
            .iter()
            .map(|(a, b)| {
                let (a, b) = (a.index(len), b.index(len));
                (a.min(b), a.max(b))
            })
            .collect();
        let header = ranges.iter().map(|(a, b)| format!("{a}-{b}")).collect::<Vec<_>>().join(",");

        let (status, headers, body) = read_all(respond(Some(format!("bytes={header}")), &content).unwrap());
        prop_assert_eq!(StatusCode::PARTIAL_CONTENT, status);
        prop_assert_eq!(
            "multipart/byteranges; boundary=prop-boundary",
            headers["content-type"].to_str().unwrap()
        );
        prop_assert_eq!(body.len().to_string(), headers["content-length"].to_str().unwrap());

        // walk the parts in order
        let mut rest = &body[..];
        for (a, b) in &ranges {
            let head = format!(
                "--prop-boundary\r\nContent-Type: application/octet-stream\r\nContent-Range: bytes {a}-{b}/{len}\r\n\r\n"
            );
            prop_assert!(rest.starts_with(head.as_bytes()));
            rest = &rest[head.len()..];
            prop_assert_eq!(&content[*a..=*b], &rest[..=b - a]);
            rest = &rest[b - a + 1..];
            prop_assert!(rest.starts_with(b"\r\n"));
            rest = &rest[2..];
        }
        prop_assert_eq!(&b"--prop-boundary--\r\n"[..], rest);
    }

    #[test]
    fn prop_parser_never_panics(header in "\\PC{0,40}") {
        match parse_range_header(&header) {
            Ok(spec) => prop_assert!(!spec.is_empty()),
            Err(err) => prop_assert!(matches!(err, RangeError::MalformedRange(_)), "unexpected error {:?}", err),
        }
    }

    #[test]
    fn prop_same_request_same_response(len in 1usize..1024, a in any::<prop::sample::Index>()) {
        let content = resource(len);
        let header = format!("bytes={}-", a.index(len));
        let first = read_all(respond(Some(header.clone()), &content).unwrap());
        let second = read_all(respond(Some(header), &content).unwrap());
        prop_assert_eq!(first, second);
    }
}
