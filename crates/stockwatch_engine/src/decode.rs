use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding_label: String,
    /// Some byte sequences were invalid and replaced with U+FFFD.
    pub had_errors: bool,
}

/// Decode a fetched page into UTF-8 using: BOM -> Content-Type charset ->
/// chardetng detection (hinted by the host's top-level domain).
///
/// Decoding is lossy and never fails: invalid sequences become U+FFFD.
/// Detection only runs when neither a BOM nor a known charset label is present.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>, tld: Option<&str>) -> DecodedHtml {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    let declared = content_type
        .and_then(extract_charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    if let Some(encoding) = declared {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let tld = tld
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_alphabetic()))
        .map(str::to_ascii_lowercase);
    let encoding = detector.guess(tld.as_deref().map(str::as_bytes), true);
    decode_with(bytes, encoding)
}

/// Last label of a URL's host, e.g. `jp` for `https://shop.example.jp/item`.
pub fn host_tld(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let last = host.rsplit('.').next()?;
    if last.is_empty() || last.chars().any(|c| !c.is_ascii_alphabetic()) {
        return None;
    }
    Some(last.to_ascii_lowercase())
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("charset") {
                return None;
            }
            Some(value.trim().trim_matches(['"', '\''].as_ref()))
        })
        .next()
        .map(|s| s.to_string())
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> DecodedHtml {
    let (text, used, had_errors) = encoding.decode(bytes);
    DecodedHtml {
        html: text.into_owned(),
        encoding_label: used.name().to_string(),
        had_errors,
    }
}
