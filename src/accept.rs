use std::fmt;

//
// MediaType
//

/// A concrete `type/subType` pair, as chosen by [`highest`].
///
/// No wildcard resolution is performed: a winning `*/*` range is returned
/// literally, and remains eligible to form a [content-type
/// suffix](crate::key::KeyBuilder::content_type_suffix) downstream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaType {
    /// The `type` component (e.g. `application`).
    pub main_type: String,
    /// The `subType` component (e.g. `json`).
    pub sub_type: String,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)
    }
}

struct RankedRange {
    media_type: MediaType,
    quality: f64,
}

/// Rank the media ranges in an `Accept` header and return the highest one.
///
/// Each comma-separated segment is a media range of the form
/// `type/subType;param=value;...`. A missing `q` parameter defaults to
/// `1.0`; a segment whose main part isn't `type/subType` or whose `q`
/// fails to parse is skipped silently rather than rejecting the whole
/// header.
///
/// Segments are stable-sorted by `q` ascending and the last one is
/// returned, which means that among segments tied for the highest `q`,
/// the one that appeared *later* in the header wins. This mirrors the
/// observed behavior of the system this policy was modeled on; whether
/// it was a deliberate choice or an artifact of a particular sort
/// implementation is not resolvable from the outside, so it is preserved
/// rather than "fixed" to earliest-wins.
pub fn highest(accept_header: Option<&str>) -> Option<MediaType> {
    let accept_header = accept_header?.trim();
    if accept_header.is_empty() {
        return None;
    }

    let mut ranges: Vec<RankedRange> =
        accept_header.split(',').filter_map(parse_range).collect();

    ranges.sort_by(|a, b| a.quality.partial_cmp(&b.quality).unwrap_or(std::cmp::Ordering::Equal));

    ranges.pop().map(|range| range.media_type)
}

fn parse_range(segment: &str) -> Option<RankedRange> {
    let mut parts = segment.split(';');
    let media_range = parts.next()?.trim();

    let (main_type, sub_type) = media_range.split_once('/')?;
    let main_type = main_type.trim();
    let sub_type = sub_type.trim();
    if main_type.is_empty() || sub_type.is_empty() {
        return None;
    }

    let mut quality = 1.0;
    for param in parts {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("q") {
            quality = value.trim().parse::<f64>().ok()?;
        }
    }

    Some(RankedRange {
        media_type: MediaType { main_type: main_type.to_string(), sub_type: sub_type.to_string() },
        quality,
    })
}
