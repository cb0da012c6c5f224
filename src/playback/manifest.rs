//! HLS playlist handling
//!
//! Parsing goes through `m3u8-rs`; the engine only keeps what it needs to
//! pick a variant and walk media segments. The relay's URI rewriting works
//! line by line so unrecognised tags are carried through untouched.

use m3u8_rs::Playlist;

use crate::errors::{PlaybackError, PlaybackResult};

/// Maximum bytes read from a playlist body
pub const MAX_PLAYLIST_BYTES: usize = 256 * 1024;

const PLAYLIST_HEADER: &str = "#EXTM3U";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistKind {
    /// Lists variant streams (`#EXT-X-STREAM-INF`)
    Master,
    /// Lists media segments
    Media,
}

/// One playable variant of a master playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterVariant {
    pub bandwidth: u64,
    pub resolution: Option<(u64, u64)>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSegment {
    pub sequence: u64,
    pub uri: String,
}

/// Segments of a media playlist together with the live-edge bookkeeping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaPlaylist {
    pub target_duration: Option<f32>,
    pub media_sequence: u64,
    pub init_uri: Option<String>,
    pub segments: Vec<MediaSegment>,
    pub is_ended: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPlaylist {
    /// Playable variants in source order
    Master(Vec<MasterVariant>),
    Media(MediaPlaylist),
}

impl ParsedPlaylist {
    pub fn kind(&self) -> PlaylistKind {
        match self {
            Self::Master(_) => PlaylistKind::Master,
            Self::Media(_) => PlaylistKind::Media,
        }
    }
}

/// Parse a playlist body
///
/// Bodies without the `#EXTM3U` header (error pages, HTML) are rejected
/// before the parser sees them.
pub fn parse_playlist(text: &str) -> PlaybackResult<ParsedPlaylist> {
    if !text.trim_start_matches('\u{feff}').trim_start().starts_with(PLAYLIST_HEADER) {
        return Err(PlaybackError::manifest("missing #EXTM3U header"));
    }

    match m3u8_rs::parse_playlist_res(text.as_bytes()) {
        Ok(Playlist::MasterPlaylist(master)) => Ok(ParsedPlaylist::Master(
            master
                .variants
                .into_iter()
                .filter(|variant| !variant.is_i_frame)
                .map(|variant| MasterVariant {
                    bandwidth: variant.bandwidth,
                    resolution: variant.resolution.map(|r| (r.width, r.height)),
                    uri: variant.uri,
                })
                .collect(),
        )),
        Ok(Playlist::MediaPlaylist(media)) => Ok(ParsedPlaylist::Media(media_playlist(media))),
        Err(_) => Err(PlaybackError::manifest("playlist could not be parsed")),
    }
}

/// Parse a body that must be a media playlist (live reloads)
pub fn parse_media_playlist(text: &str) -> PlaybackResult<MediaPlaylist> {
    match parse_playlist(text)? {
        ParsedPlaylist::Media(playlist) => Ok(playlist),
        ParsedPlaylist::Master(_) => Err(PlaybackError::manifest(
            "expected a media playlist, got a master playlist",
        )),
    }
}

fn media_playlist(media: m3u8_rs::MediaPlaylist) -> MediaPlaylist {
    let target = media.target_duration as f32;
    let init_uri = media
        .segments
        .iter()
        .find_map(|segment| segment.map.as_ref().map(|map| map.uri.clone()));

    // Sequence numbers past u64::MAX cannot be addressed; those segments are dropped
    let segments = media
        .segments
        .into_iter()
        .zip(0u64..)
        .map_while(|(segment, offset)| {
            Some(MediaSegment {
                sequence: media.media_sequence.checked_add(offset)?,
                uri: segment.uri,
            })
        })
        .collect();

    MediaPlaylist {
        target_duration: (target.is_finite() && target > 0.0).then_some(target),
        media_sequence: media.media_sequence,
        init_uri,
        segments,
        is_ended: media.end_list,
    }
}

/// Highest-bandwidth variant, the first one listed on ties
pub fn select_variant(variants: &[MasterVariant]) -> Option<&MasterVariant> {
    variants.iter().rev().max_by_key(|v| v.bandwidth)
}

/// Map every URI in a playlist through `map`
///
/// Covers URI lines (variants and segments) and `URI="..."` attributes of
/// tags such as `#EXT-X-KEY`, `#EXT-X-MAP` and `#EXT-X-MEDIA`. Line endings
/// are normalised to `\n`.
pub fn rewrite_uris<F>(text: &str, mut map: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push_str(line);
        } else if trimmed.starts_with('#') {
            out.push_str(&rewrite_uri_attribute(line, &mut map));
        } else {
            out.push_str(&map(trimmed));
        }
        out.push('\n');
    }
    out
}

fn rewrite_uri_attribute<F>(line: &str, map: &mut F) -> String
where
    F: FnMut(&str) -> String,
{
    const MARKER: &str = "URI=\"";
    let Some(start) = line.find(MARKER).map(|pos| pos + MARKER.len()) else {
        return line.to_string();
    };
    let Some(len) = line[start..].find('"') else {
        return line.to_string();
    };
    let end = start + len;
    format!("{}{}{}", &line[..start], map(&line[start..end]), &line[end..])
}
