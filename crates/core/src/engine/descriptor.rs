//! Torrent descriptor and magnet link parsing.
//!
//! Descriptors are decoded with librqbit-core so that a malformed file is
//! rejected before it ever reaches an engine backend.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};

use super::EngineError;

/// One file listed in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorFile {
    pub path: String,
    pub size_bytes: u64,
}

/// Parsed torrent descriptor.
#[derive(Debug, Clone)]
pub struct TorrentDescriptor {
    pub name: String,
    /// Info hash (lowercase hex).
    pub info_hash: String,
    pub files: Vec<DescriptorFile>,
    /// `announce` followed by every `announce-list` tier, deduplicated.
    pub trackers: Vec<String>,
}

impl TorrentDescriptor {
    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

/// Parse a torrent descriptor.
///
/// Supports both single-file and multi-file layouts.
pub fn parse_descriptor(bytes: &[u8]) -> Result<TorrentDescriptor, EngineError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| EngineError::InvalidTorrent(e.to_string()))?;

    let info = &torrent.info;

    let name = info
        .name
        .as_ref()
        .map(|b| bytes_to_string(b.as_ref()))
        .unwrap_or_else(|| "unknown".to_string());

    let files = if let Some(ref files) = info.files {
        let mut result = Vec::with_capacity(files.len());
        for file in files {
            let mut parts = vec![name.clone()];
            for part in &file.path {
                parts.push(bytes_to_string(part.as_ref()));
            }
            result.push(DescriptorFile {
                path: parts.join("/"),
                size_bytes: file.length,
            });
        }
        result
    } else if let Some(length) = info.length {
        vec![DescriptorFile {
            path: name.clone(),
            size_bytes: length,
        }]
    } else {
        Vec::new()
    };

    if files.is_empty() {
        return Err(EngineError::InvalidTorrent(
            "descriptor lists no files".to_string(),
        ));
    }

    let mut trackers: Vec<String> = Vec::new();
    let announce = torrent.announce.iter();
    let tiers = torrent.announce_list.iter().flatten();
    for url in announce.chain(tiers) {
        let url = bytes_to_string(url.as_ref());
        if !url.is_empty() && !trackers.contains(&url) {
            trackers.push(url);
        }
    }

    Ok(TorrentDescriptor {
        name,
        info_hash: torrent.info_hash.as_string(),
        files,
        trackers,
    })
}

fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parsed magnet URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    /// Info hash as given in `xt=urn:btih:` (lowercased).
    pub info_hash: String,
    /// `dn=` display name, if present.
    pub display_name: Option<String>,
    /// Every `tr=` tracker, in order.
    pub trackers: Vec<String>,
}

/// Parse a `magnet:?` URI.
pub fn parse_magnet(uri: &str) -> Result<MagnetLink, EngineError> {
    let query = uri
        .strip_prefix("magnet:?")
        .ok_or_else(|| EngineError::InvalidTorrent(format!("not a magnet link: {uri}")))?;

    let mut info_hash = None;
    let mut display_name = None;
    let mut trackers = Vec::new();

    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = decode(value);
        match key {
            "xt" => {
                if let Some(hash) = value.strip_prefix("urn:btih:") {
                    info_hash = Some(hash.to_lowercase());
                }
            }
            "dn" => display_name = Some(value),
            "tr" => trackers.push(value),
            _ => {}
        }
    }

    let info_hash = info_hash
        .filter(|h| !h.is_empty())
        .ok_or_else(|| EngineError::InvalidTorrent(format!("magnet link has no info hash: {uri}")))?;

    Ok(MagnetLink {
        info_hash,
        display_name,
        trackers,
    })
}

fn decode(value: &str) -> String {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_parse_single_file_descriptor() {
        let bytes = fixtures::single_file_descriptor("ubuntu-24.04.iso", 4096);
        let desc = parse_descriptor(&bytes).unwrap();
        assert_eq!(desc.name, "ubuntu-24.04.iso");
        assert_eq!(desc.files.len(), 1);
        assert_eq!(desc.total_size(), 4096);
        assert_eq!(desc.info_hash.len(), 40);
        assert_eq!(desc.trackers, vec!["http://tracker.test/announce"]);
    }

    #[test]
    fn test_parse_multi_file_descriptor() {
        let bytes = fixtures::multi_file_descriptor("album", &[("cd1/01.flac", 100), ("cover.jpg", 20)]);
        let desc = parse_descriptor(&bytes).unwrap();
        assert_eq!(desc.name, "album");
        assert_eq!(desc.files.len(), 2);
        assert_eq!(desc.files[0].path, "album/cd1/01.flac");
        assert_eq!(desc.total_size(), 120);
    }

    #[test]
    fn test_distinct_names_distinct_hashes() {
        let a = parse_descriptor(&fixtures::single_file_descriptor("a.iso", 10)).unwrap();
        let b = parse_descriptor(&fixtures::single_file_descriptor("b.iso", 10)).unwrap();
        assert_ne!(a.info_hash, b.info_hash);
    }

    #[test]
    fn test_parse_invalid_descriptor() {
        assert!(matches!(
            parse_descriptor(b"not a valid torrent"),
            Err(EngineError::InvalidTorrent(_))
        ));
        assert!(parse_descriptor(b"").is_err());
    }

    #[test]
    fn test_parse_magnet_full() {
        let link = parse_magnet(
            "magnet:?xt=urn:btih:ABCDEF0123&dn=Debian+12%20netinst&tr=udp%3A%2F%2Ft1%3A80&tr=http%3A%2F%2Ft2",
        )
        .unwrap();
        assert_eq!(link.info_hash, "abcdef0123");
        assert_eq!(link.display_name.as_deref(), Some("Debian 12 netinst"));
        assert_eq!(link.trackers, vec!["udp://t1:80", "http://t2"]);
    }

    #[test]
    fn test_parse_magnet_minimal() {
        let link = parse_magnet("magnet:?xt=urn:btih:abc").unwrap();
        assert_eq!(link.info_hash, "abc");
        assert!(link.display_name.is_none());
        assert!(link.trackers.is_empty());
    }

    #[test]
    fn test_parse_magnet_rejects_garbage() {
        assert!(parse_magnet("http://example.com/a.torrent").is_err());
        assert!(parse_magnet("magnet:?dn=NoHash").is_err());
        assert!(parse_magnet("magnet:?xt=urn:btih:").is_err());
    }
}
