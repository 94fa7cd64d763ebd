//! Testing utilities and mock implementations.
//!
//! The mock engine doubles as the `mock` backend selectable in configuration,
//! so the CLI can be exercised without network traffic.
//!
//! # Example
//!
//! ```rust,ignore
//! use tamer_core::testing::{fixtures, MockEngine};
//!
//! let engine = Arc::new(MockEngine::new());
//! let registry = TorrentRegistry::new(engine.clone(), "/downloads", false);
//!
//! let id = registry.add(&fixtures::magnet("abc", "Demo")).await?;
//! engine.set_progress("abc", 1.0).await;
//! ```

mod mock_engine;
mod mock_fetcher;

pub use mock_engine::{MockEngine, MockHandle, MockHandleState, RecordedAdd, RecordedRemove};
pub use mock_fetcher::StaticFeedFetcher;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::engine::PeerInfo;

    const PIECE_LENGTH: u64 = 16384;

    /// Build a magnet link with a display name.
    pub fn magnet(info_hash: &str, name: &str) -> String {
        format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            info_hash,
            urlencoding::encode(name)
        )
    }

    /// Bencoded single-file descriptor.
    ///
    /// Different names yield different info hashes.
    pub fn single_file_descriptor(name: &str, length: u64) -> Vec<u8> {
        let mut info = Vec::new();
        info.push(b'd');
        bytes_field(&mut info, "length");
        int(&mut info, length);
        bytes_field(&mut info, "name");
        bytes_field(&mut info, name);
        pieces(&mut info, length);
        info.push(b'e');
        wrap_info(info)
    }

    /// Bencoded multi-file descriptor; file paths are relative to `name`.
    pub fn multi_file_descriptor(name: &str, files: &[(&str, u64)]) -> Vec<u8> {
        let mut info = Vec::new();
        info.push(b'd');
        bytes_field(&mut info, "files");
        info.push(b'l');
        for (path, length) in files {
            info.push(b'd');
            bytes_field(&mut info, "length");
            int(&mut info, *length);
            bytes_field(&mut info, "path");
            info.push(b'l');
            for part in path.split('/') {
                bytes_field(&mut info, part);
            }
            info.push(b'e');
            info.push(b'e');
        }
        info.push(b'e');
        bytes_field(&mut info, "name");
        bytes_field(&mut info, name);
        pieces(&mut info, files.iter().map(|(_, l)| *l).sum());
        info.push(b'e');
        wrap_info(info)
    }

    /// RSS 2.0 document with `(title, link)` items.
    pub fn rss_feed(items: &[(&str, &str)]) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"><channel>\
             <title>Test feed</title><link>https://feeds.test/</link>\
             <description>fixture</description>",
        );
        for (title, link) in items {
            xml.push_str(&format!(
                "<item><title>{}</title><link>{}</link></item>",
                escape(title),
                escape(link)
            ));
        }
        xml.push_str("</channel></rss>");
        xml
    }

    /// A connected peer with the given progress.
    pub fn peer(ip: &str, progress: f64) -> PeerInfo {
        PeerInfo {
            ip: ip.to_string(),
            port: 6881,
            client: "Mock/1.0".to_string(),
            progress,
            download_rate: 32 * 1024,
            upload_rate: 8 * 1024,
            flags: 0b1_0000_0001,
        }
    }

    fn wrap_info(info: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(b'd');
        bytes_field(&mut out, "announce");
        bytes_field(&mut out, "http://tracker.test/announce");
        bytes_field(&mut out, "info");
        out.extend_from_slice(&info);
        out.push(b'e');
        out
    }

    fn pieces(out: &mut Vec<u8>, total: u64) {
        let count = total.div_ceil(PIECE_LENGTH).max(1) as usize;
        bytes_field(out, "piece length");
        int(out, PIECE_LENGTH);
        bytes_field(out, "pieces");
        out.extend_from_slice(format!("{}:", count * 20).as_bytes());
        out.extend(std::iter::repeat_n(0xabu8, count * 20));
    }

    fn bytes_field(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(format!("{}:", s.len()).as_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn int(out: &mut Vec<u8>, value: u64) {
        out.extend_from_slice(format!("i{}e", value).as_bytes());
    }

    fn escape(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}
