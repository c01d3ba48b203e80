//! Playlist content fingerprint.
//!
//! CRC-32 over the playlist title and every entry's persisted fields, in
//! playlist order. Native handles are left out so that the fingerprint only
//! changes when something a caller can observe changes.

use crc32fast::Hasher;

use crate::engine::PlaylistData;

const FIELD_SEP: &[u8] = &[0x1f];
const ENTRY_SEP: &[u8] = &[0x1e];

/// Computes the content checksum of a fetched playlist.
#[must_use]
pub fn playlist_checksum(data: &PlaylistData) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data.title.as_bytes());

    for entry in &data.entries {
        hasher.update(ENTRY_SEP);
        hasher.update(entry.filename.as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(&(entry.duration.as_millis() as u64).to_le_bytes());
        hasher.update(&entry.rating.to_bits().to_le_bytes());
        hasher.update(&entry.source_type.as_db().to_le_bytes());
        for (name, value) in &entry.tags {
            hasher.update(FIELD_SEP);
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        hasher.update(FIELD_SEP);
        hasher.update(&entry.bitrate.to_le_bytes());
        hasher.update(&entry.channels.to_le_bytes());
        hasher.update(&entry.samplerate.to_le_bytes());
        hasher.update(&entry.filesize.to_le_bytes());
    }

    hasher.finalize()
}
