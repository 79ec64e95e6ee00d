//! Tag reading with per-file container sniffing

use crate::ScanError;
use lofty::{Accessor, AudioFile, FileType, ItemKey, Probe, Tag, TagType, TaggedFile, TaggedFileExt};
use std::path::Path;
use tunesync_core::types::{title_from_path, TagMetadata};

/// Reads tag metadata from one audio file
///
/// Implementations are called from blocking worker threads and may do
/// synchronous I/O.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<TagMetadata, ScanError>;
}

/// Tag container family, decided by sniffing the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagContainer {
    /// ID3-style frames (MPEG, AIFF, WAV, ADTS AAC)
    FrameTagged,
    /// MP4 atoms (`ilst`)
    AtomTagged,
    /// Simple key/value comments (Vorbis comments, APE)
    KeyValueTagged(TagType),
    Unknown,
}

impl TagContainer {
    pub fn for_file_type(file_type: &FileType) -> Self {
        match file_type {
            FileType::Mpeg | FileType::Aiff | FileType::Wav | FileType::Aac => Self::FrameTagged,
            FileType::Mp4 => Self::AtomTagged,
            FileType::Flac | FileType::Vorbis | FileType::Opus | FileType::Speex => {
                Self::KeyValueTagged(TagType::VorbisComments)
            }
            FileType::Ape | FileType::WavPack | FileType::Mpc => Self::KeyValueTagged(TagType::Ape),
            _ => Self::Unknown,
        }
    }

    /// Tag types to try, most specific first
    fn preferred_tags(self) -> &'static [TagType] {
        match self {
            Self::FrameTagged => &[TagType::Id3v2, TagType::Id3v1],
            Self::AtomTagged => &[TagType::Mp4Ilst],
            Self::KeyValueTagged(TagType::VorbisComments) => &[TagType::VorbisComments],
            Self::KeyValueTagged(_) => &[TagType::Ape, TagType::Id3v1],
            Self::Unknown => &[],
        }
    }

    /// Pick the tag this container should be read from
    ///
    /// Falls back to the file's primary tag and then to whatever tag exists.
    pub fn select_tag(self, file: &TaggedFile) -> Option<&Tag> {
        self.preferred_tags()
            .iter()
            .find_map(|tag_type| file.tag(*tag_type))
            .or_else(|| file.primary_tag())
            .or_else(|| file.first_tag())
    }
}

/// [`TagReader`] backed by lofty
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl LoftyTagReader {
    pub fn new() -> Self {
        Self
    }

    /// Sniff the container from the file header
    pub fn sniff(path: &Path) -> Result<TagContainer, ScanError> {
        let probe = Probe::open(path)
            .and_then(|p| p.guess_file_type().map_err(Into::into))
            .map_err(|e| parse_error(path, e))?;

        Ok(probe
            .file_type()
            .as_ref()
            .map_or(TagContainer::Unknown, TagContainer::for_file_type))
    }
}

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagMetadata, ScanError> {
        let probe = Probe::open(path)
            .and_then(|p| p.guess_file_type().map_err(Into::into))
            .map_err(|e| parse_error(path, e))?;

        let container = probe
            .file_type()
            .as_ref()
            .map_or(TagContainer::Unknown, TagContainer::for_file_type);
        if container == TagContainer::Unknown {
            return Err(ScanError::Parse {
                path: path.to_path_buf(),
                reason: "unrecognised container format".to_string(),
            });
        }

        let tagged_file = probe.read().map_err(|e| parse_error(path, e))?;
        let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        let properties = tagged_file.properties();
        let mut metadata = TagMetadata {
            title: String::new(),
            duration_secs: properties.duration().as_secs_f64(),
            file_size,
            bitrate: properties.audio_bitrate(),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            ..Default::default()
        };

        if let Some(tag) = container.select_tag(&tagged_file) {
            fill_from_tag(&mut metadata, tag);
        }

        if metadata.title.trim().is_empty() {
            metadata.title = title_from_path(path);
        }

        Ok(metadata)
    }
}

fn fill_from_tag(metadata: &mut TagMetadata, tag: &Tag) {
    metadata.title = tag.title().map(|s| s.trim().to_string()).unwrap_or_default();
    metadata.artist = non_empty(tag.artist());
    metadata.album = non_empty(tag.album());
    metadata.album_artist = non_empty(tag.get_string(&ItemKey::AlbumArtist));
    metadata.genre = non_empty(tag.genre());
    metadata.track_number = tag.track().unwrap_or(0);
    metadata.track_total = tag.track_total().unwrap_or(0);
    metadata.disc_number = tag.disk().unwrap_or(0);
    metadata.disc_total = tag.disk_total().unwrap_or(0);
    metadata.date = non_empty(tag.get_string(&ItemKey::RecordingDate))
        .or_else(|| tag.year().map(|y| y.to_string()));
}

fn non_empty<S: AsRef<str>>(value: Option<S>) -> Option<String> {
    value
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> ScanError {
    ScanError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
