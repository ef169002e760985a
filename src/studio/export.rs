use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::studio::codec::{decode_payload, mime_type_of};
use crate::studio::error::{StudioError, StudioResult};
use crate::studio::filename::shot_filename;
use crate::studio::workflow::GeneratedShot;

pub const BUNDLE_FILE_NAME: &str = "product-shots.zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Write(#[from] io::Error),
}

/// Packs named entries into a single downloadable archive.
pub trait Archiver: Send + Sync {
    fn archive(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError>;
}

#[cfg(feature = "zip-bundle")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

#[cfg(feature = "zip-bundle")]
impl Archiver for ZipArchiver {
    fn archive(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
        use std::io::{Cursor, Write};
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for entry in entries {
            zip.start_file(entry.name.as_str(), options)
                .map_err(io::Error::from)?;
            zip.write_all(&entry.bytes)?;
        }
        let cursor = zip.finish().map_err(io::Error::from)?;
        Ok(cursor.into_inner())
    }
}

/// Stands in when the build carries no archive support.
#[cfg_attr(feature = "zip-bundle", allow(dead_code))]
#[derive(Debug, Clone)]
pub struct UnavailableArchiver {
    reason: String,
}

#[cfg_attr(feature = "zip-bundle", allow(dead_code))]
impl UnavailableArchiver {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Archiver for UnavailableArchiver {
    fn archive(&self, _entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
        Err(ArchiveError::Unavailable(self.reason.clone()))
    }
}

pub fn default_archiver() -> Box<dyn Archiver> {
    #[cfg(feature = "zip-bundle")]
    {
        Box::new(ZipArchiver)
    }
    #[cfg(not(feature = "zip-bundle"))]
    {
        Box::new(UnavailableArchiver::new(
            "built without the `zip-bundle` feature",
        ))
    }
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub bytes: Vec<u8>,
    pub file_names: Vec<String>,
    pub skipped: usize,
}

fn idea_for<'a>(shot: &GeneratedShot, ideas: &'a [String]) -> Option<&'a str> {
    ideas.get(shot.idea_index).map(String::as_str)
}

/// Shots whose payload cannot be decoded are skipped, not fatal.
pub fn export_all(
    shots: &[GeneratedShot],
    ideas: &[String],
    archiver: &dyn Archiver,
) -> StudioResult<Bundle> {
    let mut entries = Vec::with_capacity(shots.len());
    let mut skipped = 0usize;
    for (position, shot) in shots.iter().enumerate() {
        let name = shot_filename(idea_for(shot, ideas), position, &shot.data_uri);
        match decode_payload(&shot.data_uri) {
            Ok(bytes) => entries.push(ArchiveEntry { name, bytes }),
            Err(err) => {
                skipped += 1;
                warn!("Skipping {name} in bundle: {err}");
            }
        }
    }

    let file_names = entries.iter().map(|entry| entry.name.clone()).collect();
    let bytes = archiver.archive(&entries).map_err(|err| match err {
        ArchiveError::Unavailable(reason) => StudioError::ExportUnavailable(reason),
        ArchiveError::Write(source) => StudioError::Io {
            path: PathBuf::from(BUNDLE_FILE_NAME),
            source,
        },
    })?;

    Ok(Bundle {
        bytes,
        file_names,
        skipped,
    })
}

/// Writes one shot to `dir` under the same name it gets inside a bundle.
pub async fn save_shot(
    dir: &Path,
    shot: &GeneratedShot,
    ideas: &[String],
    position: usize,
) -> StudioResult<PathBuf> {
    let bytes = decode_payload(&shot.data_uri)?;
    let path = dir.join(shot_filename(idea_for(shot, ideas), position, &shot.data_uri));
    write_file(&path, &bytes).await?;
    info!("Saved {} ({})", path.display(), mime_type_of(&shot.data_uri));
    Ok(path)
}

pub async fn write_bundle(path: &Path, bundle: &Bundle) -> StudioResult<()> {
    write_file(path, &bundle.bytes).await?;
    info!(
        "Wrote {} with {} shot(s) ({} skipped)",
        path.display(),
        bundle.file_names.len(),
        bundle.skipped
    );
    Ok(())
}

async fn write_file(path: &Path, bytes: &[u8]) -> StudioResult<()> {
    let to_io_error = |source| StudioError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_io_error)?;
    }
    tokio::fs::write(path, bytes).await.map_err(to_io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::codec::encode;

    fn shot(idea_index: usize, bytes: &[u8], mime: &str) -> GeneratedShot {
        GeneratedShot {
            idea_index,
            data_uri: encode(bytes, mime),
        }
    }

    struct RecordingArchiver;

    impl Archiver for RecordingArchiver {
        fn archive(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
            Ok(entries
                .iter()
                .map(|entry| entry.name.as_str())
                .collect::<Vec<_>>()
                .join("|")
                .into_bytes())
        }
    }

    #[test]
    fn names_follow_ideas_and_positions() {
        let shots = vec![shot(0, b"one", "image/png"), shot(1, b"two", "image/webp")];
        let ideas = vec!["Bright kitchen scene".to_string(), String::new()];
        let bundle = export_all(&shots, &ideas, &RecordingArchiver).unwrap();
        assert_eq!(
            bundle.file_names,
            vec!["Bright_kitchen_scene_1.png", "untitled_shot_2.webp"]
        );
        assert_eq!(bundle.skipped, 0);
    }

    #[test]
    fn undecodable_shots_are_skipped() {
        let shots = vec![
            GeneratedShot {
                idea_index: 0,
                data_uri: "data:image/png;base64,%%%".to_string(),
            },
            shot(1, b"ok", "image/png"),
        ];
        let ideas = vec!["Broken".to_string(), "Fine".to_string()];
        let bundle = export_all(&shots, &ideas, &RecordingArchiver).unwrap();
        assert_eq!(bundle.file_names, vec!["Fine_2.png"]);
        assert_eq!(bundle.skipped, 1);
    }

    #[test]
    fn missing_idea_falls_back_to_shot() {
        let shots = vec![shot(4, b"x", "image/jpeg")];
        let bundle = export_all(&shots, &[], &RecordingArchiver).unwrap();
        assert_eq!(bundle.file_names, vec!["shot_1.jpeg"]);
    }

    #[test]
    fn unavailable_archiver_is_reported_distinctly() {
        let shots = vec![shot(0, b"x", "image/png")];
        let err = export_all(
            &shots,
            &["Idea".to_string()],
            &UnavailableArchiver::new("not loaded"),
        )
        .unwrap_err();
        assert!(matches!(err, StudioError::ExportUnavailable(ref reason) if reason == "not loaded"));
    }

    #[cfg(feature = "zip-bundle")]
    #[test]
    fn zip_archive_contains_every_entry() {
        use std::io::{Cursor, Read};

        let shots = vec![shot(0, b"first", "image/png"), shot(1, b"second", "image/png")];
        let ideas = vec!["Marble pedestal".to_string(), "Beach at dusk".to_string()];
        let bundle = export_all(&shots, &ideas, &ZipArchiver).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bundle.bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("Beach_at_dusk_2.png").unwrap();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"second");
    }

    #[tokio::test]
    async fn single_save_uses_bundle_naming() {
        let dir = tempfile::tempdir().unwrap();
        let shots = vec![shot(0, b"a", "image/png"), shot(2, b"c", "image/webp")];
        let ideas = vec![
            "Close-up, dramatic!".to_string(),
            "unused".to_string(),
            "Studio softbox".to_string(),
        ];

        let first = save_shot(dir.path(), &shots[0], &ideas, 0).await.unwrap();
        let second = save_shot(dir.path(), &shots[1], &ideas, 1).await.unwrap();
        assert_eq!(first.file_name().unwrap(), "Closeup_dramatic_1.png");
        assert_eq!(second.file_name().unwrap(), "Studio_softbox_2.webp");
        assert_eq!(std::fs::read(&second).unwrap(), b"c");

        let bundle = export_all(&shots, &ideas, &RecordingArchiver).unwrap();
        assert_eq!(
            bundle.file_names,
            vec!["Closeup_dramatic_1.png", "Studio_softbox_2.webp"]
        );
    }

    #[tokio::test]
    async fn bundle_is_written_to_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(BUNDLE_FILE_NAME);
        let bundle = Bundle {
            bytes: b"zip".to_vec(),
            file_names: vec!["a_1.png".to_string()],
            skipped: 0,
        };
        write_bundle(&path, &bundle).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"zip");
    }
}
