use std::path::{Path, PathBuf};

/// Errors produced while reading, tagging, and rewriting photos.
///
/// Three variants are recoverable conditions that the directory walker turns
/// into per-file skips: [`LabelError::NoLabelsFound`], [`LabelError::ImageTooLarge`]
/// and (for the single-file entry point) [`LabelError::AlreadyLabeled`].
/// Everything else aborts the walk.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    /// The input is not a JPEG, or its segment structure is broken.
    #[error("invalid image container: {0}")]
    Format(String),

    /// A backup from an earlier (probably interrupted) run is still present.
    #[error("backup file already exists: {}", path.display())]
    BackupConflict { path: PathBuf },

    /// The file already carries the processed marker.
    #[error("file is already labeled: {}", path.display())]
    AlreadyLabeled { path: PathBuf },

    /// The recognition service returned no usable labels.
    #[error("no labels found")]
    NoLabelsFound,

    /// The recognition service refused the image because of its size.
    #[error("image too large for recognition: {0}")]
    ImageTooLarge(String),

    /// A metadata field name that has no IIM dataset behind it.
    #[error("unknown IPTC field: {0}")]
    UnknownField(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opaque failure from the recognition service.
    #[error("label service failed: {0:#}")]
    Recognition(anyhow::Error),
}

impl LabelError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// `true` for the conditions the walker skips instead of aborting on.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NoLabelsFound | Self::ImageTooLarge(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skippable_conditions() {
        assert!(LabelError::NoLabelsFound.is_skippable());
        assert!(LabelError::ImageTooLarge("413".into()).is_skippable());
        assert!(!LabelError::Format("x".into()).is_skippable());
        assert!(
            !LabelError::BackupConflict {
                path: PathBuf::from("a.jpg~")
            }
            .is_skippable()
        );
    }

    #[test]
    fn messages_name_the_path() {
        let err = LabelError::AlreadyLabeled {
            path: PathBuf::from("_testdir/testfile.jpg"),
        };
        assert!(err.to_string().contains("_testdir/testfile.jpg"));

        let err = LabelError::io(Path::new("x.jpg"))(std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "I/O error on x.jpg: boom");
    }
}
