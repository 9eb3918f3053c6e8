use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::{Config, WalkConfig};
use crate::error::LabelError;
use crate::iptc::{self, MetadataRecord};
use crate::vision::{LabelService, select_labels};

/// What happened to one file during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Keywords merged and written, backup created.
    Tagged,
    /// The processed marker was already present; nothing was sent or written.
    SkippedAlreadyTagged,
    /// The file name matched an excluded substring.
    SkippedExcluded,
    /// The label service had nothing to offer.
    SkippedNoLabels,
    /// The label service refused the image because of its size.
    SkippedTooLarge,
}

impl fmt::Display for WalkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tagged => "tagged",
            Self::SkippedAlreadyTagged => "skipped (already tagged)",
            Self::SkippedExcluded => "skipped (excluded)",
            Self::SkippedNoLabels => "skipped (no labels)",
            Self::SkippedTooLarge => "skipped (too large)",
        })
    }
}

/// Sink for per-file outcomes of a walk.
pub trait Reporter {
    fn report(&mut self, path: &Path, outcome: WalkOutcome);
}

/// Reports outcomes through the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, path: &Path, outcome: WalkOutcome) {
        match outcome {
            WalkOutcome::Tagged => log::info!("Labeled file [{}]", path.display()),
            WalkOutcome::SkippedAlreadyTagged => {
                log::info!("Skipping already labeled file [{}]", path.display())
            }
            WalkOutcome::SkippedExcluded => log::debug!("Skipping excluded file [{}]", path.display()),
            WalkOutcome::SkippedNoLabels => log::warn!("No labels found for [{}]", path.display()),
            WalkOutcome::SkippedTooLarge => {
                log::warn!("Image [{}] is too big, skipping", path.display())
            }
        }
    }
}

/// Collects outcomes in order; handy for callers that post-process a walk.
impl Reporter for Vec<(PathBuf, WalkOutcome)> {
    fn report(&mut self, path: &Path, outcome: WalkOutcome) {
        self.push((path.to_path_buf(), outcome));
    }
}

/// Outcome counts of a finished walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub tagged: usize,
    pub already_tagged: usize,
    pub excluded: usize,
    pub no_labels: usize,
    pub too_large: usize,
}

impl WalkSummary {
    fn record(&mut self, outcome: WalkOutcome) {
        let counter = match outcome {
            WalkOutcome::Tagged => &mut self.tagged,
            WalkOutcome::SkippedAlreadyTagged => &mut self.already_tagged,
            WalkOutcome::SkippedExcluded => &mut self.excluded,
            WalkOutcome::SkippedNoLabels => &mut self.no_labels,
            WalkOutcome::SkippedTooLarge => &mut self.too_large,
        };
        *counter += 1;
    }

    pub fn total(&self) -> usize {
        self.tagged + self.already_tagged + self.excluded + self.no_labels + self.too_large
    }
}

impl fmt::Display for WalkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tagged, {} already tagged, {} excluded, {} without labels, {} too large",
            self.tagged, self.already_tagged, self.excluded, self.no_labels, self.too_large
        )
    }
}

/// Collect image files under `root`, in file-name order.
///
/// Directories named in [`WalkConfig::excluded_dirs`] are not entered. Files
/// with an excluded substring are still returned, so the walk can report them.
pub fn collect_images(root: &Path, walk: &WalkConfig) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry, walk))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Cannot read directory entry: {e}");
                None
            }
        })
        // `path().is_file()` follows symlinks; linked directories are not entered
        .filter(|entry| walk.is_image(entry.path()) && entry.path().is_file())
        .map(DirEntry::into_path)
        .collect()
}

fn is_excluded_dir(entry: &DirEntry, walk: &WalkConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let excluded = entry.file_name().to_str().is_some_and(|name| walk.is_excluded_dir(name));
    if excluded {
        log::debug!("Skipping excluded directory [{}]", entry.path().display());
    }
    excluded
}

fn has_excluded_name(path: &Path, walk: &WalkConfig) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| walk.is_excluded_file(name))
}

/// Add `tags` to the keywords of the photo at `path` and mark it processed.
///
/// Fails with [`LabelError::AlreadyLabeled`] if the marker is already there.
/// A photo without IPTC data gets a fresh record. The original is backed up
/// to `path~` before it is rewritten.
///
/// # Example
///
/// ```rust,no_run
/// use photo_label::pipeline::label_file;
/// use std::path::Path;
///
/// let record = label_file(Path::new("photo.jpg"), &["cat", "mammal"])?;
/// println!("Keywords now: {:?}", record.keywords());
/// # Ok::<(), photo_label::LabelError>(())
/// ```
pub fn label_file<S: AsRef<str>>(path: &Path, tags: &[S]) -> Result<MetadataRecord, LabelError> {
    let existing = iptc::load_record(path)?;
    if existing.as_ref().is_some_and(MetadataRecord::is_already_labeled) {
        return Err(LabelError::AlreadyLabeled {
            path: path.to_path_buf(),
        });
    }

    let merged = existing.unwrap_or_default().merge(tags);
    iptc::save_record(path, &merged)?;
    Ok(merged)
}

/// Label every image under `root` that has not been labeled yet.
///
/// Files are handled one at a time:
///
/// 1. excluded names are reported and skipped
/// 2. files carrying the processed marker are skipped without a service call
/// 3. the image bytes go to `service`; "too large" and "no labels" answers
///    skip the file
/// 4. the selected labels are merged into the keywords, the original is
///    backed up, and the file is rewritten
///
/// Any other error, including a leftover backup from an interrupted run,
/// stops the walk and is returned. Files finished before that stay tagged.
pub async fn walk_and_tag(
    root: &Path,
    service: &dyn LabelService,
    config: &Config,
    reporter: &mut dyn Reporter,
) -> Result<WalkSummary, LabelError> {
    let files = collect_images(root, &config.walk);
    log::info!(
        "Found ({}) files in [{}]. Start labeling...",
        files.len(),
        root.display()
    );

    let mut summary = WalkSummary::default();
    for path in &files {
        let outcome = tag_one(path, service, config).await?;
        summary.record(outcome);
        reporter.report(path, outcome);
    }

    log::info!("done. {summary}");
    Ok(summary)
}

async fn tag_one(
    path: &Path,
    service: &dyn LabelService,
    config: &Config,
) -> Result<WalkOutcome, LabelError> {
    if has_excluded_name(path, &config.walk) {
        return Ok(WalkOutcome::SkippedExcluded);
    }
    if iptc::is_already_labeled(path)? {
        return Ok(WalkOutcome::SkippedAlreadyTagged);
    }

    log::info!("Labeling file [{}]", path.display());
    let image = std::fs::read(path).map_err(LabelError::io(path))?;

    let tags = match service
        .fetch_labels(&image)
        .await
        .and_then(|candidates| select_labels(&candidates, config.labels.min_confidence))
    {
        Ok(tags) => tags,
        Err(LabelError::NoLabelsFound) => return Ok(WalkOutcome::SkippedNoLabels),
        Err(LabelError::ImageTooLarge(reason)) => {
            log::debug!("{} refused [{}]: {reason}", service.name(), path.display());
            return Ok(WalkOutcome::SkippedTooLarge);
        }
        Err(e) => return Err(e),
    };
    log::info!(
        "Found ({}) tags for file [{}]: {}",
        tags.len(),
        path.display(),
        tags.join(", ")
    );

    label_file(path, tags.as_slice())?;
    Ok(WalkOutcome::Tagged)
}
