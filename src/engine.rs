//! Move coordination: locate, name, guard, copy, clean up

use crate::classifier;
use crate::cleanup;
use crate::config::EngineConfig;
use crate::disk::{DiskOperations, RealDisk};
use crate::error::{MoveError, Result};
use crate::guard::validate_within;
use crate::locator;
use crate::media::{Classification, LibraryRoots, MediaKind, MoveOptions, MoveOutcome, MoveRequest};
use crate::naming::{self, MovieLayout, MovieNaming, TvNaming};
use crate::transfer::{CopyTool, FileTransfer, ProgressSink, SubtitleTransfer, TransferOrchestrator};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Everything a move will do, computed before any write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovePlan {
    pub kind: MediaKind,
    pub library_root: PathBuf,
    /// Deepest directory holding every destination
    pub destination_root: PathBuf,
    pub source_dir: PathBuf,
    pub source_is_dir: bool,
    pub files: Vec<FileTransfer>,
    pub warnings: Vec<String>,
}

impl MovePlan {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// `(source, destination)` for every video and subtitle, in copy order
    pub fn pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        self.files
            .iter()
            .flat_map(|f| {
                std::iter::once((f.source.clone(), f.destination.clone())).chain(
                    f.subtitles
                        .iter()
                        .map(|s| (s.source.clone(), s.destination.clone())),
                )
            })
            .collect()
    }
}

/// Releases the single-flight flag on drop
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MoveError::Busy);
        }
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Places finished downloads into the movie and TV libraries
///
/// One move runs at a time per engine; a second concurrent call gets
/// [`MoveError::Busy`].
pub struct MoveEngine {
    roots: LibraryRoots,
    tool: CopyTool,
    movie_layout: MovieLayout,
    disk: Box<dyn DiskOperations>,
    busy: AtomicBool,
}

impl MoveEngine {
    pub fn new(roots: LibraryRoots, tool: CopyTool, movie_layout: MovieLayout) -> Self {
        Self {
            roots,
            tool,
            movie_layout,
            disk: Box::new(RealDisk::new()),
            busy: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.library.clone(),
            config.copy.to_tool(),
            config.movie_layout,
        )
    }

    pub fn with_disk(mut self, disk: Box<dyn DiskOperations>) -> Self {
        self.disk = disk;
        self
    }

    /// Where every file of `request` would go, without copying anything
    pub fn preview(&self, request: &MoveRequest) -> Result<MovePlan> {
        let classification = &request.classification;
        let library_root = self
            .roots
            .root_for(classification.kind)
            .ok_or(MoveError::UnknownMediaKind)?
            .clone();

        let source = &request.source_path;
        let metadata = std::fs::metadata(source).map_err(|_| MoveError::SourceNotFound {
            path: source.clone(),
        })?;
        let source_is_dir = metadata.is_dir();
        let source_dir = if source_is_dir {
            source.clone()
        } else {
            source
                .parent()
                .map_or_else(|| source.clone(), Path::to_path_buf)
        };

        let mut warnings = Vec::new();
        let files = match classification.kind {
            MediaKind::Movie => {
                self.plan_movie(source, &source_dir, source_is_dir, classification, &library_root)?
            }
            MediaKind::TvEpisode => {
                plan_tv(source, &source_dir, classification, &library_root, &mut warnings)?
            }
            MediaKind::Unknown => return Err(MoveError::UnknownMediaKind),
        };

        let destination_root = common_parent(&files).unwrap_or_else(|| library_root.clone());

        Ok(MovePlan {
            kind: classification.kind,
            library_root,
            destination_root,
            source_dir,
            source_is_dir,
            files,
            warnings,
        })
    }

    fn plan_movie(
        &self,
        source: &Path,
        source_dir: &Path,
        source_is_dir: bool,
        classification: &Classification,
        root: &Path,
    ) -> Result<Vec<FileTransfer>> {
        let video = locator::find_principal_video(source)?;
        let naming = MovieNaming {
            title: classification.title.clone(),
            year: classification.year,
            extension: video
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        };

        let stem = naming::movie_stem(&naming.title, naming.year)?;
        let destination = root.join(naming::format_movie_path(&naming, self.movie_layout)?);
        validate_within(&destination, root)?;

        let dest_dir = destination
            .parent()
            .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
        let video_stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let found = if source_is_dir {
            locator::find_subtitles(source)
        } else {
            locator::find_subtitles_for_video(source_dir, &video)
        };

        let mut taken = HashSet::new();
        let mut subtitles = Vec::new();
        for sub in found {
            let Some(name) = sub.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let target = dest_dir.join(naming::movie_subtitle_name(&stem, &video_stem, &name));
            validate_within(&target, root)?;
            if !taken.insert(target.clone()) {
                tracing::debug!("Skipping {}: {} already planned", sub.display(), target.display());
                continue;
            }
            subtitles.push(SubtitleTransfer {
                source: sub,
                destination: target,
            });
        }

        Ok(vec![FileTransfer {
            size: file_size(&video),
            source: video,
            destination,
            subtitles,
        }])
    }

    /// Run `request` to completion
    ///
    /// Nothing under the source is touched unless every video copied and
    /// verified, and cleanup was asked for.
    pub async fn execute(
        &self,
        request: MoveRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<MoveOutcome> {
        let _busy = BusyGuard::acquire(&self.busy)?;

        let plan = self.preview(&request)?;
        self.check_space(&plan)?;

        tracing::info!(
            "Moving {} ({}, {} file(s), {} bytes) into {}",
            request.source_path.display(),
            plan.kind,
            plan.files.len(),
            plan.total_bytes(),
            plan.destination_root.display()
        );

        let orchestrator = TransferOrchestrator::new(&self.tool, request.use_elevated_copy, cancel);
        let report = orchestrator
            .run(&plan.files, progress, plan.kind == MediaKind::TvEpisode)
            .await
            .inspect_err(|e| tracing::error!("Move of {} failed: {}", request.source_path.display(), e))?;

        let mut warnings = plan.warnings;
        warnings.extend(report.warnings);

        let remaining_source_entries = if request.cleanup_after_move {
            let cleaned = cleanup::cleanup_source(&plan.source_dir, plan.source_is_dir, &report.copied_sources);
            warnings.extend(cleaned.warnings);
            cleaned.remaining
        } else {
            Vec::new()
        };

        tracing::info!(
            "Moved {} file(s) to {}",
            report.videos.len(),
            plan.destination_root.display()
        );

        Ok(MoveOutcome {
            files_moved: report.videos.len(),
            moved_video_paths: report.videos,
            moved_subtitle_paths: report.subtitles,
            destination_root: plan.destination_root,
            media_kind: plan.kind,
            total_bytes: report.bytes,
            remaining_source_entries,
            source_dir: plan.source_dir,
            warnings,
        })
    }

    /// Classify the source path and move it
    pub async fn move_auto(
        &self,
        source: impl Into<PathBuf>,
        options: MoveOptions,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<MoveOutcome> {
        let source = source.into();
        let classification = classifier::detect_path(&source)?;
        let request = MoveRequest::new(source, classification).with_options(options);
        self.execute(request, progress, cancel).await
    }

    /// Move as a movie with caller-chosen title and year
    pub async fn move_as_movie(
        &self,
        source: impl Into<PathBuf>,
        naming: &MovieNaming,
        options: MoveOptions,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<MoveOutcome> {
        let classification = Classification::movie(naming.title.clone(), naming.year);
        let request = MoveRequest::new(source, classification).with_options(options);
        self.execute(request, progress, cancel).await
    }

    /// Move as TV; `naming.season` is the fallback for season-less files
    pub async fn move_as_tv(
        &self,
        source: impl Into<PathBuf>,
        naming: &TvNaming,
        options: MoveOptions,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<MoveOutcome> {
        let classification = Classification::tv(naming.show_title.clone(), naming.season);
        let request = MoveRequest::new(source, classification).with_options(options);
        self.execute(request, progress, cancel).await
    }

    /// Bytes still to write must fit on the library filesystem
    ///
    /// Destinations left by an interrupted earlier attempt count toward what
    /// is already there.
    fn check_space(&self, plan: &MovePlan) -> Result<()> {
        let needed: u64 = plan
            .files
            .iter()
            .map(|f| f.size.saturating_sub(file_size(&f.destination)))
            .sum();

        let available = match self.disk.available_space(&plan.library_root) {
            Ok(available) => available,
            Err(e) => {
                tracing::debug!(
                    "Skipping free-space check for {}: {}",
                    plan.library_root.display(),
                    e
                );
                return Ok(());
            }
        };

        if available < needed {
            return Err(MoveError::InsufficientSpace {
                root: plan.library_root.clone(),
                needed,
                available,
            });
        }
        Ok(())
    }
}

fn plan_tv(
    source: &Path,
    source_dir: &Path,
    classification: &Classification,
    root: &Path,
    warnings: &mut Vec<String>,
) -> Result<Vec<FileTransfer>> {
    let videos = locator::find_all_videos(source)?;
    let mut taken = HashSet::new();
    let mut planned: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut files = Vec::with_capacity(videos.len());

    for video in videos {
        let Some(file_name) = video.file_name().map(|n| n.to_os_string()) else {
            continue;
        };

        let season = episode_season(&video, source, classification.season).unwrap_or_else(|| {
            let msg = format!(
                "No season for {}, placing it in Season 01",
                file_name.to_string_lossy()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            1
        });

        let dir = root.join(naming::format_tv_directory(&classification.title, season)?);
        let destination = dir.join(&file_name);
        validate_within(&destination, root)?;
        if let Some(first) = planned.insert(destination.clone(), video.clone()) {
            return Err(MoveError::DuplicateDestination {
                path: destination,
                first,
                second: video,
            });
        }

        let mut subtitles = Vec::new();
        for sub in locator::find_subtitles_for_video(source_dir, &video) {
            let Some(name) = sub.file_name() else {
                continue;
            };
            let target = dir.join(name);
            validate_within(&target, root)?;
            if taken.insert(target.clone()) {
                subtitles.push(SubtitleTransfer {
                    source: sub,
                    destination: target,
                });
            }
        }

        files.push(FileTransfer {
            size: file_size(&video),
            source: video,
            destination,
            subtitles,
        });
    }

    Ok(files)
}

/// Season of one pack video
///
/// The file's own marker wins, then the nearest `Season N` / `Sxx` directory
/// between the file and `source`, then `fallback`; 0 means none.
fn episode_season(video: &Path, source: &Path, fallback: u32) -> Option<u32> {
    let season_of = |name: &std::ffi::OsStr| {
        let found = classifier::classify(&name.to_string_lossy());
        (found.kind == MediaKind::TvEpisode && found.season > 0).then_some(found.season)
    };

    let own = video.file_name().and_then(season_of);
    let from_dirs = || {
        video
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(source))
            .find_map(|dir| dir.file_name().and_then(season_of))
    };

    own.or_else(from_dirs).or((fallback > 0).then_some(fallback))
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Longest directory prefix shared by every destination
fn common_parent(files: &[FileTransfer]) -> Option<PathBuf> {
    let mut common = files.first()?.destination.parent()?.to_path_buf();
    while !files.iter().all(|f| f.destination.starts_with(&common)) {
        if !common.pop() {
            return None;
        }
    }
    Some(common)
}
