//! Warm command: post-process a batch of cached pages in parallel.
//!
//! Pages are collected up front (explicit files plus a walk over any
//! directories), then processed on the rayon pool with one pipeline shared
//! across workers. A failed page keeps its cached bytes; the run never
//! leaves a half-transformed file behind.

use anyhow::{Context, Result};
use jwalk::WalkDir;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use reflow::config::PipelineConfig;
use reflow::core::CancelToken;
use reflow::logger::PagesProgress;
use reflow::pipeline::{Pipeline, PipelineStatus, TransformFailure};
use reflow::{debug, log};

use super::args::WarmArgs;

/// Per-page outcome, serialized into the `--report` file.
#[derive(Debug, Serialize)]
struct PageReport {
    path: PathBuf,
    /// `"done"`, or the failure reason.
    status: String,
    /// Soft transform failures recovered during the run.
    failures: Vec<TransformFailure>,
}

impl PageReport {
    fn is_done(&self) -> bool {
        self.status == "done"
    }
}

pub fn run(args: &WarmArgs, config: &PipelineConfig, cancel: CancelToken) -> Result<()> {
    let pages = collect_pages(&args.paths)?;
    if pages.is_empty() {
        log!("warm"; "no pages to process");
        return Ok(());
    }
    log!("warm"; "processing {} page(s)", pages.len());

    let pipeline = Pipeline::new(config).with_cancel(cancel.clone());
    let progress = PagesProgress::new(pages.len());
    let reports: Vec<PageReport> = pages
        .par_iter()
        .map(|page| {
            let report = process_page(&pipeline, page, args.output.as_deref());
            progress.inc();
            report
        })
        .collect();
    progress.finish();

    summarize(&reports, cancel.is_cancelled());

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&reports)?;
        fs::write(report_path, json)
            .with_context(|| format!("failed to write report to {}", report_path.display()))?;
        log!("warm"; "report written to {}", report_path.display());
    }
    Ok(())
}

/// Process one page and write the result to its destination.
fn process_page(pipeline: &Pipeline, path: &Path, output: Option<&Path>) -> PageReport {
    let report = |status: String, failures| PageReport {
        path: path.to_path_buf(),
        status,
        failures,
    };

    let input = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return report(format!("read failed: {e}"), Vec::new()),
    };

    let outcome = pipeline.run(&input);
    let status = match &outcome.status {
        PipelineStatus::Done => "done".to_string(),
        PipelineStatus::Failed(reason) => reason.to_string(),
    };

    // In place, a failed run would rewrite identical bytes; skip the write
    // so the cached file keeps its mtime. Mirrored runs always write, so
    // the output tree is complete either way.
    if output.is_none() && !outcome.status.is_done() {
        debug!("warm"; "{}: {} (left untouched)", path.display(), status);
        return report(status, outcome.failures);
    }

    let dest = destination(path, output);
    if let Some(parent) = dest.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        return report(format!("write failed: {e}"), outcome.failures);
    }
    if let Err(e) = fs::write(&dest, &outcome.bytes) {
        return report(format!("write failed: {e}"), outcome.failures);
    }
    report(status, outcome.failures)
}

/// Where a processed page lands.
fn destination(path: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        None => path.to_path_buf(),
        Some(dir) => {
            // Relative inputs keep their structure under the output dir;
            // absolute inputs flatten to the file name.
            if path.is_absolute() {
                dir.join(path.file_name().unwrap_or_default())
            } else {
                dir.join(path)
            }
        }
    }
}

/// Expand the given paths into the list of pages to process.
fn collect_pages(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort(true) {
                let entry = entry?;
                let entry_path = entry.path();
                if entry.file_type().is_file() && is_page(&entry_path) {
                    pages.push(entry_path);
                }
            }
        } else if path.is_file() {
            pages.push(path.clone());
        } else {
            anyhow::bail!("no such file or directory: {}", path.display());
        }
    }
    Ok(pages)
}

fn is_page(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html" | "htm")
    )
}

fn summarize(reports: &[PageReport], interrupted: bool) {
    let done = reports.iter().filter(|r| r.is_done()).count();
    let failed = reports.len() - done;
    let soft: usize = reports.iter().map(|r| r.failures.len()).sum();

    for report in reports.iter().filter(|r| !r.is_done()) {
        log!("error"; "{}: {}", report.path.display(), report.status);
    }
    for report in reports {
        for failure in &report.failures {
            log!("error"; "{}: transform {} failed: {}",
                report.path.display(), failure.transform, failure.reason);
        }
    }

    if interrupted {
        log!("warm"; "interrupted: {done} done, {failed} skipped");
    } else if failed == 0 && soft == 0 {
        log!("warm"; "{done} page(s) processed");
    } else {
        log!("warm"; "{done} done, {failed} failed, {soft} transform failure(s)");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_pages_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("sub/page.htm"), "<html></html>").unwrap();
        fs::write(root.join("style.css"), "a{}").unwrap();

        let pages = collect_pages(&[root.to_path_buf()]).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| is_page(p)));
    }

    #[test]
    fn test_collect_pages_missing_path_errors() {
        assert!(collect_pages(&[PathBuf::from("/no/such/dir")]).is_err());
    }

    #[test]
    fn test_destination_mirrors_relative_paths() {
        let out = Path::new("/tmp/out");
        assert_eq!(
            destination(Path::new("cache/a/index.html"), Some(out)),
            PathBuf::from("/tmp/out/cache/a/index.html")
        );
        assert_eq!(
            destination(Path::new("/abs/index.html"), Some(out)),
            PathBuf::from("/tmp/out/index.html")
        );
        assert_eq!(
            destination(Path::new("cache/index.html"), None),
            PathBuf::from("cache/index.html")
        );
    }

    #[test]
    fn test_process_page_writes_transformed_output() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        fs::write(
            &page,
            "<html><head><link rel=\"stylesheet\" href=\"a.css\"></head><body></body></html>",
        )
        .unwrap();

        let config: PipelineConfig =
            toml::from_str(r#"transforms = ["asset-defer"]"#).unwrap();
        let pipeline = Pipeline::new(&config);
        let report = process_page(&pipeline, &page, None);
        assert!(report.is_done(), "status: {}", report.status);
        assert!(report.failures.is_empty());

        let out = fs::read_to_string(&page).unwrap();
        assert!(out.contains("rel=\"preload\""));
    }

    #[test]
    fn test_process_page_failed_run_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("data.html");
        fs::write(&page, "{\"not\": \"html\"}").unwrap();

        let config: PipelineConfig = toml::from_str(r#"guard = "skip-non-html""#).unwrap();
        let pipeline = Pipeline::new(&config);
        let report = process_page(&pipeline, &page, None);
        assert!(!report.is_done());
        assert_eq!(fs::read_to_string(&page).unwrap(), "{\"not\": \"html\"}");
    }
}
