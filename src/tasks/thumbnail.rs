//! Thumbnail generation for a directory's indexed images.
//!
//! Output: `<thumbnail_dir>/<directory_id>/<document id>`, a JPEG whose longest side is
//! `ThumbnailSize`, with transparency flattened onto `ThumbnailColor`.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::search::SearchIndex;
use crate::tracker::SharedProgress;
use crate::types::{Directory, DocumentSummary};

/// Thumbnail settings taken from the directory's options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThumbnailOptions {
    pub size: u32,
    pub quality: u8,
    pub background: [u8; 3],
}

impl ThumbnailOptions {
    const FALLBACK_BACKGROUND: [u8; 3] = [0xFF, 0x00, 0xFF];

    pub fn for_directory(directory: &Directory) -> Self {
        let color = directory.get_option("ThumbnailColor");
        Self {
            size: (directory.get_option_usize("ThumbnailSize").max(1)).min(u32::MAX as usize) as u32,
            quality: directory.get_option_usize("ThumbnailQuality").clamp(1, 100) as u8,
            background: parse_hex_color(&color).unwrap_or_else(|| {
                log::warn!("bad ThumbnailColor {color:?}; using FF00FF");
                Self::FALLBACK_BACKGROUND
            }),
        }
    }
}

/// `RRGGBB`, optionally prefixed with `#`.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let s = s.trim().trim_start_matches('#');
    let bytes = hex::decode(s).ok()?;
    <[u8; 3]>::try_from(bytes.as_slice()).ok()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSummary {
    pub generated: u64,
    /// Documents that are not images.
    pub skipped: u64,
    pub failed: u64,
}

/// Regenerate every thumbnail of `directory`. The output directory is wiped first.
/// `progress` gets the document count as total and one increment per document.
pub fn generate_thumbnails(
    directory: &Directory,
    index: &dyn SearchIndex,
    thumbnail_dir: &Path,
    opts: &ThumbnailOptions,
    threads: usize,
    progress: &SharedProgress,
) -> Result<ThumbnailSummary> {
    let dest = thumbnail_dir.join(directory.id.to_string());
    if dest.exists() {
        std::fs::remove_dir_all(&dest)
            .with_context(|| format!("clear thumbnails in {}", dest.display()))?;
    }
    std::fs::create_dir_all(&dest)
        .with_context(|| format!("create thumbnail dir {}", dest.display()))?;

    let documents = index
        .get_all_documents(directory.id)
        .with_context(|| format!("list documents of directory {}", directory.id))?;
    progress.set_total(documents.len() as u64);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .context("build thumbnail thread pool")?;

    let generated = AtomicU64::new(0);
    let skipped = AtomicU64::new(0);
    let failed = AtomicU64::new(0);
    pool.install(|| {
        documents.par_iter().for_each(|doc| {
            if !doc.mime.starts_with("image/") {
                skipped.fetch_add(1, Ordering::Relaxed);
            } else {
                match thumbnail_document(doc, &directory.path, &dest, opts) {
                    Ok(()) => {
                        generated.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        log::debug!("no thumbnail for {}: {:#}", doc.id, e);
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            progress.inc_parsed();
        });
    });

    let summary = ThumbnailSummary {
        generated: generated.into_inner(),
        skipped: skipped.into_inner(),
        failed: failed.into_inner(),
    };
    log::info!(
        "Thumbnails for {}: {} generated, {} failed",
        directory.path.display(),
        summary.generated,
        summary.failed
    );
    Ok(summary)
}

fn thumbnail_document(
    doc: &DocumentSummary,
    root: &Path,
    dest_dir: &Path,
    opts: &ThumbnailOptions,
) -> Result<()> {
    let src = doc.full_path(root);
    let img = image::open(&src).with_context(|| format!("decode {}", src.display()))?;
    let thumb = flatten(&img.thumbnail(opts.size, opts.size), opts.background);

    let out = dest_dir.join(&doc.id);
    let file = File::create(&out).with_context(|| format!("create {}", out.display()))?;
    let mut writer = BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, opts.quality);
    encoder
        .encode_image(&thumb)
        .with_context(|| format!("encode {}", out.display()))?;
    Ok(())
}

/// Alpha-blend onto a solid background; JPEG has no transparency.
fn flatten(img: &image::DynamicImage, background: [u8; 3]) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let a = px[3] as u32;
        let blend = |c: u8, b: u8| ((c as u32 * a + b as u32 * (255 - a)) / 255) as u8;
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(px[0], background[0]),
                blend(px[1], background[1]),
                blend(px[2], background[2]),
            ]),
        );
    }
    out
}
