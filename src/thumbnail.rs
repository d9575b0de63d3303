use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::GenericImageView;
use std::path::Path;
use std::process::Command;

/// Thumbnails are bounded by this edge length; smaller media is never upscaled.
pub const MAX_EDGE: u32 = 320;
const JPEG_QUALITY: u8 = 80;
pub const THUMBNAIL_MIME: &str = "image/jpeg";

/// What ingest-time derivation produced for one file. Both fields stay absent
/// when derivation fails; the item is stored regardless.
#[derive(Debug, Default)]
pub struct DerivedMedia {
    pub thumbnail: Option<Vec<u8>>,
    pub duration: Option<f64>,
}

/// Runs once per ingested file. Infallible by contract: any decode, probe or
/// seek failure degrades to absent thumbnail/duration and never aborts the
/// ingest of the item itself.
pub fn derive(kind: crate::models::MediaKind, path: &Path, payload: &[u8]) -> DerivedMedia {
    match kind {
        crate::models::MediaKind::Image => DerivedMedia {
            thumbnail: image_thumbnail(payload).ok(),
            duration: None,
        },
        crate::models::MediaKind::Video => {
            let duration = probe_duration(path).ok().flatten();
            DerivedMedia {
                thumbnail: video_thumbnail(path, duration).ok(),
                duration,
            }
        }
        crate::models::MediaKind::Other => DerivedMedia::default(),
    }
}

/// Decode, downscale to the bounded edge preserving aspect ratio, re-encode
/// as JPEG at a fixed quality.
pub fn image_thumbnail(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("decode image bytes for thumbnail")?;
    encode_scaled(decoded)
}

fn encode_scaled(decoded: image::DynamicImage) -> Result<Vec<u8>> {
    let (width, height) = decoded.dimensions();
    let (target_width, target_height) = bounded_size(width, height, MAX_EDGE);

    let resized = if target_width == width && target_height == height {
        decoded
    } else {
        decoded.resize(target_width, target_height, FilterType::Triangle)
    };

    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
        .context("encode thumbnail to jpeg")?;
    Ok(out)
}

/// Aspect-preserving fit inside max_edge; identity when already small enough.
fn bounded_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }
    if width >= height {
        let scaled = ((height as f64) * (max_edge as f64) / (width as f64)).round() as u32;
        (max_edge, scaled.max(1))
    } else {
        let scaled = ((width as f64) * (max_edge as f64) / (height as f64)).round() as u32;
        (scaled.max(1), max_edge)
    }
}

/// Reads the container duration with ffprobe. "N/A" and non-finite values
/// (some live/fragmented streams) are reported as absent, not as errors.
pub fn probe_duration(path: &Path) -> Result<Option<f64>> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .context("run ffprobe")?;

    if !output.status.success() {
        return Err(anyhow!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    match text.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(secs)),
        _ => Ok(None),
    }
}

/// Grabs one frame and runs it through the image pipeline. Seeks to 10% of
/// the duration first to skip black lead-in frames, then falls back to
/// earlier offsets until one yields a decodable frame.
fn video_thumbnail(path: &Path, duration: Option<f64>) -> Result<Vec<u8>> {
    let mut offsets = Vec::new();
    if let Some(secs) = duration {
        offsets.push(secs * 0.1);
    }
    offsets.push(1.0);
    offsets.push(0.0);

    let mut last_err = anyhow!("no seek offsets to try");
    for offset in offsets {
        match grab_frame(path, offset) {
            Ok(png) if !png.is_empty() => {
                let decoded =
                    image::load_from_memory(&png).context("decode frame grabbed by ffmpeg")?;
                return encode_scaled(decoded);
            }
            Ok(_) => last_err = anyhow!("ffmpeg produced an empty frame at {offset:.3}s"),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

fn grab_frame(path: &Path, offset: f64) -> Result<Vec<u8>> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error"])
        .args(["-ss", &format!("{offset:.3}")])
        .arg("-i")
        .arg(path)
        .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "pipe:1"])
        .output()
        .context("run ffmpeg")?;

    if !output.status.success() {
        return Err(anyhow!(
            "ffmpeg failed at {offset:.3}s: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn large_image_is_scaled_down_to_max_edge() {
        let thumb = image_thumbnail(&png_bytes(1024, 512)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.width(), MAX_EDGE);
        assert_eq!(decoded.height(), MAX_EDGE / 2);
    }

    #[test]
    fn small_image_is_never_upscaled() {
        let thumb = image_thumbnail(&png_bytes(100, 60)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 60));
    }

    #[test]
    fn tall_image_keeps_aspect_ratio() {
        assert_eq!(bounded_size(512, 1024, 320), (160, 320));
        assert_eq!(bounded_size(320, 320, 320), (320, 320));
        assert_eq!(bounded_size(1, 10_000, 320), (1, 320));
    }

    #[test]
    fn undecodable_bytes_fail_cleanly() {
        assert!(image_thumbnail(b"definitely not an image").is_err());
    }

    #[test]
    fn derive_for_other_kind_attempts_nothing() {
        let d = derive(MediaKind::Other, Path::new("whatever.pdf"), &[1, 2, 3]);
        assert!(d.thumbnail.is_none());
        assert!(d.duration.is_none());
    }

    #[test]
    fn derive_for_broken_image_stores_no_thumbnail() {
        let d = derive(MediaKind::Image, Path::new("broken.png"), b"garbage");
        assert!(d.thumbnail.is_none());
        assert!(d.duration.is_none());
    }

    fn ffmpeg_available() -> bool {
        let ok = |bin: &str| {
            Command::new(bin)
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        };
        ok("ffmpeg") && ok("ffprobe")
    }

    #[test]
    fn video_probe_and_frame_grab_work_end_to_end() {
        if !ffmpeg_available() {
            eprintln!("skipping: ffmpeg/ffprobe not installed");
            return;
        }

        let dir = tempfile::TempDir::new().unwrap();
        let clip = dir.path().join("clip.mp4");
        let status = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-f", "lavfi"])
            .args(["-i", "testsrc=duration=2:size=64x48:rate=10"])
            .args(["-pix_fmt", "yuv420p"])
            .arg(&clip)
            .status()
            .unwrap();
        assert!(status.success());

        let duration = probe_duration(&clip).unwrap().expect("duration probed");
        assert!((duration - 2.0).abs() < 0.5, "got {duration}");

        let d = derive(MediaKind::Video, &clip, &[]);
        assert_eq!(d.duration, Some(duration));
        let thumb = d.thumbnail.expect("frame grabbed");
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn derive_for_unreadable_video_degrades_to_absent() {
        // Whether or not ffmpeg is installed, a nonexistent file must not
        // produce a thumbnail or a duration.
        let d = derive(MediaKind::Video, Path::new("/no/such/clip.mp4"), &[]);
        assert!(d.thumbnail.is_none());
        assert!(d.duration.is_none());
    }
}
