//! Rotation-frame rendering and 360° video encoding.
//!
//! The super-resolution raster is rendered at 10° increments onto a fixed
//! square canvas sized to the image diagonal, so every frame of the sequence
//! shares the same dimensions and nothing is clipped at any angle. The frame
//! set is then piped as raw RGB24 into an external `ffmpeg` process and
//! encoded as H.264 at 24 fps.

use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use image::{DynamicImage, Rgb, RgbImage};

/// Degrees between consecutive rotation frames.
pub const ANGLE_STEP_DEG: u32 = 10;
/// Number of frames in a full rotation sequence (0..360 by 10).
pub const FRAME_COUNT: usize = 36;
/// Playback rate of the encoded rotation video.
pub const VIDEO_FPS: u32 = 24;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Side length of the square frame canvas for a `w`×`h` source.
///
/// The diagonal is the smallest side that fits the image at every rotation
/// angle; it is rounded up to an even number because the H.264 encoder
/// requires even dimensions.
pub fn frame_canvas_side(width: u32, height: u32) -> u32 {
    let diag = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
    let side = diag.ceil() as u32;
    side + (side % 2)
}

/// Render the full 36-frame rotation sequence, angle-ascending.
///
/// Each frame rotates the source counter-clockwise about its center on a
/// white canvas. Source alpha is composited over white, so frames are fully
/// opaque RGB.
pub fn render_frames(source: &DynamicImage) -> Vec<RgbImage> {
    let src = source.to_rgba8();
    let (sw, sh) = (src.width(), src.height());
    let side = frame_canvas_side(sw, sh);

    (0..FRAME_COUNT as u32)
        .map(|n| {
            let theta = f64::from(n * ANGLE_STEP_DEG).to_radians();
            let (sin, cos) = theta.sin_cos();
            let cx = f64::from(side) / 2.0;
            let cy = f64::from(side) / 2.0;
            let scx = f64::from(sw) / 2.0;
            let scy = f64::from(sh) / 2.0;

            let mut frame = RgbImage::from_pixel(side, side, BACKGROUND);
            for y in 0..side {
                for x in 0..side {
                    // Inverse-map the destination pixel into source space.
                    let dx = f64::from(x) + 0.5 - cx;
                    let dy = f64::from(y) + 0.5 - cy;
                    let sx = dx * cos - dy * sin + scx;
                    let sy = dx * sin + dy * cos + scy;
                    if sx < 0.0 || sy < 0.0 {
                        continue;
                    }
                    let (sx, sy) = (sx as u32, sy as u32);
                    if sx >= sw || sy >= sh {
                        continue;
                    }
                    let p = src.get_pixel(sx, sy);
                    let a = u32::from(p[3]);
                    // Composite over the white background.
                    let blend = |c: u8| -> u8 {
                        ((u32::from(c) * a + 255 * (255 - a)) / 255) as u8
                    };
                    frame.put_pixel(x, y, Rgb([blend(p[0]), blend(p[1]), blend(p[2])]));
                }
            }
            frame
        })
        .collect()
}

/// Write each frame as `frame_<angle>.png` under `folder`.
pub fn write_frames(folder: &Path, frames: &[RgbImage]) -> Result<(), image::ImageError> {
    std::fs::create_dir_all(folder)?;
    for (n, frame) in frames.iter().enumerate() {
        let angle = n as u32 * ANGLE_STEP_DEG;
        frame.save(folder.join(format!("frame_{angle}.png")))?;
    }
    Ok(())
}

/// Encode a frame sequence into an H.264 video via an external `ffmpeg`.
///
/// Frames are streamed to ffmpeg's stdin as raw RGB24; all frames must share
/// the same dimensions (guaranteed by [`render_frames`]).
pub fn encode_video(frames: &[RgbImage], out_path: &Path) -> io::Result<()> {
    encode_video_with("ffmpeg", frames, out_path)
}

fn encode_video_with(ffmpeg: &str, frames: &[RgbImage], out_path: &Path) -> io::Result<()> {
    let (width, height) = match frames.first() {
        Some(f) => (f.width(), f.height()),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no frames to encode",
            ))
        }
    };

    let mut child = Command::new(ffmpeg)
        .args([
            "-y",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{width}x{height}"),
            "-r",
            &VIDEO_FPS.to_string(),
            "-i",
            "-",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    // An ffmpeg that dies mid-stream breaks the pipe; the write result is
    // held until the child has been reaped, because bailing out on it
    // directly would leave a zombie per failed product.
    let write_result = match child.stdin.take() {
        Some(mut stdin) => {
            let feed = frames
                .iter()
                .try_for_each(|frame| stdin.write_all(frame.as_raw()));
            // Dropping stdin closes the pipe so ffmpeg sees EOF and exits.
            drop(stdin);
            feed
        }
        None => Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "ffmpeg stdin unavailable",
        )),
    };

    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim().lines().last().unwrap_or("no error output");
        return Err(io::Error::other(format!(
            "ffmpeg exited with {} for {}: {detail}",
            output.status,
            out_path.display()
        )));
    }
    write_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample_image(w: u32, h: u32) -> DynamicImage {
        let mut img = image::RgbaImage::from_pixel(w, h, Rgba([10, 120, 230, 255]));
        img.put_pixel(w / 2, h / 2, Rgba([1, 2, 3, 255]));
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn canvas_side_is_even_and_fits_diagonal() {
        // 10x10 diagonal is ~14.14, rounded up to 15 then to the next even.
        assert_eq!(frame_canvas_side(10, 10), 16);
        assert_eq!(frame_canvas_side(3, 4), 6);
        assert!(frame_canvas_side(7, 1) >= 8);
    }

    #[test]
    fn renders_exactly_36_frames_of_equal_size() {
        let frames = render_frames(&sample_image(9, 5));
        assert_eq!(frames.len(), FRAME_COUNT);
        let side = frame_canvas_side(9, 5);
        for frame in &frames {
            assert_eq!(frame.width(), side);
            assert_eq!(frame.height(), side);
        }
    }

    #[test]
    fn zero_angle_frame_preserves_center_pixel() {
        let img = sample_image(9, 9);
        let frames = render_frames(&img);
        // The canvas side is even, so the source center (4,4) lands at
        // dest (side/2 - 1, side/2 - 1) under the half-pixel-centre map.
        let side = frame_canvas_side(9, 9);
        let center = frames[0].get_pixel(side / 2 - 1, side / 2 - 1);
        assert_eq!(center, &Rgb([1, 2, 3]));
    }

    #[test]
    fn transparent_pixels_blend_to_white() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            4,
            4,
            Rgba([0, 0, 0, 0]),
        ));
        let frames = render_frames(&img);
        let side = frame_canvas_side(4, 4);
        assert_eq!(frames[0].get_pixel(side / 2, side / 2), &BACKGROUND);
    }

    #[test]
    fn writes_angle_named_frame_files() {
        let dir = tempfile::tempdir().unwrap();
        let frames = render_frames(&sample_image(4, 4));
        write_frames(dir.path(), &frames).unwrap();
        for n in 0..FRAME_COUNT as u32 {
            let path = dir.path().join(format!("frame_{}.png", n * ANGLE_STEP_DEG));
            assert!(path.is_file(), "missing {}", path.display());
        }
    }

    #[test]
    fn encode_rejects_empty_frame_set() {
        let err = encode_video(&[], Path::new("/tmp/out.mp4")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn failed_encoder_is_reaped_and_reports_its_stderr() {
        use std::os::unix::fs::PermissionsExt;

        // An encoder that exits without reading stdin: the frame write hits
        // a broken pipe mid-stream.
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake_ffmpeg");
        std::fs::write(
            &fake,
            "#!/bin/sh\necho \"Unknown encoder 'libx264'\" >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let frames = render_frames(&sample_image(32, 32));
        let err = encode_video_with(
            fake.to_str().unwrap(),
            &frames,
            &dir.path().join("out.mp4"),
        )
        .unwrap_err();

        // The child must have been waited on (reaped), so its exit status
        // and stderr are part of the error rather than a bare broken pipe.
        let msg = err.to_string();
        assert!(msg.contains("Unknown encoder"), "got: {msg}");
        assert!(msg.contains("exit status"), "got: {msg}");
    }
}
