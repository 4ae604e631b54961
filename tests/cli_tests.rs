use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn formats_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("formats")
}

/// The binary run from `dir` with no inherited configuration
fn vidsink(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vidsink").unwrap();
    cmd.current_dir(dir);
    for key in [
        "VIDSINK_CONFIG",
        "VIDSINK_FFMPEG_PATH",
        "VIDSINK_GIFSKI_PATH",
        "VIDSINK_FORMATS_DIR",
        "VIDSINK_TEMP_DIR",
        "VIDSINK_LOG_LEVEL",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn write_frames(dir: &Path, count: u8) {
    fs::create_dir_all(dir).unwrap();
    for index in 0..count {
        image::RgbImage::from_pixel(10, 6, image::Rgb([index, 40, 80]))
            .save(dir.join(format!("frame_{:03}.png", index)))
            .unwrap();
    }
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    vidsink(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("encode"))
        .stdout(predicate::str::contains("formats"))
        .stdout(predicate::str::contains("widgets"));
}

#[test]
fn test_formats_lists_bundled_descriptors() {
    let dir = TempDir::new().unwrap();
    vidsink(dir.path())
        .arg("--formats-dir")
        .arg(formats_dir())
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("video/h264-mp4"))
        .stdout(predicate::str::contains("video/gifski"));
}

#[test]
fn test_formats_dir_from_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    fs::write(
        &config,
        format!("formats_dir = {:?}\n", formats_dir().display().to_string()),
    )
    .unwrap();

    vidsink(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("video/webm"));
}

#[test]
fn test_widgets_shows_defaults() {
    let dir = TempDir::new().unwrap();
    vidsink(dir.path())
        .arg("--formats-dir")
        .arg(formats_dir())
        .args(["widgets", "--format", "video/h264-mp4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("crf = 19"))
        .stdout(predicate::str::contains("pix_fmt = yuv420p"));
}

#[test]
fn test_unknown_format_fails() {
    let dir = TempDir::new().unwrap();
    vidsink(dir.path())
        .arg("--formats-dir")
        .arg(formats_dir())
        .args(["widgets", "--format", "video/no-such-format"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-format"));
}

#[test]
fn test_bad_widget_assignment_is_rejected() {
    let dir = TempDir::new().unwrap();
    vidsink(dir.path())
        .args(["encode", "--input", "frames", "--output", "out.mp4", "-w", "crf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected name=value"));
}

#[cfg(unix)]
mod with_stand_in_encoder {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Writes its stdin to the last argument
    fn fake_ffmpeg(dir: &Path) -> PathBuf {
        let path = dir.join("ffmpeg");
        fs::write(&path, "#!/bin/sh\nfor last; do :; done\ncat > \"$last\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_encode_image_directory() {
        let dir = TempDir::new().unwrap();
        write_frames(&dir.path().join("frames"), 3);
        let output = dir.path().join("out").join("clip.mp4");

        vidsink(dir.path())
            .arg("--formats-dir")
            .arg(formats_dir())
            .arg("--ffmpeg")
            .arg(fake_ffmpeg(dir.path()))
            .args(["encode", "--input", "frames", "--output"])
            .arg(&output)
            .args(["-w", "crf=23"])
            .assert()
            .success()
            .stdout(predicate::str::contains("(3 frames)"));

        // 10x6 RGB padded to 16x8
        assert_eq!(fs::read(&output).unwrap().len(), 3 * 16 * 8 * 3);
    }

    #[test]
    fn test_chunked_encode_matches_single_call() {
        let dir = TempDir::new().unwrap();
        write_frames(&dir.path().join("frames"), 5);
        let ffmpeg = fake_ffmpeg(dir.path());

        for (name, chunk_size) in [("single.mp4", None), ("chunked.mp4", Some("2"))] {
            let mut cmd = vidsink(dir.path());
            cmd.arg("--formats-dir")
                .arg(formats_dir())
                .arg("--ffmpeg")
                .arg(&ffmpeg)
                .args(["encode", "--input", "frames", "--output", name]);
            if let Some(size) = chunk_size {
                cmd.args(["--chunk-size", size]);
            }
            cmd.assert().success().stdout(predicate::str::contains("(5 frames)"));
        }

        assert_eq!(
            fs::read(dir.path().join("single.mp4")).unwrap(),
            fs::read(dir.path().join("chunked.mp4")).unwrap()
        );
    }

    #[test]
    fn test_existing_output_needs_overwrite() {
        let dir = TempDir::new().unwrap();
        write_frames(&dir.path().join("frames"), 1);
        fs::write(dir.path().join("clip.mp4"), b"keep").unwrap();
        let ffmpeg = fake_ffmpeg(dir.path());

        let run = |overwrite: bool| {
            let mut cmd = vidsink(dir.path());
            cmd.arg("--formats-dir")
                .arg(formats_dir())
                .arg("--ffmpeg")
                .arg(&ffmpeg)
                .args(["encode", "--input", "frames", "--output", "clip.mp4"]);
            if overwrite {
                cmd.arg("--overwrite");
            }
            cmd.assert()
        };

        run(false).failure().stderr(predicate::str::contains("already exists"));
        assert_eq!(fs::read(dir.path().join("clip.mp4")).unwrap(), b"keep");
        run(true).success();
    }

    #[test]
    fn test_pingpong_with_chunks_fails() {
        let dir = TempDir::new().unwrap();
        write_frames(&dir.path().join("frames"), 4);

        vidsink(dir.path())
            .arg("--formats-dir")
            .arg(formats_dir())
            .arg("--ffmpeg")
            .arg(fake_ffmpeg(dir.path()))
            .args(["encode", "--input", "frames", "--output", "pp.mp4"])
            .args(["--pingpong", "--chunk-size", "2"])
            .assert()
            .failure();
        assert!(!dir.path().join("pp.mp4").exists());
    }

    #[test]
    fn test_undecodable_frame_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let frames = dir.path().join("frames");
        write_frames(&frames, 4);
        fs::write(frames.join("frame_002.png"), b"not a png").unwrap();
        let ffmpeg = fake_ffmpeg(dir.path());

        for (name, chunk_size) in [("single.mp4", None), ("chunked.mp4", Some("2"))] {
            let mut cmd = vidsink(dir.path());
            cmd.arg("--formats-dir")
                .arg(formats_dir())
                .arg("--ffmpeg")
                .arg(&ffmpeg)
                .args(["encode", "--input", "frames", "--output", name]);
            if let Some(size) = chunk_size {
                cmd.args(["--chunk-size", size]);
            }
            cmd.assert()
                .failure()
                .stderr(predicate::str::contains("frame_002.png"));
            assert!(!dir.path().join(name).exists(), "{name} was left behind");
        }
    }

    #[test]
    fn test_undecodable_first_frame_keeps_existing_output() {
        let dir = TempDir::new().unwrap();
        let frames = dir.path().join("frames");
        write_frames(&frames, 2);
        fs::write(frames.join("frame_000.png"), b"not a png").unwrap();
        fs::write(dir.path().join("clip.mp4"), b"keep").unwrap();

        vidsink(dir.path())
            .arg("--formats-dir")
            .arg(formats_dir())
            .arg("--ffmpeg")
            .arg(fake_ffmpeg(dir.path()))
            .args(["encode", "--input", "frames", "--output", "clip.mp4"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
        assert_eq!(fs::read(dir.path().join("clip.mp4")).unwrap(), b"keep");
    }
}
