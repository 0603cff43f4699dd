use super::*;

use crate::foundation::core::FrameRange;

#[test]
fn exit_display_and_code() {
    assert_eq!(AttemptExit::Code(3).to_string(), "exit code 3");
    assert_eq!(AttemptExit::Code(3).code(), Some(3));
    assert_eq!(AttemptExit::Signal.code(), None);
    assert!(AttemptExit::Signal.to_string().contains("signal"));
}

#[test]
fn missing_renderer_is_a_launch_error() {
    let job = RenderJob::new("shot.blend", "out", FrameRange::new(1, 2).unwrap())
        .with_renderer("/definitely/not/a/blender-binary");
    let err = BlenderProcess::new()
        .run_attempt(&job, &CancelToken::new(), &mut |_| {})
        .unwrap_err();
    assert!(matches!(err, KeeperError::Launch(_)));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::PermissionsExt as _;
    use std::path::{Path, PathBuf};

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-renderer.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn fast() -> BlenderProcess {
        BlenderProcess {
            poll_interval: Duration::from_millis(20),
            drain_grace: Duration::from_millis(500),
        }
    }

    #[test]
    fn forwards_merged_output_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = script(
            tmp.path(),
            "echo one\necho two >&2\necho three\nprintf 'no newline'\nexit 3",
        );
        let job = RenderJob::new("shot.blend", tmp.path().join("out"), FrameRange::new(1, 2).unwrap())
            .with_renderer(renderer);

        let mut lines = Vec::new();
        let exit = fast()
            .run_attempt(&job, &CancelToken::new(), &mut |l| lines.push(l.to_string()))
            .unwrap();

        assert_eq!(exit, AttemptExit::Code(3));
        assert_eq!(lines, vec!["one", "two", "three", "no newline"]);
    }

    #[test]
    fn receives_job_arguments() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = script(tmp.path(), "for a in \"$@\"; do echo \"$a\"; done");
        let job = RenderJob::new("shot.blend", "/renders/x", FrameRange::new(4, 9).unwrap())
            .with_renderer(renderer);

        let mut lines = Vec::new();
        let exit = fast()
            .run_attempt(&job, &CancelToken::new(), &mut |l| lines.push(l.to_string()))
            .unwrap();

        assert_eq!(exit, AttemptExit::Code(0));
        assert_eq!(
            lines,
            vec![
                "-b",
                "shot.blend",
                "--frame-start",
                "4",
                "--frame-end",
                "9",
                "--render-output",
                "/renders/x/",
                "-a"
            ]
        );
    }

    #[test]
    fn killed_process_reports_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = script(tmp.path(), "kill -9 $$");
        let job = RenderJob::new("shot.blend", "out", FrameRange::new(1, 1).unwrap())
            .with_renderer(renderer);

        let exit = fast()
            .run_attempt(&job, &CancelToken::new(), &mut |_| {})
            .unwrap();
        assert_eq!(exit, AttemptExit::Signal);
    }

    #[test]
    fn cancellation_kills_the_renderer() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = script(tmp.path(), "echo started\nexec sleep 30");
        let job = RenderJob::new("shot.blend", "out", FrameRange::new(1, 1).unwrap())
            .with_renderer(renderer);

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let began = Instant::now();
        let err = fast()
            .run_attempt(&job, &cancel, &mut |_| trigger.cancel())
            .unwrap_err();

        assert!(matches!(err, KeeperError::Cancelled));
        assert!(began.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn cancellation_still_applies_after_output_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = script(tmp.path(), "echo started\nexec 1>&- 2>&-\nexec sleep 30");
        let job = RenderJob::new("shot.blend", "out", FrameRange::new(1, 1).unwrap())
            .with_renderer(renderer);

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(500));
            trigger.cancel();
        });

        let began = Instant::now();
        let mut lines = Vec::new();
        let err = fast()
            .run_attempt(&job, &cancel, &mut |l| lines.push(l.to_string()))
            .unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, KeeperError::Cancelled));
        assert_eq!(lines, vec!["started"]);
        assert!(began.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn grandchild_holding_output_does_not_block_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let renderer = script(tmp.path(), "echo rendered\nsleep 5 &\nexit 0");
        let job = RenderJob::new("shot.blend", "out", FrameRange::new(1, 1).unwrap())
            .with_renderer(renderer);

        let began = Instant::now();
        let mut lines = Vec::new();
        let exit = fast()
            .run_attempt(&job, &CancelToken::new(), &mut |l| lines.push(l.to_string()))
            .unwrap();

        assert_eq!(exit, AttemptExit::Code(0));
        assert_eq!(lines, vec!["rendered"]);
        assert!(began.elapsed() < Duration::from_secs(4));
    }
}
