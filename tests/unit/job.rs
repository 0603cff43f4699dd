use super::*;

fn job() -> RenderJob {
    RenderJob::new(
        "/projects/shot.blend",
        "/renders/shot",
        FrameRange::new(1, 250).unwrap(),
    )
}

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn args_follow_blender_contract() {
    let args = strings(&job().args());
    let sep = std::path::MAIN_SEPARATOR;
    assert_eq!(
        args,
        vec![
            "-b".to_string(),
            "/projects/shot.blend".to_string(),
            "--frame-start".to_string(),
            "1".to_string(),
            "--frame-end".to_string(),
            "250".to_string(),
            "--render-output".to_string(),
            format!("/renders/shot{sep}"),
            "-a".to_string(),
        ]
    );
}

#[test]
fn args_are_pure_and_track_start() {
    let mut job = job();
    let first = job.args();
    assert_eq!(first, job.args());

    job.range.start = 42;
    let moved = job.args();
    assert_eq!(first.len(), moved.len());
    let changed: Vec<usize> = (0..first.len()).filter(|&i| first[i] != moved[i]).collect();
    assert_eq!(changed, vec![3]);
    assert_eq!(moved[3], OsString::from("42"));
}

#[test]
fn single_frame_job_omits_animate_flag() {
    let mut job = job();
    job.animate = false;
    let args = strings(&job.args());
    assert!(!args.contains(&"-a".to_string()));
}

#[test]
fn render_output_keeps_single_trailing_separator() {
    let sep = std::path::MAIN_SEPARATOR;
    let job = RenderJob::new(
        "a.blend",
        format!("/renders/shot{sep}"),
        FrameRange::new(1, 1).unwrap(),
    );
    assert_eq!(
        job.render_output_arg(),
        PathBuf::from(format!("/renders/shot{sep}"))
    );
}

#[test]
fn command_uses_configured_renderer() {
    let cmd = job().with_renderer("/opt/blender/blender").command();
    assert_eq!(cmd.get_program(), "/opt/blender/blender");
    assert_eq!(cmd.get_args().count(), 9);
}

#[test]
fn parse_range_ignores_noise_and_order() {
    let out = "Blender 4.1.0\nRead blend: shot.blend\nend_frame=120\n  start_frame=10  \nBlender quit\n";
    let range = parse_frame_range(out).unwrap();
    assert_eq!(range, FrameRange::new(10, 120).unwrap());
}

#[test]
fn parse_range_requires_both_markers() {
    let err = parse_frame_range("start_frame=1\n").unwrap_err();
    assert!(matches!(err, KeeperError::Discovery(_)));
    assert!(parse_frame_range("").is_err());
}

#[test]
fn parse_range_rejects_bad_numbers() {
    assert!(matches!(
        parse_frame_range("start_frame=one\nend_frame=10\n"),
        Err(KeeperError::Discovery(_))
    ));
    assert!(matches!(
        parse_frame_range("start_frame=20\nend_frame=10\n"),
        Err(KeeperError::Discovery(_))
    ));
}

#[test]
fn discovery_reports_missing_renderer() {
    let err = discover_frame_range(
        Path::new("/definitely/not/a/blender-binary"),
        Path::new("shot.blend"),
    )
    .unwrap_err();
    assert!(matches!(err, KeeperError::Discovery(_)));
}

#[test]
fn output_dir_naming_is_deterministic() {
    let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(7, 5, 1)
        .unwrap();
    let naming = OutputNaming::new("/renders").with_started_at(at);
    let input = Path::new("/projects/my shot.blend");
    assert_eq!(
        naming.dir_for(input),
        PathBuf::from("/renders").join("my shot_20240309-070501")
    );
    assert_eq!(naming.dir_for(input), naming.dir_for(input));
}
