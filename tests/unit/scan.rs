use super::*;

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"").unwrap();
}

#[test]
fn missing_directory_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let frames = scan_completed_frames(&tmp.path().join("not-created-yet")).unwrap();
    assert!(frames.is_empty());
}

#[test]
fn skips_non_numeric_names() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["3.png", "7.png", "1.png", "notanumber.png"] {
        touch(tmp.path(), name);
    }

    let frames = scan_completed_frames(tmp.path()).unwrap();
    assert_eq!(frames.into_iter().collect::<Vec<_>>(), vec![1, 3, 7]);
}

#[test]
fn zero_padded_names_and_subdirectories() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "0001.png");
    touch(tmp.path(), "0012.exr");
    std::fs::create_dir(tmp.path().join("0099.png")).unwrap();
    std::fs::create_dir(tmp.path().join("nested")).unwrap();
    touch(&tmp.path().join("nested"), "0050.png");

    let frames = scan_completed_frames(tmp.path()).unwrap();
    assert_eq!(frames.into_iter().collect::<Vec<_>>(), vec![1, 12]);
}

#[test]
fn frame_number_uses_last_extension_separator() {
    assert_eq!(frame_number("0007.png"), Some(7));
    assert_eq!(frame_number("12"), Some(12));
    assert_eq!(frame_number("5.tar.gz"), None);
    assert_eq!(frame_number("+5.png"), None);
    assert_eq!(frame_number("-5.png"), None);
    assert_eq!(frame_number(".png"), None);
    assert_eq!(frame_number("frame_0001.png"), None);
}

#[test]
fn last_completed_is_max() {
    let frames: FrameSet = [4, 9, 2].into_iter().collect();
    assert_eq!(last_completed(&frames), Some(9));
    assert_eq!(last_completed(&FrameSet::new()), None);
}
