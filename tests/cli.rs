use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

const SAMPLE: &str = "tests/fixtures/sample.coco.json";

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("seglabel"));
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(format!("seglabel {}\n", env!("CARGO_PKG_VERSION")));
}

// Seg subcommand tests

#[test]
fn seg_writes_label_maps_and_manifest() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let out = temp.path().join("out");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["seg", SAMPLE, "--output-dir"]).arg(&out);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Converted:       1"))
        .stdout(predicates::str::contains("Skipped (empty): 1"))
        .stdout(predicates::str::contains("Failed:          1"));

    assert!(out.join("class_labels/1.png").is_file());
    assert!(out.join("instance_labels/1.png").is_file());
    assert!(out.join("id_labels/1.npz").is_file());
    assert!(!out.join("class_labels/3.png").exists());
    assert_eq!(
        fs::read_to_string(out.join("images_ids.txt")).expect("read manifest"),
        "1\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("image_names.txt")).expect("read names"),
        "000001\n"
    );
    assert!(!out.join("class_color").exists());
}

#[test]
fn seg_no_compress_writes_npy() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["seg", SAMPLE, "--no-compress", "--colorize", "--output-dir"])
        .arg(temp.path());
    cmd.assert().success();

    assert!(temp.path().join("id_labels/1.npy").is_file());
    assert!(temp.path().join("class_color/1.png").is_file());
}

#[test]
fn seg_fail_fast_reports_bad_image() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["seg", SAMPLE, "--fail-fast", "--output-dir"])
        .arg(temp.path());
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Image 3 failed"))
        .stderr(predicates::str::contains("Invalid polygon"));
}

#[test]
fn seg_missing_input_fails() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["seg", "tests/fixtures/does_not_exist.json", "--output-dir"])
        .arg(temp.path());
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("IO error"));
}

// Voc subcommand tests

#[test]
fn voc_writes_full_layout() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let images = temp.path().join("images");
    fs::create_dir_all(&images).expect("create image dir");
    fs::write(images.join("000001.jpg"), b"not really a jpeg").expect("write image");

    let out = temp.path().join("voc");
    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["voc", SAMPLE, "--copy-images", "--output-dir"])
        .arg(&out)
        .arg("--image-dir")
        .arg(&images);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Wrote 2 XML file(s)"))
        .stdout(predicates::str::contains("Copied 1 image(s)"));

    assert!(out.join("Annotations/000001.xml").is_file());
    assert!(out.join("JPEGImages/000001.jpg").is_file());
    assert!(out.join("class_labels/1.png").is_file());
    assert!(out.join("class_color/1.png").is_file());
    assert_eq!(
        fs::read_to_string(out.join("image_names.txt")).expect("read names"),
        "000001\n"
    );
}

#[test]
fn voc_no_colorize_skips_palette_maps() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["voc", SAMPLE, "--no-colorize", "--output-dir"])
        .arg(temp.path());
    cmd.assert().success();

    assert!(temp.path().join("class_labels/1.png").is_file());
    assert!(!temp.path().join("class_color").exists());
}

#[test]
fn voc_separate_categories_replicates_xml() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["voc", SAMPLE, "--separate-categories", "--output-dir"])
        .arg(temp.path());
    cmd.assert().success();

    assert!(temp.path().join("person/000001.xml").is_file());
    assert!(temp.path().join("traffic_light/000001.xml").is_file());
    assert!(temp.path().join("traffic_light/000003.xml").is_file());
    assert!(!temp.path().join("person/000003.xml").exists());
}

#[test]
fn voc_keypoint_kind_writes_keypoint_xml() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["voc", SAMPLE, "--kind", "keypoint", "--output-dir"])
        .arg(temp.path());
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Wrote 2 XML file(s)"));

    let xml = fs::read_to_string(temp.path().join("Annotations/000001.xml")).expect("read xml");
    assert!(xml.contains("<folder>VOC2014_keypoints</folder>"));
    assert!(xml.contains("<left_eye>"));
}

#[test]
fn voc_rejects_unknown_kind() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["voc", SAMPLE, "--kind", "panoptic", "--output-dir"])
        .arg(temp.path());
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("Unsupported format"));
}

#[test]
fn voc_copy_images_requires_image_dir() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["voc", SAMPLE, "--copy-images", "--output-dir"])
        .arg(temp.path());
    cmd.assert().failure();
}

// Resize subcommand tests

#[test]
fn resize_writes_scaled_annotations() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let output = temp.path().join("resized/annotations.json");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["resize", SAMPLE, "--width", "3", "--height", "3", "--output"])
        .arg(&output);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("Resized 3 image(s) and 3 annotation(s)"));

    let dataset = seglabel::ir::io_coco_json::read_coco_json(&output).expect("read output");
    let first = dataset.image(1u64.into()).expect("image 1");
    assert_eq!((first.width, first.height), (3, 2));
}

#[test]
fn resize_rejects_zero_target() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["resize", SAMPLE, "--width", "0", "--height", "3", "--output"])
        .arg(temp.path().join("out.json"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("sizes must be positive"));
}

#[test]
fn resize_image_dir_requires_output_image_dir() {
    let temp = tempfile::tempdir().expect("create temp dir");

    let mut cmd = Command::cargo_bin("seglabel").unwrap();
    cmd.args(["resize", SAMPLE, "--width", "3", "--height", "3", "--output"])
        .arg(temp.path().join("out.json"))
        .arg("--image-dir")
        .arg(temp.path());
    cmd.assert().failure();
}
