use std::path::Path;

use seglabel::ir::io_coco_json::{read_coco_json, write_coco_json};
use seglabel::ir::{ImageId, Segmentation};
use seglabel::mask::{rasterize, Canvas};
use seglabel::resize::{resize_dataset, ResizeOptions, Size};

#[test]
fn resized_sample_survives_coco_roundtrip() {
    let dataset = read_coco_json(Path::new("tests/fixtures/sample.coco.json")).expect("read sample");
    let options = ResizeOptions {
        target: Size::new(12, 12),
        preserve_aspect: true,
    };
    let resized = resize_dataset(&dataset, &options).expect("resize");

    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("nested/resized.json");
    write_coco_json(&path, &resized.dataset).expect("write coco");
    let restored = read_coco_json(&path).expect("read back");

    let image = restored.image(ImageId::new(1)).expect("image 1");
    assert_eq!((image.width, image.height), (12, 8));
    assert_eq!(resized.factors[&ImageId::new(1)].scale_x, 2.0);

    let person = restored
        .annotations
        .iter()
        .find(|ann| ann.id.as_u64() == 10)
        .expect("annotation 10");
    assert_eq!(person.area, 96.0);
    assert_eq!(person.bbox.to_xywh(), [0.0, 0.0, 12.0, 8.0]);
    assert_eq!(person.keypoints, Some(vec![2.0, 2.0, 2.0, 4.0, 4.0, 1.0]));

    // The rescaled polygon rasterizes to the rescaled area.
    let Some(Segmentation::Polygons(rings)) = &person.segmentation else {
        panic!("polygon segmentation expected");
    };
    let rle = rasterize(rings, Canvas::new(image.height, image.width)).expect("rasterize");
    assert_eq!(rle.area() as f64, person.area);

    // RLE segmentations are carried through unchanged.
    let light = restored
        .annotations
        .iter()
        .find(|ann| ann.id.as_u64() == 11)
        .expect("annotation 11");
    assert!(matches!(light.segmentation, Some(Segmentation::UncompressedRle(_))));
}

#[test]
fn original_dataset_can_be_resized_twice() {
    let dataset = read_coco_json(Path::new("tests/fixtures/sample.coco.json")).expect("read sample");
    let small = resize_dataset(
        &dataset,
        &ResizeOptions {
            target: Size::new(3, 3),
            preserve_aspect: false,
        },
    )
    .expect("resize small");
    let large = resize_dataset(
        &dataset,
        &ResizeOptions {
            target: Size::new(60, 40),
            preserve_aspect: false,
        },
    )
    .expect("resize large");

    assert_eq!(small.dataset.images[0].width, 3);
    assert_eq!(large.dataset.images[0].width, 60);
    assert_eq!(large.dataset.annotations[0].area, 2400.0);
}
