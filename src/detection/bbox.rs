use ndarray::{s, ArrayViewD, Axis, Ix3};

use super::preprocessing::Letterbox;
use super::{DetectError, Detection};

/// Box coordinates come first in every prediction row.
const BOX_VALUES: usize = 4;

pub fn decode_box(center: [f32; 2], size: [f32; 2]) -> [f32; 4] {
    let x1 = center[0] - size[0] / 2.0;
    let y1 = center[1] - size[1] / 2.0;
    let x2 = center[0] + size[0] / 2.0;
    let y2 = center[1] + size[1] / 2.0;

    [x1, y1, x2, y2]
}

/// Maps a box from model input space back onto the source image.
pub fn restore_box(bbox: [f32; 4], letterbox: &Letterbox) -> [f32; 4] {
    let max_x = letterbox.source_width as f32;
    let max_y = letterbox.source_height as f32;
    let unmap_x = |x: f32| ((x - letterbox.pad_x as f32) / letterbox.scale).clamp(0.0, max_x);
    let unmap_y = |y: f32| ((y - letterbox.pad_y as f32) / letterbox.scale).clamp(0.0, max_y);

    [unmap_x(bbox[0]), unmap_y(bbox[1]), unmap_x(bbox[2]), unmap_y(bbox[3])]
}

/// Turns the raw YOLOv8 head output into one detection per anchor.
///
/// The usual layout is `[1, 4 + classes, anchors]`; exports that transpose the
/// last two axes are accepted as well, since anchors always outnumber values.
pub fn decode_predictions(
    output: ArrayViewD<f32>,
    letterbox: &Letterbox,
) -> Result<Vec<Detection>, DetectError> {
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|e| DetectError::Output(format!("expected a rank 3 tensor: {e}")))?;

    let mut predictions = output.index_axis_move(Axis(0), 0);
    if predictions.nrows() > predictions.ncols() {
        predictions = predictions.reversed_axes();
    }

    let values = predictions.nrows();
    if values <= BOX_VALUES {
        return Err(DetectError::Output(format!(
            "prediction rows hold {values} values, need at least {}",
            BOX_VALUES + 1
        )));
    }

    let detections = predictions
        .axis_iter(Axis(1))
        .map(|anchor| {
            let (class_id, confidence) = anchor
                .slice(s![BOX_VALUES..])
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (class_id, score)| {
                    if score > best.1 {
                        (class_id, score)
                    } else {
                        best
                    }
                });

            let bbox = decode_box([anchor[0], anchor[1]], [anchor[2], anchor[3]]);
            Detection {
                class_id,
                confidence,
                bbox: restore_box(bbox, letterbox),
            }
        })
        .collect();

    Ok(detections)
}
