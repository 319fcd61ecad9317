use crate::detection::domain::face_box::FaceBox;

/// Greedy NMS: order by confidence descending, then drop any box whose IoU
/// with an already-kept box exceeds `iou_threshold`.
///
/// The sort is stable, so equal confidences keep their input order. The
/// result is in descending confidence order.
pub fn non_max_suppression(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = kept.iter().any(|k| k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_suppresses_overlapping() {
        let boxes = vec![
            FaceBox::new(0.9, 0.0, 0.0, 100.0, 100.0),
            FaceBox::new(0.8, 5.0, 5.0, 105.0, 105.0),
        ];
        let kept = non_max_suppression(boxes, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_keeps_non_overlapping() {
        let boxes = vec![
            FaceBox::new(0.9, 0.0, 0.0, 50.0, 50.0),
            FaceBox::new(0.8, 200.0, 200.0, 250.0, 250.0),
        ];
        assert_eq!(non_max_suppression(boxes, 0.3).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(non_max_suppression(Vec::new(), 0.3).is_empty());
    }

    #[test]
    fn test_higher_confidence_wins_regardless_of_input_order() {
        let boxes = vec![
            FaceBox::new(0.5, 0.0, 0.0, 100.0, 100.0),
            FaceBox::new(0.9, 2.0, 2.0, 102.0, 102.0),
        ];
        let kept = non_max_suppression(boxes, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_iou_exactly_at_threshold_survives() {
        // Overlap 5x10 → IoU 1/3; a threshold equal to the IoU keeps both.
        let a = FaceBox::new(0.9, 0.0, 0.0, 10.0, 10.0);
        let b = FaceBox::new(0.8, 5.0, 0.0, 15.0, 10.0);
        let iou = a.iou(&b);
        let kept = non_max_suppression(vec![a, b], iou);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_ties_keep_inference_order() {
        let first = FaceBox::new(0.8, 0.0, 0.0, 10.0, 10.0);
        let second = FaceBox::new(0.8, 1.0, 1.0, 11.0, 11.0);
        let kept = non_max_suppression(vec![first, second], 0.3);
        assert_eq!(kept, vec![first]);
    }

    #[test]
    fn test_output_sorted_descending() {
        let boxes = vec![
            FaceBox::new(0.3, 0.0, 0.0, 10.0, 10.0),
            FaceBox::new(0.7, 100.0, 0.0, 110.0, 10.0),
            FaceBox::new(0.5, 200.0, 0.0, 210.0, 10.0),
            FaceBox::new(0.9, 300.0, 0.0, 310.0, 10.0),
        ];
        let kept = non_max_suppression(boxes, 0.5);
        let confidences: Vec<f32> = kept.iter().map(|b| b.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.5, 0.3]);
    }

    #[test]
    fn test_chain_suppression_only_against_kept() {
        // B overlaps A heavily, C overlaps B but not A: B is dropped, C survives.
        let a = FaceBox::new(0.9, 0.0, 0.0, 10.0, 10.0);
        let b = FaceBox::new(0.8, 2.0, 0.0, 12.0, 10.0);
        let c = FaceBox::new(0.7, 10.0, 0.0, 20.0, 10.0);
        let kept = non_max_suppression(vec![a, b, c], 0.5);
        assert_eq!(kept, vec![a, c]);
    }
}
