use falcon_types::{BBox, ClassTag};
use image::RgbImage;

/// An inclusive HSV window. `h` is degrees `[0, 360)`; `s`/`v` are
/// fractions `[0, 1]`. `h_min > h_max` is interpreted as wrapping through 0
/// (e.g. red hues spanning 350..=360 and 0..=10).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvWindow {
    pub h_min: f32,
    pub h_max: f32,
    pub s_min: f32,
    pub s_max: f32,
    pub v_min: f32,
    pub v_max: f32,
}

impl HsvWindow {
    fn contains(&self, h: f32, s: f32, v: f32) -> bool {
        let hue_ok = if self.h_min <= self.h_max {
            h >= self.h_min && h <= self.h_max
        } else {
            h >= self.h_min || h <= self.h_max
        };
        hue_ok && s >= self.s_min && s <= self.s_max && v >= self.v_min && v <= self.v_max
    }
}

/// Configured HSV windows for the two subclass refinements (4.7). Matches
/// the original's two reclassification checks, values are the spec's
/// literal thresholds (vest >10% coverage; work-vehicle yellow>5% AND
/// black>1%), not the original's divergent per-module numbers.
#[derive(Debug, Clone)]
pub struct RefinerConfig {
    pub vest_window: HsvWindow,
    pub vehicle_yellow_window: HsvWindow,
    pub vehicle_black_window: HsvWindow,
    pub vest_min_ratio: f32,
    pub vehicle_yellow_min_ratio: f32,
    pub vehicle_black_min_ratio: f32,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        RefinerConfig {
            // high-visibility safety yellow/green
            vest_window: HsvWindow { h_min: 50.0, h_max: 80.0, s_min: 0.4, s_max: 1.0, v_min: 0.5, v_max: 1.0 },
            vehicle_yellow_window: HsvWindow { h_min: 45.0, h_max: 65.0, s_min: 0.3, s_max: 1.0, v_min: 0.4, v_max: 1.0 },
            vehicle_black_window: HsvWindow { h_min: 0.0, h_max: 360.0, s_min: 0.0, s_max: 1.0, v_min: 0.0, v_max: 0.15 },
            vest_min_ratio: 0.10,
            vehicle_yellow_min_ratio: 0.05,
            vehicle_black_min_ratio: 0.01,
        }
    }
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    let v = max;
    (h, s, v)
}

fn ratio_in_window(image: &RgbImage, bbox: &BBox, window: &HsvWindow) -> f32 {
    let x0 = bbox.x0.max(0.0) as u32;
    let y0 = bbox.y0.max(0.0) as u32;
    let x1 = (bbox.x1.max(0.0) as u32).min(image.width());
    let y1 = (bbox.y1.max(0.0) as u32).min(image.height());
    if x1 <= x0 || y1 <= y0 {
        return 0.0;
    }

    let mut total = 0u64;
    let mut matched = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let px = image.get_pixel(x, y);
            let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
            if window.contains(h, s, v) {
                matched += 1;
            }
            total += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        matched as f32 / total as f32
    }
}

/// Returns the refined subclass for `class`, if the bbox crop's color
/// signature qualifies, per 4.7. Returns `None` when `class` is not
/// refinable or the crop does not qualify.
pub fn refine(image: &RgbImage, class: ClassTag, bbox: &BBox, config: &RefinerConfig) -> Option<ClassTag> {
    match class {
        ClassTag::Person => {
            let ratio = ratio_in_window(image, bbox, &config.vest_window);
            (ratio > config.vest_min_ratio).then_some(ClassTag::WorkPerson)
        }
        ClassTag::Vehicle => {
            let yellow = ratio_in_window(image, bbox, &config.vehicle_yellow_window);
            let black = ratio_in_window(image, bbox, &config.vehicle_black_window);
            (yellow > config.vehicle_yellow_min_ratio && black > config.vehicle_black_min_ratio)
                .then_some(ClassTag::WorkVehicle)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn bbox_for(img: &RgbImage) -> BBox {
        BBox { x0: 0.0, y0: 0.0, x1: img.width() as f32, y1: img.height() as f32 }
    }

    #[test]
    fn solid_vest_color_refines_person_to_work_person() {
        let img = RgbImage::from_pixel(10, 10, Rgb([60, 220, 40])); // saturated yellow-green
        let bbox = bbox_for(&img);
        let out = refine(&img, ClassTag::Person, &bbox, &RefinerConfig::default());
        assert_eq!(out, Some(ClassTag::WorkPerson));
    }

    #[test]
    fn plain_gray_person_does_not_refine() {
        let img = RgbImage::from_pixel(10, 10, Rgb([128, 128, 128]));
        let bbox = bbox_for(&img);
        let out = refine(&img, ClassTag::Person, &bbox, &RefinerConfig::default());
        assert_eq!(out, None);
    }

    #[test]
    fn vehicle_needs_both_yellow_and_black_present() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([128, 128, 128]));
        // Paint 60% of the image safety yellow and 5% near-black.
        for y in 0..6 {
            for x in 0..10 {
                img.put_pixel(x, y, Rgb([210, 190, 30]));
            }
        }
        img.put_pixel(0, 9, Rgb([5, 5, 5]));
        let bbox = bbox_for(&img);
        let out = refine(&img, ClassTag::Vehicle, &bbox, &RefinerConfig::default());
        assert_eq!(out, Some(ClassTag::WorkVehicle));
    }

    #[test]
    fn yellow_without_black_does_not_refine_vehicle() {
        let img = RgbImage::from_pixel(10, 10, Rgb([210, 190, 30]));
        let bbox = bbox_for(&img);
        let out = refine(&img, ClassTag::Vehicle, &bbox, &RefinerConfig::default());
        assert_eq!(out, None);
    }

    #[test]
    fn non_refinable_class_is_always_none() {
        let img = RgbImage::from_pixel(10, 10, Rgb([60, 220, 40]));
        let bbox = bbox_for(&img);
        assert_eq!(refine(&img, ClassTag::Bird, &bbox, &RefinerConfig::default()), None);
    }
}
