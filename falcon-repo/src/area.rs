use std::collections::HashMap;

use falcon_types::BBox;

/// Resolves a detection's pixel bbox to a named operational area (4.14) by
/// testing the bbox's bottom-center point against configured polygons, per
/// the area-mapping open question's resolution: an object's footprint is
/// better represented by where its base touches the ground than by its
/// geometric center, which for a tall object can sit well outside the area
/// it is actually standing in.
#[derive(Debug, Clone, Default)]
pub struct AreaMap {
    polygons: HashMap<String, Vec<(f32, f32)>>,
}

impl AreaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_area(mut self, name: impl Into<String>, polygon: Vec<(f32, f32)>) -> Self {
        self.polygons.insert(name.into(), polygon);
        self
    }

    /// Returns the first configured area whose polygon contains `bbox`'s
    /// bottom-center point, or `None` if it falls outside every area.
    pub fn locate(&self, bbox: &BBox) -> Option<&str> {
        let (px, py) = bbox.bottom_center();
        self.polygons
            .iter()
            .find(|(_, poly)| point_in_polygon(px, py, poly))
            .map(|(name, _)| name.as_str())
    }

    pub fn area_names(&self) -> impl Iterator<Item = &str> {
        self.polygons.keys().map(|s| s.as_str())
    }

    pub fn polygon(&self, name: &str) -> Option<&[(f32, f32)]> {
        self.polygons.get(name).map(|v| v.as_slice())
    }
}

/// Standard ray-casting point-in-polygon test.
fn point_in_polygon(px: f32, py: f32, polygon: &[(f32, f32)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        let intersects = (yi > py) != (yj > py)
            && px < (xj - xi) * (py - yi) / (yj - yi) + xi;
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<(f32, f32)> {
        vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]
    }

    #[test]
    fn bottom_center_inside_polygon_resolves_to_its_area() {
        let map = AreaMap::new().with_area("RWY-A", square());
        let bbox = BBox { x0: 10.0, y0: 10.0, x1: 30.0, y1: 50.0 }; // bottom-center (20, 50)
        assert_eq!(map.locate(&bbox), Some("RWY-A"));
    }

    #[test]
    fn point_outside_every_polygon_resolves_to_none() {
        let map = AreaMap::new().with_area("RWY-A", square());
        let bbox = BBox { x0: 200.0, y0: 200.0, x1: 220.0, y1: 250.0 };
        assert_eq!(map.locate(&bbox), None);
    }

    #[test]
    fn tall_object_is_located_by_its_base_not_its_center() {
        // Object spans from inside the square up far above it; its
        // geometric center would fall outside, but its bottom-center does
        // not.
        let map = AreaMap::new().with_area("RWY-A", square());
        let bbox = BBox { x0: 40.0, y0: -500.0, x1: 60.0, y1: 90.0 };
        assert_eq!(map.locate(&bbox), Some("RWY-A"));
    }
}
